pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::Settings;
pub use core::{MenuBoard, MenuCache, MenuOrchestrator, MenuScheduler};
pub use domain::model::{Cafeteria, Menu, MenuItem};
pub use utils::error::{MenuError, Result};
