pub mod toml_config;

pub use toml_config::{Settings, DEFAULT_CONFIG_PATH};
