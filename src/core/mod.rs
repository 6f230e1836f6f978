pub mod board;
pub mod cache;
pub mod enricher;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use board::MenuBoard;
pub use cache::MenuCache;
pub use enricher::DescriptionEnricher;
pub use notify::{DispatchReport, NotificationDispatcher};
pub use orchestrator::MenuOrchestrator;
pub use scheduler::{MenuScheduler, SchedulerOptions};
pub use crate::utils::error::Result;
