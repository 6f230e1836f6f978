use crate::domain::model::{Cafeteria, Menu, MenuItem, MenuValidationResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Source of "now" in the configured civil timezone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Pulls raw dish sections out of the cafeteria page.
pub trait HtmlExtractor: Send + Sync {
    /// One entry per weekday section, in document order.
    fn food_lists(&self, markup: &str) -> Vec<String>;

    /// Dish names inside a single section, empty names dropped.
    fn food_items(&self, section: &str) -> Vec<String>;
}

#[async_trait]
pub trait MenuSource: Send + Sync {
    async fn fetch_menu(&self, cancel: &CancellationToken) -> Result<Menu>;
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    /// `Ok(None)` when nothing was stored for that exact day.
    async fn load(&self, cafeteria: Cafeteria, date: NaiveDate) -> Result<Option<Vec<MenuItem>>>;

    async fn save(&self, cafeteria: Cafeteria, dishes: &[MenuItem], date: NaiveDate) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], cancel: &CancellationToken) -> Result<String>;
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn validate(&self, menu: &Menu, cancel: &CancellationToken) -> Result<MenuValidationResult>;

    /// Fills descriptions in place. Items that succeeded keep their data even when
    /// the call returns an error.
    async fn enrich(&self, menu: &mut Menu, cancel: &CancellationToken) -> Result<()>;
}

/// What the scheduler needs from the orchestrator.
#[async_trait]
pub trait MenuRefresher: Send + Sync {
    async fn refresh_menu(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu>;

    fn clear_cache(&self);
}

/// What front ends need from the orchestrator.
#[async_trait]
pub trait MenuProvider: Send + Sync {
    async fn get_menu(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<()>;
}
