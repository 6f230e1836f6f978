// Adapters layer: concrete implementations for external systems (clock, http, model gateway, storage, chat).

pub mod clock;
pub mod html;
pub mod http_source;
pub mod llm;
pub mod sqlite;
pub mod webhook;

pub use clock::ZonedClock;
pub use html::FoodListExtractor;
pub use http_source::{HttpMenuSource, HttpSourceOptions};
pub use llm::GatewayClient;
pub use sqlite::SqliteMenuRepository;
pub use webhook::WebhookNotifier;
