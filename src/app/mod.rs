// 組裝所有元件，整個程式只在這裡建立實體
use crate::adapters::{
    FoodListExtractor, GatewayClient, HttpMenuSource, SqliteMenuRepository, WebhookNotifier,
    ZonedClock,
};
use crate::config::Settings;
use crate::core::{
    DescriptionEnricher, MenuBoard, MenuCache, MenuOrchestrator, MenuScheduler,
    NotificationDispatcher,
};
use crate::domain::model::Cafeteria;
use crate::domain::ports::Clock;
use crate::utils::error::{MenuError, Result};
use std::sync::Arc;
use std::time::Duration;

pub fn build_clock(settings: &Settings) -> Arc<dyn Clock> {
    Arc::new(ZonedClock::from_hours(settings.app.utc_offset_hours))
}

/// Wires cache, SQLite storage, both HTTP sources and the model-backed enricher.
pub async fn build_orchestrator(
    settings: &Settings,
    clock: Arc<dyn Clock>,
) -> Result<Arc<MenuOrchestrator>> {
    let repository =
        SqliteMenuRepository::connect(&settings.database.url, settings.database.max_connections)
            .await?;
    tracing::info!(url = %settings.database.url, "🗄️ Menu storage ready");

    let model = GatewayClient::new(&settings.ai.endpoint, &settings.ai.api_token)
        .with_timeout(Duration::from_secs(settings.ai.timeout_seconds))
        .with_retry(settings.model_retry());
    let enricher = DescriptionEnricher::new(Arc::new(model), settings.ai.max_concurrent_requests);

    let cache = MenuCache::with_ttl(clock.clone(), settings.cache_ttl());
    let extractor = Arc::new(FoodListExtractor::new());

    let mut orchestrator = MenuOrchestrator::new(
        Arc::new(cache),
        Arc::new(repository),
        Arc::new(enricher),
        clock.clone(),
    );

    for cafeteria in Cafeteria::ALL {
        let source = HttpMenuSource::new(
            cafeteria,
            settings.source_url(cafeteria),
            clock.clone(),
            extractor.clone(),
            settings.fetch_options(),
        );
        orchestrator = orchestrator.with_source(cafeteria, Arc::new(source));
    }

    Ok(Arc::new(orchestrator))
}

pub fn build_scheduler(
    settings: &Settings,
    orchestrator: Arc<MenuOrchestrator>,
    clock: Arc<dyn Clock>,
) -> MenuScheduler {
    let cafeterias = orchestrator.cafeterias();
    MenuScheduler::new(orchestrator, cafeterias, clock, settings.scheduler_options())
}

pub fn build_board(orchestrator: Arc<MenuOrchestrator>) -> MenuBoard {
    let cafeterias = orchestrator.cafeterias();
    MenuBoard::new(orchestrator, cafeterias)
}

/// Dispatcher plus its recipients; fails when `[notifications]` is not configured.
pub fn build_dispatcher(settings: &Settings) -> Result<(NotificationDispatcher, Vec<String>)> {
    let notifications = settings
        .notifications
        .as_ref()
        .ok_or_else(|| MenuError::MissingConfigError {
            field: "notifications".to_string(),
        })?;

    let notifier = WebhookNotifier::new(&notifications.webhook_url);
    let dispatcher = NotificationDispatcher::new(Arc::new(notifier), notifications.max_concurrent);
    Ok((dispatcher, notifications.recipients.clone()))
}
