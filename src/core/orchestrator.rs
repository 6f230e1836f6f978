use crate::core::cache::MenuCache;
use crate::domain::model::{Cafeteria, Menu};
use crate::domain::ports::{
    Clock, Enricher, MenuProvider, MenuRefresher, MenuRepository, MenuSource,
};
use crate::utils::error::{MenuError, Result, Stage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Cache-aside menu pipeline: cache, then today's stored row, then a fresh
/// fetch-validate-enrich run that is written back to both.
pub struct MenuOrchestrator {
    cache: Arc<MenuCache>,
    repository: Arc<dyn MenuRepository>,
    sources: HashMap<Cafeteria, Arc<dyn MenuSource>>,
    enricher: Arc<dyn Enricher>,
    clock: Arc<dyn Clock>,
    fetch_locks: Option<HashMap<Cafeteria, Mutex<()>>>,
}

impl MenuOrchestrator {
    pub fn new(
        cache: Arc<MenuCache>,
        repository: Arc<dyn MenuRepository>,
        enricher: Arc<dyn Enricher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            repository,
            sources: HashMap::new(),
            enricher,
            clock,
            fetch_locks: None,
        }
    }

    pub fn with_source(mut self, cafeteria: Cafeteria, source: Arc<dyn MenuSource>) -> Self {
        self.sources.insert(cafeteria, source);
        self
    }

    /// Serializes cache misses per cafeteria so concurrent readers share one fetch.
    pub fn with_fetch_coalescing(mut self) -> Self {
        self.fetch_locks = Some(
            Cafeteria::ALL
                .iter()
                .map(|cafeteria| (*cafeteria, Mutex::new(())))
                .collect(),
        );
        self
    }

    pub fn cafeterias(&self) -> Vec<Cafeteria> {
        let mut cafeterias: Vec<Cafeteria> = self.sources.keys().copied().collect();
        cafeterias.sort();
        cafeterias
    }

    pub fn cache(&self) -> &MenuCache {
        &self.cache
    }

    #[tracing::instrument(name = "orchestrator::get_menu", skip(self, cancel), fields(cafeteria = %cafeteria))]
    pub async fn get_menu(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu> {
        if let Some(menu) = self.lookup(cafeteria, cancel).await? {
            return Ok(menu);
        }

        match self.fetch_locks.as_ref().and_then(|locks| locks.get(&cafeteria)) {
            Some(lock) => {
                let _guard = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(MenuError::Cancelled),
                    guard = lock.lock() => guard,
                };
                // 等鎖期間可能已有其他呼叫完成抓取
                if let Some(menu) = self.lookup(cafeteria, cancel).await? {
                    return Ok(menu);
                }
                self.fetch_fresh(cafeteria, cancel).await
            }
            None => self.fetch_fresh(cafeteria, cancel).await,
        }
    }

    /// Always runs the fetch path, bypassing cache and repository reads.
    #[tracing::instrument(name = "orchestrator::refresh_menu", skip(self, cancel), fields(cafeteria = %cafeteria))]
    pub async fn refresh_menu(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu> {
        self.fetch_fresh(cafeteria, cancel).await
    }

    pub fn clear_cache(&self) {
        self.cache.clear_all();
        tracing::info!("🧹 Menu cache cleared");
    }

    async fn lookup(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Option<Menu>> {
        if let Some(menu) = self.cache.get(cafeteria) {
            tracing::debug!("Cache hit");
            return Ok(Some(menu));
        }

        let today = self.clock.today();
        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MenuError::Cancelled),
            loaded = self.repository.load(cafeteria, today) => loaded,
        };

        match loaded {
            Ok(Some(items)) => {
                // 讀取期間被取消就不寫入快取
                if cancel.is_cancelled() {
                    return Err(MenuError::Cancelled);
                }
                tracing::debug!(dishes = items.len(), "Loaded today's menu from storage");
                let menu = Menu::new(items, today);
                self.cache.set(cafeteria, menu.clone());
                Ok(Some(menu))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "Menu storage unavailable, fetching instead");
                Ok(None)
            }
        }
    }

    async fn fetch_fresh(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu> {
        let source = self
            .sources
            .get(&cafeteria)
            .ok_or(MenuError::NoSource(cafeteria))?;

        tracing::info!("🚀 Fetching fresh menu");
        let mut menu = source
            .fetch_menu(cancel)
            .await
            .map_err(|e| e.at(cafeteria, Stage::Fetch))?;

        if menu.is_empty_sentinel() {
            tracing::info!(message = %menu.items[0].name, "No dishes served today");
        } else {
            menu = self.validate_and_enrich(cafeteria, menu, cancel).await?;
        }

        if cancel.is_cancelled() {
            return Err(MenuError::Cancelled);
        }

        self.cache.set(cafeteria, menu.clone());
        self.repository
            .save(cafeteria, &menu.items, menu.as_of_date)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "❌ Failed to persist menu, cached copy stays in use");
                e.at(cafeteria, Stage::Persist)
            })?;

        tracing::info!(dishes = menu.items.len(), date = %menu.as_of_date, "✅ Menu ready");
        Ok(menu)
    }

    async fn validate_and_enrich(
        &self,
        cafeteria: Cafeteria,
        mut menu: Menu,
        cancel: &CancellationToken,
    ) -> Result<Menu> {
        match self.enricher.validate(&menu, cancel).await {
            Ok(verdict) if !verdict.is_valid => {
                tracing::info!(reason = %verdict.reason, "Menu rejected by validation");
                return Ok(Menu::empty(&verdict.message, menu.as_of_date));
            }
            Ok(_) => {}
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                // 驗證失敗不影響主流程，有菜就當作有效
                tracing::warn!(error = %e, "Menu validation unavailable, assuming valid");
                if menu.items.is_empty() {
                    return Ok(Menu::empty("", menu.as_of_date));
                }
            }
        }

        self.enricher
            .enrich(&mut menu, cancel)
            .await
            .map_err(|e| e.at(cafeteria, Stage::Enrich))?;
        Ok(menu)
    }
}

#[async_trait]
impl MenuProvider for MenuOrchestrator {
    async fn get_menu(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu> {
        MenuOrchestrator::get_menu(self, cafeteria, cancel).await
    }
}

#[async_trait]
impl MenuRefresher for MenuOrchestrator {
    async fn refresh_menu(&self, cafeteria: Cafeteria, cancel: &CancellationToken) -> Result<Menu> {
        MenuOrchestrator::refresh_menu(self, cafeteria, cancel).await
    }

    fn clear_cache(&self) {
        MenuOrchestrator::clear_cache(self)
    }
}
