use crate::domain::model::{Cafeteria, Menu};
use crate::domain::ports::Clock;
use chrono::{DateTime, FixedOffset, TimeDelta};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct CachedMenu {
    pub menu: Menu,
    pub expires_at: DateTime<FixedOffset>,
}

/// In-memory menu cache with lazy TTL expiry.
///
/// Entries are replaced as a whole under the write lock, so a reader sees either
/// the previous entry or the new one.
pub struct MenuCache {
    entries: RwLock<HashMap<Cafeteria, CachedMenu>>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl MenuCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, TimeDelta::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: TimeDelta) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub fn get(&self, cafeteria: Cafeteria) -> Option<Menu> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let cached = entries.get(&cafeteria)?;

        if self.clock.now() > cached.expires_at {
            return None;
        }
        Some(cached.menu.clone())
    }

    pub fn set(&self, cafeteria: Cafeteria, menu: Menu) {
        let expires_at = self.clock.now() + self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(cafeteria, CachedMenu { menu, expires_at });
    }

    pub fn clear(&self, cafeteria: Cafeteria) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&cafeteria);
    }

    pub fn clear_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }
}
