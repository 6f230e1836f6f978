#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use kbu_menu::domain::model::{Cafeteria, Menu, MenuItem, MenuValidationResult};
use kbu_menu::domain::ports::{Clock, Enricher, MenuRepository, MenuSource};
use kbu_menu::Result;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tuesday, 4 March 2025, 11:30 KST.
pub fn tuesday() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(9 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 3, 4, 11, 30, 0)
        .unwrap()
}

pub fn tuesday_date() -> NaiveDate {
    tuesday().date_naive()
}

pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// A week page in the cafeteria site's layout, Monday to Friday.
pub fn week_page(days: [&[&str]; 5]) -> String {
    let mut html = String::from("<html><body><div class=\"menu\">\n");
    for dishes in days {
        html.push_str("<ul class=\"foodList\">\n");
        for dish in dishes {
            html.push_str(&format!("  <li class=\"foodItem\">{}</li>\n", dish));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</div></body></html>\n");
    html
}

/// Gateway envelope carrying `reply` as the model's text.
pub fn gateway_reply(reply: &str) -> serde_json::Value {
    json!({
        "result": {"response": reply},
        "success": true,
        "errors": []
    })
}

pub struct CountingSource {
    pub dishes: Vec<String>,
    pub delay: Duration,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(dishes: &[&str]) -> Arc<Self> {
        Self::slow(dishes, Duration::ZERO)
    }

    pub fn slow(dishes: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            dishes: dishes.iter().map(|d| d.to_string()).collect(),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MenuSource for CountingSource {
    async fn fetch_menu(&self, _cancel: &CancellationToken) -> Result<Menu> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Menu::from_dishes(self.dishes.clone(), tuesday_date()))
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    rows: Mutex<HashMap<(Cafeteria, NaiveDate), Vec<MenuItem>>>,
}

impl MemoryRepository {
    pub fn stored(&self, cafeteria: Cafeteria, date: NaiveDate) -> Option<Vec<MenuItem>> {
        self.rows.lock().unwrap().get(&(cafeteria, date)).cloned()
    }
}

#[async_trait]
impl MenuRepository for MemoryRepository {
    async fn load(&self, cafeteria: Cafeteria, date: NaiveDate) -> Result<Option<Vec<MenuItem>>> {
        Ok(self.stored(cafeteria, date))
    }

    async fn save(&self, cafeteria: Cafeteria, dishes: &[MenuItem], date: NaiveDate) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert((cafeteria, date), dishes.to_vec());
        Ok(())
    }
}

/// Accepts every menu and describes each dish by name.
#[derive(Default)]
pub struct EchoEnricher {
    pub enrichments: AtomicUsize,
}

#[async_trait]
impl Enricher for EchoEnricher {
    async fn validate(&self, _menu: &Menu, _cancel: &CancellationToken) -> Result<MenuValidationResult> {
        Ok(MenuValidationResult {
            is_valid: true,
            ..Default::default()
        })
    }

    async fn enrich(&self, menu: &mut Menu, _cancel: &CancellationToken) -> Result<()> {
        self.enrichments.fetch_add(1, Ordering::SeqCst);
        for item in &mut menu.items {
            item.description = format!("about {}", item.name);
        }
        Ok(())
    }
}
