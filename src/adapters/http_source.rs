use crate::domain::model::{Cafeteria, Menu, HOLIDAY_MESSAGE};
use crate::domain::ports::{Clock, HtmlExtractor, MenuSource};
use crate::utils::error::{MenuError, Result};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{Datelike, Weekday};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("kbu-menu/", env!("CARGO_PKG_VERSION"));
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone, Copy)]
pub struct HttpSourceOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_response_bytes: usize,
}

impl Default for HttpSourceOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::new(3, Duration::from_secs(2)),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Scrapes one cafeteria page and turns today's section into a [`Menu`].
pub struct HttpMenuSource {
    cafeteria: Cafeteria,
    url: String,
    client: Client,
    clock: Arc<dyn Clock>,
    extractor: Arc<dyn HtmlExtractor>,
    options: HttpSourceOptions,
}

impl HttpMenuSource {
    pub fn new(
        cafeteria: Cafeteria,
        url: impl Into<String>,
        clock: Arc<dyn Clock>,
        extractor: Arc<dyn HtmlExtractor>,
        options: HttpSourceOptions,
    ) -> Self {
        Self {
            cafeteria,
            url: url.into(),
            client: Client::new(),
            clock,
            extractor,
            options,
        }
    }

    /// Downloads the page, retrying transport failures and non-2xx statuses.
    pub async fn fetch_markup(&self, cancel: &CancellationToken) -> Result<String> {
        self.options
            .retry
            .run(cancel, "fetch", MenuError::is_retryable, |attempt| {
                self.fetch_attempt(cancel, attempt)
            })
            .await
    }

    async fn fetch_attempt(&self, cancel: &CancellationToken, attempt: u32) -> Result<String> {
        tracing::debug!(cafeteria = %self.cafeteria, attempt, "📡 GET {}", self.url);

        tokio::select! {
            _ = cancel.cancelled() => Err(MenuError::Cancelled),
            result = self.fetch_once() => result,
        }
    }

    async fn fetch_once(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT_HTML)
            .timeout(self.options.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MenuError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = self.read_capped(response).await?;
        tracing::debug!(cafeteria = %self.cafeteria, bytes = body.len(), "Fetched menu page");
        Ok(body)
    }

    async fn read_capped(&self, mut response: reqwest::Response) -> Result<String> {
        let cap = self.options.max_response_bytes;
        let mut body: Vec<u8> = Vec::new();

        while let Some(chunk) = response.chunk().await? {
            let room = cap.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                tracing::warn!(
                    cafeteria = %self.cafeteria,
                    max_bytes = cap,
                    "Response body truncated"
                );
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl MenuSource for HttpMenuSource {
    async fn fetch_menu(&self, cancel: &CancellationToken) -> Result<Menu> {
        let markup = self.fetch_markup(cancel).await?;

        let now = self.clock.now();
        let today = now.date_naive();
        let dishes = dishes_for_weekday(self.extractor.as_ref(), &markup, now.weekday())?;

        if dishes.is_empty() {
            tracing::info!(cafeteria = %self.cafeteria, %today, "No dishes found, treating today as a holiday");
            return Ok(Menu::empty(HOLIDAY_MESSAGE, today));
        }

        tracing::info!(cafeteria = %self.cafeteria, dishes = dishes.len(), "✅ Extracted today's dishes");
        Ok(Menu::from_dishes(dishes, today))
    }
}

/// 1-based `foodList` section for a weekday. The site only publishes Monday to
/// Friday, so the weekend reuses Friday.
pub fn section_for(weekday: Weekday) -> usize {
    match weekday {
        Weekday::Sat | Weekday::Sun => 5,
        day => day.number_from_monday() as usize,
    }
}

/// Dish names for `weekday`. Too few sections is a structural error; an empty
/// section is simply an empty list.
pub fn dishes_for_weekday(
    extractor: &dyn HtmlExtractor,
    markup: &str,
    weekday: Weekday,
) -> Result<Vec<String>> {
    let sections = extractor.food_lists(markup);
    let target = section_for(weekday);

    if sections.len() < target {
        return Err(MenuError::Structure {
            message: format!(
                "need foodList section {} for {}, document has {}",
                target,
                weekday,
                sections.len()
            ),
        });
    }

    Ok(extractor.food_items(&sections[target - 1]))
}
