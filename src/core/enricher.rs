use crate::domain::model::{Menu, MenuValidationResult};
use crate::domain::ports::{ChatMessage, Enricher, LanguageModel};
use crate::utils::error::{ItemFailure, MenuError, Result};
use crate::utils::json_extract::parse_first_json;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 3;
pub const MAX_SPICINESS: i64 = 5;

const VALIDATION_PROMPT: &str = r#"Ты — ассистент для проверки меню столовой. Проанализируй меню и определи, является ли оно полноценным дневным меню.

Критерии валидного меню:
- Минимум 3 блюда
- Разнообразие категорий (не только гарниры или закуски)

Отвечай строго в формате JSON:
{
  "is_valid": true/false,
  "message": "текст для отображения пользователю на русском",
  "reason": "краткое объяснение на русском"
}

Правила:
- Если меню полноценное, is_valid: true, message можно оставить пустым
- Если меню недостаточное, is_valid: false с дружелюбным сообщением
- Лучше одобрить меню с 2-3 блюдами, чем отклонить нормальное меню"#;

const DESCRIPTION_PROMPT: &str = r#"Ты — помощник, который коротко описывает блюда корейской столовой. Отвечай только на русском языке.
Описание должно состоять максимум из 2 предложений.

Всегда отвечай строго в формате JSON:
{
  "name": "название блюда",
  "description": "короткое описание блюда на русском языке",
  "spiciness": целое число от 0 до 5
}

Не добавляй пояснений, комментариев или Markdown-блоков."#;

/// Model reply for a single dish.
#[derive(Debug, Deserialize)]
struct DishReply {
    description: String,
    spiciness: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishDescription {
    pub description: String,
    pub spiciness: u8,
}

/// Parses one dish reply: a JSON object with a non-empty `description` and an
/// integer `spiciness` in `0..=5`.
pub fn parse_dish_reply(reply: &str) -> Result<DishDescription> {
    let parsed: DishReply = parse_first_json(reply)?;

    let description = parsed.description.trim();
    if description.is_empty() {
        return Err(MenuError::malformed("empty description"));
    }
    if !(0..=MAX_SPICINESS).contains(&parsed.spiciness) {
        return Err(MenuError::malformed(format!(
            "spiciness {} outside 0..={}",
            parsed.spiciness, MAX_SPICINESS
        )));
    }

    Ok(DishDescription {
        description: description.to_string(),
        spiciness: parsed.spiciness as u8,
    })
}

fn describe_menu(menu: &Menu) -> String {
    let names: Vec<&str> = menu
        .items
        .iter()
        .filter(|item| !item.placeholder)
        .map(|item| item.name.as_str())
        .collect();

    if names.is_empty() {
        return "Пустое меню".to_string();
    }
    format!("Блюда ({}): {}", names.len(), names.join(", "))
}

/// Validates and describes menus through a language model.
///
/// All model calls made by one instance share a single semaphore, so the bound
/// holds across concurrent `enrich` calls.
pub struct DescriptionEnricher {
    model: Arc<dyn LanguageModel>,
    permits: Arc<Semaphore>,
}

impl DescriptionEnricher {
    pub fn new(model: Arc<dyn LanguageModel>, max_concurrent_requests: usize) -> Self {
        Self {
            model,
            permits: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }

    async fn describe_dish(
        model: Arc<dyn LanguageModel>,
        permits: Arc<Semaphore>,
        name: String,
        cancel: CancellationToken,
    ) -> Result<DishDescription> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MenuError::Cancelled),
            permit = permits.acquire_owned() => permit.map_err(|_| MenuError::Cancelled)?,
        };

        let messages = [
            ChatMessage::system(DESCRIPTION_PROMPT),
            ChatMessage::user(format!("Сгенерируй описание для блюда: {}", name)),
        ];
        let reply = model.complete(&messages, &cancel).await?;

        parse_dish_reply(&reply).inspect_err(|e| {
            tracing::warn!(dish = %name, reply = %reply, error = %e, "Unusable dish description");
        })
    }
}

#[async_trait]
impl Enricher for DescriptionEnricher {
    #[tracing::instrument(name = "enricher::validate", skip_all, fields(dishes = menu.items.len()))]
    async fn validate(&self, menu: &Menu, cancel: &CancellationToken) -> Result<MenuValidationResult> {
        let messages = [
            ChatMessage::system(VALIDATION_PROMPT),
            ChatMessage::user(format!("Проверь меню на сегодня: {}", describe_menu(menu))),
        ];

        let reply = {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MenuError::Cancelled),
                permit = self.permits.acquire() => permit.map_err(|_| MenuError::Cancelled)?,
            };
            self.model.complete(&messages, cancel).await?
        };

        let result: MenuValidationResult = parse_first_json(&reply)?;
        tracing::debug!(is_valid = result.is_valid, reason = %result.reason, "Menu validated");
        Ok(result)
    }

    #[tracing::instrument(name = "enricher::enrich", skip_all, fields(dishes = menu.items.len()))]
    async fn enrich(&self, menu: &mut Menu, cancel: &CancellationToken) -> Result<()> {
        let mut tasks = JoinSet::new();

        for (index, item) in menu.items.iter().enumerate() {
            if item.placeholder {
                continue;
            }
            let model = self.model.clone();
            let permits = self.permits.clone();
            let name = item.name.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                (index, Self::describe_dish(model, permits, name, cancel).await)
            });
        }

        let mut failures = Vec::new();
        let mut cancelled = false;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(described))) => {
                    let item = &mut menu.items[index];
                    item.description = described.description;
                    item.spiciness = described.spiciness;
                }
                Ok((_, Err(e))) if e.is_cancelled() => cancelled = true,
                Ok((index, Err(e))) => failures.push(ItemFailure {
                    position: index + 1,
                    name: menu.items[index].name.clone(),
                    reason: e.to_string(),
                }),
                Err(e) => {
                    // 任務 panic 時無法得知是哪一道菜
                    tracing::error!(error = %e, "Enrichment task aborted");
                    failures.push(ItemFailure {
                        position: 0,
                        name: String::new(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if cancelled {
            return Err(MenuError::Cancelled);
        }

        if failures.is_empty() {
            tracing::info!("✅ All dishes described");
            return Ok(());
        }

        failures.sort_by_key(|failure| failure.position);
        tracing::warn!(failed = failures.len(), "Some dishes could not be described");
        Err(MenuError::Enrichment { failures })
    }
}
