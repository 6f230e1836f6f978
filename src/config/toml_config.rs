use crate::adapters::HttpSourceOptions;
use crate::core::cache::DEFAULT_TTL_HOURS;
use crate::core::enricher::DEFAULT_MAX_CONCURRENT_REQUESTS;
use crate::core::notify::DEFAULT_MAX_CONCURRENT_SENDS;
use crate::core::scheduler::{SchedulerOptions, DEFAULT_RUN_HOUR};
use crate::domain::model::Cafeteria;
use crate::utils::error::{MenuError, Result};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use chrono::TimeDelta;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "menu-config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub notifications: Option<NotificationsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub utc_offset_hours: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { utc_offset_hours: 9 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub peony_url: String,
    pub azilea_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub max_response_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_seconds: 2,
            max_response_bytes: crate::adapters::http_source::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: String,
    pub api_token: String,
    pub max_concurrent_requests: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            timeout_seconds: 30,
            retry_attempts: 2,
            retry_delay_seconds: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://database/daily-menu.db".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub run_hour: u32,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub warmup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_hour: DEFAULT_RUN_HOUR,
            retry_attempts: 3,
            retry_delay_seconds: 300,
            warmup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent: usize,
}

fn default_max_concurrent_sends() -> usize {
    DEFAULT_MAX_CONCURRENT_SENDS
}

impl Settings {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MenuError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| MenuError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MENU_AI_TOKEN})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MenuError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn source_url(&self, cafeteria: Cafeteria) -> &str {
        match cafeteria {
            Cafeteria::Peony => &self.sources.peony_url,
            Cafeteria::Azilea => &self.sources.azilea_url,
        }
    }

    pub fn fetch_options(&self) -> HttpSourceOptions {
        HttpSourceOptions {
            timeout: Duration::from_secs(self.fetch.timeout_seconds),
            retry: RetryPolicy::new(
                self.fetch.retry_attempts,
                Duration::from_secs(self.fetch.retry_delay_seconds),
            ),
            max_response_bytes: self.fetch.max_response_bytes,
        }
    }

    pub fn model_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.ai.retry_attempts,
            Duration::from_secs(self.ai.retry_delay_seconds),
        )
    }

    pub fn cache_ttl(&self) -> TimeDelta {
        TimeDelta::hours(self.cache.ttl_hours)
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            run_hour: self.scheduler.run_hour,
            retry: RetryPolicy::new(
                self.scheduler.retry_attempts,
                Duration::from_secs(self.scheduler.retry_delay_seconds),
            ),
            warmup: self.scheduler.warmup,
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_range("app.utc_offset_hours", self.app.utc_offset_hours, -12, 14)?;

        validate_url("sources.peony_url", &self.sources.peony_url)?;
        validate_url("sources.azilea_url", &self.sources.azilea_url)?;

        validate_positive_number("fetch.timeout_seconds", self.fetch.timeout_seconds, 1)?;
        validate_positive_number("fetch.retry_attempts", self.fetch.retry_attempts, 1)?;
        validate_positive_number("fetch.max_response_bytes", self.fetch.max_response_bytes, 1)?;

        validate_url("ai.endpoint", &self.ai.endpoint)?;
        validate_non_empty_string("ai.api_token", &self.ai.api_token)?;
        validate_positive_number("ai.max_concurrent_requests", self.ai.max_concurrent_requests, 1)?;
        validate_positive_number("ai.timeout_seconds", self.ai.timeout_seconds, 1)?;
        validate_positive_number("ai.retry_attempts", self.ai.retry_attempts, 1)?;

        validate_non_empty_string("database.url", &self.database.url)?;
        if !self.database.url.starts_with("sqlite:") {
            return Err(MenuError::InvalidConfigValueError {
                field: "database.url".to_string(),
                value: self.database.url.clone(),
                reason: "Only sqlite: URLs are supported".to_string(),
            });
        }
        validate_positive_number("database.max_connections", self.database.max_connections, 1)?;

        validate_positive_number("cache.ttl_hours", self.cache.ttl_hours, 1)?;

        validate_range("scheduler.run_hour", self.scheduler.run_hour, 0, 23)?;
        validate_positive_number("scheduler.retry_attempts", self.scheduler.retry_attempts, 1)?;

        if let Some(notifications) = &self.notifications {
            validate_url("notifications.webhook_url", &notifications.webhook_url)?;
            validate_positive_number("notifications.max_concurrent", notifications.max_concurrent, 1)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[sources]
peony_url = "https://kbu.ac.kr/menu/peony.do"
azilea_url = "https://kbu.ac.kr/menu/azilea.do"

[ai]
endpoint = "https://gateway.example.com/ai/run"
api_token = "secret"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.app.utc_offset_hours, 9);
        assert_eq!(settings.fetch.retry_attempts, 3);
        assert_eq!(settings.fetch.max_response_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.ai.max_concurrent_requests, 3);
        assert_eq!(settings.database.url, "sqlite://database/daily-menu.db");
        assert_eq!(settings.cache_ttl(), TimeDelta::hours(24));
        assert_eq!(settings.scheduler_options().run_hour, 6);
        assert_eq!(
            settings.scheduler_options().retry.delay,
            Duration::from_secs(300)
        );
        assert!(settings.notifications.is_none());
        assert_eq!(
            settings.source_url(Cafeteria::Azilea),
            "https://kbu.ac.kr/menu/azilea.do"
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("KBU_MENU_TEST_TOKEN", "from-env");

        let content = MINIMAL.replace("\"secret\"", "\"${KBU_MENU_TEST_TOKEN}\"");
        let settings = Settings::from_toml_str(&content).unwrap();
        assert_eq!(settings.ai.api_token, "from-env");

        std::env::remove_var("KBU_MENU_TEST_TOKEN");
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let content = MINIMAL.replace("\"secret\"", "\"${KBU_MENU_SURELY_UNSET}\"");
        let settings = Settings::from_toml_str(&content).unwrap();

        assert_eq!(settings.ai.api_token, "${KBU_MENU_SURELY_UNSET}");
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("ai.api_token"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            ("[scheduler]\nrun_hour = 24\n", "scheduler.run_hour"),
            ("[app]\nutc_offset_hours = 15\n", "app.utc_offset_hours"),
            ("[fetch]\nretry_attempts = 0\n", "fetch.retry_attempts"),
            ("[database]\nurl = \"postgres://db\"\n", "database.url"),
            (
                "[notifications]\nwebhook_url = \"ftp://chat\"\n",
                "notifications.webhook_url",
            ),
        ];

        for (extra, field) in cases {
            let content = format!("{}\n{}", MINIMAL, extra);
            let settings = Settings::from_toml_str(&content).unwrap();
            let err = settings.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_missing_sources_fail_validation() {
        let settings = Settings::from_toml_str("").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_broken_toml_is_config_error() {
        let err = Settings::from_toml_str("[fetch\nretry_attempts = ").unwrap_err();
        assert!(matches!(err, MenuError::ConfigError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let content = format!(
            "{}\n[notifications]\nwebhook_url = \"https://chat.example.com/send\"\nrecipients = [\"734130728\"]\n",
            MINIMAL
        );
        temp_file.write_all(content.as_bytes()).unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        settings.validate().unwrap();

        let notifications = settings.notifications.unwrap();
        assert_eq!(notifications.recipients, vec!["734130728".to_string()]);
        assert_eq!(notifications.max_concurrent, 4);
    }
}
