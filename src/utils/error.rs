use crate::domain::model::Cafeteria;
use std::fmt;
use thiserror::Error;

/// 錯誤分類，對應重試與呈現策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Structural,
    Enrichment,
    Storage,
    Cancelled,
    Configuration,
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Enrich,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Enrich => "enrich",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// One dish that could not be enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// 1-based position in the menu
    pub position: usize,
    pub name: String,
    pub reason: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {} '{}': {}", self.position, self.name, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<MenuError>,
    },

    #[error("markup structure changed: {message}")]
    Structure { message: String },

    #[error("malformed model response: {message}")]
    MalformedResponse { message: String },

    #[error("model request rejected: {}", errors.join("; "))]
    ModelRejected { errors: Vec<String> },

    #[error("enrichment failed for {} item(s): {}", failures.len(), join_failures(failures))]
    Enrichment { failures: Vec<ItemFailure> },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("no menu source configured for {0}")]
    NoSource(Cafeteria),

    #[error("{cafeteria} {stage} failed: {source}")]
    Stage {
        cafeteria: Cafeteria,
        stage: Stage,
        #[source]
        source: Box<MenuError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

fn join_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MenuError {
    pub fn at(self, cafeteria: Cafeteria, stage: Stage) -> Self {
        match self {
            MenuError::Cancelled => MenuError::Cancelled,
            other => MenuError::Stage {
                cafeteria,
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        MenuError::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MenuError::Http(_) | MenuError::HttpStatus { .. } | MenuError::RetriesExhausted { .. } => {
                ErrorCategory::Transient
            }
            MenuError::Structure { .. }
            | MenuError::MalformedResponse { .. }
            | MenuError::ModelRejected { .. } => ErrorCategory::Structural,
            MenuError::Enrichment { .. } => ErrorCategory::Enrichment,
            MenuError::Database(_)
            | MenuError::Migration(_)
            | MenuError::SerializationError(_)
            | MenuError::IoError(_) => ErrorCategory::Storage,
            MenuError::Cancelled => ErrorCategory::Cancelled,
            MenuError::NoSource(_)
            | MenuError::ConfigError { .. }
            | MenuError::InvalidConfigValueError { .. }
            | MenuError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MenuError::Stage { source, .. } => source.category(),
        }
    }

    /// Only transport failures and HTTP status errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            MenuError::Http(_) | MenuError::HttpStatus { .. } => true,
            MenuError::Stage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MenuError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, MenuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrichment_error_lists_every_failure() {
        let err = MenuError::Enrichment {
            failures: vec![
                ItemFailure {
                    position: 2,
                    name: "김치찌개".to_string(),
                    reason: "no JSON value".to_string(),
                },
                ItemFailure {
                    position: 5,
                    name: "잡채".to_string(),
                    reason: "spiciness 9 out of range".to_string(),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.contains("2 item(s)"));
        assert!(text.contains("item 2 '김치찌개'"));
        assert!(text.contains("item 5 '잡채'"));
        assert_eq!(err.category(), ErrorCategory::Enrichment);
    }

    #[test]
    fn test_stage_wrapping_keeps_category_and_context() {
        let err = MenuError::Structure {
            message: "found 2 foodList sections".to_string(),
        }
        .at(Cafeteria::Peony, Stage::Fetch);

        assert_eq!(err.category(), ErrorCategory::Structural);
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("peony fetch failed"));
    }

    #[test]
    fn test_cancelled_is_never_wrapped() {
        let err = MenuError::Cancelled.at(Cafeteria::Azilea, Stage::Persist);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_status_errors_are_retryable() {
        let err = MenuError::HttpStatus {
            url: "http://localhost/menu".to_string(),
            status: 503,
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Transient);
        assert!(!MenuError::malformed("oops").is_retryable());
    }
}
