pub mod error;
pub mod json_extract;
pub mod logger;
pub mod retry;
pub mod validation;
