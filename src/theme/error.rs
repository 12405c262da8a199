//! Theme engine error types

use thiserror::Error;

/// Theme-specific errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Template parse or render error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// IO error while reading override templates
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
