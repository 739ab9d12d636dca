//! Failures while building `MendSettings`.

use thiserror::Error;

/// Why the settings file or its environment overrides could not be used.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `~/.mend/settings.json` exists but could not be read.
    #[error("cannot read mend settings: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON.
    #[error("mend settings are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A merged value the server cannot run with: a blank model name, a zero
    /// request timeout or a zero upload cap.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
