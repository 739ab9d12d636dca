//! Settings type definitions.
//!
//! All types use camelCase on the wire and `#[serde(default)]`, so a
//! partial settings file only needs the fields it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MendSettings {
    /// Settings schema version.
    pub version: String,
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub generation: GenerationSettings,
    pub staging: StagingSettings,
    pub search: SearchSettings,
    pub logging: LoggingSettings,
}

impl Default for MendSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            api: ApiSettings::default(),
            generation: GenerationSettings::default(),
            staging: StagingSettings::default(),
            search: SearchSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    /// `0` binds a random free port.
    pub port: u16,
    /// Upper bound on one session upload (all screenshots together).
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Model-serving API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// Server-level fallback credential, only ever taken from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 120,
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Where uploaded screenshots are written before the model reads them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StagingSettings {
    /// Defaults to the system temp directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: "heart_healer_".to_string(),
        }
    }
}

impl StagingSettings {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Web search tool used by the reality-check persona.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_results: usize,
    /// Model round-trips allowed to request searches before a final answer.
    pub max_tool_rounds: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.duckduckgo.com".to_string(),
            timeout_secs: 15,
            max_results: 5,
            max_tool_rounds: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` wins when set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
