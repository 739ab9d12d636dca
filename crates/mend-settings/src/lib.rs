//! # mend-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MendSettings::default()`]
//! 2. **User file**: `~/.mend/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `MEND_*` overrides, plus `OPENAI_API_KEY`
//!
//! The API key is never read from or written to the settings file.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
