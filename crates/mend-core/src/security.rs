use secrecy::{ExposeSecret, SecretString};

/// Wraps an API key with secrecy protection (zeroized on drop, redacted in Debug).
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("API key is missing")]
    Missing,
    #[error("API key is malformed: {0}")]
    Malformed(&'static str),
}

impl ApiKey {
    /// Validate a raw key well enough for the provider to accept it.
    ///
    /// Surrounding whitespace is trimmed (keys are usually pasted).
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(CredentialError::Missing);
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CredentialError::Malformed("contains whitespace"));
        }
        if !key.is_ascii() {
            return Err(CredentialError::Malformed("contains non-ASCII characters"));
        }
        Ok(Self(SecretString::from(key.to_string())))
    }

    /// Parse an optional key, treating `None` as missing.
    pub fn from_optional(raw: Option<&str>) -> Result<Self, CredentialError> {
        raw.map_or(Err(CredentialError::Missing), Self::parse)
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Environment variable names.
pub mod env_vars {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
}
