use mend_core::errors::GatewayError;
use mend_core::security::CredentialError;

use crate::persona::PersonaKind;

pub const MISSING_KEY_MESSAGE: &str = "Please enter your OpenAI API key in the sidebar first.";
pub const MALFORMED_KEY_MESSAGE: &str =
    "That OpenAI API key doesn't look right. Please double-check it and try again.";
pub const EMPTY_INPUT_MESSAGE: &str =
    "Please share your feelings or upload at least one screenshot to get a recovery plan.";
pub const INITIALIZATION_MESSAGE: &str =
    "Failed to initialize agents. Please double-check your OpenAI API key.";
pub const GENERATION_FAILED_MESSAGE: &str =
    "An error occurred while generating your recovery plan. Please try again.";

/// Terminal session errors. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] CredentialError),

    #[error("neither narrative nor attachments provided")]
    EmptyInput,

    #[error("provider initialization failed: {0}")]
    Initialization(#[source] GatewayError),

    #[error("persona {persona} failed: {source}")]
    PersonaFailed {
        persona: PersonaKind,
        #[source]
        source: GatewayError,
    },
}

impl EngineError {
    /// Message safe to show the user. Causes stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(CredentialError::Missing) => MISSING_KEY_MESSAGE,
            Self::Configuration(CredentialError::Malformed(_)) => MALFORMED_KEY_MESSAGE,
            Self::EmptyInput => EMPTY_INPUT_MESSAGE,
            Self::Initialization(_) => INITIALIZATION_MESSAGE,
            Self::PersonaFailed { .. } => GENERATION_FAILED_MESSAGE,
        }
    }

    /// Input problems the user can fix, reported before any model call.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::EmptyInput)
    }

    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::EmptyInput => "empty_input",
            Self::Initialization(_) => "initialization",
            Self::PersonaFailed { .. } => "persona_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_hide_causes() {
        let err = EngineError::PersonaFailed {
            persona: PersonaKind::Closure,
            source: GatewayError::ServerError {
                status: 500,
                body: "stack trace".into(),
            },
        };
        assert_eq!(err.user_message(), GENERATION_FAILED_MESSAGE);
        assert!(!err.user_message().contains("stack trace"));
        assert!(err.to_string().contains("closure"));
        assert!(!err.is_warning());
    }

    #[test]
    fn warnings_vs_failures() {
        assert!(EngineError::EmptyInput.is_warning());
        assert!(EngineError::from(CredentialError::Missing).is_warning());
        assert!(!EngineError::Initialization(GatewayError::NetworkError("x".into())).is_warning());
    }

    #[test]
    fn missing_key_message() {
        let err = EngineError::from(CredentialError::Missing);
        assert_eq!(err.user_message(), MISSING_KEY_MESSAGE);
        assert_eq!(err.error_kind(), "configuration");
    }
}
