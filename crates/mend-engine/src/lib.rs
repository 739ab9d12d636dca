//! Recovery session engine: persona configuration, prompt templates,
//! attachment staging and the sequential persona orchestrator.

pub mod error;
pub mod persona;
pub mod prompts;
pub mod registry;
pub mod runner;
pub mod session;
pub mod staging;
pub mod tools;

pub use error::EngineError;
pub use persona::{Persona, PersonaKind};
pub use session::{
    FixedProvider, NoopObserver, OpenAiFactory, PersonaResponse, ProviderFactory, SessionConfig,
    SessionInput, SessionObserver, SessionOrchestrator, SessionReport,
};
pub use staging::{AttachmentStager, StagedAttachment, StagingError, Upload};
