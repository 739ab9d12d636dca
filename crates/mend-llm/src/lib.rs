pub mod converter;
pub mod mock;
pub mod models;
pub mod openai;

pub use mock::{MockProvider, MockResponse};
pub use openai::{OpenAiConfig, OpenAiProvider};
