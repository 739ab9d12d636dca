pub mod events;
pub mod handlers;
pub mod markdown;
pub mod page;
pub mod server;

pub use events::SessionEvent;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
