use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use secrecy::SecretString;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mend_engine::SessionOrchestrator;
use mend_settings::MendSettings;

use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub model: String,
    /// Used when the form leaves the key blank.
    pub default_api_key: Option<SecretString>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
            max_upload_bytes: 20 * 1024 * 1024,
            model: "gpt-4o-mini".into(),
            default_api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &MendSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_upload_bytes: settings.server.max_upload_bytes,
            model: settings.api.model.clone(),
            default_api_key: settings
                .api
                .api_key
                .as_ref()
                .map(|k| SecretString::from(k.clone())),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub default_api_key: Option<Arc<SecretString>>,
    pub model: Arc<str>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/personas", get(handlers::personas))
        .route("/api/session", post(handlers::create_session))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve in the background. Port 0 picks a free port.
pub async fn start(
    config: ServerConfig,
    orchestrator: Arc<SessionOrchestrator>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        orchestrator,
        default_api_key: config.default_api_key.map(Arc::new),
        model: Arc::from(config.model.as_str()),
    };
    let router = build_router(state, config.max_upload_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        host = %config.host,
        port = local_addr.port(),
        max_upload_bytes = config.max_upload_bytes,
        "Heart Mend server started"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`. Dropping it leaves the server running.
pub struct ServerHandle {
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "server task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings() {
        let mut settings = MendSettings::default();
        settings.server.port = 9000;
        settings.api.api_key = Some("sk-env".into());
        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.port, 9000);
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.default_api_key.is_some());
    }

    #[tokio::test]
    async fn starts_on_ephemeral_port_and_shuts_down() {
        let settings = MendSettings::default();
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let orchestrator = Arc::new(SessionOrchestrator::from_settings(&settings));
        let handle = start(config, orchestrator).await.unwrap();
        assert_ne!(handle.port, 0);
        handle.shutdown().await;
    }
}
