use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures::Stream;
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mend_engine::{Persona, PersonaResponse, SessionInput, SessionObserver, Upload};

use crate::events::SessionEvent;
use crate::page::INDEX_HTML;
use crate::server::AppState;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model": &*state.model,
        "credentialConfigured": state.default_api_key.is_some(),
    }))
}

pub async fn personas() -> Json<&'static [Persona]> {
    Json(Persona::all())
}

/// Fields of the session form.
#[derive(Debug, Default)]
pub struct SessionForm {
    pub api_key: Option<String>,
    pub narrative: String,
    pub screenshots: Vec<Upload>,
}

async fn read_form(mut multipart: Multipart) -> Result<SessionForm, MultipartError> {
    let mut form = SessionForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "api_key" => form.api_key = Some(field.text().await?),
            "narrative" => form.narrative = field.text().await?,
            "screenshots" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.screenshots.push(Upload::new(file_name, bytes));
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok(form)
}

struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
    completed: AtomicUsize,
}

impl ChannelObserver {
    fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("client disconnected; session continues");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn persona_started(&self, persona: &Persona) {
        self.send(SessionEvent::persona_started(persona));
    }

    fn persona_completed(&self, response: &PersonaResponse) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.send(SessionEvent::persona_completed(response));
    }
}

/// Run one recovery session and stream its progress as SSE.
pub async fn create_session(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            // Oversized bodies come back as 413, anything else malformed as 400.
            let status = e.status();
            let message = e.body_text();
            warn!(%status, error = %message, "rejected session form");
            return (status, Json(json!({ "error": message }))).into_response();
        }
    };

    let credential = form
        .api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            state
                .default_api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
        });

    let input = SessionInput::new(form.narrative, form.screenshots);
    let session_id = input.id.to_string();
    info!(session_id = %session_id, uploads = input.attachments.len(), "session requested");

    let (tx, rx) = mpsc::unbounded_channel();
    let observer = ChannelObserver {
        tx,
        completed: AtomicUsize::new(0),
    };
    observer.send(SessionEvent::Started {
        session_id: session_id.clone(),
        personas: Persona::all().iter().map(|p| p.kind).collect(),
    });

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let result = orchestrator
            .run_session(input, credential.as_deref(), &observer)
            .await;
        if let Err(e) = result {
            let message = e.user_message().to_string();
            if e.is_warning() {
                observer.send(SessionEvent::Warning { message });
            } else {
                observer.send(SessionEvent::Failed { message });
            }
        }
        observer.send(SessionEvent::Finished {
            session_id,
            completed: observer.completed.load(Ordering::Relaxed),
        });
    });

    Sse::new(event_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn event_stream(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(event.to_sse());
        }
    }
}
