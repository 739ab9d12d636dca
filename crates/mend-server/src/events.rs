use axum::response::sse::Event;
use serde::Serialize;

use mend_engine::{Persona, PersonaKind, PersonaResponse};

use crate::markdown::render_markdown;

/// Events streamed to the page over SSE while a session runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        personas: Vec<PersonaKind>,
    },
    PersonaStarted {
        persona: PersonaKind,
        heading: &'static str,
        progress: &'static str,
    },
    PersonaCompleted {
        persona: PersonaKind,
        name: &'static str,
        heading: &'static str,
        markdown: String,
        html: String,
    },
    Warning {
        message: String,
    },
    Failed {
        message: String,
    },
    Finished {
        session_id: String,
        completed: usize,
    },
}

impl SessionEvent {
    pub fn persona_started(persona: &Persona) -> Self {
        Self::PersonaStarted {
            persona: persona.kind,
            heading: persona.heading,
            progress: persona.progress,
        }
    }

    pub fn persona_completed(response: &PersonaResponse) -> Self {
        Self::PersonaCompleted {
            persona: response.persona,
            name: response.name,
            heading: response.heading,
            html: render_markdown(&response.markdown),
            markdown: response.markdown.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::PersonaStarted { .. } => "persona_started",
            Self::PersonaCompleted { .. } => "persona_completed",
            Self::Warning { .. } => "warning",
            Self::Failed { .. } => "failed",
            Self::Finished { .. } => "finished",
        }
    }

    pub fn to_sse(&self) -> Event {
        let data = serde_json::to_string(self).unwrap_or_default();
        Event::default().event(self.name()).data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_event_carries_html() {
        let event = SessionEvent::persona_completed(&PersonaResponse {
            persona: PersonaKind::Routine,
            name: "Routine Architect",
            heading: "📅 7-Day Healing Gameplan",
            markdown: "**Day 1**: walk".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "persona_completed");
        assert_eq!(json["persona"], "routine");
        assert!(json["html"].as_str().unwrap().contains("<strong>Day 1</strong>"));
        assert_eq!(event.name(), "persona_completed");
    }

    #[test]
    fn started_event_lists_personas_in_order() {
        let event = SessionEvent::Started {
            session_id: "sess_1".into(),
            personas: Persona::all().iter().map(|p| p.kind).collect(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["personas"][0], "support");
        assert_eq!(json["personas"][3], "reality_check");
    }

    #[test]
    fn progress_text_from_persona() {
        let event = SessionEvent::persona_started(PersonaKind::Support.persona());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["progress"], "🤗 Offering emotional first aid...");
    }
}
