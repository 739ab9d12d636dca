//! The four fixed personas, in the order a session runs them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Appended to every persona's instruction lines.
pub const MARKDOWN_HINT: &str = "Use markdown to format your answers.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKind {
    Support,
    Closure,
    Routine,
    RealityCheck,
}

impl PersonaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Closure => "closure",
            Self::Routine => "routine",
            Self::RealityCheck => "reality_check",
        }
    }

    pub fn persona(self) -> &'static Persona {
        match self {
            Self::Support => &PERSONAS[0],
            Self::Closure => &PERSONAS[1],
            Self::Routine => &PERSONAS[2],
            Self::RealityCheck => &PERSONAS[3],
        }
    }
}

impl fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable persona record.
#[derive(Debug, Serialize)]
pub struct Persona {
    pub kind: PersonaKind,
    pub name: &'static str,
    pub heading: &'static str,
    pub progress: &'static str,
    #[serde(skip)]
    pub instructions: &'static [&'static str],
    pub uses_web_search: bool,
    /// Also stated in the last instruction line.
    pub word_limit: u32,
}

impl Persona {
    /// All personas in session order.
    pub fn all() -> &'static [Persona] {
        &PERSONAS
    }

    /// Instruction lines sent as the system prompt.
    pub fn system_instructions(&self) -> Vec<String> {
        self.instructions
            .iter()
            .map(|line| line.to_string())
            .chain(std::iter::once(MARKDOWN_HINT.to_string()))
            .collect()
    }
}

static PERSONAS: [Persona; 4] = [
    Persona {
        kind: PersonaKind::Support,
        name: "Supportive Listener",
        heading: "🤗 Emotional First Aid",
        progress: "🤗 Offering emotional first aid...",
        instructions: &[
            "You are a warm, empathetic breakup-support companion who:",
            "1. Listens deeply and validates the user's emotions",
            "2. Uses gentle, light humour where appropriate",
            "3. Normalizes their feelings and shares relatable breakup perspectives",
            "4. Offers reassuring, encouraging words and hope",
            "5. Can use both the text and screenshots to understand emotional context",
            "Always be kind, non-judgmental, and emotionally safe And limit the answer in 70 Words",
        ],
        uses_web_search: false,
        word_limit: 70,
    },
    Persona {
        kind: PersonaKind::Closure,
        name: "Closure Coach",
        heading: "✍️ Letters for Closure (Not to Send)",
        progress: "✍️ Drafting letters you’ll never send...",
        instructions: &[
            "You help the user write for emotional closure, not to actually send.",
            "1. Draft unsent messages to their ex to release emotions",
            "2. Allow honest, raw but non-abusive expression",
            "3. Organize content with simple headings or sections",
            "4. Gently steer toward self-respect and letting go",
            "Focus on emotional release and healthy closure  And limit the answer in 50 Words.",
        ],
        uses_web_search: false,
        word_limit: 50,
    },
    Persona {
        kind: PersonaKind::Routine,
        name: "Routine Architect",
        heading: "📅 7-Day Healing Gameplan",
        progress: "📅 Designing your 7-day healing gameplan...",
        instructions: &[
            "You design short, practical breakup-recovery routines.",
            "1. Create a 7-day healing plan with daily tasks",
            "2. Mix self-care, movement, journaling, and social connection",
            "3. Add ideas for digital / social media boundaries",
            "4. Suggest mood-lifting playlist themes or song ideas",
            "Keep it simple, doable, and encouraging.  And limit the answer in 80 Words",
        ],
        uses_web_search: false,
        word_limit: 80,
    },
    Persona {
        kind: PersonaKind::RealityCheck,
        name: "Reality Check Partner",
        heading: "💡 Reality Check & Growth Notes",
        progress: "💡 Offering a grounded reality check...",
        instructions: &[
            "You give honest but respectful perspective about the breakup.",
            "1. Explain what likely went wrong in clear language",
            "2. Avoid sugar-coating, but never insult the user",
            "3. Highlight patterns to avoid in the future",
            "4. List reasons why moving on is good for them",
            "Be direct, but always constructive and growth-focused.  And limit the answer in 50 Words",
        ],
        uses_web_search: true,
        word_limit: 50,
    },
];
