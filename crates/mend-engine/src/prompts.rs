//! Per-persona prompt templates. The narrative is interpolated verbatim.

use crate::persona::PersonaKind;

pub fn build_prompt(kind: PersonaKind, narrative: &str) -> String {
    match kind {
        PersonaKind::Support => format!(
            "
You are helping someone who is going through a breakup.

User's message:
{narrative}

Using their words (and any images, if provided), please:
1. Validate what they are feeling without minimizing it.
2. Normalize their reaction (why it makes sense to feel this way).
3. Offer a few comforting, human-sounding reflections.
4. Give 2–3 gentle suggestions for what they can do *today* to feel 1% better.
Keep the tone warm, conversational, and kind but in limited words.
"
        ),
        PersonaKind::Closure => format!(
            "
Help the user process their breakup by writing for closure.

User's feelings / story:
{narrative}

Please create:
1. One unsent message to their ex (for their eyes only, not to actually send).
2. A short journal prompt to help them explore what they learned.
3. A brief self-compassion note they can read to themselves.

Tone: honest, respectful, and focused on self-worth but in limited words.
"
        ),
        PersonaKind::Routine => format!(
            "
Design a simple 7-day breakup healing plan.

Context about the user:
{narrative}

Include for each day:
1. One small self-care or body movement activity.
2. One reflection or journaling idea.
3. One optional social connection / reaching out action.
4. Any digital / social media guideline if relevant.

Keep it realistic for someone who has low energy and is emotionally tired but in limited words.
"
        ),
        PersonaKind::RealityCheck => format!(
            "
Provide an honest but compassionate perspective on this breakup.

User's situation:
{narrative}

Please cover:
1. A clear, neutral analysis of what might have gone wrong.
2. Patterns or red flags they might want to notice for the future.
3. Reasons this breakup might secretly be protecting or freeing them.
4. 3–5 concrete growth steps they can focus on over the next month.

Be direct but never cruel. The goal is clarity + growth, not blame but in limited words.
"
        ),
    }
}
