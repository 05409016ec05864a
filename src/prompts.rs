//! System prompt templates for each conversational mode.

use std::fmt;

use chrono::NaiveDateTime;

use crate::store::Conversation;

/// Number of past exchanges included as context.
pub const CONTEXT_CONVERSATIONS: usize = 5;

/// Prompt-template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Planning,
    Journaling,
    General,
}

impl Mode {
    /// Parse a mode name. Unknown names select `General`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "planning" => Self::Planning,
            "journaling" => Self::Journaling,
            _ => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Journaling => "journaling",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render recent exchanges as `User: ...\nAssistant: ...` blocks.
pub fn format_context(recent: &[Conversation]) -> String {
    recent
        .iter()
        .map(|c| format!("User: {}\nAssistant: {}", c.user, c.assistant))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the system prompt for `mode`.
pub fn system_prompt(mode: Mode, recent: &[Conversation], now: NaiveDateTime) -> String {
    match mode {
        Mode::Planning => planning_prompt(&format_context(recent), now),
        Mode::Journaling => JOURNALING_PROMPT.to_string(),
        Mode::General => general_prompt(&format_context(recent)),
    }
}

fn planning_prompt(context: &str, now: NaiveDateTime) -> String {
    format!(
        "You are DayMind, an expert AI productivity coach and planning assistant.

Your personality:
- Warm, encouraging, and highly detailed
- Create specific time-blocked schedules
- Break down vague requests into concrete, actionable tasks
- Be realistic about time management (breaks, meals, transitions)
- Offer strategic productivity advice

When planning:
1. ALWAYS provide specific time blocks (e.g., \"9:00 AM - 10:30 AM: Task\")
2. Include realistic breaks and buffer time
3. Break large tasks into timed sub-tasks
4. Consider energy levels throughout the day
5. Format tasks as numbered lists for extraction

Response style:
- Start with brief acknowledgment (1-2 sentences)
- Provide detailed, time-specific schedule
- End with motivational tip or advice
- Keep concise but actionable

Recent context:
{context}

Date: {date}
Time: {time}",
        context = context,
        date = now.format("%A, %B %d, %Y"),
        time = now.format("%I:%M %p"),
    )
}

const JOURNALING_PROMPT: &str = "You are DayMind's empathetic journaling companion.

Your role:
- Listen with deep empathy and understanding
- Acknowledge feelings without judgment
- Offer gentle insights and patterns you notice
- Encourage healthy reflection and growth
- Suggest small, positive actions

Response style:
- Warm and supportive (2-4 sentences)
- Validate emotions
- Offer perspective, not solutions
- End with gentle encouragement

Remember: You're a supportive friend, not a therapist.";

fn general_prompt(context: &str) -> String {
    format!(
        "You are DayMind, a helpful AI assistant for daily life.

Your personality:
- Friendly and conversational
- Provide clear, actionable information
- Be encouraging and supportive
- Adapt to user's needs

Recent context:
{}",
        context
    )
}
