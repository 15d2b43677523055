use crate::replies;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageIntent {
    Greeting,
    Help,
    Fallback,
}

/// First match wins, on case-insensitive substring containment. Note that
/// "hi" also matches inside longer words ("this", "which").
pub fn classify(text: &str) -> MessageIntent {
    let lowered = text.to_lowercase();
    if lowered.contains("hello") || lowered.contains("hi") {
        MessageIntent::Greeting
    } else if lowered.contains("help") {
        MessageIntent::Help
    } else {
        MessageIntent::Fallback
    }
}

pub fn respond(text: &str) -> &'static str {
    match classify(text) {
        MessageIntent::Greeting => replies::GREETING_TEXT,
        MessageIntent::Help => replies::CHAT_HELP_TEXT,
        MessageIntent::Fallback => replies::FALLBACK_TEXT,
    }
}
