//! The keyword response policy: a finite ordered table mapping utterance
//! keywords to canned replies and a continue/terminate decision.
//!
//! The table is data, not branching code. Matching is first-entry-wins over
//! substring containment on the normalized (lowercased, trimmed) utterance,
//! so earlier entries shadow later ones — "goodbye" is claimed by the
//! farewell entry before "call" could ever see it. An unmatched utterance
//! falls back to an echo reply with a generic help prompt.

use chrono::Local;

/// How the reply text for a policy entry is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A fixed canned reply.
    Fixed(&'static str),
    /// The current local time, spoken.
    CurrentTime,
    /// The current date, spoken.
    CurrentDate,
}

/// One row of the response policy table.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEntry {
    /// Stable name for logging and tests.
    pub name: &'static str,
    /// Keywords matched by substring containment; any hit selects the entry.
    pub keywords: &'static [&'static str],
    /// How to produce the reply.
    pub reply: ReplyKind,
    /// Whether a match ends the call.
    pub terminates: bool,
}

/// The ordered response policy. First matching entry wins.
pub const RESPONSE_POLICY: &[PolicyEntry] = &[
    PolicyEntry {
        name: "greeting",
        keywords: &["hello", "hi"],
        reply: ReplyKind::Fixed("Hello! How can I help you today?"),
        terminates: false,
    },
    PolicyEntry {
        name: "help",
        keywords: &["help"],
        reply: ReplyKind::Fixed("I can help you with various tasks. Just tell me what you need!"),
        terminates: false,
    },
    PolicyEntry {
        name: "weather",
        keywords: &["weather"],
        reply: ReplyKind::Fixed(
            "I'm sorry, I don't have access to weather information yet. \
             But I can help you with other tasks!",
        ),
        terminates: false,
    },
    PolicyEntry {
        name: "time",
        keywords: &["time"],
        reply: ReplyKind::CurrentTime,
        terminates: false,
    },
    PolicyEntry {
        name: "date",
        keywords: &["date"],
        reply: ReplyKind::CurrentDate,
        terminates: false,
    },
    PolicyEntry {
        name: "farewell",
        keywords: &["goodbye", "bye", "end"],
        reply: ReplyKind::Fixed("Goodbye! Have a great day!"),
        terminates: true,
    },
    PolicyEntry {
        name: "thanks",
        keywords: &["thank you", "thanks"],
        reply: ReplyKind::Fixed("You're welcome! Is there anything else I can help you with?"),
        terminates: false,
    },
    PolicyEntry {
        name: "name",
        keywords: &["name"],
        reply: ReplyKind::Fixed("My name is Dialout, your personal assistant!"),
        terminates: false,
    },
    PolicyEntry {
        name: "wellbeing",
        keywords: &["how are you"],
        reply: ReplyKind::Fixed("I'm doing great, thank you for asking! How are you?"),
        terminates: false,
    },
    PolicyEntry {
        name: "joke",
        keywords: &["joke"],
        reply: ReplyKind::Fixed(
            "Why don't scientists trust atoms? Because they make up everything!",
        ),
        terminates: false,
    },
    PolicyEntry {
        name: "music",
        keywords: &["music", "song"],
        reply: ReplyKind::Fixed("I can't play music yet, but I can help you with other tasks!"),
        terminates: false,
    },
    PolicyEntry {
        name: "news",
        keywords: &["news"],
        reply: ReplyKind::Fixed(
            "I don't have access to news yet, but I can help you with other information!",
        ),
        terminates: false,
    },
    PolicyEntry {
        name: "reminder",
        keywords: &["reminder", "remind"],
        reply: ReplyKind::Fixed(
            "I can help you set reminders! Just tell me what you want to be \
             reminded about and when.",
        ),
        terminates: false,
    },
    PolicyEntry {
        name: "call",
        keywords: &["call"],
        reply: ReplyKind::Fixed(
            "I can help you make calls! Just provide the phone number and message.",
        ),
        terminates: false,
    },
];

/// The outcome of running the policy against one utterance.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    /// The reply to speak back.
    pub reply: String,
    /// Whether the call should end after the reply.
    pub terminates: bool,
    /// The name of the matched entry, if any.
    pub matched: Option<&'static str>,
}

/// Runs the response policy against a speech-recognition result.
pub fn respond(utterance: &str) -> PolicyDecision {
    let normalized = utterance.trim().to_lowercase();

    for entry in RESPONSE_POLICY {
        if entry.keywords.iter().any(|kw| normalized.contains(kw)) {
            let reply = match entry.reply {
                ReplyKind::Fixed(text) => text.to_string(),
                ReplyKind::CurrentTime => format!(
                    "The current time is {}",
                    Local::now().format("%I:%M %p")
                ),
                ReplyKind::CurrentDate => {
                    format!("Today is {}", Local::now().format("%B %d, %Y"))
                }
            };
            return PolicyDecision {
                reply,
                terminates: entry.terminates,
                matched: Some(entry.name),
            };
        }
    }

    PolicyDecision {
        reply: format!(
            "I heard you say '{normalized}'. I'm still learning, but I can help you \
             with basic tasks like checking the time, setting reminders, or making \
             calls. What would you like to do?"
        ),
        terminates: false,
        matched: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_matches_and_continues() {
        let decision = respond("hello there");
        assert_eq!(decision.reply, "Hello! How can I help you today?");
        assert!(!decision.terminates);
        assert_eq!(decision.matched, Some("greeting"));
    }

    #[test]
    fn farewell_terminates() {
        let decision = respond("ok bye");
        assert!(decision.reply.contains("Goodbye"));
        assert!(decision.terminates);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let decision = respond("  HELLO!  ");
        assert_eq!(decision.matched, Some("greeting"));
    }

    #[test]
    fn first_entry_wins_over_later_ones() {
        // "goodbye" also contains keywords that later entries would match
        // ("call" would match "call me goodbye"); the farewell row is earlier.
        let decision = respond("goodbye, call me later");
        assert_eq!(decision.matched, Some("farewell"));
        assert!(decision.terminates);
    }

    #[test]
    fn time_and_date_are_formatted() {
        let time = respond("what time is it");
        assert!(time.reply.starts_with("The current time is "));
        assert!(time.reply.ends_with("AM") || time.reply.ends_with("PM"));

        let date = respond("what's the date");
        assert!(date.reply.starts_with("Today is "));
    }

    #[test]
    fn unmatched_utterance_echoes_with_help_prompt() {
        let decision = respond("quantum flux capacitors");
        assert!(decision.reply.contains("'quantum flux capacitors'"));
        assert!(decision.reply.contains("What would you like to do?"));
        assert!(!decision.terminates);
        assert!(decision.matched.is_none());
    }

    #[test]
    fn only_farewell_terminates() {
        for entry in RESPONSE_POLICY {
            assert_eq!(
                entry.terminates,
                entry.name == "farewell",
                "unexpected terminate flag on {}",
                entry.name
            );
        }
    }
}
