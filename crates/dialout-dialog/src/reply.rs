//! Reply generation for recorded-utterance turns.

/// Generates the spoken reply for a recording turn from its transcript.
///
/// An absent or empty transcript selects the "didn't hear anything" branch —
/// this is the branch a failed transcription provider lands on, so the
/// conversation continues instead of dying with the provider.
pub fn reply_to_transcript(transcript: Option<&str>) -> String {
    let text = match transcript {
        Some(t) if !t.trim().is_empty() => t.trim().to_lowercase(),
        _ => return "I didn't hear anything. Could you please repeat that?".to_string(),
    };

    if text.contains("hello") || text.contains("hi") {
        "Hello! How are you doing today?".to_string()
    } else if text.contains("goodbye") || text.contains("bye") {
        "Thank you for calling. Have a great day!".to_string()
    } else if text.contains("help") {
        "I'm here to help! You can ask me questions or just chat with me.".to_string()
    } else if text.contains("repeat") {
        format!("I heard you say: {text}")
    } else if text.contains('?') {
        "That's an interesting question. Let me think about that.".to_string()
    } else {
        format!("I heard you say: {text}. That's interesting! Tell me more.")
    }
}
