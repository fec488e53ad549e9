//! Builder for the provider's call-control markup (TwiML).
//!
//! Webhook handlers respond to the provider with a small XML program:
//! play or speak something, gather speech, record the caller, hang up. The
//! builder keeps every handler branch on one code path for emitting it and
//! escapes all text and attribute values.

use std::fmt::Write;

/// A `<Say>` verb: the provider speaks the text with its built-in voice.
#[derive(Debug, Clone, Default)]
pub struct Say {
    text: String,
    voice: Option<String>,
    speed: Option<String>,
}

impl Say {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Selects a provider voice (e.g. `alice`).
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Sets the speaking speed (e.g. `slow`).
    pub fn speed(mut self, speed: impl Into<String>) -> Self {
        self.speed = Some(speed.into());
        self
    }

    fn render(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        let mut attrs = String::new();
        if let Some(voice) = &self.voice {
            let _ = write!(attrs, " voice=\"{}\"", escape(voice));
        }
        if let Some(speed) = &self.speed {
            let _ = write!(attrs, " speed=\"{}\"", escape(speed));
        }
        let _ = writeln!(out, "{pad}<Say{attrs}>{}</Say>", escape(&self.text));
    }
}

/// A `<Gather>` verb configured for speech input, with a nested prompt.
#[derive(Debug, Clone)]
pub struct Gather {
    action: String,
    method: String,
    timeout: u32,
    speech_timeout: u32,
    enhanced: bool,
    prompt: Say,
}

impl Gather {
    /// The fixed speech-gathering configuration used on every listening
    /// turn: enhanced recognition, 10 s speech timeout, 45 s overall.
    pub fn speech(action: impl Into<String>, prompt: Say) -> Self {
        Self {
            action: action.into(),
            method: "POST".to_string(),
            timeout: 45,
            speech_timeout: 10,
            enhanced: true,
            prompt,
        }
    }

    fn render(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        let _ = writeln!(
            out,
            "{pad}<Gather input=\"speech\" action=\"{}\" method=\"{}\" \
             speechTimeout=\"{}\" enhanced=\"{}\" timeout=\"{}\">",
            escape(&self.action),
            escape(&self.method),
            self.speech_timeout,
            self.enhanced,
            self.timeout,
        );
        self.prompt.render(out, indent + 4);
        let _ = writeln!(out, "{pad}</Gather>");
    }
}

/// A `<Record>` verb: record the caller, then call back with the result.
#[derive(Debug, Clone)]
pub struct Record {
    action: String,
    method: String,
    max_length: u32,
    play_beep: bool,
    timeout: u32,
    transcribe: bool,
    transcribe_callback: Option<String>,
    recording_status_callback: Option<String>,
}

impl Record {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            method: "POST".to_string(),
            max_length: 60,
            play_beep: true,
            timeout: 5,
            transcribe: false,
            transcribe_callback: None,
            recording_status_callback: None,
        }
    }

    /// Enables the provider's own (secondary) transcription channel, with
    /// results delivered to `callback`.
    pub fn transcribe_to(mut self, callback: impl Into<String>) -> Self {
        self.transcribe = true;
        self.transcribe_callback = Some(callback.into());
        self
    }

    /// Sets the recording status callback URL.
    pub fn status_callback(mut self, callback: impl Into<String>) -> Self {
        self.recording_status_callback = Some(callback.into());
        self
    }

    fn render(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        let mut attrs = format!(
            "action=\"{}\" method=\"{}\" maxLength=\"{}\" playBeep=\"{}\" timeout=\"{}\"",
            escape(&self.action),
            escape(&self.method),
            self.max_length,
            self.play_beep,
            self.timeout,
        );
        if self.transcribe {
            attrs.push_str(" transcribe=\"true\"");
        }
        if let Some(cb) = &self.transcribe_callback {
            let _ = write!(attrs, " transcribeCallback=\"{}\"", escape(cb));
        }
        if let Some(cb) = &self.recording_status_callback {
            let _ = write!(attrs, " recordingStatusCallback=\"{}\"", escape(cb));
        }
        let _ = writeln!(out, "{pad}<Record {attrs}/>");
    }
}

#[derive(Debug, Clone)]
enum Verb {
    Play(String),
    Say(Say),
    Gather(Gather),
    Record(Record),
    Hangup,
}

/// A `<Response>` document under construction.
#[derive(Debug, Clone, Default)]
pub struct Response {
    verbs: Vec<Verb>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plays audio fetched from a URL.
    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    pub fn say(mut self, say: Say) -> Self {
        self.verbs.push(Verb::Say(say));
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.verbs.push(Verb::Record(record));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Renders the complete XML document.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");
        for verb in &self.verbs {
            match verb {
                Verb::Play(url) => {
                    let _ = writeln!(out, "    <Play>{}</Play>", escape(url));
                }
                Verb::Say(say) => say.render(&mut out, 4),
                Verb::Gather(gather) => gather.render(&mut out, 4),
                Verb::Record(record) => record.render(&mut out, 4),
                Verb::Hangup => out.push_str("    <Hangup/>\n"),
            }
        }
        out.push_str("</Response>");
        out
    }
}

/// Escapes text for use in XML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
