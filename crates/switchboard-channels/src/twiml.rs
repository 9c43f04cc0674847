//! TwiML voice markup.
//!
//! Responses are built verb by verb and rendered once; every text node and
//! attribute value is XML-escaped on render.

use std::fmt::Write;

/// Voice used by `<Say>` unless overridden.
pub const DEFAULT_SAY_VOICE: &str = "alice";

/// Speech capture element.
#[derive(Debug, Clone, PartialEq)]
pub struct Gather {
    pub action: String,
    pub language: String,
    pub prompt: Option<String>,
}

impl Gather {
    pub fn speech(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            language: "en-US".to_string(),
            prompt: None,
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Verb {
    Say(String),
    Play(String),
    Gather(Gather),
    Redirect(String),
    Dial(String),
    Hangup,
}

/// A `<Response>` document.
#[derive(Debug, Clone, PartialEq)]
pub struct TwimlResponse {
    voice: String,
    verbs: Vec<Verb>,
}

impl Default for TwimlResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl TwimlResponse {
    pub fn new() -> Self {
        Self::with_voice(DEFAULT_SAY_VOICE)
    }

    pub fn with_voice(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            verbs: Vec::new(),
        }
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(url.into()));
        self
    }

    pub fn dial(mut self, number: impl Into<String>) -> Self {
        self.verbs.push(Verb::Dial(number.into()));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Whether the document captures more caller speech.
    pub fn has_gather(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Gather(_)))
    }

    /// Whether the document transfers the call.
    pub fn has_dial(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Dial(_)))
    }

    pub fn has_hangup(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Hangup))
    }

    /// Audio URIs queued with `<Play>`.
    pub fn played(&self) -> Vec<&str> {
        self.verbs
            .iter()
            .filter_map(|v| match v {
                Verb::Play(url) => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text spoken with `<Say>`, including gather prompts.
    pub fn spoken(&self) -> Vec<&str> {
        self.verbs
            .iter()
            .filter_map(|v| match v {
                Verb::Say(text) => Some(text.as_str()),
                Verb::Gather(g) => g.prompt.as_deref(),
                _ => None,
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let voice = escape_xml(&self.voice);
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push_str("<Response>");
        for verb in &self.verbs {
            // Writing into a String cannot fail.
            let _ = match verb {
                Verb::Say(text) => write!(out, r#"<Say voice="{voice}">{}</Say>"#, escape_xml(text)),
                Verb::Play(url) => write!(out, "<Play>{}</Play>", escape_xml(url)),
                Verb::Gather(g) => {
                    let _ = write!(
                        out,
                        r#"<Gather input="speech" action="{}" method="POST" speechTimeout="auto" language="{}">"#,
                        escape_xml(&g.action),
                        escape_xml(&g.language)
                    );
                    if let Some(prompt) = &g.prompt {
                        let _ = write!(out, r#"<Say voice="{voice}">{}</Say>"#, escape_xml(prompt));
                    }
                    write!(out, "</Gather>")
                }
                Verb::Redirect(url) => {
                    write!(out, r#"<Redirect method="POST">{}</Redirect>"#, escape_xml(url))
                }
                Verb::Dial(number) => {
                    write!(out, "<Dial><Number>{}</Number></Dial>", escape_xml(number))
                }
                Verb::Hangup => write!(out, "<Hangup/>"),
            };
        }
        out.push_str("</Response>");
        out
    }
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
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
