//! TwiML markup responder.
//!
//! [`render`] is the only entry point the call handler needs. It never fails:
//! every input produces a well-formed document, and untrusted text is escaped
//! before it is embedded.

use serde::{Deserialize, Serialize};

/// Media type for every markup response.
pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

const PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// What the provider should do after speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Speak, then collect speech and post it back to the webhook.
    Listen,
    /// Speak, then bridge the call to a human.
    Transfer,
    /// Empty document. The call is over on the provider side.
    None,
}

fn default_voice() -> String {
    "Polly.Joanna".to_string()
}

fn default_language() -> String {
    "fr-FR".to_string()
}

fn default_gather_action() -> String {
    "/api/twiml".to_string()
}

fn default_speech_timeout() -> String {
    "auto".to_string()
}

fn default_gather_timeout_secs() -> u32 {
    5
}

fn default_listen_prompt() -> String {
    "Je vous écoute.".to_string()
}

fn default_no_input_message() -> String {
    "Je n'ai rien entendu. Au revoir.".to_string()
}

fn default_transfer_announcement() -> String {
    "Je vous transfère vers un agent humain.".to_string()
}

fn default_transfer_number() -> String {
    "+33123456789".to_string()
}

/// Rendering knobs. Deserializable so the server can embed it in its config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupOptions {
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// URL the provider posts gathered speech to. Usually the webhook itself.
    #[serde(default = "default_gather_action")]
    pub gather_action: String,
    #[serde(default = "default_speech_timeout")]
    pub speech_timeout: String,
    /// Seconds of silence before the gather gives up.
    #[serde(default = "default_gather_timeout_secs")]
    pub gather_timeout_secs: u32,
    #[serde(default = "default_listen_prompt")]
    pub listen_prompt: String,
    /// Spoken when the gather times out without input.
    #[serde(default = "default_no_input_message")]
    pub no_input_message: String,
    #[serde(default = "default_transfer_announcement")]
    pub transfer_announcement: String,
    #[serde(default = "default_transfer_number")]
    pub transfer_number: String,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            language: default_language(),
            gather_action: default_gather_action(),
            speech_timeout: default_speech_timeout(),
            gather_timeout_secs: default_gather_timeout_secs(),
            listen_prompt: default_listen_prompt(),
            no_input_message: default_no_input_message(),
            transfer_announcement: default_transfer_announcement(),
            transfer_number: default_transfer_number(),
        }
    }
}

/// Renders the response for `message` followed by `next`.
///
/// A blank message produces no `<Say>`. [`NextAction::None`] ignores the
/// message and returns an empty `<Response>`.
pub fn render(opts: &MarkupOptions, message: &str, next: NextAction) -> String {
    let mut doc = TwimlBuilder::new();
    match next {
        NextAction::None => {}
        NextAction::Listen => {
            doc.say(message, &opts.voice, &opts.language);
            doc.gather_speech(opts, |inner| {
                inner.say(&opts.listen_prompt, &opts.voice, &opts.language);
            });
            doc.say(&opts.no_input_message, &opts.voice, &opts.language);
        }
        NextAction::Transfer => {
            doc.say(message, &opts.voice, &opts.language);
            doc.say(&opts.transfer_announcement, &opts.voice, &opts.language);
            doc.dial(&opts.transfer_number);
        }
    }
    doc.build()
}

/// Incremental writer for the verbs this service emits.
#[derive(Debug, Default)]
pub struct TwimlBuilder {
    body: String,
}

impl TwimlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `<Say>`. Skipped when the sanitized text is empty.
    pub fn say(&mut self, text: &str, voice: &str, language: &str) -> &mut Self {
        let text = escape(text);
        let text = text.trim();
        if text.is_empty() {
            return self;
        }
        self.body.push_str(&format!(
            r#"<Say voice="{}" language="{}">{}</Say>"#,
            escape(voice),
            escape(language),
            text
        ));
        self
    }

    /// Appends a speech `<Gather>` whose children are written by `inner`.
    pub fn gather_speech(
        &mut self,
        opts: &MarkupOptions,
        inner: impl FnOnce(&mut TwimlBuilder),
    ) -> &mut Self {
        let mut nested = TwimlBuilder::new();
        inner(&mut nested);
        self.body.push_str(&format!(
            r#"<Gather input="speech" action="{}" method="POST" speechTimeout="{}" timeout="{}" language="{}">{}</Gather>"#,
            escape(&opts.gather_action),
            escape(&opts.speech_timeout),
            opts.gather_timeout_secs,
            escape(&opts.language),
            nested.body
        ));
        self
    }

    pub fn dial(&mut self, number: &str) -> &mut Self {
        self.body
            .push_str(&format!("<Dial>{}</Dial>", escape(number.trim())));
        self
    }

    pub fn build(self) -> String {
        format!("{PROLOG}<Response>{}</Response>", self.body)
    }
}

/// Escapes XML metacharacters. Whitespace controls become spaces and all
/// other control characters are dropped.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
