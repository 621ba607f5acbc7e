use serde_json::Value;

use crate::models::UserCredentials;

/// How a job's output reaches its audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Chatroom turn; the output channel is the message id itself.
    Direct,
    /// API, batch or any other channel name.
    Proxied,
}

impl Addressing {
    pub fn classify(channel: &str, message_id: i64) -> Self {
        if channel == message_id.to_string() {
            Self::Direct
        } else {
            Self::Proxied
        }
    }
}

/// The message a job writes to, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTarget {
    pub id: i64,
    pub mode: Addressing,
}

impl MessageTarget {
    /// The kernel tells the modes apart by the sign of `history_id`.
    pub fn wire_history_id(&self) -> i64 {
        match self.mode {
            Addressing::Direct => self.id,
            Addressing::Proxied => -self.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleVerdict {
    Busy,
    NoExecutor,
    Ready,
    Unknown,
}

impl ScheduleVerdict {
    /// Parse the bare token returned by `/worker/schedule`.
    pub fn parse(body: &str) -> Self {
        match body.trim().to_ascii_uppercase().as_str() {
            "BUSY" => Self::Busy,
            "NOMACHINE" => Self::NoExecutor,
            "READY" => Self::Ready,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub access_code: String,
    pub target: MessageTarget,
    pub user_id: i64,
}

/// Everything sent to `/chat/completions`.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// JSON array of prior turns, already rectified.
    pub input: String,
    pub access_code: String,
    pub user_id: i64,
    pub target: MessageTarget,
    pub locale: String,
    pub api_base_urls: String,
    pub credentials: UserCredentials,
    /// Processed modelfile as JSON; omitted when the bot has none.
    pub modelfile: Option<String>,
}

impl CompletionRequest {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("input", self.input.clone()),
            ("name", self.access_code.clone()),
            ("user_id", self.user_id.to_string()),
            ("history_id", self.target.wire_history_id().to_string()),
        ];
        let optional = [
            ("openai_token", &self.credentials.openai_token),
            ("google_token", &self.credentials.google_token),
            ("nim_token", &self.credentials.nim_token),
            ("third_party_token", &self.credentials.third_party_token),
        ];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.clone().map(|v| (name, v))),
        );
        fields.push(("user_token", self.credentials.api_token.clone()));
        if let Some(modelfile) = &self.modelfile {
            fields.push(("modelfile", modelfile.clone()));
        }
        fields
    }
}

/// One member of an SSE frame's `delta` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    Text(String),
    Log { level: String, text: String },
    ExitCode(i64),
    Unknown,
}

impl DeltaEvent {
    /// Accepts both the nested (`{"type":"text","text":{"value":..}}`) and the
    /// flat (`{"type":"text","value":..}`) shapes.
    pub fn from_value(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = match value.get("text") {
                    Some(Value::String(s)) => Some(s.as_str()),
                    Some(nested) => nested.get("value").and_then(Value::as_str),
                    None => value.get("value").and_then(Value::as_str),
                };
                Self::Text(text.unwrap_or_default().to_string())
            }
            Some("log") => {
                let src = value.get("log").filter(|l| l.is_object()).unwrap_or(value);
                let field = |name: &str| {
                    src.get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Self::Log {
                    level: field("level"),
                    text: field("text"),
                }
            }
            Some("exit_code") => value
                .get("exit_code")
                .or_else(|| value.get("value"))
                .and_then(Value::as_i64)
                .map(Self::ExitCode)
                .unwrap_or(Self::Unknown),
            _ => Self::Unknown,
        }
    }

    /// Visible contribution of this delta to the current chunk.
    pub fn render_into(&self, chunk: &mut String) {
        match self {
            Self::Text(text) => chunk.push_str(text),
            Self::Log { level, text } => {
                chunk.push_str("\n[");
                chunk.push_str(level);
                chunk.push_str("] ");
                chunk.push_str(text);
            }
            Self::ExitCode(_) | Self::Unknown => {}
        }
    }
}
