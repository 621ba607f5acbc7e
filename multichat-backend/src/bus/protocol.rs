//! Wire format of messages published on an output channel.
//!
//! Subscribers receive plain strings with a verb prefix:
//! `New {"msg": ...}` while streaming, `New {"msg": ..., "exit_code": ...}` at
//! the end, and the literal `Ended Ended` once nothing more will follow.

use serde_json::{json, Value};

const NEW_PREFIX: &str = "New ";
pub const ENDED: &str = "Ended Ended";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Incremental content.
    Delta { msg: String },
    /// Final content plus the executor's exit code, if it reported one.
    Final { msg: String, exit_code: Option<i64> },
    /// Terminal sentinel.
    Ended,
}

impl ChannelEvent {
    pub fn delta(msg: impl Into<String>) -> Self {
        Self::Delta { msg: msg.into() }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Delta { msg } => format!("{}{}", NEW_PREFIX, json!({ "msg": msg })),
            Self::Final { msg, exit_code } => {
                format!("{}{}", NEW_PREFIX, json!({ "msg": msg, "exit_code": exit_code }))
            }
            Self::Ended => ENDED.to_string(),
        }
    }

    /// Inverse of [`encode`](Self::encode); `None` for anything unrecognised.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == ENDED {
            return Some(Self::Ended);
        }
        let body: Value = serde_json::from_str(raw.strip_prefix(NEW_PREFIX)?).ok()?;
        let msg = body.get("msg")?.as_str().unwrap_or_default().to_string();
        match body.get("exit_code") {
            Some(code) => Some(Self::Final {
                msg,
                exit_code: code.as_i64(),
            }),
            None => Some(Self::Delta { msg }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings() {
        assert_eq!(ChannelEvent::delta("Hel").encode(), r#"New {"msg":"Hel"}"#);
        assert_eq!(
            ChannelEvent::Final { msg: "Hello".into(), exit_code: None }.encode(),
            r#"New {"exit_code":null,"msg":"Hello"}"#
        );
        assert_eq!(ChannelEvent::Ended.encode(), "Ended Ended");
    }

    #[test]
    fn test_parse_distinguishes_final_from_delta() {
        let fin = ChannelEvent::Final { msg: String::new(), exit_code: Some(3) };
        assert_eq!(ChannelEvent::parse(&fin.encode()), Some(fin));
        assert_eq!(
            ChannelEvent::parse(r#"New {"msg":"x"}"#),
            Some(ChannelEvent::delta("x"))
        );
        assert_eq!(ChannelEvent::parse("Ended Ended"), Some(ChannelEvent::Ended));
        assert_eq!(ChannelEvent::parse("Bogus"), None);
        assert_eq!(ChannelEvent::parse("New {broken"), None);
    }
}
