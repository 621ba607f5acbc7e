use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::processing::notices::PLACEHOLDER;

/// One turn of a conversation (a row of `histories`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: i64,
    pub chat_id: i64,
    pub msg: String,
    pub is_bot: bool,
    /// Earlier turns are sent along as context (otherwise only the latest one).
    pub chained: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HistoryMessage {
    /// Still waiting for a dispatch job to write the reply.
    pub fn is_placeholder(&self) -> bool {
        self.msg == PLACEHOLDER
    }
}

/// A turn as serialized into the executor's `input` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub msg: String,
    pub isbot: bool,
}

impl Turn {
    pub fn user(msg: impl Into<String>) -> Self {
        Self { msg: msg.into(), isbot: false }
    }

    pub fn bot(msg: impl Into<String>) -> Self {
        Self { msg: msg.into(), isbot: true }
    }
}
