use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix marking a message that went through moderation.
pub const APPROVAL_MARKER: &str = "APPROVED: ";

/// Produces the approved form of a message. The original text is left intact.
pub fn approve(message: &str) -> String {
    format!("{APPROVAL_MARKER}{message}")
}

/// The two logical queues held by the queue store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    /// Messages waiting for moderation.
    Pending,
    /// Messages carrying the approval marker.
    Approved,
}

impl QueueName {
    /// Key under which the queue lives in the store.
    pub fn key(&self) -> &'static str {
        match self {
            QueueName::Pending => "messages",
            QueueName::Approved => "approved_messages",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for QueueName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "pending" | "messages" => Ok(QueueName::Pending),
            "approved" | "approved_messages" => Ok(QueueName::Approved),
            other => Err(format!("unknown queue '{other}'")),
        }
    }
}

/// Form body of `POST /send_message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageForm {
    pub message: String,
}

/// Form body of `POST /approve_message`. Carries the raw, unmarked text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApproveMessageForm {
    pub message: String,
}

/// Form body of the `POST /message_approved` callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageApprovedForm {
    pub approved_message: String,
}

/// Snapshot of the pending queue rendered by the moderation view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingMessages {
    pub messages: Vec<String>,
}
