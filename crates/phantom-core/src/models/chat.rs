//! Conversational scheduling.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The assistant's answer to one chat message.
///
/// `actions` describes what the assistant did (events created, deleted or
/// proposed). Its entries are passed through as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One past message and the reply it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub message: String,
    pub response: String,
    pub intent: String,
    pub timestamp: DateTime<FixedOffset>,
}

/// Most recent exchanges, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub conversations: Vec<ChatExchange>,
    pub count: usize,
}
