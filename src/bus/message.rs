use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::term::Term;

/// One message on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Transaction id correlating a request with its responses
    pub uid: u64,
    /// Client id of the sending participant
    pub sender: String,
    /// Transaction id this envelope replies to, if any
    pub reply_to: Option<u64>,
    pub timestamp: NaiveDateTime,
    pub payload: MessagePayload,
}

impl Envelope {
    pub fn new(uid: u64, sender: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            uid,
            sender: sender.into(),
            reply_to: None,
            timestamp: chrono::Utc::now().naive_utc(),
            payload,
        }
    }

    /// Build a reply to this envelope
    pub fn reply(&self, uid: u64, sender: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            uid,
            sender: sender.into(),
            reply_to: Some(self.uid),
            timestamp: chrono::Utc::now().naive_utc(),
            payload,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

/// Message kinds exchanged by the runtime core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Broadcast duplicate-registration check
    ExecutorQuery { action: String },
    ExecutorReply { action: String, claimed: bool },
    /// Cancel the invocation identified by the transaction id
    CancelRequest { uid: u64 },
    /// Bus-wide request to start or stop user-action reporting
    WatchRequest { watching: bool },
    /// Broadcast notification of a watch transition
    WatchNotify { watching: bool },
    /// Sequence numbers for new demonstration-time events
    SerialRequest,
    SerialReply { serial: u64 },
    /// Type persistence round trip with an external type-storage provider
    TypeQuery { name: String },
    TypeResult { name: String, document: Option<JsonValue> },
    TypeListQuery,
    TypeListResult { names: Vec<String> },
    TypeStoreRequest { name: String, document: JsonValue },
    TypeStoreResult { accepted: bool },
    /// Evaluate a term expression against a variable-binding set
    EvalRequest {
        expr: Term,
        bindings: HashMap<String, Term>,
    },
    EvalResult {
        value: Option<Term>,
        error: Option<String>,
    },
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::ExecutorQuery { .. } => MessageKind::ExecutorQuery,
            MessagePayload::ExecutorReply { .. } => MessageKind::ExecutorReply,
            MessagePayload::CancelRequest { .. } => MessageKind::CancelRequest,
            MessagePayload::WatchRequest { .. } => MessageKind::WatchRequest,
            MessagePayload::WatchNotify { .. } => MessageKind::WatchNotify,
            MessagePayload::SerialRequest => MessageKind::SerialRequest,
            MessagePayload::SerialReply { .. } => MessageKind::SerialReply,
            MessagePayload::TypeQuery { .. } => MessageKind::TypeQuery,
            MessagePayload::TypeResult { .. } => MessageKind::TypeResult,
            MessagePayload::TypeListQuery => MessageKind::TypeListQuery,
            MessagePayload::TypeListResult { .. } => MessageKind::TypeListResult,
            MessagePayload::TypeStoreRequest { .. } => MessageKind::TypeStoreRequest,
            MessagePayload::TypeStoreResult { .. } => MessageKind::TypeStoreResult,
            MessagePayload::EvalRequest { .. } => MessageKind::EvalRequest,
            MessagePayload::EvalResult { .. } => MessageKind::EvalResult,
        }
    }
}

/// Discriminant used for per-kind handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ExecutorQuery,
    ExecutorReply,
    CancelRequest,
    WatchRequest,
    WatchNotify,
    SerialRequest,
    SerialReply,
    TypeQuery,
    TypeResult,
    TypeListQuery,
    TypeListResult,
    TypeStoreRequest,
    TypeStoreResult,
    EvalRequest,
    EvalResult,
}
