use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::TetherError;

/// Error codes carried by asynchronously delivered failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A referenced action or type was never loaded
    NotAllLoaded,
    ExecutionFailed,
    RemoteCommunication,
    Cancelled,
    Unknown,
}

/// Failure payload delivered through callback sinks instead of being thrown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new<M: Into<String>>(code: ErrorCode, message: M) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Type name parsed out of the detail text, if single-quoted there
    pub fn missing_name(&self) -> Option<String> {
        let start = self.message.find('\'')?;
        let rest = &self.message[start + 1..];
        let end = rest.find('\'')?;
        let name = &rest[..end];
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Convert to a synchronous failure for a waiting caller.
    ///
    /// The not-all-loaded code is remapped to the distinguished
    /// missing-action failure carrying the parsed type name.
    pub fn into_error(self) -> TetherError {
        match self.code {
            ErrorCode::NotAllLoaded => match self.missing_name() {
                Some(name) => TetherError::missing_action(name),
                None => TetherError::missing_action(self.message),
            },
            ErrorCode::RemoteCommunication => TetherError::remote("callback", self.message),
            _ => TetherError::internal(self.message),
        }
    }
}

/// Typed result/error sink for asynchronous completion
#[async_trait]
pub trait CallbackHandler<T: Send + 'static>: Send + Sync {
    async fn result(&self, value: T);
    async fn error(&self, error: ErrorInfo);
}

/// Anything whose in-flight work can be asked to stop
pub trait Cancelable: Send + Sync {
    fn cancel(&self);
}
