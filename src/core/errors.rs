use thiserror::Error;

/// Unified error type for the tether runtime
#[derive(Debug, Error)]
pub enum TetherError {
    /// An action name is already claimed, locally or by another bus participant
    #[error("Executor already registered for '{action}' (owner: {owner})")]
    DuplicateExecutor { action: String, owner: String },

    /// Bus send/receive failure (e.g. a peer is unreachable)
    #[error("Remote communication failed during {operation}: {message}")]
    RemoteCommunication {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced action or type was never loaded; callers may trigger
    /// on-demand loading when they see this
    #[error("Action or type not loaded: {name}")]
    MissingAction { name: String },

    /// A custom type's backing string conversion cannot be resolved or is
    /// underspecified; detected eagerly at type setup
    #[error("Representation '{repr}' unresolvable: {message}")]
    Representation { repr: String, message: String },

    /// A value's string form exceeds the configured maximum payload size
    #[error("String form size {size} exceeds limit {limit}")]
    SizeLimit { size: u64, limit: u64 },

    /// Persisted data encoded by an incompatible format version
    #[error("Unsupported serialization version {found} (supported: {supported})")]
    SerializationVersion { found: u32, supported: u32 },

    /// Malformed term shape during decoding
    #[error("Structural decode failed: expected {expected}, found {found}")]
    StructuralDecode { expected: String, found: String },

    /// Unknown struct field name
    #[error("No field '{field}' in struct '{structure}'")]
    NoSuchField { structure: String, field: String },

    /// Bounded operation exceeded its time budget
    #[error("Operation timed out: {operation} (timeout: {timeout_ms}ms)")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TetherError {
    /// Create a duplicate-executor error naming the conflicting owner
    pub fn duplicate_executor<A: Into<String>, O: Into<String>>(action: A, owner: O) -> Self {
        Self::DuplicateExecutor {
            action: action.into(),
            owner: owner.into(),
        }
    }

    /// Create a remote-communication error
    pub fn remote<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::RemoteCommunication {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a remote-communication error with source
    pub fn remote_with_source<O: Into<String>, M: Into<String>, E>(
        operation: O,
        message: M,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::RemoteCommunication {
            operation: operation.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a missing-action error
    pub fn missing_action<S: Into<String>>(name: S) -> Self {
        Self::MissingAction { name: name.into() }
    }

    /// Create a representation error
    pub fn representation<R: Into<String>, M: Into<String>>(repr: R, message: M) -> Self {
        Self::Representation {
            repr: repr.into(),
            message: message.into(),
        }
    }

    /// Create a size-limit error
    pub fn size_limit(size: u64, limit: u64) -> Self {
        Self::SizeLimit { size, limit }
    }

    /// Create a serialization-version error
    pub fn serialization_version(found: u32, supported: u32) -> Self {
        Self::SerializationVersion { found, supported }
    }

    /// Create a structural-decode error
    pub fn structural_decode<E: Into<String>, F: Into<String>>(expected: E, found: F) -> Self {
        Self::StructuralDecode {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a no-such-field error
    pub fn no_such_field<S: Into<String>, F: Into<String>>(structure: S, field: F) -> Self {
        Self::NoSuchField {
            structure: structure.into(),
            field: field.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RemoteCommunication { .. } => true,
            Self::MissingAction { .. } => true, // recoverable after on-demand load
            Self::DuplicateExecutor { .. }
            | Self::Representation { .. }
            | Self::SizeLimit { .. }
            | Self::SerializationVersion { .. }
            | Self::StructuralDecode { .. }
            | Self::NoSuchField { .. } => false,
            Self::Internal { .. } => false,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::DuplicateExecutor { .. } => "duplicate_executor",
            Self::RemoteCommunication { .. } => "remote",
            Self::MissingAction { .. } => "missing_action",
            Self::Representation { .. } => "representation",
            Self::SizeLimit { .. } => "size_limit",
            Self::SerializationVersion { .. } => "serialization_version",
            Self::StructuralDecode { .. } => "structural_decode",
            Self::NoSuchField { .. } => "no_such_field",
            Self::Timeout { .. } => "timeout",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TetherError>;

/// Convert from common error types
impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: "json serialization failed".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<anyhow::Error> for TetherError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
