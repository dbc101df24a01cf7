//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are
//! grouped into broad categories through [`Error::kind`], which the loop
//! uses to tell "this reaction cannot run yet" apart from "this reaction
//! failed".

use thiserror::Error;

use crate::reactive::SignalMode;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A class or member declaration is malformed. Raised by `build()`.
    Construction,
    /// A protected slot was written, or a member was used the wrong way.
    Access,
    /// A dependency path could not be resolved.
    Resolution,
    /// A dependency of a dependency could not be resolved.
    Propagation,
    /// A user body (action or evaluator) failed.
    Evaluation,
    /// The loop gave up before reaching a fixed point.
    Scheduling,
    /// Configuration could not be loaded or is invalid.
    Configuration,
    /// A class description could not be encoded or decoded.
    Serialization,
}

/// The error type for all reactive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An alias or declaration refers to something that cannot be called.
    #[error("'{name}' is not callable: {reason}")]
    NotCallable { name: String, reason: String },

    /// A callable target exists but rejects action call semantics.
    #[error("'{name}' cannot be wrapped as an action: {reason}")]
    CallIncompatible { name: String, reason: String },

    #[error("invalid declaration of '{name}' in class {class}: {reason}")]
    InvalidDeclaration {
        class: String,
        name: String,
        reason: String,
    },

    /// External write or delete of a property, action or signal slot.
    #[error("'{name}' is read-only from outside its action")]
    ReadOnly { name: String },

    #[error("{owner} has no member '{name}'")]
    NoSuchMember { owner: String, name: String },

    #[error("signal '{signal}' is a {mode} signal and does not support {operation}")]
    UnsupportedCall {
        signal: String,
        mode: SignalMode,
        operation: &'static str,
    },

    /// The final segment of a dependency path names nothing.
    #[error("signal '{path}' does not exist.")]
    NoSuchSignal { path: String },

    /// An intermediate attribute of a dependency path is not set (yet).
    #[error("signal '{path}' does not exist. (attribute '{missing}' is not set)")]
    Unresolved { path: String, missing: String },

    #[error("signal '{signal}' belongs to a component that no longer exists")]
    OwnerDropped { signal: String },

    #[error("signal '{signal}' depends on '{upstream}', which is not connected")]
    UpstreamNotConnected { signal: String, upstream: String },

    #[error("evaluating '{signal}' failed: {message}")]
    Evaluation { signal: String, message: String },

    #[error("action '{action}' received invalid arguments: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("action '{action}' has no base implementation to delegate to")]
    NoBaseAction { action: String },

    #[error("{0}")]
    Custom(String),

    #[error("iteration stopped after {limit} {unit} without reaching a fixed point")]
    Runaway { limit: usize, unit: &'static str },

    /// The loop a component was created on no longer exists.
    #[error("the event loop of {component} was dropped")]
    LoopDropped { component: String },

    #[error("invalid loop configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Decode(#[from] rmp_serde::decode::Error),
}

impl Error {
    /// Create a free-form error, typically from inside an action body.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create an evaluation error attributed to a signal.
    pub fn evaluation(signal: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            signal: signal.into(),
            message: message.into(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotCallable { .. }
            | Self::CallIncompatible { .. }
            | Self::InvalidDeclaration { .. } => ErrorKind::Construction,
            Self::ReadOnly { .. } | Self::NoSuchMember { .. } | Self::UnsupportedCall { .. } => {
                ErrorKind::Access
            }
            Self::NoSuchSignal { .. } | Self::Unresolved { .. } | Self::OwnerDropped { .. } => {
                ErrorKind::Resolution
            }
            Self::UpstreamNotConnected { .. } => ErrorKind::Propagation,
            Self::Evaluation { .. }
            | Self::InvalidArguments { .. }
            | Self::NoBaseAction { .. }
            | Self::Custom(_) => ErrorKind::Evaluation,
            Self::Runaway { .. } | Self::LoopDropped { .. } => ErrorKind::Scheduling,
            Self::Config(_) => ErrorKind::Configuration,
            Self::Json(_) | Self::Encode(_) | Self::Decode(_) => ErrorKind::Serialization,
        }
    }

    /// Whether this error only means a dependency is not connected.
    pub fn is_unconnected(&self) -> bool {
        matches!(self.kind(), ErrorKind::Resolution | ErrorKind::Propagation)
    }
}
