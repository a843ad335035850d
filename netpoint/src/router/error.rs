use thiserror::Error;

use crate::router::SendPattern;

/// Errors that can abort one outbound send. Every variant is isolated to the
/// send that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Attempted to send on behalf of an object that no longer exists
    #[error("cannot send {call}: no live object at source path {path}")]
    InvalidSourceInstance { call: String, path: String },

    /// A replicated value tried to send before being registered
    #[error("replicated value used before registration")]
    UnboundValue,

    /// A host-only pattern was invoked on a client
    #[error("{pattern:?} may only be sent by the host")]
    NotHost { pattern: SendPattern },
}

/// Errors that can drop one inbound (or looped-back) message. Every variant
/// is isolated to the message that raised it; none affect other objects or
/// the peer process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A read ran past the message's written bits: the sender and receiver
    /// disagree about the payload's shape
    #[error("message truncated while reading {context}")]
    TruncatedMessage { context: &'static str },

    /// The target path did not resolve to a live object. Legitimate when the
    /// object was destroyed between send and receipt
    #[error("no live object at path {path} for call {name}")]
    UnknownTarget { name: String, path: String },

    /// The target object exists but has no call registered under this name
    #[error("call {name} is not registered on object {path}")]
    UnregisteredCall { name: String, path: String },

    /// The synchronous local-dispatch guard tripped
    #[error("local dispatch exceeded the depth limit of {limit}")]
    DepthExceeded { limit: u8 },
}
