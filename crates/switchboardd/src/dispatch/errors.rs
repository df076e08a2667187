//! Error types for JSON-RPC dispatch.
//!
//! [`RpcError`] is the wire-shaped error every failure ends up as.
//! [`CommandError`] is what handlers return: RPC-shaped errors pass through,
//! plain failures are folded into [`ErrorCode::MiscError`] at the dispatcher
//! boundary.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// JSON-RPC error codes understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Generic handler failure (`-1`).
    MiscError,
    /// Value had the wrong JSON type (`-3`).
    TypeError,
    /// Value was malformed or out of range (`-8`).
    InvalidParameter,
    /// Server is still starting (`-28`).
    InWarmup,
    /// Method is deprecated and not re-enabled (`-32`).
    MethodDeprecated,
    /// Request object is not valid JSON-RPC (`-32600`).
    InvalidRequest,
    /// No command is registered under the method name (`-32601`).
    MethodNotFound,
    /// Parameters are invalid for the method (`-32602`).
    InvalidParams,
    /// Unexpected internal failure (`-32603`).
    InternalError,
    /// Payload or envelope could not be parsed (`-32700`).
    ParseError,
    /// Application-defined code outside the standard set.
    Other(i32),
}

impl ErrorCode {
    /// Integer value sent on the wire.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::MiscError => -1,
            Self::TypeError => -3,
            Self::InvalidParameter => -8,
            Self::InWarmup => -28,
            Self::MethodDeprecated => -32,
            Self::InvalidRequest => -32_600,
            Self::MethodNotFound => -32_601,
            Self::InvalidParams => -32_602,
            Self::InternalError => -32_603,
            Self::ParseError => -32_700,
            Self::Other(code) => code,
        }
    }

    /// Maps a wire integer back onto a known code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::MiscError,
            -3 => Self::TypeError,
            -8 => Self::InvalidParameter,
            -28 => Self::InWarmup,
            -32 => Self::MethodDeprecated,
            -32_600 => Self::InvalidRequest,
            -32_601 => Self::MethodNotFound,
            -32_602 => Self::InvalidParams,
            -32_603 => Self::InternalError,
            -32_700 => Self::ParseError,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.code())
    }
}

/// Error object carried in a reply envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} (code {code})")]
pub struct RpcError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl RpcError {
    /// Creates an error with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a handler failure error.
    pub fn misc(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MiscError, message)
    }

    /// Creates a type mismatch error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeError, message)
    }

    /// Creates an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameter, message)
    }

    /// Creates a warmup rejection carrying the current status text.
    pub fn in_warmup(status: impl Into<String>) -> Self {
        Self::new(ErrorCode::InWarmup, status)
    }

    /// Creates a deprecation rejection for `method`.
    #[must_use]
    pub fn method_deprecated(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodDeprecated,
            format!(
                "{method} is deprecated and will be removed; \
                 restart with --deprecated-rpc {method} to keep using it"
            ),
        )
    }

    /// Creates the error returned for unknown methods.
    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(ErrorCode::MethodNotFound, "Method not found")
    }

    /// Creates an internal failure error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Creates a parse failure error.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }
}

/// Failure returned by a command handler.
#[derive(Debug, Error)]
pub enum CommandError {
    /// RPC-shaped error, forwarded unchanged.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Any other failure; its message survives, its origin does not.
    #[error("{message}")]
    Failed {
        /// Failure description.
        message: String,
    },
}

impl CommandError {
    /// Creates a plain handler failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Rejects a call whose arguments do not fit, replying with the usage text.
    pub fn usage(text: impl Into<String>) -> Self {
        Self::Rpc(RpcError::misc(text))
    }

    /// Normalises the failure into a wire error.
    #[must_use]
    pub fn into_rpc(self) -> RpcError {
        match self {
            Self::Rpc(error) => error,
            Self::Failed { message } => RpcError::misc(message),
        }
    }
}
