//! Reply envelopes written back to clients.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

use super::errors::RpcError;

/// Outcome of one request together with its echoed id.
///
/// Serialises as `{"result": ..., "error": null, "id": ...}` on success and
/// `{"result": null, "error": {"code": ..., "message": ...}, "id": ...}` on
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEnvelope {
    /// Echoed request id.
    pub id: Value,
    /// Result value or error.
    pub outcome: Result<Value, RpcError>,
}

impl ReplyEnvelope {
    /// Wraps an outcome.
    #[must_use]
    pub const fn new(id: Value, outcome: Result<Value, RpcError>) -> Self {
        Self { id, outcome }
    }

    /// Builds a successful reply.
    #[must_use]
    pub const fn success(id: Value, result: Value) -> Self {
        Self::new(id, Ok(result))
    }

    /// Builds a failed reply.
    #[must_use]
    pub const fn failure(id: Value, error: RpcError) -> Self {
        Self::new(id, Err(error))
    }

    /// Returns the error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&RpcError> {
        self.outcome.as_ref().err()
    }

    /// Returns the result, if any.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }
}

impl Serialize for ReplyEnvelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut reply = serializer.serialize_struct("ReplyEnvelope", 3)?;
        match &self.outcome {
            Ok(result) => {
                reply.serialize_field("result", result)?;
                reply.serialize_field("error", &Value::Null)?;
            }
            Err(error) => {
                reply.serialize_field("result", &Value::Null)?;
                reply.serialize_field("error", error)?;
            }
        }
        reply.serialize_field("id", &self.id)?;
        reply.end()
    }
}
