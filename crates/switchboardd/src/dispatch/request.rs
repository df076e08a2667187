//! JSON-RPC request envelopes.

use serde_json::{Map, Value};
use thiserror::Error;

use super::errors::RpcError;

/// A single method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// Token echoed back in the reply.
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Positional (`Array`) or named (`Object`) parameters.
    pub params: Value,
    /// Asks the handler for its usage text instead of running it.
    pub help_requested: bool,
}

impl JsonRpcRequest {
    /// Creates a request with a `null` id.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Value::Null,
            method: method.into(),
            params,
            help_requested: false,
        }
    }

    /// Sets the echoed id.
    #[must_use]
    pub fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }

    /// Marks the request as a help request.
    #[must_use]
    pub fn in_help_mode(mut self) -> Self {
        self.help_requested = true;
        self
    }

    /// Parses a request object received from a client.
    ///
    /// Missing or `null` params become an empty positional list.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRequest`] when the value is not an object, the
    /// method is missing or not a string, or params are neither an array nor
    /// an object.
    pub fn parse(value: &Value) -> Result<Self, MalformedRequest> {
        let Value::Object(envelope) = value else {
            return Err(MalformedRequest::NotAnObject);
        };
        let id = envelope.get("id").cloned().unwrap_or(Value::Null);

        let method = match envelope.get("method") {
            None => return Err(MalformedRequest::MissingMethod { id }),
            Some(Value::String(method)) => method.clone(),
            Some(_) => return Err(MalformedRequest::MethodNotString { id }),
        };

        let params = match envelope.get("params") {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(params @ (Value::Array(_) | Value::Object(_))) => params.clone(),
            Some(_) => return Err(MalformedRequest::InvalidParams { id }),
        };

        Ok(Self {
            id,
            method,
            params,
            help_requested: false,
        })
    }

    /// Positional parameters; empty when params are named.
    #[must_use]
    pub fn positional(&self) -> &[Value] {
        match &self.params {
            Value::Array(values) => values,
            _ => &[],
        }
    }

    /// Named parameters, when the request carries an object.
    #[must_use]
    pub fn named(&self) -> Option<&Map<String, Value>> {
        self.params.as_object()
    }
}

/// Envelope-level parse failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRequest {
    /// The request was not a JSON object.
    #[error("Invalid Request object")]
    NotAnObject,
    /// The `method` member was absent.
    #[error("Missing method")]
    MissingMethod {
        /// Id found in the envelope.
        id: Value,
    },
    /// The `method` member was not a string.
    #[error("Method must be a string")]
    MethodNotString {
        /// Id found in the envelope.
        id: Value,
    },
    /// The `params` member was a scalar.
    #[error("Params must be an array or object")]
    InvalidParams {
        /// Id found in the envelope.
        id: Value,
    },
}

impl MalformedRequest {
    /// Id to echo in the error reply, `null` when none could be read.
    #[must_use]
    pub fn id(&self) -> Value {
        match self {
            Self::NotAnObject => Value::Null,
            Self::MissingMethod { id }
            | Self::MethodNotString { id }
            | Self::InvalidParams { id } => id.clone(),
        }
    }

    /// Converts the failure into the error sent to the client.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::parse_error(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_positional_request() {
        let request =
            JsonRpcRequest::parse(&json!({"method": "help", "params": ["stop"], "id": 7}))
                .expect("parse");
        assert_eq!(request.method, "help");
        assert_eq!(request.positional(), &[json!("stop")]);
        assert_eq!(request.id, json!(7));
        assert!(!request.help_requested);
    }

    #[test]
    fn missing_params_become_empty_array() {
        let request = JsonRpcRequest::parse(&json!({"method": "uptime"})).expect("parse");
        assert_eq!(request.params, json!([]));
        assert_eq!(request.id, Value::Null);
    }

    #[test]
    fn keeps_named_params() {
        let request =
            JsonRpcRequest::parse(&json!({"method": "help", "params": {"command": "stop"}}))
                .expect("parse");
        assert!(request.named().is_some());
        assert!(request.positional().is_empty());
    }

    #[rstest]
    #[case::not_object(json!(["help"]), Value::Null)]
    #[case::missing_method(json!({"id": 3}), json!(3))]
    #[case::method_not_string(json!({"method": 5, "id": "a"}), json!("a"))]
    #[case::scalar_params(json!({"method": "help", "params": 1, "id": 9}), json!(9))]
    fn malformed_envelopes_keep_their_id(#[case] input: Value, #[case] expected_id: Value) {
        let error = JsonRpcRequest::parse(&input).expect_err("should be malformed");
        assert_eq!(error.id(), expected_id);
        assert_eq!(error.to_rpc_error().code.code(), -32_700);
    }
}
