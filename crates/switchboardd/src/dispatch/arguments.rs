//! Named-to-positional argument conversion.
//!
//! Commands declare their parameters as an ordered list of alias groups
//! (`"blockhash|hash"`). A request carrying an object is rewritten into the
//! positional form the handler expects: each declared position takes the value
//! of the first alias present, gaps before a matched position become `null`,
//! and gaps after the last match are dropped so handlers can still branch on
//! argument count.

use std::collections::BTreeMap;
use std::iter;

use serde_json::Value;

use super::errors::RpcError;
use super::request::JsonRpcRequest;

/// Interchangeable names for one positional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamAliases {
    aliases: Vec<String>,
}

impl ParamAliases {
    /// Parses a `|`-separated alias pattern such as `"b|c"`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        Self {
            aliases: pattern.split('|').map(str::to_owned).collect(),
        }
    }

    /// Aliases in priority order.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Preferred name, used in usage text.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.aliases.first().map_or("", String::as_str)
    }
}

impl From<&str> for ParamAliases {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

/// Rewrites object-shaped params into positional form.
///
/// Requests that already carry an array are returned unchanged.
///
/// # Errors
///
/// Returns an invalid parameter error naming the smallest key that matched no
/// declared alias.
pub fn transform_named_arguments(
    request: &JsonRpcRequest,
    params: &[ParamAliases],
) -> Result<JsonRpcRequest, RpcError> {
    let Some(named) = request.named() else {
        return Ok(request.clone());
    };

    let mut remaining: BTreeMap<&str, &Value> = named
        .iter()
        .map(|(key, value)| (key.as_str(), value))
        .collect();
    let mut positional = Vec::with_capacity(params.len());
    let mut holes = 0_usize;

    for group in params {
        let found = group
            .aliases()
            .iter()
            .find_map(|alias| remaining.remove(alias.as_str()));
        match found {
            Some(value) => {
                positional.extend(iter::repeat_n(Value::Null, holes));
                holes = 0;
                positional.push(value.clone());
            }
            None => holes += 1,
        }
    }

    if let Some(unknown) = remaining.keys().next() {
        return Err(RpcError::invalid_parameter(format!(
            "Unknown named parameter {unknown}"
        )));
    }

    Ok(JsonRpcRequest {
        params: Value::Array(positional),
        ..request.clone()
    })
}
