//! Runtime-pluggable commands.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use super::DISPATCH_TARGET;
use super::errors::CommandError;
use super::request::JsonRpcRequest;

/// Command registered after startup that owns its whole request contract,
/// argument parsing included.
pub trait RpcCommand: Send + Sync {
    /// Method name the command answers to.
    fn name(&self) -> &str;

    /// Handles the request exactly as received.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command fails.
    fn execute(&self, request: &JsonRpcRequest) -> Result<Value, CommandError>;
}

/// Reader-writer guarded table of [`RpcCommand`]s.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<dyn RpcCommand>>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command` under its name unless that name is already taken.
    ///
    /// Returns `true` when the command was inserted.
    pub fn register(&self, command: Arc<dyn RpcCommand>) -> bool {
        let mut commands = self
            .commands
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match commands.entry(command.name().to_owned()) {
            Entry::Occupied(existing) => {
                debug!(
                    target: DISPATCH_TARGET,
                    method = existing.key().as_str(),
                    "ignoring duplicate dynamic command"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(command);
                true
            }
        }
    }

    /// Returns the command registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn RpcCommand>> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandRegistry")
            .field("commands", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Named {
        name: &'static str,
        reply: Value,
    }

    impl RpcCommand for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn execute(&self, _request: &JsonRpcRequest) -> Result<Value, CommandError> {
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn first_registration_wins() {
        let registry = CommandRegistry::new();
        assert!(registry.register(Arc::new(Named {
            name: "getinfo",
            reply: json!(1),
        })));
        assert!(!registry.register(Arc::new(Named {
            name: "getinfo",
            reply: json!(2),
        })));

        let command = registry.get("getinfo").expect("registered");
        let reply = command
            .execute(&JsonRpcRequest::new("getinfo", json!([])))
            .expect("execute");
        assert_eq!(reply, json!(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_names_resolve_to_none() {
        let registry = CommandRegistry::new();
        assert!(registry.get("nothing").is_none());
        assert!(registry.is_empty());
    }
}
