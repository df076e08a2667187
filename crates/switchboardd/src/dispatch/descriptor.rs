//! Built-in command descriptors and the context handlers run in.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::arguments::ParamAliases;
use super::dispatcher::Dispatcher;
use super::errors::{CommandError, RpcError};
use super::request::JsonRpcRequest;
use super::table::CommandTable;
use crate::timers::TimerCallback;
use crate::tracker::ActiveCommand;

/// Category excluded from the grouped help listing.
pub const HIDDEN_CATEGORY: &str = "hidden";

/// Handler for a built-in command.
///
/// `describe` supplies the usage text; the help listing calls it directly and
/// a request in help mode is answered with it.
pub trait CommandHandler: Send + Sync {
    /// Runs the command against positional params.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the command fails or its arguments do
    /// not fit.
    fn invoke(
        &self,
        context: &CommandContext<'_>,
        request: &JsonRpcRequest,
    ) -> Result<Value, CommandError>;

    /// Returns the usage text; the first line is the summary.
    fn describe(&self) -> String;
}

/// Immutable description of a built-in command.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: String,
    category: String,
    params: Vec<ParamAliases>,
    handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    /// Builds a descriptor; each `params` entry is an alias pattern such as
    /// `"blockhash|hash"`.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        params: &[&str],
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: params.iter().copied().map(ParamAliases::parse).collect(),
            handler,
        }
    }

    /// Canonical method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Declared parameters in positional order.
    #[must_use]
    pub fn params(&self) -> &[ParamAliases] {
        &self.params
    }

    /// Handler capability.
    #[must_use]
    pub fn handler(&self) -> &dyn CommandHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Server state visible to a running handler.
pub struct CommandContext<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> CommandContext<'a> {
    pub(crate) const fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Built-in command table.
    #[must_use]
    pub fn table(&self) -> &CommandTable {
        self.dispatcher.table()
    }

    /// Commands executing right now, including the caller.
    #[must_use]
    pub fn active_commands(&self) -> Vec<ActiveCommand> {
        self.dispatcher.tracker().snapshot()
    }

    /// Time since the dispatcher was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.dispatcher.uptime()
    }

    /// Asks the server to shut down.
    pub fn request_shutdown(&self) {
        self.dispatcher.shutdown_handle().request();
    }

    /// Schedules `callback` under `name`, replacing any pending timer with
    /// that name.
    ///
    /// # Errors
    ///
    /// Returns an internal error when no timer backend is installed.
    pub fn run_later(
        &self,
        name: &str,
        callback: TimerCallback,
        delay_seconds: u64,
    ) -> Result<(), RpcError> {
        self.dispatcher.timers().run_later(name, callback, delay_seconds)
    }

    /// Returns `true` when deprecated behaviour of `method` was re-enabled.
    #[must_use]
    pub fn is_deprecated_rpc_enabled(&self, method: &str) -> bool {
        self.dispatcher.is_deprecated_rpc_enabled(method)
    }

    /// Fails unless deprecated behaviour of `method` was re-enabled.
    ///
    /// # Errors
    ///
    /// Returns a method-deprecated error naming the configuration switch.
    pub fn require_deprecated(&self, method: &str) -> Result<(), RpcError> {
        if self.is_deprecated_rpc_enabled(method) {
            Ok(())
        } else {
            Err(RpcError::method_deprecated(method))
        }
    }
}
