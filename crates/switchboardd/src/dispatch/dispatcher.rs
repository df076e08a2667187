//! Request execution: warmup gate, lookup, argument conversion and tracking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::DISPATCH_TARGET;
use super::arguments::transform_named_arguments;
use super::descriptor::{CommandContext, CommandDescriptor};
use super::errors::{CommandError, RpcError};
use super::registry::{CommandRegistry, RpcCommand};
use super::reply::ReplyEnvelope;
use super::request::JsonRpcRequest;
use super::table::CommandTable;
use crate::clock::{MonotonicClock, SystemClock};
use crate::process::ShutdownHandle;
use crate::timers::DeadlineTimers;
use crate::tracker::ExecutionTracker;
use crate::warmup::WarmupGate;

/// Fallback line written when a reply cannot be serialised.
const SERIALISE_FAILURE_REPLY: &str =
    r#"{"result":null,"error":{"code":-32603,"message":"failed to serialise reply"},"id":null}"#;

/// Command found by [`Dispatcher::lookup`].
#[derive(Clone)]
pub enum ResolvedCommand {
    /// Runtime-registered command that receives the request untouched.
    Bound(Arc<dyn RpcCommand>),
    /// Built-in command whose named params are converted to positional.
    Free(Arc<CommandDescriptor>),
}

impl std::fmt::Debug for ResolvedCommand {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bound(command) => formatter.debug_tuple("Bound").field(&command.name()).finish(),
            Self::Free(descriptor) => formatter.debug_tuple("Free").field(descriptor).finish(),
        }
    }
}

/// Executes JSON-RPC requests against the command registries.
///
/// One dispatcher is built per server and shared across connection threads.
/// Handlers run outside every dispatcher lock.
pub struct Dispatcher {
    table: CommandTable,
    registry: CommandRegistry,
    warmup: WarmupGate,
    tracker: ExecutionTracker,
    timers: Arc<DeadlineTimers>,
    shutdown: ShutdownHandle,
    clock: Arc<dyn MonotonicClock>,
    started_at: Instant,
    deprecated_rpc: Vec<String>,
}

impl Dispatcher {
    /// Creates a dispatcher over `table` using the system clock.
    #[must_use]
    pub fn new(table: CommandTable) -> Self {
        Self::with_clock(table, Arc::new(SystemClock))
    }

    /// Creates a dispatcher reading time from `clock`.
    #[must_use]
    pub fn with_clock(table: CommandTable, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            table,
            registry: CommandRegistry::new(),
            warmup: WarmupGate::new(),
            tracker: ExecutionTracker::new(Arc::clone(&clock)),
            timers: Arc::new(DeadlineTimers::new()),
            shutdown: ShutdownHandle::new(),
            started_at: clock.now(),
            clock,
            deprecated_rpc: Vec::new(),
        }
    }

    /// Shares an existing timer service.
    #[must_use]
    pub fn with_timers(mut self, timers: Arc<DeadlineTimers>) -> Self {
        self.timers = timers;
        self
    }

    /// Uses `shutdown` for `stop` requests.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Re-enables deprecated behaviour for the listed methods.
    #[must_use]
    pub fn with_deprecated_rpc(mut self, methods: Vec<String>) -> Self {
        self.deprecated_rpc = methods;
        self
    }

    /// Built-in command table.
    #[must_use]
    pub const fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Runtime command registry.
    #[must_use]
    pub const fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Startup gate.
    #[must_use]
    pub const fn warmup(&self) -> &WarmupGate {
        &self.warmup
    }

    /// In-flight command tracker.
    #[must_use]
    pub const fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    /// Deferred timer service.
    #[must_use]
    pub fn timers(&self) -> &Arc<DeadlineTimers> {
        &self.timers
    }

    /// Shutdown trigger used by `stop`.
    #[must_use]
    pub const fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Time since construction.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    /// Returns `true` when deprecated behaviour of `method` was re-enabled.
    #[must_use]
    pub fn is_deprecated_rpc_enabled(&self, method: &str) -> bool {
        self.deprecated_rpc.iter().any(|enabled| enabled == method)
    }

    /// Resolves `method`, preferring runtime-registered commands.
    #[must_use]
    pub fn lookup(&self, method: &str) -> Option<ResolvedCommand> {
        if let Some(command) = self.registry.get(method) {
            return Some(ResolvedCommand::Bound(command));
        }
        self.table
            .get(method)
            .map(|descriptor| ResolvedCommand::Free(Arc::clone(descriptor)))
    }

    /// Executes one parsed request.
    ///
    /// # Errors
    ///
    /// Returns the [`RpcError`] to place in the reply: warmup rejection,
    /// unknown method, argument errors, or the handler's own failure.
    pub fn execute(&self, request: &JsonRpcRequest) -> Result<Value, RpcError> {
        if let Some(status) = self.warmup.status() {
            return Err(RpcError::in_warmup(status));
        }

        let resolved = self
            .lookup(&request.method)
            .ok_or_else(RpcError::method_not_found)?;

        debug!(
            target: DISPATCH_TARGET,
            method = request.method.as_str(),
            "dispatching request"
        );

        match resolved {
            ResolvedCommand::Bound(command) => {
                let _guard = self.tracker.begin(&request.method);
                command.execute(request).map_err(CommandError::into_rpc)
            }
            ResolvedCommand::Free(descriptor) => self.execute_free(&descriptor, request),
        }
    }

    fn execute_free(
        &self,
        descriptor: &CommandDescriptor,
        request: &JsonRpcRequest,
    ) -> Result<Value, RpcError> {
        let request = transform_named_arguments(request, descriptor.params())?;
        let handler = descriptor.handler();
        if request.help_requested {
            return Err(RpcError::misc(handler.describe()));
        }

        let _guard = self.tracker.begin(&request.method);
        let context = CommandContext::new(self);
        handler
            .invoke(&context, &request)
            .map_err(CommandError::into_rpc)
    }

    /// Parses and executes one request value.
    ///
    /// Malformed envelopes produce a parse error reply echoing whatever id
    /// could be read.
    #[must_use]
    pub fn execute_one(&self, value: &Value) -> ReplyEnvelope {
        match JsonRpcRequest::parse(value) {
            Ok(request) => {
                let outcome = self.execute(&request);
                ReplyEnvelope::new(request.id, outcome)
            }
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    %error,
                    "malformed request envelope"
                );
                ReplyEnvelope::failure(error.id(), error.to_rpc_error())
            }
        }
    }

    /// Executes every element independently, preserving order.
    #[must_use]
    pub fn execute_batch(&self, values: &[Value]) -> Vec<ReplyEnvelope> {
        values.iter().map(|value| self.execute_one(value)).collect()
    }

    /// Handles one raw payload: an object is a single request, an array a
    /// batch. The returned line always ends with `\n`.
    #[must_use]
    pub fn handle_payload(&self, payload: &[u8]) -> String {
        let mut line = match serde_json::from_slice::<Value>(payload) {
            Ok(Value::Object(object)) => serialise(&self.execute_one(&Value::Object(object))),
            Ok(Value::Array(batch)) => serialise(&self.execute_batch(&batch)),
            Ok(_) => serialise(&ReplyEnvelope::failure(
                Value::Null,
                RpcError::parse_error("Top-level object parse error"),
            )),
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    %error,
                    "unparsable request payload"
                );
                serialise(&ReplyEnvelope::failure(
                    Value::Null,
                    RpcError::parse_error("Parse error"),
                ))
            }
        };
        line.push('\n');
        line
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("registry", &self.registry)
            .field("warmup", &self.warmup)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

fn serialise<T: Serialize>(reply: &T) -> String {
    serde_json::to_string(reply).unwrap_or_else(|error| {
        warn!(
            target: DISPATCH_TARGET,
            %error,
            "failed to serialise reply"
        );
        SERIALISE_FAILURE_REPLY.to_owned()
    })
}
