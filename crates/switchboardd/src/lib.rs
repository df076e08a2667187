//! JSON-RPC command dispatch server.
//!
//! The server accepts newline-delimited JSON-RPC requests over a Unix or TCP
//! socket, resolves each method against a registry of named commands and
//! writes one reply line per request line. The crate is organised around the
//! dispatch core and the process runtime that hosts it:
//!
//! * [`dispatch`] parses envelopes, converts named arguments to positional
//!   ones, runs handlers and shapes replies. Commands registered at runtime
//!   through [`dispatch::CommandRegistry`] take precedence over the built-in
//!   [`dispatch::CommandTable`].
//! * [`WarmupGate`] rejects every request with the current status text until
//!   startup completes.
//! * [`ExecutionTracker`] records in-flight commands for `getrpcinfo`.
//! * [`DeadlineTimers`] runs named callbacks after a delay, replacing pending
//!   timers of the same name.
//! * [`ServerLifecycle`] signals start and stop, cancelling timers and
//!   deleting the authentication cookie when the server stops.
//!
//! [`run_server`] wires these together: it loads configuration, initialises
//! telemetry, binds the socket, finishes warmup and blocks until a
//! termination signal or a `stop` request.

mod auth;
mod bootstrap;
mod clock;
pub mod commands;
pub mod dispatch;
mod health;
mod lifecycle;
mod process;
mod telemetry;
mod timers;
mod tracker;
mod transport;
mod warmup;

pub use auth::{AuthArtifact, CookieFile};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Server, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use clock::{MonotonicClock, SystemClock};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{
    LifecycleError, LifecycleObserver, ObserverError, RunningFlag, ServerLifecycle,
};
pub use process::{
    LaunchError, ShutdownError, ShutdownHandle, ShutdownSignal, SystemShutdownSignal, run_server,
};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use timers::{
    DeadlineTimer, DeadlineTimers, ThreadTimerBackend, TimerBackend, TimerCallback,
};
pub use tracker::{ActiveCommand, ExecutionGuard, ExecutionTracker};
pub use warmup::{INITIAL_WARMUP_STATUS, WarmupError, WarmupGate};

#[cfg(test)]
mod tests;
