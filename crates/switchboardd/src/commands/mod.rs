//! Built-in commands shipped with the server.

mod control;

pub use self::control::register_control_commands;

/// Help category of the built-in control commands.
pub const CONTROL_CATEGORY: &str = "control";
