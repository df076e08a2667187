//! JSON-RPC command dispatch.
//!
//! Requests arrive as newline-delimited JSON. Each line holds either one
//! request object or a batch array:
//!
//! ```json
//! {"id":1,"method":"help","params":{"command":"stop"}}
//! ```
//!
//! and is answered by one line:
//!
//! ```json
//! {"result":"stop ...","error":null,"id":1}
//! ```
//!
//! Methods resolve first against the runtime [`CommandRegistry`], then against
//! the built-in [`CommandTable`]. Built-in commands declare their parameter
//! names so named arguments can be converted to positional ones before the
//! handler runs. Every execution is visible through `getrpcinfo` while it is
//! in flight.

mod arguments;
mod connection;
mod descriptor;
mod dispatcher;
mod errors;
mod params;
mod registry;
mod reply;
mod request;
mod table;
mod usage;

pub use self::arguments::{ParamAliases, transform_named_arguments};
pub(crate) use self::connection::RpcConnectionHandler;
pub use self::descriptor::{CommandContext, CommandDescriptor, CommandHandler, HIDDEN_CATEGORY};
pub use self::dispatcher::{Dispatcher, ResolvedCommand};
pub use self::errors::{CommandError, ErrorCode, RpcError};
pub use self::params::{
    TypeSpec, ValueKind, parse_hash, parse_hex, type_check, type_check_argument,
    type_check_object,
};
pub use self::registry::{CommandRegistry, RpcCommand};
pub use self::reply::ReplyEnvelope;
pub use self::request::{JsonRpcRequest, MalformedRequest};
pub use self::table::CommandTable;
pub use self::usage::{CommandUsage, example_cli, example_rpc};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
