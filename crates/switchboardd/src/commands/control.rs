//! Server introspection and control: `getrpcinfo`, `help`, `stop`, `uptime`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

use super::CONTROL_CATEGORY;
use crate::dispatch::{
    CommandContext, CommandDescriptor, CommandError, CommandHandler, CommandTable, CommandUsage,
    JsonRpcRequest, TypeSpec, ValueKind, example_cli, example_rpc, type_check_argument,
};

/// Reply returned by `stop` before the server winds down.
pub(crate) const STOP_REPLY: &str = "switchboard server stopping";

/// Adds the control commands to `table`.
pub fn register_control_commands(table: &mut CommandTable) {
    let commands: [(&str, &[&str], Arc<dyn CommandHandler>); 4] = [
        ("getrpcinfo", &[], Arc::new(GetRpcInfo)),
        ("help", &["command"], Arc::new(Help)),
        ("stop", &["wait"], Arc::new(Stop)),
        ("uptime", &[], Arc::new(Uptime)),
    ];
    for (name, params, handler) in commands {
        let descriptor = CommandDescriptor::new(name, CONTROL_CATEGORY, params, handler);
        table.append_command(name, Arc::new(descriptor));
    }
}

struct GetRpcInfo;

impl CommandHandler for GetRpcInfo {
    fn invoke(
        &self,
        context: &CommandContext<'_>,
        request: &JsonRpcRequest,
    ) -> Result<Value, CommandError> {
        if !request.positional().is_empty() {
            return Err(CommandError::usage(self.describe()));
        }
        Ok(json!({ "active_commands": context.active_commands() }))
    }

    fn describe(&self) -> String {
        CommandUsage::new("getrpcinfo")
            .description("Returns details of the RPC server.")
            .result(
                "{\n  \"active_commands\" (array) All active commands\n  [\n    {\n      \
                 \"method\" (string) The name of the RPC command\n      \
                 \"duration\" (numeric) The running time in microseconds\n    },...\n  ]\n}",
            )
            .example(example_cli("getrpcinfo", ""))
            .example(example_rpc("getrpcinfo", ""))
            .render()
    }
}

struct Help;

impl CommandHandler for Help {
    fn invoke(
        &self,
        context: &CommandContext<'_>,
        request: &JsonRpcRequest,
    ) -> Result<Value, CommandError> {
        let filter = match request.positional() {
            [] | [Value::Null] => "",
            [command] => {
                type_check_argument(command, TypeSpec::Kind(ValueKind::String))?;
                command.as_str().unwrap_or_default()
            }
            _ => return Err(CommandError::usage(self.describe())),
        };
        Ok(Value::String(context.table().help(filter)))
    }

    fn describe(&self) -> String {
        CommandUsage::new("help")
            .optional_arg("command", "(string) The command to get help on")
            .description("List all commands, or get help for a specified command.")
            .result("\"text\"     (string) The help text")
            .render()
    }
}

struct Stop;

impl CommandHandler for Stop {
    fn invoke(
        &self,
        context: &CommandContext<'_>,
        request: &JsonRpcRequest,
    ) -> Result<Value, CommandError> {
        let wait = match request.positional() {
            [] => None,
            [wait] => wait.as_u64(),
            _ => return Err(CommandError::usage(self.describe())),
        };
        context.request_shutdown();
        if let Some(millis) = wait {
            thread::sleep(Duration::from_millis(millis));
        }
        Ok(Value::String(STOP_REPLY.to_owned()))
    }

    fn describe(&self) -> String {
        CommandUsage::new("stop")
            .description("Stop the switchboard server.")
            .render()
    }
}

struct Uptime;

impl CommandHandler for Uptime {
    fn invoke(
        &self,
        context: &CommandContext<'_>,
        request: &JsonRpcRequest,
    ) -> Result<Value, CommandError> {
        if !request.positional().is_empty() {
            return Err(CommandError::usage(self.describe()));
        }
        Ok(json!(context.uptime().as_secs()))
    }

    fn describe(&self) -> String {
        CommandUsage::new("uptime")
            .description("Returns the total uptime of the server.")
            .result("ttt        (numeric) The number of seconds that the server has been running")
            .example(example_cli("uptime", ""))
            .example(example_rpc("uptime", ""))
            .render()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use super::*;
    use crate::clock::MonotonicClock;
    use crate::clock::test_support::ManualClock;
    use crate::dispatch::{Dispatcher, ErrorCode};
    use crate::lifecycle::RunningFlag;

    struct Fixture {
        clock: Arc<ManualClock>,
        dispatcher: Dispatcher,
    }

    #[fixture]
    fn server() -> Fixture {
        let mut table = CommandTable::new(RunningFlag::default());
        register_control_commands(&mut table);
        let clock = Arc::new(ManualClock::new());
        let dispatcher = Dispatcher::with_clock(table, Arc::clone(&clock) as Arc<dyn MonotonicClock>);
        dispatcher.warmup().finish().expect("finish warmup");
        Fixture { clock, dispatcher }
    }

    fn call(dispatcher: &Dispatcher, method: &str, params: Value) -> Result<Value, ErrorCode> {
        dispatcher
            .execute(&JsonRpcRequest::new(method, params))
            .map_err(|error| error.code)
    }

    #[rstest]
    fn registers_all_control_commands(server: Fixture) {
        assert_eq!(
            server.dispatcher.table().list_commands(),
            vec!["getrpcinfo", "help", "stop", "uptime"]
        );
    }

    #[rstest]
    fn getrpcinfo_lists_itself(server: Fixture) {
        let info = call(&server.dispatcher, "getrpcinfo", json!([])).expect("getrpcinfo");
        let active = info["active_commands"].as_array().expect("array");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["method"], json!("getrpcinfo"));
        assert_eq!(active[0]["duration"], json!(0));
    }

    #[rstest]
    #[case::getrpcinfo("getrpcinfo", json!([1]))]
    #[case::uptime("uptime", json!([1]))]
    #[case::help("help", json!(["a", "b"]))]
    #[case::stop("stop", json!([1, 2]))]
    fn extra_arguments_return_usage(server: Fixture, #[case] method: &str, #[case] params: Value) {
        let error = server
            .dispatcher
            .execute(&JsonRpcRequest::new(method, params))
            .expect_err("usage error");
        assert_eq!(error.code, ErrorCode::MiscError);
        assert!(error.message.starts_with(method));
    }

    #[rstest]
    fn uptime_counts_whole_seconds(server: Fixture) {
        server.clock.advance(Duration::from_millis(2_500));
        assert_eq!(call(&server.dispatcher, "uptime", json!([])), Ok(json!(2)));
    }

    #[rstest]
    fn help_accepts_named_command(server: Fixture) {
        let text = call(&server.dispatcher, "help", json!({"command": "uptime"})).expect("help");
        let text = text.as_str().expect("string");
        assert!(text.starts_with("uptime\n\nReturns the total uptime of the server."));
    }

    #[rstest]
    fn help_lists_control_group(server: Fixture) {
        let text = call(&server.dispatcher, "help", json!([])).expect("help");
        insta::assert_snapshot!(text.as_str().expect("string"), @r###"
        == Control ==
        getrpcinfo
        help ( "command" )
        stop
        uptime
        "###);
    }

    #[rstest]
    fn help_rejects_non_string_command(server: Fixture) {
        assert_eq!(
            call(&server.dispatcher, "help", json!([5])),
            Err(ErrorCode::TypeError)
        );
    }

    #[rstest]
    fn stop_requests_shutdown(server: Fixture) {
        assert!(!server.dispatcher.shutdown_handle().is_requested());
        let reply = call(&server.dispatcher, "stop", json!([])).expect("stop");
        assert_eq!(reply, json!(STOP_REPLY));
        assert!(server.dispatcher.shutdown_handle().is_requested());
    }

    #[rstest]
    fn stop_ignores_non_numeric_wait(server: Fixture) {
        let reply = call(&server.dispatcher, "stop", json!(["soon"])).expect("stop");
        assert_eq!(reply, json!(STOP_REPLY));
    }

    #[rstest]
    fn help_mode_returns_usage_as_error(server: Fixture) {
        let request = JsonRpcRequest::new("uptime", json!([])).in_help_mode();
        let error = server.dispatcher.execute(&request).expect_err("usage");
        assert_eq!(error.code, ErrorCode::MiscError);
        assert_eq!(error.message, server.dispatcher.table().help("uptime"));
    }
}
