//! Behavioural coverage for configuration layering.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use switchboard_config::{
    Config, SocketEndpoint, default_log_filter, default_log_format, default_socket_endpoint,
};

type StepResult = Result<(), String>;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Layers staged for one load. Environment changes are undone on drop.
struct LayerWorld {
    _env_lock: MutexGuard<'static, ()>,
    dir: TempDir,
    file_lines: Vec<String>,
    args: Vec<OsString>,
    saved_env: Vec<(String, Option<OsString>)>,
    loaded: Option<Result<Config, String>>,
}

impl LayerWorld {
    fn new() -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        Self {
            _env_lock: lock,
            dir: TempDir::new().expect("temporary directory"),
            file_lines: Vec::new(),
            args: vec![OsString::from("switchboardd")],
            saved_env: Vec::new(),
            loaded: None,
        }
    }

    fn config(&self) -> Result<&Config, String> {
        match &self.loaded {
            Some(Ok(config)) => Ok(config),
            Some(Err(error)) => Err(format!("configuration failed to load: {error}")),
            None => Err(String::from("configuration was not loaded")),
        }
    }
}

impl Drop for LayerWorld {
    fn drop(&mut self) {
        for (key, previous) in self.saved_env.drain(..).rev() {
            match previous {
                Some(value) => unsafe { std::env::set_var(&key, value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

#[fixture]
fn world() -> RefCell<LayerWorld> {
    RefCell::new(LayerWorld::new())
}

#[given("a configuration file with the line {line}")]
fn file_line(world: &RefCell<LayerWorld>, line: String) -> StepResult {
    world.borrow_mut().file_lines.push(line);
    Ok(())
}

#[given("the environment variable {key} is \"{value}\"")]
fn environment_variable(world: &RefCell<LayerWorld>, key: String, value: String) -> StepResult {
    let previous = std::env::var_os(&key);
    // Edition 2024 marks environment mutation unsafe; ENV_MUTEX serialises it.
    unsafe { std::env::set_var(&key, &value) };
    world.borrow_mut().saved_env.push((key, previous));
    Ok(())
}

#[given("the command line flags {flag} {value}")]
fn command_line(world: &RefCell<LayerWorld>, flag: String, value: String) -> StepResult {
    let mut world = world.borrow_mut();
    world.args.push(OsString::from(flag));
    world.args.push(OsString::from(value));
    Ok(())
}

#[when("the configuration is loaded")]
fn load(world: &RefCell<LayerWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let mut args = world.args.clone();
    if !world.file_lines.is_empty() {
        let path = world.dir.path().join("switchboard.toml");
        let mut body = world.file_lines.join("\n");
        body.push('\n');
        fs::write(&path, body).map_err(|error| format!("write config: {error}"))?;
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }
    world.loaded = Some(Config::load_from_iter(args).map_err(|error| error.to_string()));
    Ok(())
}

#[then("the daemon socket is \"{socket}\"")]
fn daemon_socket(world: &RefCell<LayerWorld>, socket: String) -> StepResult {
    let expected: SocketEndpoint = socket
        .parse()
        .map_err(|error| format!("bad expectation {socket}: {error}"))?;
    let world = world.borrow();
    let actual = world.config()?.daemon_socket();
    if actual == &expected {
        Ok(())
    } else {
        Err(format!("expected {expected}, loaded {actual}"))
    }
}

#[then("the log filter is \"{filter}\"")]
fn log_filter(world: &RefCell<LayerWorld>, filter: String) -> StepResult {
    let world = world.borrow();
    let actual = world.config()?.log_filter();
    if actual == filter {
        Ok(())
    } else {
        Err(format!("expected filter {filter}, loaded {actual}"))
    }
}

#[then("the built-in defaults are in effect")]
fn defaults(world: &RefCell<LayerWorld>) -> StepResult {
    let world = world.borrow();
    let config = world.config()?;
    let matches = config.daemon_socket() == &default_socket_endpoint()
        && config.log_filter() == default_log_filter()
        && config.log_format() == default_log_format()
        && config.deprecated_rpc().is_empty();
    if matches {
        Ok(())
    } else {
        Err(format!("unexpected configuration {config:?}"))
    }
}

#[then("deprecated behaviour is enabled for \"{method}\" only")]
fn deprecated_only(world: &RefCell<LayerWorld>, method: String) -> StepResult {
    let world = world.borrow();
    let config = world.config()?;
    if config.deprecated_rpc() == [method.clone()] && config.is_deprecated_rpc_enabled(&method) {
        Ok(())
    } else {
        Err(format!("deprecated methods were {:?}", config.deprecated_rpc()))
    }
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command line beats environment and file"
)]
fn command_line_beats_environment_and_file(world: RefCell<LayerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Environment beats file"
)]
fn environment_beats_file(world: RefCell<LayerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Table form of the daemon socket"
)]
fn table_form_of_the_daemon_socket(world: RefCell<LayerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn built_in_defaults_apply(world: RefCell<LayerWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Deprecated methods come from the configuration file"
)]
fn deprecated_methods_from_file(world: RefCell<LayerWorld>) {
    drop(world);
}
