//! Built-in command table and the grouped help listing.
//!
//! The table is filled through `&mut self` while the server is assembled and
//! shared read-only afterwards. Registration is refused once the server is
//! running.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::DISPATCH_TARGET;
use super::descriptor::{CommandDescriptor, HIDDEN_CATEGORY};
use crate::lifecycle::RunningFlag;

/// Name-keyed table of built-in commands.
#[derive(Debug)]
pub struct CommandTable {
    commands: BTreeMap<String, Arc<CommandDescriptor>>,
    running: RunningFlag,
}

impl CommandTable {
    /// Creates an empty table gated by `running`.
    #[must_use]
    pub fn new(running: RunningFlag) -> Self {
        Self {
            commands: BTreeMap::new(),
            running,
        }
    }

    /// Registers `descriptor` under `name`.
    ///
    /// Several names may share one descriptor. Returns `false`, leaving the
    /// table unchanged, when the server is running or `name` is taken.
    pub fn append_command(&mut self, name: &str, descriptor: Arc<CommandDescriptor>) -> bool {
        if self.running.is_running() {
            debug!(
                target: DISPATCH_TARGET,
                method = name,
                "refusing command registration while running"
            );
            return false;
        }
        if self.commands.contains_key(name) {
            debug!(
                target: DISPATCH_TARGET,
                method = name,
                "refusing duplicate command registration"
            );
            return false;
        }
        self.commands.insert(name.to_owned(), descriptor);
        true
    }

    /// Looks up a command by registered name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<CommandDescriptor>> {
        self.commands.get(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn list_commands(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    /// Builds help text.
    ///
    /// With an empty `filter`, lists the summary line of every visible command
    /// grouped under `== Category ==` headers. Otherwise returns the full
    /// usage of the command whose name equals `filter`. The result never ends
    /// with a newline.
    #[must_use]
    pub fn help(&self, filter: &str) -> String {
        let mut entries: Vec<(&str, &str, &Arc<CommandDescriptor>)> = self
            .commands
            .iter()
            .map(|(name, descriptor)| (descriptor.category(), name.as_str(), descriptor))
            .collect();
        entries.sort_by(|left, right| (left.0, left.1).cmp(&(right.0, right.1)));

        let mut output = String::new();
        let mut current_category: Option<&str> = None;
        let mut seen = HashSet::new();

        for (category, _, descriptor) in entries {
            let method = descriptor.name();
            if (!filter.is_empty() || category == HIDDEN_CATEGORY) && method != filter {
                continue;
            }
            if !seen.insert(Arc::as_ptr(descriptor)) {
                continue;
            }

            let usage = descriptor.handler().describe();
            if filter.is_empty() {
                let summary = usage.lines().next().unwrap_or_default();
                if current_category != Some(category) {
                    if current_category.is_some() {
                        output.push('\n');
                    }
                    current_category = Some(category);
                    output.push_str(&format!("== {} ==\n", capitalise(category)));
                }
                output.push_str(summary);
            } else {
                output.push_str(&usage);
            }
            output.push('\n');
        }

        if output.is_empty() {
            output = format!("help: unknown command: {filter}\n");
        }
        output.pop();
        output
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
