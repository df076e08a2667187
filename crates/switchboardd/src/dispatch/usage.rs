//! Usage text rendering for command help.

use switchboard_config::DEFAULT_TCP_PORT;

/// Argument line in a usage block.
#[derive(Debug, Clone)]
struct UsageArg {
    name: String,
    optional: bool,
    description: String,
}

/// Builder for the multi-line text returned by `help <command>`.
///
/// The first rendered line is the one-line summary shown in the grouped
/// command listing.
#[derive(Debug, Clone)]
pub struct CommandUsage {
    name: String,
    description: String,
    args: Vec<UsageArg>,
    result: Option<String>,
    examples: Vec<String>,
}

impl CommandUsage {
    /// Starts a usage block for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            args: Vec::new(),
            result: None,
            examples: Vec::new(),
        }
    }

    /// Sets the free-form description.
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Adds a required argument.
    #[must_use]
    pub fn arg(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.push_arg(name.into(), false, description.into())
    }

    /// Adds an optional argument.
    #[must_use]
    pub fn optional_arg(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.push_arg(name.into(), true, description.into())
    }

    /// Describes the result.
    #[must_use]
    pub fn result(mut self, text: impl Into<String>) -> Self {
        self.result = Some(text.into());
        self
    }

    /// Appends an example block, usually from [`example_cli`] or
    /// [`example_rpc`].
    #[must_use]
    pub fn example(mut self, text: impl Into<String>) -> Self {
        self.examples.push(text.into());
        self
    }

    fn push_arg(mut self, name: String, optional: bool, description: String) -> Self {
        self.args.push(UsageArg {
            name,
            optional,
            description,
        });
        self
    }

    /// Renders the usage text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.signature();
        if !self.description.is_empty() {
            text.push_str("\n\n");
            text.push_str(self.description.trim_end());
            text.push('\n');
        }
        if !self.args.is_empty() {
            text.push_str("\nArguments:\n");
            for (index, arg) in self.args.iter().enumerate() {
                let requirement = if arg.optional { "optional" } else { "required" };
                text.push_str(&format!(
                    "{}. {} ({requirement}) {}\n",
                    index + 1,
                    arg.name,
                    arg.description
                ));
            }
        }
        if let Some(result) = &self.result {
            text.push_str("\nResult:\n");
            text.push_str(result.trim_end());
            text.push('\n');
        }
        if !self.examples.is_empty() {
            text.push_str("\nExamples:\n");
            for example in &self.examples {
                text.push_str(example);
            }
        }
        text
    }

    fn signature(&self) -> String {
        let mut line = self.name.clone();
        for arg in &self.args {
            if arg.optional {
                line.push_str(&format!(" ( \"{}\" )", arg.name));
            } else {
                line.push_str(&format!(" \"{}\"", arg.name));
            }
        }
        line
    }
}

/// Shell example invoking `method` through the command-line client.
#[must_use]
pub fn example_cli(method: &str, args: &str) -> String {
    if args.is_empty() {
        format!("> switchboard-cli {method}\n")
    } else {
        format!("> switchboard-cli {method} {args}\n")
    }
}

/// Shell example sending a raw request line to the daemon socket.
#[must_use]
pub fn example_rpc(method: &str, args: &str) -> String {
    format!(
        "> echo '{{\"id\": \"example\", \"method\": \"{method}\", \"params\": [{args}]}}' \
         | nc 127.0.0.1 {DEFAULT_TCP_PORT}\n"
    )
}
