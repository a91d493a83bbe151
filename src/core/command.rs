use crate::core::error::FlowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: Vec<String>,
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// `command` is the configured tool command, e.g. `./acp export`.
    pub fn new(command: &str) -> Result<Self, FlowError> {
        let program = shell_words::split(command).map_err(|err| FlowError::InvalidCommand {
            command: command.to_string(),
            message: err.to_string(),
        })?;
        if program.is_empty() {
            return Err(FlowError::InvalidCommand {
                command: command.to_string(),
                message: "empty command".to_string(),
            });
        }
        Ok(Self {
            program,
            args: Vec::new(),
        })
    }

    pub fn flag(mut self, name: &str, value: impl Into<String>) -> Self {
        self.args.push(format!("--{name}"));
        self.args.push(value.into());
        self
    }

    pub fn flag_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.flag(name, value),
            None => self,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        self.program.iter().chain(self.args.iter()).cloned().collect()
    }

    /// Every token is quoted, so user-supplied values cannot inject arguments.
    pub fn to_command_line(&self) -> String {
        shell_words::join(self.to_args())
    }
}
