use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::{info, warn};

use oscbridge_core::{FactStore, Parameters};
use oscbridge_rules::params::{sanitize, ParamKind, ParameterDefinition};
use oscbridge_rules::{Configured, Task, TaskError, ValidationError};

pub const KIND: &str = "run_command";

#[derive(Debug, Clone)]
struct CommandParams {
    command: String,
    arguments: Vec<String>,
    run_in_background: bool,
    directory: Option<PathBuf>,
}

impl CommandParams {
    fn display(&self) -> String {
        if self.arguments.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.arguments.join(" "))
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.arguments);
        if let Some(dir) = &self.directory {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Spawns a process, either waiting for it or leaving it in the background.
#[derive(Debug, Default)]
pub struct RunCommandTask {
    params: Configured<CommandParams>,
}

impl RunCommandTask {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(parameters: &Parameters) -> Result<CommandParams, ValidationError> {
        let param_error = |source| ValidationError::Parameter {
            path: KIND.to_string(),
            source,
        };
        let sanitized = sanitize(
            parameters,
            &[
                ParameterDefinition::required("command", &[ParamKind::String]),
                ParameterDefinition::optional("arguments", &[ParamKind::List], None),
                ParameterDefinition::optional("run_in_background", &[ParamKind::Bool], Some(json!(false))),
                ParameterDefinition::optional("directory", &[ParamKind::String], None),
            ],
        )
        .map_err(param_error)?;

        Ok(CommandParams {
            command: sanitized.string("command").map_err(param_error)?,
            arguments: sanitized.string_list("arguments").map_err(param_error)?,
            run_in_background: sanitized.bool("run_in_background").map_err(param_error)?,
            directory: sanitized
                .opt_string("directory")
                .map_err(param_error)?
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
        })
    }
}

/// Wait for `cmd` and turn a failed exit into an error.
async fn run(mut cmd: Command, cmdline: &str) -> Result<(), TaskError> {
    let status = cmd.status().await?;
    info!(task = KIND, command = %cmdline, exit_code = ?status.code(), "Command finished");
    if !status.success() {
        return Err(TaskError::Other(anyhow::anyhow!(
            "failed to execute {}: {}",
            cmdline,
            status
        )));
    }
    Ok(())
}

#[async_trait]
impl Task for RunCommandTask {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        self.params.set(Self::parse(parameters));
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.params.validate(KIND)
    }

    async fn execute(&self, _store: &FactStore) -> Result<(), TaskError> {
        let params = self.params.get()?;
        let cmdline = params.display();
        info!(task = KIND, command = %cmdline, background = params.run_in_background, "Executing task");

        let cmd = params.command();
        if params.run_in_background {
            tokio::spawn(async move {
                if let Err(e) = run(cmd, &cmdline).await {
                    warn!(task = KIND, command = %cmdline, error = %e, "Background command failed");
                }
            });
            return Ok(());
        }
        run(cmd, &cmdline).await
    }
}
