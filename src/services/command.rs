//! # Process launcher.
//!
//! [`CommandLauncher`] spawns a local program with the service's environment
//! bindings. The child is detached from the launcher: it keeps running after the
//! handle is dropped and is never torn down by the supervisor.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;

use crate::error::StartError;
use crate::process::CommandLine;
use crate::services::handle::ServiceHandle;
use crate::services::launch::{Launch, LaunchContext};

/// Start directive that spawns a process.
#[derive(Clone, Debug)]
pub struct CommandLauncher {
    line: CommandLine,
    workdir: Option<PathBuf>,
}

impl CommandLauncher {
    /// Launcher for `line`, run in the current directory.
    pub fn new(line: CommandLine) -> Self {
        Self {
            line,
            workdir: None,
        }
    }

    /// Runs the program from `dir`.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Command line that will be spawned.
    pub fn command_line(&self) -> &CommandLine {
        &self.line
    }
}

#[async_trait]
impl Launch for CommandLauncher {
    async fn launch(&self, ctx: LaunchContext) -> Result<ServiceHandle, StartError> {
        let mut cmd = self.line.to_command();
        cmd.envs(ctx.environment())
            .stdin(Stdio::null())
            .kill_on_drop(false);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| StartError::Spawn {
            program: self.line.program().to_string(),
            reason: e.to_string(),
        })?;
        Ok(ServiceHandle::new(ctx.service()).with_pid(child.id()))
    }
}
