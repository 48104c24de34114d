//! # Built-in checks.
//!
//! - [`CommandCheck`]: exit status of a program (`pg_isready`, `redis-cli ping`, ...)
//! - [`TcpCheck`]: a TCP connect to `host:port`

use std::process::Stdio;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::ProbeError;
use crate::probe::check::{Check, Health};
use crate::process::CommandLine;
use crate::services::ServiceHandle;

/// Healthy when the program exits with status 0.
///
/// The probe process is killed if the attempt is abandoned (timeout, cancellation).
#[derive(Clone, Debug)]
pub struct CommandCheck {
    line: CommandLine,
}

impl CommandCheck {
    /// Check that runs `line`.
    pub fn new(line: CommandLine) -> Self {
        Self { line }
    }
}

#[async_trait]
impl Check for CommandCheck {
    async fn check(&self, _target: &ServiceHandle) -> Result<Health, ProbeError> {
        let output = self
            .line
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Spawn {
                program: self.line.program().to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(Health::Healthy);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => format!("{}: {}", output.status, line.trim()),
            None => output.status.to_string(),
        };
        Ok(Health::unhealthy(detail))
    }
}

/// Healthy when a TCP connection to `addr` can be established.
#[derive(Clone, Debug)]
pub struct TcpCheck {
    addr: String,
}

impl TcpCheck {
    /// Check that connects to `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Check for TcpCheck {
    async fn check(&self, _target: &ServiceHandle) -> Result<Health, ProbeError> {
        match TcpStream::connect(self.addr.as_str()).await {
            Ok(_stream) => Ok(Health::Healthy),
            Err(e) => Ok(Health::unhealthy(format!("connect {}: {e}", self.addr))),
        }
    }
}
