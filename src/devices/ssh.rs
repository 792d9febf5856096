use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{DeviceTarget, DeviceTransport, TransportError};

/// ssh exits with 255 when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;
/// sshpass exits with 5 on a rejected password.
const SSHPASS_BAD_PASSWORD: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub ssh_binary: String,
    pub sshpass_binary: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub strict_host_key_checking: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            sshpass_binary: "sshpass".to_string(),
            port: 22,
            connect_timeout_secs: 30,
            command_timeout_secs: 60,
            strict_host_key_checking: false,
        }
    }
}

/// Runs one CLI command per connection through the system ssh client.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    config: SshConfig,
}

impl SshTransport {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn build_ssh_args(&self, target: &DeviceTarget<'_>, command: &str) -> Vec<String> {
        let host_key_policy = if self.config.strict_host_key_checking {
            "StrictHostKeyChecking=yes"
        } else {
            "StrictHostKeyChecking=no"
        };

        let mut args = vec![
            "-o".to_string(),
            host_key_policy.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-p".to_string(),
            self.config.port.to_string(),
        ];
        if !self.config.strict_host_key_checking {
            args.push("-o".to_string());
            args.push("UserKnownHostsFile=/dev/null".to_string());
        }
        if target.settings.password.is_empty() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }

        args.push(format!("{}@{}", target.settings.username, target.host));
        args.push(command.to_string());
        args
    }

    fn build_command(&self, target: &DeviceTarget<'_>, command: &str) -> Command {
        let ssh_args = self.build_ssh_args(target, command);
        let mut process = if target.settings.password.is_empty() {
            let mut process = Command::new(&self.config.ssh_binary);
            process.args(&ssh_args);
            process
        } else {
            let mut process = Command::new(&self.config.sshpass_binary);
            process
                .arg("-e")
                .arg(&self.config.ssh_binary)
                .args(&ssh_args)
                .env("SSHPASS", &target.settings.password);
            process
        };
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process
    }
}

#[async_trait]
impl DeviceTransport for SshTransport {
    async fn send_command(
        &self,
        target: &DeviceTarget<'_>,
        command: &str,
    ) -> Result<String, TransportError> {
        debug!(
            "Sending '{}' to {} ({})",
            command,
            target.host,
            target.platform.vendor_name()
        );

        let seconds = self.config.command_timeout_secs;
        let output = tokio::time::timeout(
            Duration::from_secs(seconds),
            self.build_command(target, command).output(),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            host: target.host.to_string(),
            seconds,
        })??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).to_string()),
            Some(SSH_CONNECTION_FAILURE) | Some(SSHPASS_BAD_PASSWORD) | None => {
                Err(TransportError::Connection {
                    host: target.host.to_string(),
                    reason: stderr,
                })
            }
            Some(code) => Err(TransportError::Command {
                host: target.host.to_string(),
                reason: format!("exit status {}: {}", code, stderr),
            }),
        }
    }
}
