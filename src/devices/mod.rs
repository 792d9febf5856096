pub mod cisco_ios;
pub mod cisco_nxos;
pub mod juniper_junos;
pub mod ssh;

pub use cisco_ios::CiscoIosPlatform;
pub use cisco_nxos::CiscoNxosPlatform;
pub use juniper_junos::JuniperJunosPlatform;
pub use ssh::SshTransport;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::capabilities::{construct_and_bind, wire_schemas, FunctionSchema, Invocable, Provider};
use crate::types::NetworkSettings;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("could not connect to {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("timed out after {seconds}s talking to {host}")]
    Timeout { host: String, seconds: u64 },

    #[error("command rejected by {host}: {reason}")]
    Command { host: String, reason: String },

    #[error("transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a transport needs to reach one device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTarget<'a> {
    pub host: &'a str,
    pub platform: DeviceType,
    pub settings: &'a NetworkSettings,
}

/// CLI access to network devices. Retry and timeout policy live here,
/// never in the capability layer.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn send_command(
        &self,
        target: &DeviceTarget<'_>,
        command: &str,
    ) -> std::result::Result<String, TransportError>;
}

/// Construction input shared by every device platform.
#[derive(Clone)]
pub struct DeviceContext {
    pub settings: NetworkSettings,
    pub transport: Arc<dyn DeviceTransport>,
}

impl DeviceContext {
    pub fn new(settings: NetworkSettings, transport: Arc<dyn DeviceTransport>) -> Result<Self> {
        if settings.username.trim().is_empty() {
            return Err(anyhow!("Connection parameters not set."));
        }
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn target<'a>(&'a self, host: &'a str, platform: DeviceType) -> DeviceTarget<'a> {
        DeviceTarget {
            host,
            platform,
            settings: &self.settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "Cisco IOS")]
    CiscoIos,
    #[serde(rename = "Cisco NXOS")]
    CiscoNxos,
    #[serde(rename = "Juniper JunOS")]
    JuniperJunos,
}

impl DeviceType {
    pub fn all() -> Vec<Self> {
        vec![
            DeviceType::CiscoIos,
            DeviceType::CiscoNxos,
            DeviceType::JuniperJunos,
        ]
    }

    pub fn vendor_name(&self) -> &'static str {
        match self {
            DeviceType::CiscoIos => CiscoIosPlatform::vendor_name(),
            DeviceType::CiscoNxos => CiscoNxosPlatform::vendor_name(),
            DeviceType::JuniperJunos => JuniperJunosPlatform::vendor_name(),
        }
    }

    pub fn from_vendor_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|device_type| device_type.vendor_name() == name)
    }

    pub fn wire_schemas(&self) -> Vec<FunctionSchema> {
        match self {
            DeviceType::CiscoIos => wire_schemas::<CiscoIosPlatform>(),
            DeviceType::CiscoNxos => wire_schemas::<CiscoNxosPlatform>(),
            DeviceType::JuniperJunos => wire_schemas::<JuniperJunosPlatform>(),
        }
    }

    /// Constructs the platform for `context` and binds all of its capabilities.
    pub fn bind(&self, context: DeviceContext) -> Result<Vec<Box<dyn Invocable>>> {
        match self {
            DeviceType::CiscoIos => construct_and_bind::<CiscoIosPlatform>(context),
            DeviceType::CiscoNxos => construct_and_bind::<CiscoNxosPlatform>(context),
            DeviceType::JuniperJunos => construct_and_bind::<JuniperJunosPlatform>(context),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HostnamesArgs {
    pub hostnames: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandArgs {
    pub hostnames: Vec<String>,
    pub command: String,
}

pub(crate) fn ensure_show_command(command: &str) -> Result<()> {
    if !command.trim_start().starts_with("show") {
        return Err(anyhow!("Only show commands are supported."));
    }
    Ok(())
}
