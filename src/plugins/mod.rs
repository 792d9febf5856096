pub mod pings;

pub use pings::{PingReply, Pinger, PingsPlugin, SystemPinger};

use anyhow::Result;
use log::warn;
use std::sync::Arc;

use crate::capabilities::{construct_and_bind, wire_schemas, FunctionSchema, Invocable, Provider};
use crate::types::{PluginList, PluginSettings};

/// Process-wide collaborators handed to every plugin instance.
#[derive(Clone)]
pub struct PluginServices {
    pub pinger: Arc<dyn Pinger>,
}

impl Default for PluginServices {
    fn default() -> Self {
        Self {
            pinger: Arc::new(SystemPinger::default()),
        }
    }
}

/// Construction input for a plugin: its settings plus shared services.
#[derive(Clone)]
pub struct PluginContext {
    pub settings: PluginSettings,
    pub services: PluginServices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Pings,
}

impl PluginKind {
    pub fn all() -> Vec<Self> {
        vec![PluginKind::Pings]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PluginKind::Pings => PingsPlugin::vendor_name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.name() == name)
    }

    pub fn default_settings(&self) -> PluginSettings {
        match self {
            PluginKind::Pings => pings::default_settings(),
        }
    }

    pub fn wire_schemas(&self) -> Vec<FunctionSchema> {
        match self {
            PluginKind::Pings => wire_schemas::<PingsPlugin>(),
        }
    }

    pub fn bind(&self, context: PluginContext) -> Result<Vec<Box<dyn Invocable>>> {
        match self {
            PluginKind::Pings => construct_and_bind::<PingsPlugin>(context),
        }
    }
}

/// Default settings of every registered plugin.
pub fn default_plugins() -> Vec<PluginSettings> {
    PluginKind::all()
        .iter()
        .map(PluginKind::default_settings)
        .collect()
}

/// Plugins to offer for one request.
///
/// Plugins the request enables come first with the request's settings;
/// default-enabled plugins not named there follow with their defaults.
pub fn select_plugins(requested: Option<&PluginList>) -> Vec<(PluginKind, PluginSettings)> {
    let mut selected: Vec<(PluginKind, PluginSettings)> = Vec::new();

    for settings in requested.map(|list| list.plugins.as_slice()).unwrap_or_default() {
        if !settings.enabled {
            continue;
        }
        match PluginKind::from_name(&settings.name) {
            Some(kind) if selected.iter().any(|(k, _)| *k == kind) => {
                warn!("Plugin {} listed twice, keeping the first entry", settings.name);
            }
            Some(kind) => selected.push((kind, settings.clone())),
            None => warn!("Ignoring unknown plugin {}", settings.name),
        }
    }

    for kind in PluginKind::all() {
        let defaults = kind.default_settings();
        if defaults.enabled && !selected.iter().any(|(k, _)| *k == kind) {
            selected.push((kind, defaults));
        }
    }

    selected
}
