use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::message::Message;

/// Credentials and platform used to reach the engineer's devices.
#[derive(Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub username: String,
    pub password: String,
    #[serde(rename = "deviceType")]
    pub device_type: String,
    #[serde(rename = "enablePassword", default)]
    pub enable_password: Option<String>,
}

impl fmt::Debug for NetworkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_type", &self.device_type)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSettings {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub enabled: bool,
}

impl PluginSettings {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginList {
    pub plugins: Vec<PluginSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub value: String,
}

/// Input to one processing cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message_history: Vec<Message>,
    pub network_settings: NetworkSettings,
    pub language_settings: LanguageSettings,
    #[serde(default)]
    pub plugin_list: Option<PluginList>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageSettingsBatch {
    pub settings: Vec<LanguageSettings>,
}
