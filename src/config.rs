use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::devices::ssh::SshConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config/netgpt.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            port: default_port(),
        }
    }
}

/// Where the chat client should authenticate. Served as-is to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    pub provider: String,
    pub server: String,
    pub realm: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// Model parameters and the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfiguration {
    pub name: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub model: String,
}

impl Default for ChatConfiguration {
    fn default() -> Self {
        Self {
            name: "NetGPT".to_string(),
            prompt: "You are NetGPT, an assistant for network engineers. Use the available \
                     functions to inspect network devices and answer concisely."
                .to_string(),
            max_tokens: 10000,
            temperature: 0.1,
            top_p: 1.0,
            model: "gpt-3.5-turbo-16k-0613".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub authentication: Option<AuthenticationConfig>,
    #[serde(default)]
    pub chat: ChatConfiguration,
    #[serde(default)]
    pub devices: SshConfig,
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Path from `CONFIG_FILE`, falling back to the default location.
    pub fn default_path() -> PathBuf {
        std::env::var("CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("invalid configuration")
    }

    /// Reads `path` and applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides settings from `lookup`, normally the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origins) = lookup("ALLOWED_ORIGINS").filter(|o| !o.trim().is_empty()) {
            self.server.allowed_origins = origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        if let Some(auth) = self.authentication.as_mut() {
            if let Some(provider) = lookup("AUTH_PROVIDER") {
                auth.provider = provider;
            }
            if let Some(server) = lookup("AUTH_SERVER") {
                auth.server = server;
            }
            if let Some(realm) = lookup("AUTH_REALM") {
                auth.realm = realm;
            }
            if let Some(client_id) = lookup("AUTH_CLIENT_ID") {
                auth.client_id = client_id;
            }
        } else if let (Some(provider), Some(server), Some(realm), Some(client_id)) = (
            lookup("AUTH_PROVIDER"),
            lookup("AUTH_SERVER"),
            lookup("AUTH_REALM"),
            lookup("AUTH_CLIENT_ID"),
        ) {
            self.authentication = Some(AuthenticationConfig {
                provider,
                server,
                realm,
                client_id,
            });
        }

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.openai_api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
server:
  allowed_origins:
    - http://localhost:3000
authentication:
  provider: keycloak
  server: https://auth.example.com
  realm: netgpt
  clientId: netgpt-ui
chat:
  name: NetGPT
  prompt: Be brief.
  max_tokens: 2000
  temperature: 0.2
  top_p: 1
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.chat.prompt, "Be brief.");
        assert_eq!(config.chat.max_tokens, 2000);
        assert_eq!(config.chat.model, ChatConfiguration::default().model);
        assert_eq!(config.devices.connect_timeout_secs, 30);
        assert_eq!(
            config.authentication.as_ref().map(|a| a.client_id.as_str()),
            Some("netgpt-ui")
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.yml")).unwrap_err();
        assert!(err.to_string().contains("absent.yml"));
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.apply_overrides(env(&[
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("AUTH_REALM", "lab"),
            ("OPENAI_API_KEY", "sk-env"),
        ]));

        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        let auth = config.authentication.unwrap();
        assert_eq!(auth.realm, "lab");
        assert_eq!(auth.provider, "keycloak");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn test_authentication_from_environment_only() {
        let mut config = Config::from_yaml("chat:\n  name: NetGPT\n").unwrap();
        assert!(config.authentication.is_none());

        config.apply_overrides(env(&[("AUTH_PROVIDER", "keycloak")]));
        assert!(config.authentication.is_none());

        config.apply_overrides(env(&[
            ("AUTH_PROVIDER", "keycloak"),
            ("AUTH_SERVER", "https://auth"),
            ("AUTH_REALM", "r"),
            ("AUTH_CLIENT_ID", "c"),
        ]));
        assert_eq!(config.authentication.unwrap().server, "https://auth");
    }
}
