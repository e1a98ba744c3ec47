//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.hotline/config.json`) and environment.
//! Every section has defaults, so an empty `{}` file is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Capability;
use crate::domain::MessageChannelField;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Slack app settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Capability grants for Slack users.
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Where the alert group directory is loaded from.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 15152).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15152
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot token (xoxb-...). Overridden by SLACK_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Verification token compared against the `token` field of every interaction payload.
    /// Overridden by SLACK_VERIFICATION_TOKEN env. Required when binding to a non-loopback address.
    pub verification_token: Option<String>,
    /// Web API base URL (default https://slack.com/api).
    pub api_base: Option<String>,
    /// Which message channel field addresses `chat.update`: "current" (default) or "legacy".
    #[serde(default)]
    pub message_channel_field: MessageChannelField,
    /// Upper bound for one step run, including its Slack calls (default 10).
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// Timeout for a single Web API request (default 5).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_step_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            verification_token: None,
            api_base: None,
            message_channel_field: MessageChannelField::default(),
            step_timeout_secs: default_step_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SlackConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Capability grants. Users without an entry in `grants` get `default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsConfig {
    #[serde(default)]
    pub default: Vec<Capability>,
    /// Slack user id -> capabilities.
    #[serde(default)]
    pub grants: HashMap<String, Vec<Capability>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryConfig {
    /// Directory snapshot file. Relative paths are resolved against the config file's parent.
    /// Omit to use `directory.json` next to the config file.
    pub path: Option<PathBuf>,
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_slack_bot_token(config: &Config) -> Option<String> {
    env_override("SLACK_BOT_TOKEN").or_else(|| trimmed(config.slack.bot_token.as_ref()))
}

/// Resolve the Slack verification token: env SLACK_VERIFICATION_TOKEN overrides config.
pub fn resolve_verification_token(config: &Config) -> Option<String> {
    env_override("SLACK_VERIFICATION_TOKEN")
        .or_else(|| trimmed(config.slack.verification_token.as_ref()))
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("HOTLINE_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".hotline").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or HOTLINE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Default directory file when no override is set: `directory.json` next to the config file.
pub fn directory_file(config_path: &Path) -> PathBuf {
    config_dir(config_path).join("directory.json")
}

/// Resolve the directory snapshot path: `config.directory.path` if set (relative paths resolved
/// against the config file's parent), otherwise [`directory_file`].
pub fn resolve_directory_path(config: &Config, config_path: &Path) -> PathBuf {
    match &config.directory.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_dir(config_path).join(p)
            }
        }
        _ => directory_file(config_path),
    }
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 15152);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn empty_object_is_a_full_default_config() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway.port, 15152);
        assert_eq!(config.slack.message_channel_field, MessageChannelField::Current);
        assert_eq!(config.slack.step_timeout(), Duration::from_secs(10));
        assert!(config.permissions.default.is_empty());
    }

    #[test]
    fn parses_slack_and_permissions_sections() {
        let config: Config = serde_json::from_str(
            r#"{
                "slack": { "botToken": " xoxb-1 ", "messageChannelField": "legacy", "stepTimeoutSecs": 0 },
                "permissions": { "default": ["chatops:read"], "grants": { "U1": ["chatops:write"] } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.slack.message_channel_field, MessageChannelField::Legacy);
        assert_eq!(config.slack.step_timeout(), Duration::from_secs(1));
        assert_eq!(trimmed(config.slack.bot_token.as_ref()).as_deref(), Some("xoxb-1"));
        assert_eq!(config.permissions.grants["U1"], vec![Capability::ChatopsWrite]);
    }

    #[test]
    fn unknown_capability_is_a_parse_error() {
        let parsed: Result<Config, _> =
            serde_json::from_str(r#"{ "permissions": { "default": ["root"] } }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn resolve_directory_path_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.hotline/config.json");
        assert_eq!(
            resolve_directory_path(&config, path),
            PathBuf::from("/home/user/.hotline/directory.json")
        );
    }

    #[test]
    fn resolve_directory_path_override_relative() {
        let mut config = Config::default();
        config.directory.path = Some(PathBuf::from("data/groups.json"));
        let path = Path::new("/home/user/.hotline/config.json");
        assert_eq!(
            resolve_directory_path(&config, path),
            PathBuf::from("/home/user/.hotline/data/groups.json")
        );
    }

    #[test]
    fn resolve_directory_path_override_absolute() {
        let mut config = Config::default();
        config.directory.path = Some(PathBuf::from("/srv/groups.json"));
        let path = Path::new("/home/user/.hotline/config.json");
        assert_eq!(
            resolve_directory_path(&config, path),
            PathBuf::from("/srv/groups.json")
        );
    }

    #[test]
    fn loopback_binds() {
        assert!(is_loopback_bind(" 127.0.0.1 "));
        assert!(is_loopback_bind("localhost"));
        assert!(!is_loopback_bind("0.0.0.0"));
    }
}
