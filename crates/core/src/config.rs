use std::collections::HashSet;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::message::{Argument, Message};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Raw, untyped parameters of a condition or task as written in the config.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub osc_sources: OscSources,
    #[serde(default)]
    pub app: AppConfig,
    /// Declaration order is evaluation order.
    #[serde(default)]
    pub actions: IndexMap<String, ActionConfig>,
}

impl BridgeConfig {
    /// Read, parse and validate a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BridgeConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not need the condition/task registries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let all_names = self
            .osc_sources
            .dummy_connections
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.osc_sources.http_bridges.iter().map(|c| c.name.as_str()))
            .chain(self.osc_sources.tickers.iter().map(|c| c.name.as_str()));
        for name in all_names {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "every osc source needs a name".to_string(),
                ));
            }
            if !names.insert(name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate osc source name '{}'",
                    name
                )));
            }
        }

        for dummy in self.osc_sources.dummy_connections.iter().filter(|c| c.enabled) {
            if dummy.iteration_speed_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "dummy connection '{}': iteration_speed_secs must be greater than 0",
                    dummy.name
                )));
            }
        }
        for bridge in self.osc_sources.http_bridges.iter().filter(|c| c.enabled) {
            if bridge.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "http bridge '{}': port must be set",
                    bridge.name
                )));
            }
        }
        for ticker in self.osc_sources.tickers.iter().filter(|c| c.enabled) {
            if ticker.refresh_rate_millis == 0 {
                return Err(ConfigError::Validation(format!(
                    "ticker '{}': refresh_rate_millis must be greater than 0",
                    ticker.name
                )));
            }
        }

        Ok(())
    }

    /// Print a summary of the loaded config (for startup logs).
    pub fn log_summary(&self) {
        let sources = &self.osc_sources;
        let enabled = |flags: &mut dyn Iterator<Item = bool>| flags.filter(|e| *e).count();
        tracing::info!("Config loaded:");
        tracing::info!(
            "  sources:     dummy={}, http={}, ticker={}",
            enabled(&mut sources.dummy_connections.iter().map(|c| c.enabled)),
            enabled(&mut sources.http_bridges.iter().map(|c| c.enabled)),
            enabled(&mut sources.tickers.iter().map(|c| c.enabled)),
        );
        tracing::info!(
            "  store:       persist_path={}",
            self.app.store_persist_path.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  debug:       connection={}, conditions={}, tasks={}",
            self.app.debug.debug_osc_connection,
            self.app.debug.debug_osc_conditions,
            self.app.debug.debug_tasks
        );
        tracing::info!("  actions:     {}", self.actions.len());
    }
}

// ── Sources ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OscSources {
    #[serde(default)]
    pub dummy_connections: Vec<DummyConnection>,
    #[serde(default)]
    pub http_bridges: Vec<HttpBridge>,
    #[serde(default)]
    pub tickers: Vec<Ticker>,
}

/// Replays predefined message groups, for running without real hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyConnection {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub iteration_speed_secs: u64,
    #[serde(default)]
    pub message_groups: Vec<MessageGroup>,
}

/// Messages emitted together in one dummy iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub osc_commands: Vec<OscCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscCommand {
    pub address: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

impl OscCommand {
    pub fn to_message(&self) -> Message {
        Message::new(self.address.clone(), self.arguments.clone())
    }
}

/// Accepts messages as HTTP GET requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBridge {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

/// Emits the current time periodically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub refresh_rate_millis: u64,
}

// ── App ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub debug: DebugConfig,
    /// Where the store snapshot lives. Persistence is off when unset.
    #[serde(default)]
    pub store_persist_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub debug_osc_connection: bool,
    #[serde(default)]
    pub debug_osc_conditions: bool,
    #[serde(default)]
    pub debug_tasks: bool,
}

// ── Actions ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default)]
    pub debounce_millis: u64,
    pub trigger_chain: ConditionConfig,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub children: Vec<ConditionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}
