//! Layered server configuration: built-in defaults, overridden by the
//! project config file, overridden by environment variables, overridden
//! by CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use toolhost_mcp::McpServerConfig;

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_RETENTION_DAYS: u32 = 30;

/// The `[config]` project file, deserialised with `toml`. Every field has
/// a default so a minimal or absent file still produces a runnable
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub tool_dir: PathBuf,
    pub user_tool_dir: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub retention_days: u32,
    pub worker_command: String,
    pub worker_args: Vec<String>,
    pub sandbox_command: String,
    pub sandbox_args: Vec<String>,
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tool_dir: PathBuf::from("./tools"),
            user_tool_dir: None,
            data_dir: toolhost_logging::toolhost_home(),
            retention_days: DEFAULT_RETENTION_DAYS,
            worker_command: "node".to_string(),
            worker_args: vec![],
            sandbox_command: "node".to_string(),
            sandbox_args: vec![],
            mcp_servers: vec![],
        }
    }
}

impl Config {
    /// Loads the config file at `path` if it exists, falling back to
    /// defaults; then applies `TOOLHOST_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("TOOLHOST_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(dir) = std::env::var("TOOLHOST_TOOL_DIR") {
            self.tool_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("TOOLHOST_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn user_tool_dir(&self) -> PathBuf {
        self.user_tool_dir
            .clone()
            .unwrap_or_else(|| toolhost_logging::toolhost_home().join("tools"))
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.data_dir.join("runs.jsonl")
    }

    pub fn attach_addr(&self) -> String {
        "tcp://127.0.0.1:5560".to_string()
    }

    pub fn client_base_url(&self) -> String {
        format!("ws://127.0.0.1:{}/client", self.port)
    }

    pub fn client_module_url(&self) -> String {
        format!("http://127.0.0.1:{}/client.ts", self.port)
    }
}

/// The starter config written by `toolhost init`.
pub fn starter_toml() -> String {
    toml::to_string_pretty(&Config::default()).expect("default config always serialises")
}
