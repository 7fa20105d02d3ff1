//! CLI argument definitions for the medchat terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use medchat_core::config::MedchatConfig;

/// Medchat: a terminal client for the medical assistant chat service.
#[derive(Parser, Debug)]
#[command(name = "medchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the chat service.
    #[arg(short = 'u', long = "api-url")]
    pub api_url: Option<String>,

    /// Directory holding the transcript database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Answer without document retrieval.
    #[arg(long = "no-rag")]
    pub no_rag: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MEDCHAT_CONFIG env var > ~/.medchat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MEDCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the chat service URL.
    ///
    /// Priority: --api-url flag > MEDCHAT_API_URL env var > config file value.
    pub fn resolve_api_url(&self, config_url: &str) -> String {
        if let Some(ref url) = self.api_url {
            return url.clone();
        }
        match std::env::var("MEDCHAT_API_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => config_url.to_string(),
        }
    }

    /// Apply every override to a loaded configuration.
    pub fn apply(&self, config: &mut MedchatConfig) {
        config.server.base_url = self.resolve_api_url(&config.server.base_url);
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if self.no_rag {
            config.chat.use_rag = false;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".medchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".medchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
