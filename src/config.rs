use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `vault.dir`.
pub const VAULT_DIR_ENV: &str = "NOSTR_VAULT_DIR";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VaultConfig {
    #[serde(default = "default_vault_dir")]
    pub dir: String,
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between chunks; 0 disables it.
    #[serde(default)]
    pub batch_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RenderConfig {
    /// Append the Author Of / Mentioned In / Contacts scaffold to profiles.
    #[serde(default)]
    pub profile_reference_sections: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            dir: default_vault_dir(),
            notes_dir: default_notes_dir(),
            profiles_dir: default_profiles_dir(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_vault_dir() -> String {
    "~/nostr-vault".to_string()
}

fn default_notes_dir() -> String {
    "notes".to_string()
}

fn default_profiles_dir() -> String {
    "people".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        let path_ref = Path::new(expanded_path.as_ref());
        if !path_ref.exists() {
            tracing::debug!("Config file {} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML config")
    }

    /// Apply `NOSTR_VAULT_DIR` if it is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(VAULT_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.vault.dir = dir;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be greater than 0");
        }

        if self.vault.dir.trim().is_empty() {
            anyhow::bail!("vault.dir must not be empty");
        }

        for (name, dir) in [
            ("vault.notes_dir", &self.vault.notes_dir),
            ("vault.profiles_dir", &self.vault.profiles_dir),
        ] {
            if dir.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
            if Path::new(dir).is_absolute() || dir.split(['/', '\\']).any(|part| part == "..") {
                anyhow::bail!("{} must be a relative path inside the vault: {}", name, dir);
            }
        }

        if self.vault.notes_dir == self.vault.profiles_dir {
            anyhow::bail!("vault.notes_dir and vault.profiles_dir must differ");
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Unknown log level: {}", self.logging.level);
        }

        Ok(())
    }

    pub fn expand_paths(&mut self) -> Result<()> {
        self.vault.dir = shellexpand::tilde(&self.vault.dir).to_string();
        Ok(())
    }

    pub fn vault_dir(&self) -> PathBuf {
        PathBuf::from(&self.vault.dir)
    }

    pub fn batch_delay(&self) -> Option<Duration> {
        (self.ingest.batch_delay_ms > 0).then(|| Duration::from_millis(self.ingest.batch_delay_ms))
    }
}
