//! Configuration Module - User preferences from ~/.sawmill/config.toml
//!
//! Supports:
//! - Default log level
//! - Matching engine, read size and worker count
//! - Output directory, pairing strategy and signature catalog
//!
//! Command-line flags always win over values read here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::carve::{CarveOptions, Pairing};
use crate::catalog::Catalog;
use crate::engine::{EngineKind, DEFAULT_BUFFER_SIZE};

/// Sawmill Configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Scan settings
    pub scan: ScanConfig,
    /// Carve settings
    pub carve: CarveConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Matching engine
    pub engine: EngineKind,
    /// Bytes per read
    pub buffer_size: usize,
    /// Number of scan threads (0 = one per file type)
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            workers: 0,
        }
    }
}

/// Carve settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarveConfig {
    /// Default output directory
    pub output_dir: PathBuf,
    /// Header/footer pairing strategy
    pub pairing: Pairing,
    /// Signature catalog (None = built-in)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    /// Write manifest.json next to the carved files
    pub write_manifest: bool,
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("carved"),
            pairing: Pairing::default(),
            catalog: None,
            write_manifest: true,
        }
    }
}

impl Config {
    /// Load config from default path or return defaults
    pub fn load() -> Self {
        Self::load_from(&Self::default_path()).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "sawmill", "sawmill")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".sawmill")
                    .join("config.toml")
            })
    }

    /// Create default config file if it doesn't exist. Returns its path.
    pub fn ensure_exists() -> Result<PathBuf> {
        let path = Self::default_path();
        if !path.exists() {
            fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
            fs::write(&path, generate_sample_config())
                .with_context(|| format!("Failed to write config: {}", path.display()))?;
            tracing::info!(path = %path.display(), "Created default config");
        }
        Ok(path)
    }

    /// Signature catalog named by the config, or the built-in one
    pub fn catalog(&self) -> Result<Catalog> {
        match &self.carve.catalog {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("Failed to load catalog: {}", path.display())),
            None => Ok(Catalog::builtin()?),
        }
    }

    /// Carve options seeded from this config
    pub fn carve_options(&self, source: PathBuf) -> CarveOptions {
        CarveOptions {
            source,
            output_dir: self.carve.output_dir.clone(),
            engine: self.scan.engine,
            buffer_size: self.scan.buffer_size,
            file_types: None,
            workers: self.scan.workers,
            pairing: self.carve.pairing,
            dry_run: false,
            write_manifest: self.carve.write_manifest,
        }
    }
}

/// Generate a sample config file with comments
pub fn generate_sample_config() -> String {
    r#"# Sawmill Configuration
# Location: ~/.config/sawmill/config.toml (or ~/.sawmill/config.toml)

[general]
# Log level: trace, debug, info, warn, error
log_level = "info"

[scan]
# Matching engine: "commentz-walter" (all signatures of a type in one pass)
# or "boyer-moore" (one pass per signature)
engine = "commentz-walter"

# Bytes per read (1 MiB)
buffer_size = 1048576

# Number of scan threads (0 = one per file type)
workers = 0

[carve]
# Where carved files go, one subdirectory per file type
output_dir = "carved"

# Header/footer pairing: "positional" (i-th header with i-th footer)
# or "nearest-footer" (each header takes the next footer after it)
pairing = "positional"

# Signature catalog (omit to use the built-in one)
# catalog = "/etc/sawmill/signatures.toml"

# Write manifest.json (report with blake3 digests) into output_dir
write_manifest = true
"#
    .to_string()
}
