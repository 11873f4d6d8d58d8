//! Shroud Configuration
//!
//! Shared configuration crate for the Shroud tools.
//!
//! Handles loading configuration from:
//! 1. SHROUD_CONFIG env var (explicit path)
//! 2. ./shroud.toml (current directory)
//! 3. ~/.shroud/shroud.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ShroudConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "shroud.toml";
const CONFIG_DIR_NAME: &str = ".shroud";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_KEY_PATH: &str = "./shroud-keys.json";
const DEFAULT_FEE: u64 = 1;
const DEFAULT_QUEUE_DEPTH: usize = 32;
const DEFAULT_VERIFIER_THREADS: usize = 0;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShroudConfig {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
}

/// Where the CLI keeps its key bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            key_path: DEFAULT_KEY_PATH.into(),
        }
    }
}

fn default_key_path() -> String {
    DEFAULT_KEY_PATH.into()
}

/// Defaults applied when building transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "default_fee")]
    pub default_fee: u64,
    #[serde(default)]
    pub default_memo: String,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_fee: DEFAULT_FEE,
            default_memo: String::new(),
        }
    }
}

fn default_fee() -> u64 {
    DEFAULT_FEE
}

/// Posting service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Pending posts buffered before callers wait
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

/// Verification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Rayon pool size for spend verification (0 = rayon default)
    #[serde(default)]
    pub threads: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_VERIFIER_THREADS,
        }
    }
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {key}={v}"),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ShroudConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHROUD_CONFIG env var
        if let Ok(path) = env::var("SHROUD_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SHROUD_CONFIG points at missing file {}", path.display());
        }

        // 2. Check ./shroud.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shroud/shroud.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        env_string("SHROUD_KEY_PATH", &mut self.wallet.key_path);

        env_parse("SHROUD_DEFAULT_FEE", &mut self.transaction.default_fee);
        env_string("SHROUD_DEFAULT_MEMO", &mut self.transaction.default_memo);

        env_parse("SHROUD_PROVER_QUEUE", &mut self.prover.queue_depth);
        env_parse("SHROUD_VERIFIER_THREADS", &mut self.verifier.threads);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.transaction.default_memo = "sent with shroud".into();
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShroudConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ShroudConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ShroudConfig) -> Result<(), ShroudConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ShroudConfig::global()`.
#[inline]
pub fn global_config() -> &'static ShroudConfig {
    ShroudConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ShroudConfig::default();
        assert_eq!(config.wallet.key_path, DEFAULT_KEY_PATH);
        assert_eq!(config.transaction.default_fee, DEFAULT_FEE);
        assert!(config.transaction.default_memo.is_empty());
        assert_eq!(config.prover.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.verifier.threads, 0);
    }

    #[test]
    fn test_generate_sample() {
        let sample = ShroudConfig::generate_sample();
        assert!(sample.contains("[wallet]"));
        assert!(sample.contains("[transaction]"));
        assert!(sample.contains("[prover]"));
        assert!(sample.contains("[verifier]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ShroudConfig::generate_sample();
        let parsed: ShroudConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.wallet.key_path, DEFAULT_KEY_PATH);
        assert_eq!(parsed.transaction.default_memo, "sent with shroud");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: ShroudConfig = toml::from_str("[prover]\nqueue_depth = 4\n").unwrap();
        assert_eq!(parsed.prover.queue_depth, 4);
        assert_eq!(parsed.transaction.default_fee, DEFAULT_FEE);
        assert_eq!(parsed.wallet, WalletConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transaction]\ndefault_fee = 7").unwrap();

        let config = ShroudConfig::load_from(file.path()).unwrap();
        // SHROUD_DEFAULT_FEE would override the file
        if env::var("SHROUD_DEFAULT_FEE").is_err() {
            assert_eq!(config.transaction.default_fee, 7);
        }
    }

    #[test]
    fn test_load_from_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transaction]\ndefault_fee = \"lots\"").unwrap();
        assert!(ShroudConfig::load_from(file.path()).is_err());
    }
}
