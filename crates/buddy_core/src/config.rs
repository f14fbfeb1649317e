use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuddyConfig {
    pub paths: PathsConfig,
    pub embedding: EmbeddingConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

impl BuddyConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: BuddyConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BUDDY_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("BUDDY_EMBED_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Ok(v) = std::env::var("BUDDY_OLLAMA_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("BUDDY_EMBED_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("BUDDY_LOG") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("BUDDY_LOG_JSON") {
            self.logging.json = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

/// Where persisted documents live. File names are relative to `data_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub consciousness_file: String,
    pub experience_file: String,
    pub narrative_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("buddy_data"),
            consciousness_file: "consciousness_state.json".to_string(),
            experience_file: "experience_memory.json".to_string(),
            narrative_file: "narrative_memory.json".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn consciousness_path(&self) -> PathBuf {
        self.data_dir.join(&self.consciousness_file)
    }

    pub fn experience_path(&self) -> PathBuf {
        self.data_dir.join(&self.experience_file)
    }

    pub fn narrative_path(&self) -> PathBuf {
        self.data_dir.join(&self.narrative_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "ollama" tries the HTTP service before the hash fallback; "hash" skips it.
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// How long to wait for the shared speech/embedding resource before falling back.
    pub contention_timeout_ms: u64,
    /// After a provider failure, skip it for this long.
    pub retry_after_secs: u64,
    /// Dimension of the hash fallback embedding.
    pub hash_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            request_timeout_secs: 10,
            contention_timeout_ms: 2_000,
            retry_after_secs: 300,
            hash_dimension: 64,
        }
    }
}

impl EmbeddingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn contention_timeout(&self) -> Duration {
        Duration::from_millis(self.contention_timeout_ms)
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }
}

/// Cadence of the consciousness substrate's background worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub tick_secs: u64,
    pub save_interval_secs: u64,
    /// Cycle length once `error_threshold` consecutive cycles have failed.
    pub backoff_secs: u64,
    pub error_threshold: u32,
    pub join_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            save_interval_secs: 300,
            backoff_secs: 300,
            error_threshold: 10,
            join_timeout_secs: 5,
        }
    }
}

impl WorkerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "buddy_memory=debug,info".
    pub level: String,
    pub json: bool,
    /// Optional directory for a daily rolling log file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_worker_cadence() {
        let cfg = BuddyConfig::default();
        assert_eq!(cfg.worker.tick(), Duration::from_secs(30));
        assert_eq!(cfg.worker.save_interval(), Duration::from_secs(300));
        assert_eq!(cfg.worker.error_threshold, 10);
        assert_eq!(cfg.embedding.contention_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.embedding.hash_dimension, 64);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: BuddyConfig = toml::from_str(
            r#"
            [worker]
            tick_secs = 5

            [paths]
            data_dir = "/var/lib/buddy"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.worker.tick_secs, 5);
        assert_eq!(cfg.worker.save_interval_secs, 300);
        assert_eq!(
            cfg.paths.consciousness_path(),
            PathBuf::from("/var/lib/buddy/consciousness_state.json")
        );
        assert_eq!(cfg.embedding.model, "nomic-embed-text");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[embedding]\nprovider = \"hash\"\nhash_dimension = 32").unwrap();
        let cfg = BuddyConfig::load(file.path()).unwrap();
        assert_eq!(cfg.embedding.hash_dimension, 32);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let cfg = BuddyConfig::load_or_default("/definitely/not/here/buddy.toml");
        assert_eq!(cfg.worker.backoff_secs, 300);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[worker\ntick_secs = ").unwrap();
        assert!(BuddyConfig::load(file.path()).is_err());
    }
}
