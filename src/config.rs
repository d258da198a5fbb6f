use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audit::ComplianceSettings;
use crate::definition::DEFAULT_MAX_CASCADE_DEPTH;
use crate::prerequisites::EvaluatorSettings;
use crate::transition::{ExecutorSettings, JustificationPolicy};

pub const CONFIG_FILE_STEM: &str = "kanban-engine";
pub const ENV_PREFIX: &str = "KANBAN_ENGINE";

/// Main configuration structure for the kanban engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KanbanEngineConfig {
    pub engine: EngineConfig,
    pub prerequisites: PrerequisiteConfig,
    pub audit: AuditConfig,
    pub observability: ObservabilityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Cascade bound for definitions that do not set their own
    pub default_max_cascade_depth: u32,
    /// Period of the background sweep
    pub sweep_interval_seconds: u64,
    /// Processes advanced in parallel during a sweep
    pub sweep_concurrency: usize,
    /// Role-based extension point: users must justify forced transitions
    pub require_user_justification: bool,
    /// Budget for the optional signal collaborator
    pub signal_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrerequisiteConfig {
    /// Hard cap on any external_api/custom_script timeout
    pub max_timeout_ms: u64,
    pub requests_per_second: u32,
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Optional JSONL mirror of every committed record
    pub jsonl_path: Option<String>,
    pub compliance_window_hours: u64,
    pub unusual_forced_share: f64,
    pub unusual_min_forced: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// JSON structured output instead of human-readable lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding `<kanban_id>.json|toml` definitions
    pub definitions_dir: String,
    /// JSON snapshot of all process instances (CLI only)
    pub state_file: String,
    /// How long a cached definition snapshot lives; 0 keeps it until reload
    pub definition_cache_ttl_seconds: u64,
}

impl Default for KanbanEngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                default_max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
                sweep_interval_seconds: 60,
                sweep_concurrency: 8,
                require_user_justification: false,
                signal_timeout_ms: 500,
            },
            prerequisites: PrerequisiteConfig {
                max_timeout_ms: 10_000,
                requests_per_second: 10,
                burst_capacity: 20,
            },
            audit: AuditConfig {
                jsonl_path: None,
                compliance_window_hours: 168, // one week
                unusual_forced_share: 0.5,
                unusual_min_forced: 3,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            storage: StorageConfig {
                definitions_dir: ".kanban/definitions".to_string(),
                state_file: ".kanban/processes.json".to_string(),
                definition_cache_ttl_seconds: 30,
            },
        }
    }
}

impl KanbanEngineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (kanban-engine.toml)
    /// 3. Environment variables (KANBAN_ENGINE__SECTION__KEY)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as `load`, looking for the configuration file in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let file = dir.join(format!("{CONFIG_FILE_STEM}.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            default_max_cascade_depth: self.engine.default_max_cascade_depth,
            signal_timeout: Duration::from_millis(self.engine.signal_timeout_ms),
        }
    }

    pub fn justification_policy(&self) -> JustificationPolicy {
        JustificationPolicy::new(self.engine.require_user_justification)
    }

    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            max_timeout: Duration::from_millis(self.prerequisites.max_timeout_ms),
        }
    }

    pub fn compliance_settings(&self) -> ComplianceSettings {
        ComplianceSettings {
            unusual_forced_share: self.audit.unusual_forced_share,
            unusual_min_forced: self.audit.unusual_min_forced,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.engine.sweep_interval_seconds.max(1))
    }

    pub fn definitions_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.definitions_dir)
    }

    pub fn definition_cache_ttl(&self) -> Option<Duration> {
        (self.storage.definition_cache_ttl_seconds > 0)
            .then(|| Duration::from_secs(self.storage.definition_cache_ttl_seconds))
    }

    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(&self.storage.state_file)
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<KanbanEngineConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = KanbanEngineConfig::load_env_file();
        KanbanEngineConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static KanbanEngineConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::debug!("Configuration loaded successfully");
    Ok(())
}
