use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    pub daemon: DaemonConfig,
    pub scheduler: SchedulerConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Overall deployment deadline when the caller does not set one.
    pub deploy_timeout_secs: u64,
    /// Grace period handed to the runtime when stopping containers.
    pub stop_timeout_secs: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between evaluator ticks.
    pub tick_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Directory the JSONL audit logs rotate in.
    pub directory: String,
    /// Seconds between integrity scans.
    pub scan_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl OrchestratorConfig {
    /// Load configuration from orchestrator.toml and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Compile-time defaults are the foundation; a key missing from
        // every file and the environment falls back to them.
        let defaults = config::Config::try_from(&OrchestratorConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        // Layer config files (overrides defaults). Locations in order:
        // 1. /etc/graphium/orchestrator.toml (production)
        // 2. config/orchestrator.toml (local development)
        // 3. crates/orchestrator/config/orchestrator.toml (workspace root)
        let config_paths = [
            "/etc/graphium/orchestrator",
            "config/orchestrator",
            "crates/orchestrator/config/orchestrator",
        ];
        for path in config_paths {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Environment overrides everything. Double underscore separates
        // nested keys: GRAPHIUM_SCHEDULER__TICK_INTERVAL_SECS.
        builder = builder.add_source(
            config::Environment::with_prefix("GRAPHIUM")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        if self.daemon.deploy_timeout_secs == 0 {
            anyhow::bail!("daemon.deploy_timeout_secs must be positive");
        }
        if self.scheduler.tick_interval_secs == 0 {
            anyhow::bail!("scheduler.tick_interval_secs must be positive");
        }
        if self.audit.enabled && self.audit.directory.is_empty() {
            anyhow::bail!("audit.directory must be set when the auditor is enabled");
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig {
                deploy_timeout_secs: 300,
                stop_timeout_secs: 10,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                tick_interval_secs: 30,
            },
            audit: AuditConfig {
                enabled: true,
                directory: "audit".to_string(),
                scan_interval_secs: 3600,
            },
            logging: LoggingConfig {
                level: "info,orchestrator=debug".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.daemon.deploy_timeout_secs, 300);
        assert_eq!(config.scheduler.tick_interval_secs, 30);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = OrchestratorConfig::default();
        config.scheduler.tick_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.daemon.deploy_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audit_directory_required_when_enabled() {
        let mut config = OrchestratorConfig::default();
        config.audit.directory.clear();
        assert!(config.validate().is_err());
        config.audit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = OrchestratorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: OrchestratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.audit.scan_interval_secs, config.audit.scan_interval_secs);
    }
}
