use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::decision_composer::{AnomalyPolicy, DecisionSettings};
use crate::errors::{ArbiterError, ArbiterResult};
use crate::text_classifier::InferenceConfig;

pub const DEFAULT_CONFIG_FILE: &str = "arbiter.toml";
pub const CONFIG_PATH_ENV: &str = "ARBITER_CONFIG";
pub const ENV_PREFIX: &str = "ARBITER_";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Longest accepted query, in characters.
    pub max_query_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_query_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleConfig {
    pub dir: PathBuf,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionConfig {
    pub approval_threshold: f64,
    #[serde(default)]
    pub anomaly_policy: AnomalyPolicy,
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            approval_threshold: 0.65,
            anomaly_policy: AnomalyPolicy::Deny,
            reference_date: None,
        }
    }
}

impl DecisionConfig {
    pub fn settings(&self) -> DecisionSettings {
        DecisionSettings {
            anomaly_policy: self.anomaly_policy,
            reference_date: self.reference_date,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArbiterConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ArbiterConfig {
    pub fn validate(&self) -> ArbiterResult<()> {
        let threshold = self.decision.approval_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ArbiterError::config(format!(
                "decision.approval_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.inference.timeout_secs == 0 {
            return Err(ArbiterError::config(
                "inference.timeout_secs must be positive",
            ));
        }
        if self.bundle.dir.as_os_str().is_empty() {
            return Err(ArbiterError::config("bundle.dir must be set"));
        }
        if self.server.max_query_chars == 0 {
            return Err(ArbiterError::config(
                "server.max_query_chars must be positive",
            ));
        }
        Ok(())
    }
}

/// Resolve the config file: explicit path, then `ARBITER_CONFIG`, then
/// `arbiter.toml` in the working directory.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(ArbiterConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Layered load: defaults, then the TOML file (if present), then
/// `ARBITER_*` environment variables with `__` as the section separator.
pub fn load_config(explicit: Option<&Path>) -> ArbiterResult<ArbiterConfig> {
    let path = config_path(explicit);
    let config: ArbiterConfig = figment(&path).extract()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ArbiterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.decision.approval_threshold, 0.65);
        assert_eq!(config.decision.anomaly_policy, AnomalyPolicy::Deny);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            port = 9090

            [decision]
            approval_threshold = 0.5
            anomaly_policy = "flag"
            reference_date = "2025-04-05"

            [inference]
            provider = "openai"
            model = "gpt-4o-mini"
            "#
        )
        .unwrap();

        let config: ArbiterConfig = figment(file.path()).extract().unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.decision.anomaly_policy, AnomalyPolicy::Flag);
        assert_eq!(
            config.decision.reference_date,
            NaiveDate::from_ymd_opt(2025, 4, 5)
        );
        assert_eq!(config.inference.model, "gpt-4o-mini");
        assert_eq!(config.bundle.dir, PathBuf::from("models"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config: ArbiterConfig = figment(Path::new("/nonexistent/arbiter.toml"))
            .extract()
            .unwrap();
        assert_eq!(config.server.max_query_chars, 2000);
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut config = ArbiterConfig::default();
        config.decision.approval_threshold = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ArbiterError::Config { .. })
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = ArbiterConfig::default();
        config.inference.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
