pub mod env;
pub use env::apply_env_overrides;

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// Re-export existing config types
pub use crate::mq::NatsConfig;

/// Env var naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "ROBOT_SIM_CONFIG";

/// Complete simulator configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

/// Identity of the simulated robot
#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    #[serde(default = "default_robot_id")]
    pub robot_id: String,
    /// Object storage prefix for mock image URLs
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
}

fn default_robot_id() -> String {
    "talos.001".to_string()
}

fn default_image_base_url() -> String {
    "http://minio:9000/bic-robot/captures".to_string()
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            robot_id: default_robot_id(),
            image_base_url: default_image_base_url(),
        }
    }
}

/// Delay scaling for simulated work
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Applied to every base delay (0.1 = ten times faster than real)
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
    /// Floor for any single simulated delay (seconds)
    #[serde(default = "default_min_delay_seconds")]
    pub min_delay_seconds: f64,
}

fn default_speed_multiplier() -> f64 {
    0.1
}

fn default_min_delay_seconds() -> f64 {
    0.5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: default_speed_multiplier(),
            min_delay_seconds: default_min_delay_seconds(),
        }
    }
}

/// Baseline outcome when no random fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    #[default]
    Success,
    Failure,
}

impl FromStr for ScenarioKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(ScenarioKind::Success),
            "failure" => Ok(ScenarioKind::Failure),
            other => Err(ConfigError::Invalid(format!(
                "default_scenario must be 'success' or 'failure', got '{}'",
                other
            ))),
        }
    }
}

/// Fault injection settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub default_scenario: ScenarioKind,
    #[serde(default)]
    pub failure_rate: f64,
    #[serde(default)]
    pub timeout_rate: f64,
    /// Fixed RNG seed; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub interval_seconds: f64,
}

fn default_heartbeat_interval() -> f64 {
    2.0
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_heartbeat_interval(),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    Io(String, std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "failed to read config file '{}': {}", path, e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl SimConfig {
    /// Load from `ROBOT_SIM_CONFIG` (if set), apply `MOCK_*` overrides, validate
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => load_config(&path)?,
            Err(_) => SimConfig::default(),
        };
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("failure_rate", self.scenario.failure_rate),
            ("timeout_rate", self.scenario.timeout_rate),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }
        let speed_multiplier = self.timing.speed_multiplier;
        if !(speed_multiplier.is_finite() && speed_multiplier > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "speed_multiplier must be positive and finite, got {}",
                speed_multiplier
            )));
        }
        let min_delay = self.timing.min_delay_seconds;
        if !(min_delay.is_finite() && min_delay >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_delay_seconds must be finite and not negative, got {}",
                min_delay
            )));
        }
        // The heartbeat ticker panics on a zero period
        let interval = self.heartbeat.interval_seconds;
        let period = Duration::try_from_secs_f64(interval).unwrap_or(Duration::ZERO);
        if !(interval.is_finite() && period > Duration::ZERO) {
            return Err(ConfigError::Invalid(format!(
                "heartbeat interval must be a positive number of seconds, got {}",
                interval
            )));
        }
        if self.robot.robot_id.is_empty() {
            return Err(ConfigError::Invalid("robot_id must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<SimConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
    let config: SimConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.robot.robot_id, "talos.001");
        assert_eq!(config.nats.stream_name, "ROBOT_SIM");
        assert_eq!(config.timing.speed_multiplier, 0.1);
        assert_eq!(config.timing.min_delay_seconds, 0.5);
        assert_eq!(config.scenario.default_scenario, ScenarioKind::Success);
        assert_eq!(config.scenario.seed, None);
        assert_eq!(config.heartbeat.interval_seconds, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [nats]
            url = "nats://example.com:4222"
            stream_name = "TEST_STREAM"

            [robot]
            robot_id = "talos.002"

            [timing]
            speed_multiplier = 0.01

            [scenario]
            default_scenario = "failure"
            failure_rate = 0.25
            seed = 42
        "#;

        let config: SimConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.nats.url, "nats://example.com:4222");
        assert_eq!(config.robot.robot_id, "talos.002");
        assert_eq!(config.robot.image_base_url, "http://minio:9000/bic-robot/captures");
        assert_eq!(config.timing.speed_multiplier, 0.01);
        assert_eq!(config.timing.min_delay_seconds, 0.5); // Default
        assert_eq!(config.scenario.default_scenario, ScenarioKind::Failure);
        assert_eq!(config.scenario.failure_rate, 0.25);
        assert_eq!(config.scenario.seed, Some(42));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[heartbeat]\ninterval_seconds = 5.0").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.heartbeat.interval_seconds, 5.0);
        assert_eq!(config.robot.robot_id, "talos.001");
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }

    #[test]
    fn test_load_config_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing\nspeed_multiplier = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = SimConfig::default();
        config.scenario.failure_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.timing.speed_multiplier = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.timing.min_delay_seconds = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_values() {
        let mut config = SimConfig::default();
        config.timing.speed_multiplier = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.timing.min_delay_seconds = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.timing.speed_multiplier = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.heartbeat.interval_seconds = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sub_nanosecond_heartbeat() {
        let mut config = SimConfig::default();
        config.heartbeat.interval_seconds = 1e-12;
        assert!(config.validate().is_err());

        config.heartbeat.interval_seconds = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_infinity_is_rejected_by_validation() {
        let mut config = SimConfig::default();
        apply_env_overrides(&mut config, |key| {
            (key == "MOCK_BASE_DELAY_MULTIPLIER").then(|| "inf".to_string())
        });
        assert!(config.timing.speed_multiplier.is_infinite());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scenario_kind_from_str() {
        assert_eq!("FAILURE".parse::<ScenarioKind>().unwrap(), ScenarioKind::Failure);
        assert!("maybe".parse::<ScenarioKind>().is_err());
    }
}
