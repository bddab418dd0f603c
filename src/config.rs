/// Simulation Configuration
///
/// Numeric options for every pipeline component. Loaded from JSON and
/// validated once before the first step runs; an invalid combination is
/// fatal and never corrected silently.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// IDS rule limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdsConfig {
    /// Verdict is anomalous when severity exceeds this value
    pub detection_threshold: f64,

    /// Physical limit on |acceleration| (threshold rule)
    pub max_acceleration: f64,

    /// Physical limit on |steering_delta| (threshold rule)
    pub max_steering_delta: f64,

    /// Max acceleration change between consecutive commands of a source
    pub max_accel_rate: f64,

    /// Max steering change between consecutive commands of a source
    pub max_steering_rate: f64,

    /// Steps covered by the Sybil comparison window (current step included)
    pub sybil_window_steps: u64,

    /// Sybil fires when MORE than this many identities agree
    pub sybil_source_count: usize,

    /// Two commands closer than this on every field are "identical"
    pub sybil_epsilon: f64,

    /// Minimum |declared - expected legitimacy| before the false-information
    /// rule fires
    pub false_info_margin: f64,

    /// Weight applied to the false-information mismatch
    pub false_info_weight: f64,

    /// Commands kept per source in the history window
    pub history_len: usize,
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.4,
            max_acceleration: 3.0,
            max_steering_delta: 1.5,
            max_accel_rate: 1.0,
            max_steering_rate: 1.0,
            sybil_window_steps: 2,
            sybil_source_count: 5,
            sybil_epsilon: 0.01,
            false_info_margin: 0.3,
            false_info_weight: 1.0,
            history_len: 8,
        }
    }
}

/// Trust decay / recovery parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub initial_trust: f64,
    pub decay_rate: f64,
    pub recovery_rate: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_trust: 1.0,
            decay_rate: 0.3,
            recovery_rate: 0.05,
        }
    }
}

/// Gateway firewall policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub block_threshold: f64,
    pub sanitize_threshold: f64,
    /// Verdicts at or above this severity are blocked outright
    pub block_severity: f64,
    pub sanitize_accel_limit: f64,
    pub sanitize_steering_limit: f64,
    /// Held when a source is blocked before any command was allowed
    pub safe_default_acceleration: f64,
    pub safe_default_steering_delta: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            block_threshold: 0.2,
            sanitize_threshold: 0.5,
            block_severity: 1.0,
            sanitize_accel_limit: 0.3,
            sanitize_steering_limit: 0.4,
            safe_default_acceleration: 0.0,
            safe_default_steering_delta: 0.0,
        }
    }
}

/// Physical safety envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// km/h
    pub max_speed: f64,
    /// degrees
    pub max_steering_angle: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_speed: 120.0,
            max_steering_angle: 25.0,
        }
    }
}

/// Scalar vehicle model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub initial_speed: f64,
    /// km/h gained per unit of acceleration per step
    pub accel_gain: f64,
    /// km/h lost per step while rolling
    pub drag: f64,
    /// degrees per unit of steering_delta
    pub steering_gain: f64,
    /// Mechanical steering stop in degrees
    pub steering_limit: f64,
    /// km/h shed per step under emergency braking
    pub emergency_decel: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            initial_speed: 40.0,
            accel_gain: 5.0,
            drag: 0.5,
            steering_gain: 10.0,
            steering_limit: 30.0,
            emergency_decel: 20.0,
        }
    }
}

/// Run-level options (command source and driver)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub steps: u64,
    pub attack_probability: f64,
    pub seed: u64,
    /// End the run once an attack has driven the vehicle into a forced stop
    pub stop_on_safe_stop: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            attack_probability: 0.2,
            seed: 42,
            stop_on_safe_stop: false,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub ids: IdsConfig,
    pub trust: TrustConfig,
    pub gateway: GatewayConfig,
    pub safety: SafetyConfig,
    pub vehicle: VehicleConfig,
    pub run: RunConfig,
}

impl SimulationConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every option and cross-option invariant
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ids = &self.ids;
        unit_interval("ids.detection_threshold", ids.detection_threshold)?;
        positive("ids.max_acceleration", ids.max_acceleration)?;
        positive("ids.max_steering_delta", ids.max_steering_delta)?;
        positive("ids.max_accel_rate", ids.max_accel_rate)?;
        positive("ids.max_steering_rate", ids.max_steering_rate)?;
        non_negative("ids.sybil_epsilon", ids.sybil_epsilon)?;
        unit_interval("ids.false_info_margin", ids.false_info_margin)?;
        unit_interval("ids.false_info_weight", ids.false_info_weight)?;
        if ids.sybil_window_steps == 0 {
            return Err(ConfigError::OutOfRange {
                field: "ids.sybil_window_steps",
                value: 0.0,
                expected: ">= 1",
            });
        }
        if ids.sybil_source_count == 0 {
            return Err(ConfigError::OutOfRange {
                field: "ids.sybil_source_count",
                value: 0.0,
                expected: ">= 1",
            });
        }
        if ids.history_len == 0 {
            return Err(ConfigError::OutOfRange {
                field: "ids.history_len",
                value: 0.0,
                expected: ">= 1",
            });
        }

        let trust = &self.trust;
        unit_interval("trust.initial_trust", trust.initial_trust)?;
        finite("trust.decay_rate", trust.decay_rate)?;
        if trust.decay_rate <= 0.0 || trust.decay_rate > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "trust.decay_rate",
                value: trust.decay_rate,
                expected: "(0, 1]",
            });
        }
        finite("trust.recovery_rate", trust.recovery_rate)?;
        if !(0.0..1.0).contains(&trust.recovery_rate) {
            return Err(ConfigError::OutOfRange {
                field: "trust.recovery_rate",
                value: trust.recovery_rate,
                expected: "[0, 1)",
            });
        }
        if trust.decay_rate <= trust.recovery_rate {
            return Err(ConfigError::DecayNotFasterThanRecovery {
                decay: trust.decay_rate,
                recovery: trust.recovery_rate,
            });
        }

        let gateway = &self.gateway;
        unit_interval("gateway.block_threshold", gateway.block_threshold)?;
        unit_interval("gateway.sanitize_threshold", gateway.sanitize_threshold)?;
        unit_interval("gateway.block_severity", gateway.block_severity)?;
        if gateway.block_threshold >= gateway.sanitize_threshold {
            return Err(ConfigError::InvertedThresholds {
                block: gateway.block_threshold,
                sanitize: gateway.sanitize_threshold,
            });
        }
        positive("gateway.sanitize_accel_limit", gateway.sanitize_accel_limit)?;
        positive("gateway.sanitize_steering_limit", gateway.sanitize_steering_limit)?;
        finite("gateway.safe_default_acceleration", gateway.safe_default_acceleration)?;
        finite("gateway.safe_default_steering_delta", gateway.safe_default_steering_delta)?;

        positive("safety.max_speed", self.safety.max_speed)?;
        positive("safety.max_steering_angle", self.safety.max_steering_angle)?;

        let vehicle = &self.vehicle;
        non_negative("vehicle.initial_speed", vehicle.initial_speed)?;
        positive("vehicle.accel_gain", vehicle.accel_gain)?;
        non_negative("vehicle.drag", vehicle.drag)?;
        positive("vehicle.steering_gain", vehicle.steering_gain)?;
        positive("vehicle.steering_limit", vehicle.steering_limit)?;
        positive("vehicle.emergency_decel", vehicle.emergency_decel)?;

        unit_interval("run.attack_probability", self.run.attack_probability)?;

        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "[0, 1]",
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "> 0",
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: ">= 0",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = SimulationConfig::default();
        config.gateway.block_threshold = 0.6;
        config.gateway.sanitize_threshold = 0.5;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedThresholds { .. })
        ));
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let mut config = SimulationConfig::default();
        config.gateway.block_threshold = 0.5;
        config.gateway.sanitize_threshold = 0.5;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedThresholds { .. })
        ));
    }

    #[test]
    fn test_decay_must_exceed_recovery() {
        let mut config = SimulationConfig::default();
        config.trust.decay_rate = 0.1;
        config.trust.recovery_rate = 0.1;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DecayNotFasterThanRecovery { .. })
        ));
    }

    #[test]
    fn test_out_of_range_rate_rejected() {
        let mut config = SimulationConfig::default();
        config.trust.decay_rate = 1.5;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "trust.decay_rate", .. })
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut config = SimulationConfig::default();
        config.safety.max_speed = f64::NAN;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite { field: "safety.max_speed", .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "gateway": { "block_threshold": 0.1 }, "run": { "steps": 5 } }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();

        assert_eq!(config.gateway.block_threshold, 0.1);
        assert_eq!(config.gateway.sanitize_threshold, 0.5);
        assert_eq!(config.run.steps, 5);
        assert_eq!(config.trust, TrustConfig::default());
    }

    #[test]
    fn test_invalid_json_fails_validation() {
        let json = r#"{ "gateway": { "block_threshold": 0.9 } }"#;
        assert!(SimulationConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_json_roundtrip_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sim.json");
        let config = SimulationConfig::default();
        std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();

        let loaded = SimulationConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = SimulationConfig::from_json_str(include_str!("../config/simulation.json")).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }
}
