use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical ECU identities used by the command sources
pub mod ecu_ids {
    /// Nominal autonomous driving controller
    pub const CONTROL_ECU: &str = "CONTROL_ECU";

    /// Rogue ECU injecting traffic under its own identity
    pub const ATTACKER_ECU: &str = "ATTACKER_ECU";

    /// Prefix for the spoofed identities of a Sybil flood
    pub const SYBIL_PREFIX: &str = "SYBIL_ECU";
}

/// Control command emitted by an ECU for one simulation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Originating ECU (real or spoofed)
    pub source_id: String,

    /// Simulation step the command was emitted in
    pub step: u64,

    /// Requested longitudinal acceleration (negative = braking)
    pub acceleration: f64,

    /// Requested change of steering angle
    pub steering_delta: f64,

    /// Legitimacy claimed by the sender
    pub declared_legitimate: bool,

    /// Ground truth: command was injected by an attacker.
    /// Only read by run metrics, never by the pipeline.
    #[serde(default)]
    pub injected: bool,
}

impl Command {
    pub fn new(source_id: impl Into<String>, step: u64, acceleration: f64, steering_delta: f64) -> Self {
        Self {
            source_id: source_id.into(),
            step,
            acceleration,
            steering_delta,
            declared_legitimate: true,
            injected: false,
        }
    }

    /// Zero command that keeps the current speed request and steering
    pub fn hold(source_id: impl Into<String>, step: u64) -> Self {
        Self::new(source_id, step, 0.0, 0.0)
    }

    /// Mark the command as attacker-injected (ground truth)
    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }

    /// Override the declared legitimacy flag
    pub fn declaring(mut self, legitimate: bool) -> Self {
        self.declared_legitimate = legitimate;
        self
    }

    /// All numeric fields are finite
    pub fn is_well_formed(&self) -> bool {
        self.acceleration.is_finite() && self.steering_delta.is_finite()
    }
}

/// Command handed to the vehicle after the safety check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub acceleration: f64,
    pub steering_delta: f64,
    /// Emergency brake request; steering is held while set
    pub emergency_brake: bool,
}

impl ActuatorCommand {
    pub fn from_command(command: &Command) -> Self {
        Self {
            acceleration: command.acceleration,
            steering_delta: command.steering_delta,
            emergency_brake: false,
        }
    }

    pub fn emergency_stop() -> Self {
        Self {
            acceleration: 0.0,
            steering_delta: 0.0,
            emergency_brake: true,
        }
    }
}

/// Attack classification produced by the IDS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackType {
    None,
    /// Physically implausible or malformed values
    Tampering,
    /// Many identities reporting the same command
    Sybil,
    /// Legitimacy claim contradicts the source's trust
    FalseInfo,
    /// Command jumps too far from the previous one
    RateAnomaly,
    /// Origin cannot be identified
    Unknown,
}

impl AttackType {
    /// Tie-break rank when two rules report the same severity (higher wins)
    pub fn tie_break_rank(self) -> u8 {
        match self {
            AttackType::Tampering => 5,
            AttackType::RateAnomaly => 4,
            AttackType::Sybil => 3,
            AttackType::FalseInfo => 2,
            AttackType::Unknown => 1,
            AttackType::None => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::None => "NONE",
            AttackType::Tampering => "TAMPERING",
            AttackType::Sybil => "SYBIL",
            AttackType::FalseInfo => "FALSE_INFO",
            AttackType::RateAnomaly => "RATE_ANOMALY",
            AttackType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Partial verdict of a single IDS rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    pub attack_type: AttackType,
    /// Normalized rule score in [0, 1]
    pub score: f64,
    pub detail: String,
}

/// IDS verdict for one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub is_anomalous: bool,
    pub attack_type: AttackType,
    pub severity: f64,
    /// Every rule that fired, strongest first
    pub hits: Vec<RuleHit>,
}

impl AnomalyVerdict {
    pub fn clean() -> Self {
        Self {
            is_anomalous: false,
            attack_type: AttackType::None,
            severity: 0.0,
            hits: Vec::new(),
        }
    }

    /// Human-readable reason of the strongest hit
    pub fn reason(&self) -> Option<&str> {
        self.hits.first().map(|hit| hit.detail.as_str())
    }
}

/// Confidence that a source's commands are legitimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub source_id: String,
    /// Always within [0, 1]
    pub value: f64,
    pub last_updated: u64,
}

/// Gateway firewall decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayDisposition {
    /// Forward unchanged
    Allow,
    /// Forward a clamped copy
    Sanitize,
    /// Drop and hold the last known-safe command
    Block,
}

impl GatewayDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayDisposition::Allow => "ALLOW",
            GatewayDisposition::Sanitize => "SANITIZE",
            GatewayDisposition::Block => "BLOCK",
        }
    }
}

impl fmt::Display for GatewayDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scalar vehicle state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleState {
    /// Speed in km/h (never negative)
    pub speed: f64,
    /// Steering angle in degrees
    pub steering_angle: f64,
    pub emergency_stop: bool,
}

impl VehicleState {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            steering_angle: 0.0,
            emergency_stop: false,
        }
    }

    pub fn is_stationary(&self) -> bool {
        self.speed <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_command() {
        assert!(Command::new("ECU", 1, 0.1, -0.1).is_well_formed());
        assert!(!Command::new("ECU", 1, f64::NAN, 0.0).is_well_formed());
        assert!(!Command::new("ECU", 1, 0.0, f64::INFINITY).is_well_formed());
    }

    #[test]
    fn test_attack_type_serializes_screaming_case() {
        let json = serde_json::to_string(&AttackType::RateAnomaly).unwrap();
        assert_eq!(json, "\"RATE_ANOMALY\"");
        let json = serde_json::to_string(&GatewayDisposition::Sanitize).unwrap();
        assert_eq!(json, "\"SANITIZE\"");
    }

    #[test]
    fn test_tie_break_rank_is_total() {
        let ranks: std::collections::HashSet<u8> = [
            AttackType::None,
            AttackType::Tampering,
            AttackType::Sybil,
            AttackType::FalseInfo,
            AttackType::RateAnomaly,
            AttackType::Unknown,
        ]
        .iter()
        .map(|t| t.tie_break_rank())
        .collect();
        assert_eq!(ranks.len(), 6);
    }
}
