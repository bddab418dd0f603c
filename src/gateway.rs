/// Gateway Firewall - trust-aware command filtering
///
/// Sits between the ECUs and the actuators and decides ALLOW / SANITIZE / BLOCK
use crate::config::GatewayConfig;
use crate::types::{AnomalyVerdict, Command, GatewayDisposition, TrustScore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of one gateway decision. Every disposition carries the command
/// that continues down the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayDecision {
    pub disposition: GatewayDisposition,
    pub effective_command: Command,
    pub reason: String,
}

/// Gateway firewall
///
/// Policy, evaluated in this order:
/// 1. trust below `block_threshold` or severity at/above `block_severity` -> BLOCK
/// 2. anomalous verdict or trust below `sanitize_threshold` -> SANITIZE
/// 3. otherwise -> ALLOW
#[derive(Debug, Clone)]
pub struct Gateway {
    config: GatewayConfig,

    /// Last command allowed through for each source
    last_safe: HashMap<String, Command>,

    /// Statistics
    commands_allowed: u64,
    commands_sanitized: u64,
    commands_blocked: u64,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            last_safe: HashMap::new(),
            commands_allowed: 0,
            commands_sanitized: 0,
            commands_blocked: 0,
        }
    }

    /// Decide what happens to a command
    pub fn decide(
        &mut self,
        command: &Command,
        verdict: &AnomalyVerdict,
        trust: &TrustScore,
    ) -> GatewayDecision {
        // Rule 1: BLOCK
        if trust.value < self.config.block_threshold || verdict.severity >= self.config.block_severity {
            self.commands_blocked += 1;

            let (effective_command, held) = match self.last_safe.get(&command.source_id) {
                Some(safe) => {
                    let mut held = safe.clone();
                    held.step = command.step;
                    (held, "last known-safe command")
                }
                None => (self.safe_default(command), "safe default"),
            };

            let reason = if trust.value < self.config.block_threshold {
                format!(
                    "Trust {:.2} below block threshold {:.2}; holding {}",
                    trust.value, self.config.block_threshold, held
                )
            } else {
                format!(
                    "{} severity {:.2} at/above {:.2}; holding {}",
                    verdict.attack_type, verdict.severity, self.config.block_severity, held
                )
            };

            return GatewayDecision {
                disposition: GatewayDisposition::Block,
                effective_command,
                reason,
            };
        }

        // Rule 2: SANITIZE
        if verdict.is_anomalous || trust.value < self.config.sanitize_threshold {
            self.commands_sanitized += 1;

            let reason = if verdict.is_anomalous {
                format!("{} detected; values clamped to safe range", verdict.attack_type)
            } else {
                format!(
                    "Trust {:.2} below sanitize threshold {:.2}; values clamped",
                    trust.value, self.config.sanitize_threshold
                )
            };

            return GatewayDecision {
                disposition: GatewayDisposition::Sanitize,
                effective_command: self.sanitize(command),
                reason,
            };
        }

        // Rule 3: ALLOW
        self.commands_allowed += 1;
        self.last_safe.insert(command.source_id.clone(), command.clone());

        GatewayDecision {
            disposition: GatewayDisposition::Allow,
            effective_command: command.clone(),
            reason: "Command considered safe".to_string(),
        }
    }

    /// Clamp command fields into the configured safe range
    pub fn sanitize(&self, command: &Command) -> Command {
        let mut safe = command.clone();
        safe.acceleration = clamp_finite(command.acceleration, self.config.sanitize_accel_limit);
        safe.steering_delta = clamp_finite(command.steering_delta, self.config.sanitize_steering_limit);
        safe
    }

    fn safe_default(&self, command: &Command) -> Command {
        let mut held = command.clone();
        held.acceleration = self.config.safe_default_acceleration;
        held.steering_delta = self.config.safe_default_steering_delta;
        held
    }

    /// Last command allowed for a source
    pub fn last_safe(&self, source_id: &str) -> Option<&Command> {
        self.last_safe.get(source_id)
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            commands_allowed: self.commands_allowed,
            commands_sanitized: self.commands_sanitized,
            commands_blocked: self.commands_blocked,
        }
    }
}

fn clamp_finite(value: f64, limit: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-limit, limit)
    } else {
        0.0
    }
}

/// Gateway statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayStats {
    pub commands_allowed: u64,
    pub commands_sanitized: u64,
    pub commands_blocked: u64,
}
