/// Safety Controller
///
/// Last line of defence, independent of the IDS and trust reasoning. The
/// effective command is checked against the physical envelope by predicting
/// the state it would produce. A violation forces an emergency stop even if
/// the gateway allowed the command.
///
/// Once stopped, the controller keeps braking until the vehicle is at rest and
/// the next command passes the check; only then is the latch released.
use crate::config::SafetyConfig;
use crate::types::{ActuatorCommand, Command, VehicleState};
use crate::vehicle::VehicleModel;
use serde::{Deserialize, Serialize};

/// Result of a safety check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyOutcome {
    pub final_command: ActuatorCommand,
    pub forced_stop: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SafetyController {
    config: SafetyConfig,
    model: VehicleModel,
    forced_stops: u64,
}

impl SafetyController {
    pub fn new(config: SafetyConfig, model: VehicleModel) -> Self {
        Self {
            config,
            model,
            forced_stops: 0,
        }
    }

    /// Check the effective command against the current vehicle state
    pub fn check(&mut self, effective: &Command, state: &VehicleState) -> SafetyOutcome {
        let violation = self.violation(effective, state);

        if state.emergency_stop {
            if state.is_stationary() && violation.is_none() {
                return SafetyOutcome {
                    final_command: ActuatorCommand::from_command(effective),
                    forced_stop: false,
                    reason: Some("Vehicle at rest and command plausible; emergency stop released".to_string()),
                };
            }

            self.forced_stops += 1;
            return SafetyOutcome {
                final_command: ActuatorCommand::emergency_stop(),
                forced_stop: true,
                reason: Some(
                    violation.unwrap_or_else(|| "Emergency stop latched until standstill".to_string()),
                ),
            };
        }

        match violation {
            Some(reason) => {
                self.forced_stops += 1;
                SafetyOutcome {
                    final_command: ActuatorCommand::emergency_stop(),
                    forced_stop: true,
                    reason: Some(reason),
                }
            }
            None => SafetyOutcome {
                final_command: ActuatorCommand::from_command(effective),
                forced_stop: false,
                reason: None,
            },
        }
    }

    /// Describe why a command leaves the safe envelope, if it does
    pub fn violation(&self, command: &Command, state: &VehicleState) -> Option<String> {
        if !command.is_well_formed() {
            return Some("Non-finite command reached the safety controller".to_string());
        }

        let (speed, steering) = self.model.predict(state, command);

        if speed > self.config.max_speed {
            return Some(format!(
                "Predicted speed {:.1} km/h exceeds {:.1} km/h",
                speed, self.config.max_speed
            ));
        }
        if steering.abs() > self.config.max_steering_angle {
            return Some(format!(
                "Predicted steering {:.1}° exceeds ±{:.1}°",
                steering, self.config.max_steering_angle
            ));
        }

        None
    }

    pub fn forced_stops(&self) -> u64 {
        self.forced_stops
    }
}
