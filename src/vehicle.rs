/// Scalar vehicle model: speed and steering updated by simple arithmetic
use crate::config::VehicleConfig;
use crate::types::{ActuatorCommand, Command, VehicleState};

/// Kinematic update rules shared by the vehicle and the safety prediction
#[derive(Debug, Clone)]
pub struct VehicleModel {
    config: VehicleConfig,
}

impl VehicleModel {
    pub fn new(config: VehicleConfig) -> Self {
        Self { config }
    }

    /// Predicted (speed, steering angle) if `command` were applied to `state`.
    /// The steering angle is not clipped at the mechanical stop.
    pub fn predict(&self, state: &VehicleState, command: &Command) -> (f64, f64) {
        let speed = (state.speed + command.acceleration * self.config.accel_gain - self.config.drag).max(0.0);
        let steering = state.steering_angle + command.steering_delta * self.config.steering_gain;
        (speed, steering)
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }
}

/// Simulated vehicle. Owns its state exclusively.
#[derive(Debug, Clone)]
pub struct Vehicle {
    state: VehicleState,
    model: VehicleModel,
}

impl Vehicle {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            state: VehicleState::new(config.initial_speed),
            model: VehicleModel::new(config),
        }
    }

    /// Start from an explicit state
    pub fn with_state(config: VehicleConfig, state: VehicleState) -> Self {
        Self {
            state,
            model: VehicleModel::new(config),
        }
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn model(&self) -> &VehicleModel {
        &self.model
    }

    /// Apply the final command of a step
    pub fn apply(&mut self, command: &ActuatorCommand) -> VehicleState {
        let config = &self.model.config;

        if command.emergency_brake {
            // Steering is held while braking
            self.state.speed = (self.state.speed - config.emergency_decel).max(0.0);
            self.state.emergency_stop = true;
            return self.state;
        }

        self.state.speed = (self.state.speed + command.acceleration * config.accel_gain - config.drag).max(0.0);
        self.state.steering_angle = (self.state.steering_angle + command.steering_delta * config.steering_gain)
            .clamp(-config.steering_limit, config.steering_limit);
        self.state.emergency_stop = false;
        self.state
    }
}
