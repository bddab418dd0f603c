/// Command processing pipeline
///
/// Every command runs through a fixed sequence of stages:
///
/// ```text
/// RECEIVE_COMMAND -> IDS_EVALUATE -> TRUST_UPDATE -> GATEWAY_DECIDE
///     -> SAFETY_CHECK -> APPLY_TO_VEHICLE -> (next command)
/// ```
///
/// The sequence is enforced by [`StageMachine`]; skipping or repeating a stage
/// is an internal error and aborts the run.
use crate::config::SimulationConfig;
use crate::error::PipelineError;
use crate::gateway::{Gateway, GatewayStats};
use crate::history::CommandHistory;
use crate::ids::IdsEvaluator;
use crate::safety_controller::SafetyController;
use crate::trust_model::TrustModel;
use crate::types::{ActuatorCommand, AnomalyVerdict, Command, GatewayDisposition, TrustScore, VehicleState};
use crate::vehicle::Vehicle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    ReceiveCommand,
    IdsEvaluate,
    TrustUpdate,
    GatewayDecide,
    SafetyCheck,
    ApplyToVehicle,
}

impl Stage {
    /// All stages in processing order
    pub const SEQUENCE: [Stage; 6] = [
        Stage::ReceiveCommand,
        Stage::IdsEvaluate,
        Stage::TrustUpdate,
        Stage::GatewayDecide,
        Stage::SafetyCheck,
        Stage::ApplyToVehicle,
    ];

    /// Stage that must follow this one
    pub fn next(self) -> Stage {
        match self {
            Stage::ReceiveCommand => Stage::IdsEvaluate,
            Stage::IdsEvaluate => Stage::TrustUpdate,
            Stage::TrustUpdate => Stage::GatewayDecide,
            Stage::GatewayDecide => Stage::SafetyCheck,
            Stage::SafetyCheck => Stage::ApplyToVehicle,
            Stage::ApplyToVehicle => Stage::ReceiveCommand,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ReceiveCommand => "RECEIVE_COMMAND",
            Stage::IdsEvaluate => "IDS_EVALUATE",
            Stage::TrustUpdate => "TRUST_UPDATE",
            Stage::GatewayDecide => "GATEWAY_DECIDE",
            Stage::SafetyCheck => "SAFETY_CHECK",
            Stage::ApplyToVehicle => "APPLY_TO_VEHICLE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transition guard for the stage sequence
#[derive(Debug, Clone, Default)]
pub struct StageMachine {
    current: Option<Stage>,
    trace: Vec<Stage>,
}

impl StageMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the machine will accept next
    pub fn expected(&self) -> Stage {
        self.current.map_or(Stage::ReceiveCommand, Stage::next)
    }

    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Move to `to`, rejecting anything but the successor of the current stage
    pub fn transition(&mut self, to: Stage) -> Result<(), PipelineError> {
        let expected = self.expected();
        if to != expected {
            return Err(PipelineError::OutOfOrder {
                expected,
                attempted: to,
            });
        }

        if to == Stage::ReceiveCommand {
            self.trace.clear();
        }
        self.trace.push(to);
        self.current = Some(to);
        Ok(())
    }

    /// Stages visited since the last RECEIVE_COMMAND
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }
}

/// Everything that happened to one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStepRecord {
    pub step: u64,
    pub command: Command,
    pub verdict: AnomalyVerdict,
    /// Trust after this command's verdict was applied
    pub trust: TrustScore,
    pub disposition: GatewayDisposition,
    pub effective_command: Command,
    pub gateway_reason: String,
    pub forced_stop: bool,
    pub safety_reason: Option<String>,
    pub final_command: ActuatorCommand,
    /// Vehicle state after the final command was applied
    pub vehicle: VehicleState,
    pub stages: Vec<Stage>,
}

impl SimulationStepRecord {
    /// Injected command that the IDS flagged
    pub fn is_detected_attack(&self) -> bool {
        self.command.injected && self.verdict.is_anomalous
    }

    /// Legitimate command that the IDS flagged
    pub fn is_false_positive(&self) -> bool {
        !self.command.injected && self.verdict.is_anomalous
    }
}

/// Per-vehicle pipeline. Owns every piece of mutable run state.
#[derive(Debug, Clone)]
pub struct Pipeline {
    ids: IdsEvaluator,
    history: CommandHistory,
    trust: TrustModel,
    gateway: Gateway,
    safety: SafetyController,
    vehicle: Vehicle,
    machine: StageMachine,
}

impl Pipeline {
    /// Build a pipeline from a validated configuration
    pub fn new(config: &SimulationConfig) -> Result<Self, PipelineError> {
        let state = VehicleState::new(config.vehicle.initial_speed);
        Self::with_vehicle_state(config, state)
    }

    /// Build a pipeline whose vehicle starts in `state`
    pub fn with_vehicle_state(config: &SimulationConfig, state: VehicleState) -> Result<Self, PipelineError> {
        config.validate()?;

        let vehicle = Vehicle::with_state(config.vehicle.clone(), state);
        let safety = SafetyController::new(config.safety.clone(), vehicle.model().clone());

        Ok(Self {
            ids: IdsEvaluator::new(config.ids.clone()),
            history: CommandHistory::new(config.ids.history_len, config.ids.sybil_window_steps),
            trust: TrustModel::new(config.trust.clone()),
            gateway: Gateway::new(config.gateway.clone()),
            safety,
            vehicle,
            machine: StageMachine::new(),
        })
    }

    /// Process one simulation step. Commands of the frame are processed in
    /// arrival order, each producing one record.
    pub fn step(&mut self, step: u64, frame: Vec<Command>) -> Result<Vec<SimulationStepRecord>, PipelineError> {
        self.history.record_frame(step, &frame);

        let mut records = Vec::with_capacity(frame.len());
        for command in frame {
            records.push(self.process(step, command)?);
        }
        Ok(records)
    }

    fn process(&mut self, step: u64, command: Command) -> Result<SimulationStepRecord, PipelineError> {
        self.machine.transition(Stage::ReceiveCommand)?;

        self.machine.transition(Stage::IdsEvaluate)?;
        let prior_trust = self.trust.get(&command.source_id).value;
        let verdict = {
            let window = self.history.window(&command.source_id, prior_trust);
            self.ids.evaluate(&command, &window)
        };
        self.history.commit(&command);

        self.machine.transition(Stage::TrustUpdate)?;
        let trust = self.trust.update(&command.source_id, &verdict, step);

        self.machine.transition(Stage::GatewayDecide)?;
        let decision = self.gateway.decide(&command, &verdict, &trust);

        self.machine.transition(Stage::SafetyCheck)?;
        let outcome = self.safety.check(&decision.effective_command, &self.vehicle.state());

        self.machine.transition(Stage::ApplyToVehicle)?;
        let vehicle = self.vehicle.apply(&outcome.final_command);

        Ok(SimulationStepRecord {
            step,
            command,
            verdict,
            trust,
            disposition: decision.disposition,
            effective_command: decision.effective_command,
            gateway_reason: decision.reason,
            forced_stop: outcome.forced_stop,
            safety_reason: outcome.reason,
            final_command: outcome.final_command,
            vehicle,
            stages: self.machine.trace().to_vec(),
        })
    }

    pub fn vehicle_state(&self) -> VehicleState {
        self.vehicle.state()
    }

    pub fn trust(&self, source_id: &str) -> TrustScore {
        self.trust.get(source_id)
    }

    pub fn trust_snapshot(&self) -> BTreeMap<String, f64> {
        self.trust.snapshot()
    }

    pub fn gateway_stats(&self) -> GatewayStats {
        self.gateway.stats()
    }

    pub fn forced_stops(&self) -> u64 {
        self.safety.forced_stops()
    }
}
