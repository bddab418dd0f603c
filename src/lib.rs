pub mod types;
pub mod error;
pub mod config;
pub mod history;
pub mod ids;
pub mod trust_model;
pub mod gateway;
pub mod vehicle;
pub mod safety_controller;
pub mod pipeline;
pub mod run_log;
pub mod command_source;
pub mod simulation;
pub mod experiment;
pub mod display;

pub use types::{
    ActuatorCommand, AnomalyVerdict, AttackType, Command, GatewayDisposition, RuleHit, TrustScore, VehicleState,
};
pub use error::{ConfigError, ExperimentError, LogError, PipelineError};
pub use config::SimulationConfig;
pub use ids::IdsEvaluator;
pub use trust_model::{TrustModel, steps_to_block};
pub use gateway::{Gateway, GatewayDecision, GatewayStats};
pub use vehicle::{Vehicle, VehicleModel};
pub use safety_controller::{SafetyController, SafetyOutcome};
pub use pipeline::{Pipeline, SimulationStepRecord, Stage, StageMachine};
pub use run_log::{AsyncRunLogger, MemorySink, RecordSink, RunLogger, verify_run_log};
pub use command_source::{AttackKind, CommandSource, RandomCommandSource, ScriptedCommandSource};
pub use simulation::{Simulation, SimulationOutcome, StopReason};
pub use experiment::{ExperimentPlan, ExperimentReport, RunMetrics, run_experiments, run_single};
