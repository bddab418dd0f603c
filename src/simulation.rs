/// Simulation driver
///
/// Pulls one frame per step from a [`CommandSource`], pushes it through the
/// [`Pipeline`] and forwards every record to a [`RecordSink`]. A run ends
/// after the configured number of steps, at the first attack-triggered safe
/// stop (if enabled) or when the cancel flag is raised. Cancellation is only
/// observed between steps.
use crate::command_source::CommandSource;
use crate::config::{RunConfig, SimulationConfig};
use crate::error::PipelineError;
use crate::gateway::GatewayStats;
use crate::pipeline::{Pipeline, SimulationStepRecord};
use crate::run_log::RecordSink;
use crate::types::VehicleState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    Completed,
    SafeStop { step: u64 },
    Cancelled { step: u64 },
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub steps_run: u64,
    pub records: u64,
    pub stop_reason: StopReason,
    pub final_state: VehicleState,
    pub trust: BTreeMap<String, f64>,
    pub gateway: GatewayStats,
    pub forced_stops: u64,
}

/// Forced stop while the IDS flagged the command
pub fn is_attack_safe_stop(record: &SimulationStepRecord) -> bool {
    record.forced_stop && record.verdict.is_anomalous
}

pub struct Simulation<S: CommandSource> {
    pipeline: Pipeline,
    source: S,
    run: RunConfig,
    cancel: Arc<AtomicBool>,
}

impl<S: CommandSource> Simulation<S> {
    pub fn new(config: &SimulationConfig, source: S) -> Result<Self, PipelineError> {
        Ok(Self::with_pipeline(Pipeline::new(config)?, config.run.clone(), source))
    }

    pub fn with_pipeline(pipeline: Pipeline, run: RunConfig, source: S) -> Self {
        Self {
            pipeline,
            source,
            run,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked before every step; set it to stop the run
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn run<K: RecordSink>(&mut self, sink: &mut K) -> Result<SimulationOutcome, PipelineError> {
        self.run_with(sink, |_| {})
    }

    /// Run to completion, calling `observe` for every record
    pub fn run_with<K, F>(&mut self, sink: &mut K, mut observe: F) -> Result<SimulationOutcome, PipelineError>
    where
        K: RecordSink,
        F: FnMut(&SimulationStepRecord),
    {
        let mut steps_run = 0;
        let mut records = 0;
        let mut stop_reason = StopReason::Completed;

        for step in 1..=self.run.steps {
            if self.cancel.load(Ordering::SeqCst) {
                stop_reason = StopReason::Cancelled { step };
                break;
            }

            let frame = self.source.next_frame(step);
            let step_records = self.pipeline.step(step, frame)?;
            steps_run = step;

            let mut safe_stop = false;
            for record in &step_records {
                sink.append(record)?;
                observe(record);
                records += 1;
                safe_stop |= is_attack_safe_stop(record);
            }

            if self.run.stop_on_safe_stop && safe_stop {
                stop_reason = StopReason::SafeStop { step };
                break;
            }
        }

        sink.flush()?;

        Ok(SimulationOutcome {
            steps_run,
            records,
            stop_reason,
            final_state: self.pipeline.vehicle_state(),
            trust: self.pipeline.trust_snapshot(),
            gateway: self.pipeline.gateway_stats(),
            forced_stops: self.pipeline.forced_stops(),
        })
    }
}
