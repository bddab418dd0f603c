/// Run Metrics and Batch Experiments
///
/// Runs many independent simulations (attack probability x repetitions) in
/// parallel, one blocking tokio task per run, and aggregates the per-run
/// metrics into detection and safe-stop rates.
use crate::command_source::RandomCommandSource;
use crate::config::SimulationConfig;
use crate::error::{ExperimentError, PipelineError};
use crate::pipeline::SimulationStepRecord;
use crate::run_log::MemorySink;
use crate::simulation::{Simulation, SimulationOutcome, is_attack_safe_stop};
use crate::types::GatewayDisposition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metrics of a single run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub attack_probability: f64,
    pub seed: u64,
    pub steps: u64,

    /// Injected commands (ground truth)
    pub attack_commands: u64,
    /// Injected commands flagged by the IDS
    pub detected_attacks: u64,
    /// Legitimate commands flagged by the IDS
    pub false_positives: u64,
    pub legitimate_commands: u64,

    pub allowed: u64,
    pub sanitized: u64,
    pub blocked: u64,
    pub forced_stops: u64,

    /// Run ended in (or passed through) a forced stop caused by a detected attack
    pub safe_stop_reached: bool,

    /// Detections by attack type
    pub detections_by_type: BTreeMap<String, u64>,
}

impl RunMetrics {
    /// Compute metrics from the records of a run
    pub fn from_records(
        attack_probability: f64,
        seed: u64,
        records: &[SimulationStepRecord],
        outcome: &SimulationOutcome,
    ) -> Self {
        let mut metrics = RunMetrics {
            attack_probability,
            seed,
            steps: outcome.steps_run,
            ..Default::default()
        };

        for record in records {
            if record.command.injected {
                metrics.attack_commands += 1;
            } else {
                metrics.legitimate_commands += 1;
            }
            if record.is_detected_attack() {
                metrics.detected_attacks += 1;
            }
            if record.is_false_positive() {
                metrics.false_positives += 1;
            }
            if record.verdict.is_anomalous {
                *metrics
                    .detections_by_type
                    .entry(record.verdict.attack_type.to_string())
                    .or_insert(0) += 1;
            }

            match record.disposition {
                GatewayDisposition::Allow => metrics.allowed += 1,
                GatewayDisposition::Sanitize => metrics.sanitized += 1,
                GatewayDisposition::Block => metrics.blocked += 1,
            }

            if record.forced_stop {
                metrics.forced_stops += 1;
            }
            metrics.safe_stop_reached |= is_attack_safe_stop(record);
        }

        metrics
    }
}

/// Aggregated metrics of all runs sharing one attack probability
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub attack_probability: f64,
    pub num_runs: usize,
    pub total_attacks: u64,
    pub total_detected: u64,
    pub total_false_positives: u64,
    pub total_forced_stops: u64,
    pub total_sanitized: u64,
    pub total_blocked: u64,
    pub avg_attacks_per_run: f64,
    pub avg_forced_stops_per_run: f64,
    /// detected / attacks (0 when no attack happened)
    pub detection_rate: f64,
    /// false positives / legitimate commands
    pub false_positive_rate: f64,
    /// Fraction of runs reaching an attack-triggered safe stop
    pub safe_stop_rate: f64,
}

pub fn aggregate(attack_probability: f64, runs: &[RunMetrics]) -> AggregateMetrics {
    let n = runs.len();
    if n == 0 {
        return AggregateMetrics {
            attack_probability,
            ..Default::default()
        };
    }

    let total_attacks: u64 = runs.iter().map(|m| m.attack_commands).sum();
    let total_detected: u64 = runs.iter().map(|m| m.detected_attacks).sum();
    let total_false_positives: u64 = runs.iter().map(|m| m.false_positives).sum();
    let total_legitimate: u64 = runs.iter().map(|m| m.legitimate_commands).sum();
    let total_forced_stops: u64 = runs.iter().map(|m| m.forced_stops).sum();
    let safe_stop_runs = runs.iter().filter(|m| m.safe_stop_reached).count();

    AggregateMetrics {
        attack_probability,
        num_runs: n,
        total_attacks,
        total_detected,
        total_false_positives,
        total_forced_stops,
        total_sanitized: runs.iter().map(|m| m.sanitized).sum(),
        total_blocked: runs.iter().map(|m| m.blocked).sum(),
        avg_attacks_per_run: total_attacks as f64 / n as f64,
        avg_forced_stops_per_run: total_forced_stops as f64 / n as f64,
        detection_rate: ratio(total_detected, total_attacks),
        false_positive_rate: ratio(total_false_positives, total_legitimate),
        safe_stop_rate: safe_stop_runs as f64 / n as f64,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Run one simulation without console output or log file
pub fn run_single(
    config: &SimulationConfig,
    attack_probability: f64,
    seed: u64,
) -> Result<RunMetrics, PipelineError> {
    let mut config = config.clone();
    config.run.attack_probability = attack_probability;
    config.run.seed = seed;

    let source = RandomCommandSource::new(attack_probability, Some(seed));
    let mut simulation = Simulation::new(&config, source)?;
    let mut sink = MemorySink::new();
    let outcome = simulation.run(&mut sink)?;

    Ok(RunMetrics::from_records(attack_probability, seed, sink.records(), &outcome))
}

/// Grid of experiment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    pub attack_probabilities: Vec<f64>,
    pub runs_per_setting: usize,
    pub base_seed: u64,
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        Self {
            attack_probabilities: vec![0.1, 0.3, 0.5],
            runs_per_setting: 5,
            base_seed: 42,
        }
    }
}

impl ExperimentPlan {
    /// Seed of a run; distinct for every (setting, run) pair
    pub fn seed_for(&self, setting: usize, run: usize) -> u64 {
        self.base_seed
            .wrapping_add((setting as u64).wrapping_mul(10_000))
            .wrapping_add(run as u64)
    }
}

/// Results of one attack probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingResult {
    pub aggregate: AggregateMetrics,
    pub runs: Vec<RunMetrics>,
}

/// Full experiment report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub generated_at: DateTime<Utc>,
    pub steps_per_run: u64,
    pub stop_on_safe_stop: bool,
    pub plan: ExperimentPlan,
    pub settings: Vec<SettingResult>,
}

impl ExperimentReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ExperimentError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Generate a text report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push('\n');
        report.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        report.push_str("║             CYBER-RESILIENCE EXPERIMENT REPORT               ║\n");
        report.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        report.push('\n');

        report.push_str("OVERVIEW\n");
        report.push_str("--------\n");
        report.push_str(&format!("Generated:                 {}\n", self.generated_at.to_rfc3339()));
        report.push_str(&format!("Steps per Run:             {}\n", self.steps_per_run));
        report.push_str(&format!("Runs per Setting:          {}\n", self.plan.runs_per_setting));
        report.push_str(&format!("Stop on Safe Stop:         {}\n", self.stop_on_safe_stop));
        report.push('\n');

        report.push_str("RESULTS BY ATTACK PROBABILITY\n");
        report.push_str("-----------------------------\n");
        report.push_str("  p     attacks  detected  det.rate  FP rate  forced  safe-stop\n");
        for setting in &self.settings {
            let agg = &setting.aggregate;
            report.push_str(&format!(
                "  {:<5.2} {:>7}  {:>8}  {:>7.1}%  {:>6.1}%  {:>6}  {:>8.1}%\n",
                agg.attack_probability,
                agg.total_attacks,
                agg.total_detected,
                agg.detection_rate * 100.0,
                agg.false_positive_rate * 100.0,
                agg.total_forced_stops,
                agg.safe_stop_rate * 100.0,
            ));
        }
        report.push('\n');

        report
    }
}

/// Run every setting of the plan; runs execute in parallel and results keep
/// the plan's order.
pub async fn run_experiments(
    config: &SimulationConfig,
    plan: &ExperimentPlan,
) -> Result<ExperimentReport, ExperimentError> {
    if plan.attack_probabilities.is_empty() {
        return Err(ExperimentError::EmptyPlan("attack probabilities"));
    }
    if plan.runs_per_setting == 0 {
        return Err(ExperimentError::EmptyPlan("runs"));
    }
    config.validate().map_err(PipelineError::from)?;

    let mut handles = Vec::new();
    for (setting, &probability) in plan.attack_probabilities.iter().enumerate() {
        for run in 0..plan.runs_per_setting {
            let config = config.clone();
            let seed = plan.seed_for(setting, run);
            handles.push(tokio::task::spawn_blocking(move || {
                run_single(&config, probability, seed)
            }));
        }
    }

    let mut all_runs = Vec::with_capacity(handles.len());
    for handle in handles {
        all_runs.push(handle.await??);
    }

    let settings = plan
        .attack_probabilities
        .iter()
        .zip(all_runs.chunks(plan.runs_per_setting))
        .map(|(&probability, runs)| SettingResult {
            aggregate: aggregate(probability, runs),
            runs: runs.to_vec(),
        })
        .collect();

    Ok(ExperimentReport {
        generated_at: Utc::now(),
        steps_per_run: config.run.steps,
        stop_on_safe_stop: config.run.stop_on_safe_stop,
        plan: plan.clone(),
        settings,
    })
}
