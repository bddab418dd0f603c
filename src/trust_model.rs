/// Per-source trust model
///
/// Each source starts at the configured initial trust. Trust drops
/// proportionally to the severity of every anomalous verdict and recovers
/// asymptotically towards 1.0 on clean verdicts:
///
/// - anomalous: `value -= decay_rate * severity`
/// - clean:     `value += recovery_rate * (1 - value)`
///
/// Scores are clamped to [0, 1] and never removed during a run.
use crate::config::TrustConfig;
use crate::types::{AnomalyVerdict, TrustScore};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct TrustModel {
    config: TrustConfig,
    scores: HashMap<String, TrustScore>,
}

impl TrustModel {
    pub fn new(config: TrustConfig) -> Self {
        Self {
            config,
            scores: HashMap::new(),
        }
    }

    /// Apply a verdict to a source and return its new score
    pub fn update(&mut self, source_id: &str, verdict: &AnomalyVerdict, step: u64) -> TrustScore {
        let initial = self.config.initial_trust;
        let score = self
            .scores
            .entry(source_id.to_string())
            .or_insert_with(|| TrustScore {
                source_id: source_id.to_string(),
                value: initial,
                last_updated: step,
            });

        let next = if verdict.is_anomalous {
            score.value - self.config.decay_rate * verdict.severity
        } else {
            score.value + self.config.recovery_rate * (1.0 - score.value)
        };

        score.value = next.clamp(0.0, 1.0);
        score.last_updated = step;
        score.clone()
    }

    /// Current score; unseen sources report the initial trust
    pub fn get(&self, source_id: &str) -> TrustScore {
        self.scores.get(source_id).cloned().unwrap_or_else(|| TrustScore {
            source_id: source_id.to_string(),
            value: self.config.initial_trust,
            last_updated: 0,
        })
    }

    pub fn is_known(&self, source_id: &str) -> bool {
        self.scores.contains_key(source_id)
    }

    /// All known scores ordered by source id
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.scores
            .iter()
            .map(|(source, score)| (source.clone(), score.value))
            .collect()
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }
}

/// Upper bound on consecutive anomalous updates of severity `severity` needed
/// to push a fresh source strictly below `block_threshold`.
///
/// `⌈(initial − block) / (decay · severity)⌉ + 1`: the extra update covers
/// repeated float subtraction landing exactly on (or just above) the threshold.
///
/// Returns `None` when no decay happens (zero severity or decay rate) or when
/// the threshold cannot be undercut (`block_threshold <= 0`).
pub fn steps_to_block(config: &TrustConfig, block_threshold: f64, severity: f64) -> Option<u64> {
    let per_step = config.decay_rate * severity;
    if per_step <= 0.0 || block_threshold <= 0.0 {
        return None;
    }
    if config.initial_trust < block_threshold {
        return Some(0);
    }

    Some(((config.initial_trust - block_threshold) / per_step).ceil() as u64 + 1)
}
