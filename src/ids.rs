/// Rule-based Intrusion Detection System (IDS)
///
/// Every rule is an independent pure function that inspects one command (and
/// the history window) and returns an optional partial verdict:
/// - Threshold rule: physical limit exceeded -> TAMPERING
/// - Rate-of-change rule: jump from the previous command of the source -> RATE_ANOMALY
/// - Sybil rule: too many identities sending the same command -> SYBIL
/// - False-information rule: legitimacy claim contradicts what the source's
///   trust and the command's own profile lead us to expect -> FALSE_INFO
/// - Identity rule: command without an origin -> UNKNOWN
///
/// Aggregation is max-severity: the strongest hit sets the severity and the
/// attack type, equal scores are resolved by `AttackType::tie_break_rank`.
/// A verdict is anomalous iff its severity exceeds the detection threshold.
use crate::config::IdsConfig;
use crate::history::HistoryWindow;
use crate::types::{AnomalyVerdict, AttackType, Command, RuleHit};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

/// Score given to a command without a source identity
const UNKNOWN_SOURCE_SCORE: f64 = 0.75;

/// Score for a value exceeding `limit`: 0.5 at the limit, 1.0 at twice the limit
fn limit_score(value: f64, limit: f64) -> f64 {
    let excess = (value - limit) / limit;
    0.5 + 0.5 * excess.clamp(0.0, 1.0)
}

/// Threshold rule
pub fn threshold_rule(config: &IdsConfig, command: &Command) -> Option<RuleHit> {
    let accel = command.acceleration.abs();
    let steer = command.steering_delta.abs();

    let accel_hit = (accel > config.max_acceleration).then(|| RuleHit {
        attack_type: AttackType::Tampering,
        score: limit_score(accel, config.max_acceleration),
        detail: format!(
            "Acceleration {:.2} exceeds physical limit {:.2}",
            command.acceleration, config.max_acceleration
        ),
    });
    let steer_hit = (steer > config.max_steering_delta).then(|| RuleHit {
        attack_type: AttackType::Tampering,
        score: limit_score(steer, config.max_steering_delta),
        detail: format!(
            "Steering delta {:.2} exceeds physical limit {:.2}",
            command.steering_delta, config.max_steering_delta
        ),
    });

    strongest(accel_hit, steer_hit)
}

/// Rate-of-change rule. A source without (well-formed) history is compared
/// to a zero command.
pub fn rate_of_change_rule(
    config: &IdsConfig,
    command: &Command,
    previous: Option<&Command>,
) -> Option<RuleHit> {
    let (prev_accel, prev_steer) = previous
        .filter(|prev| prev.is_well_formed())
        .map(|prev| (prev.acceleration, prev.steering_delta))
        .unwrap_or((0.0, 0.0));

    let accel_delta = (command.acceleration - prev_accel).abs();
    let steer_delta = (command.steering_delta - prev_steer).abs();

    let accel_hit = (accel_delta > config.max_accel_rate).then(|| RuleHit {
        attack_type: AttackType::RateAnomaly,
        score: limit_score(accel_delta, config.max_accel_rate),
        detail: format!(
            "Acceleration jumped by {:.2} (limit {:.2}/step)",
            accel_delta, config.max_accel_rate
        ),
    });
    let steer_hit = (steer_delta > config.max_steering_rate).then(|| RuleHit {
        attack_type: AttackType::RateAnomaly,
        score: limit_score(steer_delta, config.max_steering_rate),
        detail: format!(
            "Steering jumped by {:.2} (limit {:.2}/step)",
            steer_delta, config.max_steering_rate
        ),
    });

    strongest(accel_hit, steer_hit)
}

/// Sybil rule
///
/// `recent` holds every command of the last `sybil_window_steps` steps,
/// current frame included. A flood spread over the window is therefore
/// flagged on the step that pushes the identity count over the limit; the
/// commands of earlier steps were judged (and logged) before the flood was
/// visible and keep their verdict.
pub fn sybil_rule(config: &IdsConfig, command: &Command, recent: &VecDeque<Command>) -> Option<RuleHit> {
    let mut identities: HashSet<&str> = HashSet::new();
    identities.insert(command.source_id.as_str());

    for other in recent {
        let same_accel = (other.acceleration - command.acceleration).abs() <= config.sybil_epsilon;
        let same_steer = (other.steering_delta - command.steering_delta).abs() <= config.sybil_epsilon;
        if same_accel && same_steer {
            identities.insert(other.source_id.as_str());
        }
    }

    let count = identities.len();
    if count <= config.sybil_source_count {
        return None;
    }

    let threshold = config.sybil_source_count as f64;
    let excess = (count as f64 - threshold) / threshold;
    Some(RuleHit {
        attack_type: AttackType::Sybil,
        score: 0.5 + 0.5 * excess.clamp(0.0, 1.0),
        detail: format!(
            "{} identities sent near-identical commands within {} steps (limit {})",
            count, config.sybil_window_steps, config.sybil_source_count
        ),
    })
}

/// How far a command reaches towards the physical envelope, in [0, 1]
fn profile_deviation(config: &IdsConfig, command: &Command) -> f64 {
    let accel = command.acceleration.abs() / config.max_acceleration;
    let steer = command.steering_delta.abs() / config.max_steering_delta;
    accel.max(steer).clamp(0.0, 1.0)
}

/// False-information rule
///
/// Expected legitimacy is `1 - deviation * (1 - trust)`: a trusted source is
/// expected to be legitimate whatever it sends, a distrusted one only while
/// its command stays close to the nominal profile. A distrusted source sending
/// nominal commands is therefore never flagged, so its trust can recover.
pub fn false_info_rule(config: &IdsConfig, command: &Command, source_trust: f64) -> Option<RuleHit> {
    let deviation = profile_deviation(config, command);
    let expected = 1.0 - deviation * (1.0 - source_trust.clamp(0.0, 1.0));
    let declared = if command.declared_legitimate { 1.0 } else { 0.0 };
    let mismatch = (declared - expected).abs();

    if mismatch <= config.false_info_margin {
        return None;
    }

    Some(RuleHit {
        attack_type: AttackType::FalseInfo,
        score: (mismatch * config.false_info_weight).clamp(0.0, 1.0),
        detail: format!(
            "Declared {} but expected legitimacy is {:.2} (trust {:.2}, profile deviation {:.2})",
            if command.declared_legitimate { "legitimate" } else { "illegitimate" },
            expected,
            source_trust,
            deviation
        ),
    })
}

/// Identity rule
pub fn identity_rule(command: &Command) -> Option<RuleHit> {
    command.source_id.trim().is_empty().then(|| RuleHit {
        attack_type: AttackType::Unknown,
        score: UNKNOWN_SOURCE_SCORE,
        detail: "Command carries no source identity".to_string(),
    })
}

fn compare_hits(a: &RuleHit, b: &RuleHit) -> Ordering {
    a.score
        .partial_cmp(&b.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.attack_type.tie_break_rank().cmp(&b.attack_type.tie_break_rank()))
}

fn strongest(a: Option<RuleHit>, b: Option<RuleHit>) -> Option<RuleHit> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if compare_hits(&a, &b) == Ordering::Less { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Stateless rule evaluator
#[derive(Debug, Clone)]
pub struct IdsEvaluator {
    config: IdsConfig,
}

impl IdsEvaluator {
    pub fn new(config: IdsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdsConfig {
        &self.config
    }

    /// Evaluate one command against its history window
    pub fn evaluate(&self, command: &Command, window: &HistoryWindow<'_>) -> AnomalyVerdict {
        // Malformed input is tampering at full severity, never a fault
        if !command.is_well_formed() {
            return AnomalyVerdict {
                is_anomalous: true,
                attack_type: AttackType::Tampering,
                severity: 1.0,
                hits: vec![RuleHit {
                    attack_type: AttackType::Tampering,
                    score: 1.0,
                    detail: format!(
                        "Malformed command (acceleration={}, steering_delta={})",
                        command.acceleration, command.steering_delta
                    ),
                }],
            };
        }

        let mut hits: Vec<RuleHit> = [
            threshold_rule(&self.config, command),
            rate_of_change_rule(&self.config, command, window.previous()),
            sybil_rule(&self.config, command, window.recent),
            false_info_rule(&self.config, command, window.source_trust),
            identity_rule(command),
        ]
        .into_iter()
        .flatten()
        .collect();

        hits.sort_by(|a, b| compare_hits(b, a));

        let Some(top) = hits.first() else {
            return AnomalyVerdict::clean();
        };

        let severity = top.score.clamp(0.0, 1.0);
        let is_anomalous = severity > self.config.detection_threshold;

        AnomalyVerdict {
            is_anomalous,
            attack_type: if is_anomalous { top.attack_type } else { AttackType::None },
            severity,
            hits,
        }
    }
}
