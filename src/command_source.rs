/// Command sources feeding the pipeline
///
/// - [`RandomCommandSource`]: seeded control-ECU traffic with attack frames
///   mixed in at a configurable probability
/// - [`ScriptedCommandSource`]: replays a fixed list of frames
use crate::types::{Command, ecu_ids};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Number of spoofed identities used by a Sybil flood
pub const SYBIL_FLOOD_SIZE: usize = 6;

/// Produces the frame of commands for each simulation step
pub trait CommandSource {
    fn next_frame(&mut self, step: u64) -> Vec<Command>;
}

/// Attack scenarios the random source can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackKind {
    /// Implausible throttle request from the attacker ECU
    ThrottleSpike,
    /// Violent steering request spoofing the control ECU
    SteeringJerk,
    /// Brake released into full throttle (and back)
    BrakeRelease,
    /// Identical command from many spoofed identities
    SybilFlood,
    /// Near-limit throttle from the attacker ECU, claimed legitimate
    FalseLabel,
    /// Non-finite command fields
    Malformed,
}

impl AttackKind {
    pub const ALL: [AttackKind; 6] = [
        AttackKind::ThrottleSpike,
        AttackKind::SteeringJerk,
        AttackKind::BrakeRelease,
        AttackKind::SybilFlood,
        AttackKind::FalseLabel,
        AttackKind::Malformed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::ThrottleSpike => "THROTTLE_SPIKE",
            AttackKind::SteeringJerk => "STEERING_JERK",
            AttackKind::BrakeRelease => "BRAKE_RELEASE",
            AttackKind::SybilFlood => "SYBIL_FLOOD",
            AttackKind::FalseLabel => "FALSE_LABEL",
            AttackKind::Malformed => "MALFORMED",
        }
    }
}

impl fmt::Display for AttackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seeded random traffic generator
#[derive(Debug, Clone)]
pub struct RandomCommandSource {
    rng: StdRng,
    attack_probability: f64,
    /// Last acceleration sent by a brake-release attack
    last_flip: f64,
    launched: BTreeMap<AttackKind, u64>,
}

impl RandomCommandSource {
    pub fn new(attack_probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let attack_probability = if attack_probability.is_finite() {
            attack_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            rng,
            attack_probability,
            last_flip: 0.0,
            launched: BTreeMap::new(),
        }
    }

    /// Nominal control-ECU command
    pub fn normal_command(&mut self, step: u64) -> Command {
        let acceleration = self.rng.gen_range(-0.3..=0.2);
        let steering_delta = self.rng.gen_range(-0.2..=0.2);
        Command::new(ecu_ids::CONTROL_ECU, step, acceleration, steering_delta)
    }

    /// Commands of one attack; every command is marked as injected
    pub fn attack_commands(&mut self, kind: AttackKind, step: u64) -> Vec<Command> {
        *self.launched.entry(kind).or_insert(0) += 1;

        match kind {
            AttackKind::ThrottleSpike => {
                let acceleration = self.rng.gen_range(3.5..=6.0);
                vec![Command::new(ecu_ids::ATTACKER_ECU, step, acceleration, 0.0).injected()]
            }
            AttackKind::SteeringJerk => {
                let magnitude = self.rng.gen_range(1.8..=3.0);
                let steering = if self.rng.gen_bool(0.5) { magnitude } else { -magnitude };
                vec![Command::new(ecu_ids::CONTROL_ECU, step, 0.0, steering).injected()]
            }
            AttackKind::BrakeRelease => {
                let magnitude = self.rng.gen_range(1.5..=2.5);
                let acceleration = if self.last_flip <= 0.0 { magnitude } else { -magnitude };
                self.last_flip = acceleration;
                vec![Command::new(ecu_ids::ATTACKER_ECU, step, acceleration, 0.0).injected()]
            }
            AttackKind::SybilFlood => {
                let acceleration = self.rng.gen_range(0.5..=0.9);
                (1..=SYBIL_FLOOD_SIZE)
                    .map(|i| {
                        let source = format!("{}_{}", ecu_ids::SYBIL_PREFIX, i);
                        Command::new(source, step, acceleration, 0.0).injected()
                    })
                    .collect()
            }
            AttackKind::FalseLabel => {
                // Under the physical limit; only the claim gives it away once
                // the attacker ECU is distrusted
                let acceleration = self.rng.gen_range(2.3..=2.9);
                vec![Command::new(ecu_ids::ATTACKER_ECU, step, acceleration, 0.0).injected()]
            }
            AttackKind::Malformed => {
                vec![Command::new(ecu_ids::ATTACKER_ECU, step, f64::NAN, f64::INFINITY).injected()]
            }
        }
    }

    /// Attacks launched so far, per kind
    pub fn launched(&self) -> &BTreeMap<AttackKind, u64> {
        &self.launched
    }

    pub fn attack_probability(&self) -> f64 {
        self.attack_probability
    }
}

impl CommandSource for RandomCommandSource {
    fn next_frame(&mut self, step: u64) -> Vec<Command> {
        let mut frame = vec![self.normal_command(step)];

        if self.rng.gen_bool(self.attack_probability) {
            let kind = AttackKind::ALL[self.rng.gen_range(0..AttackKind::ALL.len())];
            frame.extend(self.attack_commands(kind, step));
        }

        frame
    }
}

/// Replays fixed frames; commands are re-stamped with the current step
#[derive(Debug, Clone, Default)]
pub struct ScriptedCommandSource {
    frames: VecDeque<Vec<Command>>,
}

impl ScriptedCommandSource {
    pub fn new(frames: impl IntoIterator<Item = Vec<Command>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// One single-command frame per command
    pub fn from_commands(commands: impl IntoIterator<Item = Command>) -> Self {
        Self::new(commands.into_iter().map(|command| vec![command]))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl CommandSource for ScriptedCommandSource {
    fn next_frame(&mut self, step: u64) -> Vec<Command> {
        let mut frame = self.frames.pop_front().unwrap_or_default();
        for command in &mut frame {
            command.step = step;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_traffic() {
        let mut a = RandomCommandSource::new(0.5, Some(7));
        let mut b = RandomCommandSource::new(0.5, Some(7));

        for step in 1..=50 {
            let fa = a.next_frame(step);
            let fb = b.next_frame(step);
            assert_eq!(fa.len(), fb.len());
            for (ca, cb) in fa.iter().zip(fb.iter()) {
                assert_eq!(ca.source_id, cb.source_id);
                assert_eq!(ca.acceleration.to_bits(), cb.acceleration.to_bits());
                assert_eq!(ca.steering_delta.to_bits(), cb.steering_delta.to_bits());
            }
        }
    }

    #[test]
    fn test_no_attacks_at_zero_probability() {
        let mut source = RandomCommandSource::new(0.0, Some(1));
        for step in 1..=100 {
            let frame = source.next_frame(step);
            assert_eq!(frame.len(), 1);
            assert!(!frame[0].injected);
            assert!(frame[0].acceleration >= -0.3 && frame[0].acceleration <= 0.2);
            assert!(frame[0].steering_delta.abs() <= 0.2);
        }
        assert!(source.launched().is_empty());
    }

    #[test]
    fn test_attack_every_step_at_full_probability() {
        let mut source = RandomCommandSource::new(1.0, Some(3));
        for step in 1..=20 {
            let frame = source.next_frame(step);
            assert!(frame.len() >= 2);
            assert!(frame[1..].iter().all(|c| c.injected));
        }
        assert_eq!(source.launched().values().sum::<u64>(), 20);
    }

    #[test]
    fn test_sybil_flood_uses_distinct_identities() {
        let mut source = RandomCommandSource::new(0.0, Some(1));
        let frame = source.attack_commands(AttackKind::SybilFlood, 4);

        assert_eq!(frame.len(), SYBIL_FLOOD_SIZE);
        let mut ids: Vec<&str> = frame.iter().map(|c| c.source_id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), SYBIL_FLOOD_SIZE);
        assert!(frame.iter().all(|c| c.acceleration == frame[0].acceleration));
    }

    #[test]
    fn test_brake_release_flips_sign() {
        let mut source = RandomCommandSource::new(0.0, Some(1));
        let first = source.attack_commands(AttackKind::BrakeRelease, 1)[0].acceleration;
        let second = source.attack_commands(AttackKind::BrakeRelease, 2)[0].acceleration;
        assert!(first > 0.0);
        assert!(second < 0.0);
    }

    #[test]
    fn test_false_label_claims_legitimacy_below_limit() {
        let mut source = RandomCommandSource::new(0.0, Some(9));
        for step in 1..=20 {
            let command = source.attack_commands(AttackKind::FalseLabel, step).remove(0);
            assert!(command.declared_legitimate);
            assert!(command.injected);
            assert!((2.3..=2.9).contains(&command.acceleration));
        }
    }

    #[test]
    fn test_malformed_attack_is_not_well_formed() {
        let mut source = RandomCommandSource::new(0.0, Some(1));
        let frame = source.attack_commands(AttackKind::Malformed, 1);
        assert!(!frame[0].is_well_formed());
    }

    #[test]
    fn test_scripted_source_restamps_and_drains() {
        let mut source = ScriptedCommandSource::from_commands(vec![
            Command::new("CONTROL_ECU", 0, 0.1, 0.0),
            Command::new("CONTROL_ECU", 0, 0.2, 0.0),
        ]);

        assert_eq!(source.next_frame(5)[0].step, 5);
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.next_frame(6)[0].acceleration, 0.2);
        assert!(source.next_frame(7).is_empty());
    }
}
