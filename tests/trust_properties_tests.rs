/// Trust, Gateway and Safety Property Tests
use av_resilience_sim::config::{GatewayConfig, SafetyConfig, TrustConfig, VehicleConfig};
use av_resilience_sim::*;

fn anomalous(severity: f64) -> AnomalyVerdict {
    AnomalyVerdict {
        is_anomalous: true,
        attack_type: AttackType::Tampering,
        severity,
        hits: Vec::new(),
    }
}

fn trust(value: f64) -> TrustScore {
    TrustScore {
        source_id: "ECU".to_string(),
        value,
        last_updated: 1,
    }
}

#[test]
fn test_trust_stays_in_unit_interval() {
    let mut model = TrustModel::new(TrustConfig::default());
    let severities = [1.0, 0.0, 0.7, 1.0, 1.0, 0.2, 1.0, 0.9, 0.0, 0.0];

    for step in 0..200u64 {
        let severity = severities[step as usize % severities.len()];
        let verdict = if severity > 0.0 { anomalous(severity) } else { AnomalyVerdict::clean() };
        let score = model.update("ECU", &verdict, step);
        assert!((0.0..=1.0).contains(&score.value), "step {}: {}", step, score.value);
    }
}

fn updates_until_below(config: &TrustConfig, block: f64, severity: f64) -> u64 {
    let mut model = TrustModel::new(config.clone());
    let mut steps = 0;
    while model.get("X").value >= block {
        model.update("X", &anomalous(severity), steps);
        steps += 1;
    }
    steps
}

#[test]
fn test_steps_to_block_matches_simulation() {
    let config = TrustConfig::default();
    let block = GatewayConfig::default().block_threshold;

    for severity in [0.45, 0.7, 0.95] {
        let bound = steps_to_block(&config, block, severity).unwrap();
        let actual = updates_until_below(&config, block, severity);
        assert!(actual <= bound, "severity {}: bound {} actual {}", severity, bound, actual);
        assert!(bound <= actual + 1, "severity {}: bound {} actual {}", severity, bound, actual);
    }
}

#[test]
fn test_steps_to_block_bounds_decay_grid() {
    for decay in (1..=100).map(|i| i as f64 / 100.0) {
        for block in (1..=99).map(|i| i as f64 / 100.0) {
            let config = TrustConfig {
                decay_rate: decay,
                recovery_rate: 0.0,
                ..TrustConfig::default()
            };
            for severity in [1.0, 0.6] {
                let bound = steps_to_block(&config, block, severity).unwrap();
                let actual = updates_until_below(&config, block, severity);
                assert!(
                    actual <= bound,
                    "decay {} block {} severity {}: bound {} actual {}",
                    decay,
                    block,
                    severity,
                    bound,
                    actual
                );
                assert!(bound <= actual + 2, "decay {} block {}: bound {} too loose", decay, block, bound);
            }
        }
    }
}

#[test]
fn test_recovery_slower_than_decay() {
    let mut model = TrustModel::new(TrustConfig::default());
    let after_attack = model.update("ECU", &anomalous(1.0), 1).value;
    let drop = 1.0 - after_attack;

    let after_clean = model.update("ECU", &AnomalyVerdict::clean(), 2).value;
    assert!(after_clean - after_attack < drop);

    // Several clean steps are needed to undo a single full-severity anomaly
    let mut steps = 1;
    while model.get("ECU").value < 0.95 {
        model.update("ECU", &AnomalyVerdict::clean(), 2 + steps);
        steps += 1;
    }
    assert!(steps > 5, "recovered in {} steps", steps);
}

#[test]
fn test_gateway_precedence() {
    let mut gateway = Gateway::new(GatewayConfig::default());
    let command = Command::new("ECU", 1, 0.1, 0.0);

    // Low trust blocks even a clean command
    let decision = gateway.decide(&command, &AnomalyVerdict::clean(), &trust(0.1));
    assert_eq!(decision.disposition, GatewayDisposition::Block);

    // Full severity blocks even a trusted source
    let decision = gateway.decide(&command, &anomalous(1.0), &trust(1.0));
    assert_eq!(decision.disposition, GatewayDisposition::Block);

    // Anomalous but trusted: sanitize
    let decision = gateway.decide(&command, &anomalous(0.6), &trust(0.9));
    assert_eq!(decision.disposition, GatewayDisposition::Sanitize);

    // Clean but mid trust: sanitize
    let decision = gateway.decide(&command, &AnomalyVerdict::clean(), &trust(0.3));
    assert_eq!(decision.disposition, GatewayDisposition::Sanitize);

    // Clean and trusted: allow
    let decision = gateway.decide(&command, &AnomalyVerdict::clean(), &trust(0.9));
    assert_eq!(decision.disposition, GatewayDisposition::Allow);
}

#[test]
fn test_sanitized_output_within_bounds() {
    let config = GatewayConfig::default();
    let gateway = Gateway::new(config.clone());

    for (accel, steer) in [(5.0, -5.0), (-0.2, 0.1), (f64::NAN, 2.0), (-9.0, f64::NEG_INFINITY)] {
        let safe = gateway.sanitize(&Command::new("ECU", 1, accel, steer));
        assert!(safe.acceleration.abs() <= config.sanitize_accel_limit);
        assert!(safe.steering_delta.abs() <= config.sanitize_steering_limit);
    }
}

#[test]
fn test_safety_check_is_idempotent() {
    let mut safety = SafetyController::new(SafetyConfig::default(), VehicleModel::new(VehicleConfig::default()));
    let state = VehicleState::new(118.0);
    let command = Command::new("CONTROL_ECU", 1, 0.9, 0.0);

    let first = safety.check(&command, &state);
    let second = safety.check(&command, &state);
    assert_eq!(first, second);

    // Re-checking the forced output keeps it forced
    let stop = Command::new("CONTROL_ECU", 1, first.final_command.acceleration, 0.0);
    let mut braking = state;
    braking.emergency_stop = true;
    assert!(safety.check(&stop, &braking).forced_stop);
}
