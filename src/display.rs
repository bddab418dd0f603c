/// Console rendering for the binaries
use crate::pipeline::SimulationStepRecord;
use crate::simulation::{SimulationOutcome, StopReason};
use crate::types::GatewayDisposition;
use colored::*;

const RULE: &str = "═══════════════════════════════════════════════════════";
const THIN_RULE: &str = "─────────────────────────────────────────────────────";

pub fn banner(title: &str) -> String {
    format!(
        "\n{}\n{}\n{}\n",
        RULE.cyan().bold(),
        format!("         {}", title).cyan().bold(),
        RULE.cyan().bold()
    )
}

pub fn section(title: &str) -> String {
    format!("{}\n{}", title.yellow().bold(), THIN_RULE.bright_black())
}

fn disposition_label(disposition: GatewayDisposition) -> ColoredString {
    match disposition {
        GatewayDisposition::Allow => disposition.as_str().green().bold(),
        GatewayDisposition::Sanitize => disposition.as_str().yellow().bold(),
        GatewayDisposition::Block => disposition.as_str().red().bold(),
    }
}

/// Panel describing one processed command
pub fn render_record(record: &SimulationStepRecord) -> String {
    let mut out = String::new();

    let title = format!("Step {} · {}", record.step, record.command.source_id);
    if record.verdict.is_anomalous {
        out.push_str(&format!(
            "{} {}\n",
            "⚠️".yellow(),
            format!("{} - {} DETECTED", title, record.verdict.attack_type).red().bold()
        ));
    } else {
        out.push_str(&format!("{} {}\n", "✓".green(), title.bold()));
    }

    out.push_str(&format!(
        "  {} Vehicle    speed {:>6.1} km/h  steering {:>5.1}°{}\n",
        "→".cyan(),
        record.vehicle.speed,
        record.vehicle.steering_angle,
        if record.vehicle.emergency_stop {
            "  EMERGENCY STOP".red().bold().to_string()
        } else {
            String::new()
        }
    ));
    out.push_str(&format!(
        "  {} Command    accel {:+.2}  steer {:+.2}{}\n",
        "→".cyan(),
        record.command.acceleration,
        record.command.steering_delta,
        if record.command.injected {
            "  (injected)".bright_black().to_string()
        } else {
            String::new()
        }
    ));
    out.push_str(&format!(
        "  {} IDS        {} severity {:.2}\n",
        "→".cyan(),
        record.verdict.attack_type,
        record.verdict.severity
    ));
    if let Some(reason) = record.verdict.reason() {
        out.push_str(&format!("               {}\n", reason.bright_black()));
    }
    out.push_str(&format!("  {} Trust      {:.2}\n", "→".cyan(), record.trust.value));
    out.push_str(&format!(
        "  {} Gateway    {}  {}\n",
        "→".cyan(),
        disposition_label(record.disposition),
        record.gateway_reason.bright_black()
    ));

    if record.forced_stop {
        out.push_str(&format!(
            "  {} Safety     {}  {}\n",
            "→".cyan(),
            "FORCED STOP".red().bold(),
            record.safety_reason.as_deref().unwrap_or_default().bright_black()
        ));
    } else {
        out.push_str(&format!("  {} Safety     {}\n", "→".cyan(), "pass".green()));
    }

    out
}

/// End-of-run summary
pub fn render_outcome(outcome: &SimulationOutcome) -> String {
    let mut out = String::new();
    out.push_str(&section("RUN SUMMARY"));
    out.push('\n');

    let stop = match outcome.stop_reason {
        StopReason::Completed => "completed".green().to_string(),
        StopReason::SafeStop { step } => format!("safe stop after attack at step {}", step).yellow().to_string(),
        StopReason::Cancelled { step } => format!("cancelled before step {}", step).red().to_string(),
    };

    out.push_str(&format!("{} Steps run:        {} ({})\n", "→".cyan(), outcome.steps_run, stop));
    out.push_str(&format!("{} Commands:         {}\n", "→".cyan(), outcome.records));
    out.push_str(&format!(
        "{} Gateway:          {} allowed, {} sanitized, {} blocked\n",
        "→".cyan(),
        outcome.gateway.commands_allowed,
        outcome.gateway.commands_sanitized,
        outcome.gateway.commands_blocked
    ));
    out.push_str(&format!("{} Forced stops:     {}\n", "→".cyan(), outcome.forced_stops));
    out.push_str(&format!(
        "{} Final vehicle:    {:.1} km/h, {:.1}°{}\n",
        "→".cyan(),
        outcome.final_state.speed,
        outcome.final_state.steering_angle,
        if outcome.final_state.emergency_stop { " (emergency stop)" } else { "" }
    ));

    out.push_str(&format!("{} Trust:\n", "→".cyan()));
    for (source, value) in &outcome.trust {
        let value_str = format!("{:.2}", value);
        let value_str = if *value < 0.2 {
            value_str.red()
        } else if *value < 0.5 {
            value_str.yellow()
        } else {
            value_str.green()
        };
        out.push_str(&format!("    {:<16} {}\n", source, value_str));
    }

    out
}
