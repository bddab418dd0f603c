/// Batch experiment runner
///
/// Runs the simulation for several attack probabilities with several seeds
/// each, in parallel, and writes an aggregated JSON report.
use av_resilience_sim::SimulationConfig;
use av_resilience_sim::display;
use av_resilience_sim::experiment::{ExperimentPlan, run_experiments};
use colored::*;
use std::path::PathBuf;
use std::process;

fn print_usage() {
    println!("{}", "Usage: experiment_runner [OPTIONS]".bold());
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>        JSON configuration file");
    println!("  -p, --probs <P1,P2,...>    Attack probabilities (default: 0.1,0.3,0.5)");
    println!("  -r, --runs <N>             Runs per setting (default: 5)");
    println!("      --seed <N>             Base seed (default: 42)");
    println!("  -s, --steps <N>            Steps per run");
    println!("      --stop-on-safe-stop    End runs at the first attack-triggered safe stop");
    println!("  -o, --output <FILE>        Report path (default: reports/experiment_results.json)");
    println!("  -h, --help                 Show this help");
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("{} Missing value for {}", "✗".red(), flag);
            process::exit(1);
        }
    }
}

fn parse<T: std::str::FromStr>(raw: &str, flag: &str) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("{} Invalid value for {}: {}", "✗".red(), flag, raw);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut plan = ExperimentPlan::default();
    let mut steps: Option<u64> = None;
    let mut stop_on_safe_stop = false;
    let mut output = PathBuf::from("reports/experiment_results.json");

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value(&args, i, flag)));
                i += 2;
            }
            "--probs" | "-p" => {
                plan.attack_probabilities = value(&args, i, flag)
                    .split(',')
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| parse(p, flag))
                    .collect();
                i += 2;
            }
            "--runs" | "-r" => {
                plan.runs_per_setting = parse(value(&args, i, flag), flag);
                i += 2;
            }
            "--seed" => {
                plan.base_seed = parse(value(&args, i, flag), flag);
                i += 2;
            }
            "--steps" | "-s" => {
                steps = Some(parse(value(&args, i, flag), flag));
                i += 2;
            }
            "--stop-on-safe-stop" => {
                stop_on_safe_stop = true;
                i += 1;
            }
            "--output" | "-o" => {
                output = PathBuf::from(value(&args, i, flag));
                i += 2;
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            _ => {
                eprintln!("{} Unknown option: {}", "✗".red(), flag);
                print_usage();
                process::exit(1);
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => match SimulationConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), path.display(), e);
                process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    if let Some(steps) = steps {
        config.run.steps = steps;
    }
    config.run.stop_on_safe_stop |= stop_on_safe_stop;

    print!("{}", display::banner("CYBER-RESILIENCE EXPERIMENTS"));
    println!("{} Attack probabilities: {:?}", "→".cyan(), plan.attack_probabilities);
    println!("{} Runs per setting:     {}", "→".cyan(), plan.runs_per_setting);
    println!("{} Steps per run:        {}", "→".cyan(), config.run.steps);
    println!();

    let report = match run_experiments(&config, &plan).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} Experiment failed: {}", "✗".red(), e);
            process::exit(1);
        }
    };

    for setting in &report.settings {
        println!(
            "{}",
            display::section(&format!("Attack probability = {:.2}", setting.aggregate.attack_probability))
        );
        for (n, run) in setting.runs.iter().enumerate() {
            println!(
                "  Run {}/{}: attacks={}, detected={}, forced_stops={}, safe_stop={}",
                n + 1,
                setting.runs.len(),
                run.attack_commands,
                run.detected_attacks,
                run.forced_stops,
                run.safe_stop_reached
            );
        }
        println!();
    }

    print!("{}", report.generate_report());

    match report.write_json(&output) {
        Ok(()) => println!("{} Saved experiment report to: {}", "✓".green(), output.display()),
        Err(e) => {
            eprintln!("{} Failed to save report: {}", "✗".red(), e);
            process::exit(1);
        }
    }
}
