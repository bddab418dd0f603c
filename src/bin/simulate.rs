/// Single-run simulator
///
/// Drives one vehicle through the detection / trust / gateway / safety
/// pipeline, prints a panel per processed command and writes a hash-chained
/// JSONL run log.
use av_resilience_sim::command_source::RandomCommandSource;
use av_resilience_sim::display;
use av_resilience_sim::run_log::RunLogger;
use av_resilience_sim::simulation::Simulation;
use av_resilience_sim::SimulationConfig;
use colored::*;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::time::Duration;

struct Options {
    config_path: Option<PathBuf>,
    steps: Option<u64>,
    attack_probability: Option<f64>,
    seed: Option<u64>,
    log_dir: Option<PathBuf>,
    delay_ms: u64,
    quiet: bool,
    stop_on_safe_stop: bool,
}

fn print_usage() {
    println!("{}", "Usage: simulate [OPTIONS]".bold());
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>        JSON configuration file");
    println!("  -s, --steps <N>            Number of simulation steps");
    println!("  -p, --attack-prob <P>      Attack probability per step (0.0 - 1.0)");
    println!("      --seed <N>             Random seed");
    println!("  -l, --log-dir <DIR>        Run log directory (default: run_logs)");
    println!("      --delay-ms <MS>        Pause between steps");
    println!("      --stop-on-safe-stop    End the run at the first attack-triggered safe stop");
    println!("  -q, --quiet                Only print the summary");
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
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("{} Invalid value for {}: {}", "✗".red(), flag, raw);
            process::exit(1);
        }
    }
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        config_path: None,
        steps: None,
        attack_probability: None,
        seed: None,
        log_dir: None,
        delay_ms: 0,
        quiet: false,
        stop_on_safe_stop: false,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "-c" => {
                options.config_path = Some(PathBuf::from(value(&args, i, flag)));
                i += 2;
            }
            "--steps" | "-s" => {
                options.steps = Some(parse(value(&args, i, flag), flag));
                i += 2;
            }
            "--attack-prob" | "-p" => {
                options.attack_probability = Some(parse(value(&args, i, flag), flag));
                i += 2;
            }
            "--seed" => {
                options.seed = Some(parse(value(&args, i, flag), flag));
                i += 2;
            }
            "--log-dir" | "-l" => {
                options.log_dir = Some(PathBuf::from(value(&args, i, flag)));
                i += 2;
            }
            "--delay-ms" => {
                options.delay_ms = parse(value(&args, i, flag), flag);
                i += 2;
            }
            "--stop-on-safe-stop" => {
                options.stop_on_safe_stop = true;
                i += 1;
            }
            "--quiet" | "-q" => {
                options.quiet = true;
                i += 1;
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

    options
}

#[tokio::main]
async fn main() {
    let options = parse_args();

    let mut config = match &options.config_path {
        Some(path) => match SimulationConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), path.display(), e);
                process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    if let Some(steps) = options.steps {
        config.run.steps = steps;
    }
    if let Some(probability) = options.attack_probability {
        config.run.attack_probability = probability;
    }
    if let Some(seed) = options.seed {
        config.run.seed = seed;
    }
    config.run.stop_on_safe_stop |= options.stop_on_safe_stop;

    if let Err(e) = config.validate() {
        eprintln!("{} Invalid configuration: {}", "✗".red(), e);
        process::exit(1);
    }

    print!("{}", display::banner("VEHICLE CYBER-RESILIENCE SIMULATION"));
    println!(
        "{} {} steps, attack probability {:.2}, seed {}",
        "→".cyan(),
        config.run.steps,
        config.run.attack_probability,
        config.run.seed
    );

    let run_id = format!("RUN_S{}", config.run.seed);
    let mut logger = match RunLogger::new(run_id, options.log_dir.clone()) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("{} Failed to open run log: {}", "✗".red(), e);
            process::exit(1);
        }
    };
    let log_path = logger.log_path().to_path_buf();
    println!("{} Run log: {}", "→".cyan(), log_path.display());
    println!();

    let source = RandomCommandSource::new(config.run.attack_probability, Some(config.run.seed));
    let mut simulation = match Simulation::new(&config, source) {
        Ok(simulation) => simulation,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            process::exit(1);
        }
    };

    let cancel = simulation.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let quiet = options.quiet;
    let delay = Duration::from_millis(options.delay_ms);
    let result = tokio::task::spawn_blocking(move || {
        simulation.run_with(&mut logger, |record| {
            if !quiet {
                println!("{}", display::render_record(record));
            }
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        })
    })
    .await;

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            eprintln!("{} Simulation aborted: {}", "✗".red(), e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{} Simulation task failed: {}", "✗".red(), e);
            process::exit(1);
        }
    };

    println!("{}", display::render_outcome(&outcome));
    println!(
        "{} Verify the audit trail with: verify_run_log {}",
        "✓".green(),
        log_path.display()
    );
}
