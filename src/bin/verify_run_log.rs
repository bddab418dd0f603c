/// Run Log Verifier
///
/// Checks the hash chain of a run log and summarizes what it recorded.
use av_resilience_sim::display;
use av_resilience_sim::run_log::{read_run_log, verify_entries};
use colored::*;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

fn main() {
    print!("{}", display::banner("RUN LOG VERIFIER"));

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("{} Usage: {} <run_log.jsonl>", "ERROR:".red().bold(), args[0]);
        println!();
        println!("Example:");
        println!("  {} run_logs/RUN_S42_*.jsonl", args[0]);
        std::process::exit(1);
    }

    let log_path = PathBuf::from(&args[1]);
    if !log_path.exists() {
        println!("{} Log file not found: {}", "ERROR:".red().bold(), log_path.display());
        std::process::exit(1);
    }

    println!("{} Analyzing log file: {}", "→".cyan(), log_path.display());
    println!();

    let entries = match read_run_log(&log_path) {
        Ok(entries) => entries,
        Err(e) => {
            println!("{} {}", "ERROR:".red().bold(), e);
            std::process::exit(1);
        }
    };

    println!("{}", display::section("INTEGRITY VERIFICATION"));
    let result = verify_entries(&entries);
    println!("{} Total log entries: {}", "→".cyan(), result.total_entries);

    if result.verified {
        println!("{} {}", "✓".green().bold(), "Log integrity verified".green());
    } else {
        println!("{} {}", "✗".red().bold(), "Log integrity check FAILED".red().bold());
        for issue in &result.issues {
            println!("  {} {}", "⚠️".yellow(), issue);
        }
    }
    println!();

    println!("{}", display::section("DISPOSITIONS"));
    let mut dispositions: BTreeMap<String, usize> = BTreeMap::new();
    let mut sources: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &entries {
        *dispositions
            .entry(entry.disposition().unwrap_or("?").to_string())
            .or_insert(0) += 1;
        *sources
            .entry(entry.source_id().unwrap_or("?").to_string())
            .or_insert(0) += 1;
    }
    for (disposition, count) in &dispositions {
        println!("  {:<12} {}", disposition, count);
    }
    println!();

    println!("{}", display::section("SOURCES"));
    for (source, count) in &sources {
        println!("  {:<16} {}", source, count);
    }
    println!();

    if !result.verified {
        std::process::exit(2);
    }
}
