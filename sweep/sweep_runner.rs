// Sweep Runner - execute a whole sweep schedule in-process
//
// Usage:
//   cargo run --bin sweep_runner sweep/schedules/distance.yaml
//   cargo run --bin sweep_runner sweep/schedules/stations.yaml --verbose
//
// Runs every (value, seed) pair of the schedule in order, serializing the
// appends to the shared output sink, which is how a full results table is
// meant to be produced. Single runs launched as separate processes remain
// possible via the throughput_run binary.

mod schedule;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use schedule::{SweepSchedule, SweepVariant};
use ws_rust::{Experiment, FadingModel, RateAdaptation, RunParameters, SweepPoint};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <schedule.yaml> [--verbose]", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} sweep/schedules/distance.yaml", args[0]);
        eprintln!("  {} sweep/schedules/stations.yaml --verbose", args[0]);
        process::exit(1);
    }

    let verbose = args.iter().any(|a| a == "--verbose");
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init().unwrap();

    let path = Path::new(&args[1]);
    let schedule = load_schedule(path);

    if let Some(ref name) = schedule.meta.name {
        println!("Sweep: {}", name);
    }
    if let Some(ref description) = schedule.meta.description {
        println!("{}", description);
    }
    println!(
        "{} value(s) x {} seed(s) -> {}\n",
        schedule.values.len(),
        schedule.seeds.len(),
        schedule.output
    );

    let fading = if schedule.rayleigh {
        FadingModel::Rayleigh
    } else {
        FadingModel::None
    };
    let rate_adaptation = if schedule.cara {
        RateAdaptation::Cara
    } else {
        RateAdaptation::Aarf
    };

    let runs = schedule.runs();
    let total = runs.len();
    for (i, run) in runs.iter().enumerate() {
        let sweep = match schedule.variant {
            SweepVariant::Distance => SweepPoint::Distance(run.value),
            SweepVariant::StationCount => SweepPoint::StationCount(run.value as usize),
        };
        let params = RunParameters {
            seed: run.seed,
            sweep,
            fading,
            rate_adaptation,
            verbose,
            output: PathBuf::from(&schedule.output),
        };

        match Experiment::new(params).run_and_report(&run.position) {
            Ok(throughput) => {
                println!(
                    "{:>3}/{} value {:>6} seed {}: {:.4} Mbit/s",
                    i + 1,
                    total,
                    run.value,
                    run.seed,
                    throughput
                );
            }
            Err(e) => {
                eprintln!("Run failed (value {} seed {}): {}", run.value, run.seed, e);
                process::exit(1);
            }
        }
    }

    println!("\nSweep complete: {}", schedule.output);
}

fn load_schedule(path: &Path) -> SweepSchedule {
    let yaml = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        process::exit(1);
    });

    serde_yaml::from_str(&yaml).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        process::exit(1);
    })
}
