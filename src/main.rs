// Single experiment run - one sweep point, one seed, one appended fragment
//
// Usage:
//   throughput_run --seed=1 --distance=5.0 --file=distance.txt
//   throughput_run --seed=3 --nodes=16 --cara --rayleigh --file=stations.txt
//
// The distance variant (default) runs one station on a grid with a fixed
// station -> AP flow; passing --nodes switches to the station-count variant
// with disc placement and randomized flow directions.

use std::env;
use std::path::PathBuf;
use std::process;

use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use ws_rust::{
    Experiment, FadingModel, RateAdaptation, RunParameters, SweepLayout, SweepPoint,
};

struct CliArgs {
    seed: u64,
    distance: f64,
    nodes: Option<usize>,
    cara: bool,
    rayleigh: bool,
    verbose: bool,
    file: String,
    last_seed: u64,
    final_value: Option<f64>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            seed: 4,
            distance: 5.0,
            nodes: None,
            cara: false,
            rayleigh: false,
            verbose: false,
            file: "default.txt".to_string(),
            last_seed: 5,
            final_value: None,
        }
    }
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [--key=value ...]", program);
    eprintln!("\nOptions:");
    eprintln!("  --seed=N          run seed, also the column marker (default 4)");
    eprintln!("  --distance=X      station-AP distance in meters (default 5.0)");
    eprintln!("  --nodes=N         station count; selects the station-count variant");
    eprintln!("  --cara            use the CARA rate-adaptation algorithm (default AARF)");
    eprintln!("  --rayleigh        enable Rayleigh fading on top of distance loss");
    eprintln!("  --verbose         log receive and position events");
    eprintln!("  --file=PATH       append-only output sink (default default.txt)");
    eprintln!("  --last-seed=N     seed that closes a row (default 5)");
    eprintln!("  --final-value=X   sweep value that closes the table");
    eprintln!("                    (default 100.0 for distance, 46 for nodes)");
    process::exit(1);
}

fn parse_args(program: &str, args: impl Iterator<Item = String>) -> CliArgs {
    let mut cli = CliArgs::default();

    for arg in args {
        let (key, value) = match arg.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (arg.as_str(), None),
        };

        let result = match (key, value) {
            ("--seed", Some(v)) => v.parse().map(|n| cli.seed = n).map_err(|_| v),
            ("--distance", Some(v)) => v.parse().map(|d| cli.distance = d).map_err(|_| v),
            ("--nodes", Some(v)) => v.parse().map(|n| cli.nodes = Some(n)).map_err(|_| v),
            ("--file", Some(v)) => {
                cli.file = v.to_string();
                Ok(())
            }
            ("--last-seed", Some(v)) => v.parse().map(|n| cli.last_seed = n).map_err(|_| v),
            ("--final-value", Some(v)) => {
                v.parse().map(|x| cli.final_value = Some(x)).map_err(|_| v)
            }
            ("--cara", None) => {
                cli.cara = true;
                Ok(())
            }
            ("--rayleigh", None) => {
                cli.rayleigh = true;
                Ok(())
            }
            ("--verbose", None) => {
                cli.verbose = true;
                Ok(())
            }
            _ => {
                eprintln!("Unknown option: {}", arg);
                usage(program);
            }
        };

        if result.is_err() {
            eprintln!("Invalid value in: {}", arg);
            usage(program);
        }
    }

    cli
}

fn main() {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "throughput_run".to_string());
    let cli = parse_args(&program, args);

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init().unwrap();

    let sweep = match cli.nodes {
        Some(n) => SweepPoint::StationCount(n),
        None => SweepPoint::Distance(cli.distance),
    };
    let mut layout = match cli.nodes {
        Some(_) => SweepLayout::station_default(),
        None => SweepLayout::distance_default(),
    };
    layout.last_seed = cli.last_seed;
    if let Some(final_value) = cli.final_value {
        layout.final_value = final_value;
    }

    let fading = if cli.rayleigh {
        FadingModel::Rayleigh
    } else {
        FadingModel::None
    };
    let rate_adaptation = if cli.cara {
        RateAdaptation::Cara
    } else {
        RateAdaptation::Aarf
    };

    info!("Channel Fading: {}", fading);
    info!("Rate Adaptation Algorithm: {}", rate_adaptation);

    let params = RunParameters {
        seed: cli.seed,
        sweep,
        fading,
        rate_adaptation,
        verbose: cli.verbose,
        output: PathBuf::from(&cli.file),
    };
    let position = layout.position(cli.seed, sweep.value());

    match Experiment::new(params).run_and_report(&position) {
        Ok(throughput) => {
            info!("throughput: {} Mbit/s -> {}", throughput, cli.file);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
