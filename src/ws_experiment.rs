//! One-run orchestration: topology build, traffic install, bounded run,
//! statistics collection and reporting, in that order.

use std::path::PathBuf;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ws_flow_stats::{FlowSelection, FlowStatsCollector};
use crate::ws_interface::{
    ChannelConfig, ExperimentError, FadingModel, NetworkEngine, RateAdaptation, STOP_TIME,
};
use crate::ws_memory_engine::MemoryEngine;
use crate::ws_report::{RunPosition, RunReporter};
use crate::ws_topology::{Placement, Topology, TopologyBuilder, DISC_RADIUS};
use crate::ws_traffic::{Direction, Pairing, TrafficScheduler};

/// Interval of the optional station position trace, in seconds.
const POSITION_TRACE_INTERVAL: f64 = 1.0;

// ============================================================================
// Run parameters
// ============================================================================

/// The swept independent variable, which also selects the experiment shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepPoint {
    /// One station at the given distance from the AP, on a grid, with a
    /// single fixed-direction flow.
    Distance(f64),

    /// The given number of stations on a disc around the AP, one
    /// randomized-direction flow each.
    StationCount(usize),
}

impl SweepPoint {
    /// The value written as the row's leading field.
    pub fn value(&self) -> f64 {
        match self {
            SweepPoint::Distance(d) => *d,
            SweepPoint::StationCount(n) => *n as f64,
        }
    }

    pub fn station_count(&self) -> usize {
        match self {
            SweepPoint::Distance(_) => 1,
            SweepPoint::StationCount(n) => *n,
        }
    }

    fn placement(&self) -> Placement {
        match self {
            SweepPoint::Distance(d) => Placement::Grid { spacing: *d },
            SweepPoint::StationCount(_) => Placement::Disc {
                radius: DISC_RADIUS,
            },
        }
    }

    fn pairing(&self) -> Pairing {
        match self {
            SweepPoint::Distance(_) => Pairing::FixedDirection(Direction::Upstream),
            SweepPoint::StationCount(_) => Pairing::Randomized,
        }
    }

    fn selection(&self, topology: &Topology) -> FlowSelection {
        match self {
            // Single fixed pair: filter on the station -> AP record.
            SweepPoint::Distance(_) => FlowSelection::Pair {
                source: topology.stations[0].address,
                destination: topology.access_point.address,
            },
            SweepPoint::StationCount(_) => FlowSelection::All,
        }
    }
}

/// Everything one run needs. Identical parameters reproduce identical
/// randomized choices: a single `StdRng` seeded from `seed` is threaded
/// through the topology builder and the traffic scheduler.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub seed: u64,
    pub sweep: SweepPoint,
    pub fading: FadingModel,
    pub rate_adaptation: RateAdaptation,
    pub verbose: bool,
    pub output: PathBuf,
}

// ============================================================================
// Experiment
// ============================================================================

pub struct Experiment {
    params: RunParameters,
}

impl Experiment {
    pub fn new(params: RunParameters) -> Self {
        Self { params }
    }

    /// Execute one run against the given engine and return the aggregate
    /// throughput in Mbit/s. Nothing is written to the results sink; any
    /// error here means no partial run reaches the output.
    pub fn run(&self, engine: &mut dyn NetworkEngine) -> Result<f64, ExperimentError> {
        let params = &self.params;
        info!(
            "run: seed {} sweep {} fading {} algorithm {}",
            params.seed,
            params.sweep.value(),
            params.fading,
            params.rate_adaptation
        );

        let mut rng = StdRng::seed_from_u64(params.seed);

        engine.configure_channel(ChannelConfig {
            fading: params.fading,
            rate_adaptation: params.rate_adaptation,
        });

        let topology = TopologyBuilder::new(params.sweep.station_count(), params.sweep.placement())
            .build(engine, &mut rng)?;

        if params.verbose {
            engine.schedule_position_observer(topology.stations[0].id, POSITION_TRACE_INTERVAL)?;
        }

        TrafficScheduler::new(params.sweep.pairing()).install_flows(engine, &mut rng, &topology)?;

        // If the run does not complete to its stop time, neither collection
        // nor reporting happens.
        engine.run_to_completion(STOP_TIME)?;

        let collector = FlowStatsCollector::new(params.sweep.selection(&topology));
        let summary = collector.collect(engine)?;
        Ok(summary.total_mbps)
    }

    /// Run against a fresh in-memory engine and append the result fragment
    /// for the given sweep position. Returns the reported throughput.
    pub fn run_and_report(&self, position: &RunPosition) -> Result<f64, ExperimentError> {
        let mut engine = MemoryEngine::new(self.params.seed);
        let throughput = self.run(&mut engine)?;

        let reporter = RunReporter::new(&self.params.output);
        reporter.append(self.params.sweep.value(), throughput, position)?;
        Ok(throughput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_report::SweepLayout;
    use std::fs;

    fn params(seed: u64, sweep: SweepPoint, output: PathBuf) -> RunParameters {
        RunParameters {
            seed,
            sweep,
            fading: FadingModel::None,
            rate_adaptation: RateAdaptation::Aarf,
            verbose: false,
            output,
        }
    }

    #[test]
    fn test_distance_run_is_deterministic() {
        let throughput = |seed: u64| {
            let params = params(seed, SweepPoint::Distance(30.0), PathBuf::from("unused"));
            let mut engine = MemoryEngine::new(seed);
            Experiment::new(params).run(&mut engine).unwrap()
        };
        assert_eq!(throughput(3), throughput(3));
    }

    #[test]
    fn test_zero_stations_fails_before_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let params = params(1, SweepPoint::StationCount(0), path.clone());
        let position = SweepLayout::station_default().position(1, 0.0);

        let err = Experiment::new(params).run_and_report(&position);
        assert!(matches!(err, Err(ExperimentError::InvalidStationCount(0))));
        assert!(!path.exists());
    }

    #[test]
    fn test_task1_style_row_start() {
        // stationCount=1, distance=5.0, seed=1, AARF, no fading: the row
        // begins with "5, " and ends with ", " since seed != 5.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task1.txt");
        let params = params(1, SweepPoint::Distance(5.0), path.clone());
        let position = SweepLayout::distance_default().position(1, 5.0);

        Experiment::new(params).run_and_report(&position).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("\n5, "));
        assert!(contents.ends_with(", "));

        let fragment = contents
            .trim_start_matches("\n5, ")
            .trim_end_matches(", ");
        let throughput: f64 = fragment.parse().unwrap();
        assert!(throughput >= 0.0);
    }

    #[test]
    fn test_task2_style_row_end() {
        // nodeNum at the schedule's configured maximum with the last seed:
        // the row ends with a newline and no trailing separator.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task2.txt");
        let mut layout = SweepLayout::station_default();
        layout.final_value = 3.0;

        let params = params(5, SweepPoint::StationCount(3), path.clone());
        let position = layout.position(5, 3.0);

        Experiment::new(params).run_and_report(&position).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        assert!(!contents.trim_end_matches('\n').ends_with(','));
    }

    #[test]
    fn test_station_sweep_aggregates_all_flows() {
        let params = params(2, SweepPoint::StationCount(4), PathBuf::from("unused"));
        let mut engine = MemoryEngine::new(2);
        let throughput = Experiment::new(params).run(&mut engine).unwrap();
        assert!(throughput > 0.0);
        assert_eq!(engine.flow_records().len(), 4);
    }
}
