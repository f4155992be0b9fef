//! # wsRust - WiFi Throughput Study Driver
//!
//! An experiment driver for a wireless throughput study: it builds a small
//! infrastructure WiFi topology (stations plus one access point), installs
//! constant-bit-rate flows, runs a bounded simulation, reduces the per-flow
//! counters into a throughput figure, and appends one result fragment per
//! run to a sweep results file.
//!
//! ## Core Components
//!
//! - **TopologyBuilder**: node creation, address allocation, grid/disc
//!   placement
//! - **TrafficScheduler**: per-pair flow installation with jittered starts
//! - **FlowStatsCollector**: post-run counter reduction into Mbit/s
//! - **RunReporter**: position-driven append-only table output
//!
//! ## Usage with an Engine
//!
//! The PHY/MAC/scheduling machinery is an external collaborator behind the
//! [`NetworkEngine`] trait. The crate ships [`MemoryEngine`], a deterministic
//! in-memory implementation, so runs are executable without a real simulator:
//!
//! ```no_run
//! use ws_rust::{Experiment, MemoryEngine, RunParameters, SweepPoint};
//! use ws_rust::{FadingModel, RateAdaptation};
//!
//! let params = RunParameters {
//!     seed: 1,
//!     sweep: SweepPoint::Distance(5.0),
//!     fading: FadingModel::None,
//!     rate_adaptation: RateAdaptation::Aarf,
//!     verbose: false,
//!     output: "default.txt".into(),
//! };
//! let mut engine = MemoryEngine::new(1);
//! let throughput = Experiment::new(params).run(&mut engine).unwrap();
//! println!("{} Mbit/s", throughput);
//! ```
//!
//! ## Sweeps
//!
//! Each process invocation is one sweep point; rows and columns of the
//! results table are decided by an explicit `RunPosition`. The
//! `sweep_runner` binary drives a whole schedule in-process.

// Core driver modules
pub mod ws_experiment;
pub mod ws_flow_stats;
pub mod ws_interface;
pub mod ws_report;
pub mod ws_topology;
pub mod ws_traffic;

// Engine implementations
pub mod ws_memory_engine;

// Re-export commonly used types
pub use ws_experiment::{Experiment, RunParameters, SweepPoint};
pub use ws_flow_stats::{FlowSelection, FlowStatsCollector, ThroughputSummary};
pub use ws_interface::{
    ChannelConfig, EngineError, ExperimentError, FadingModel, Flow, FlowRecord, NetworkEngine,
    NodeId, NodeRole, Position, RateAdaptation, SimTime,
};
pub use ws_memory_engine::MemoryEngine;
pub use ws_report::{RunPosition, RunReporter, SweepLayout};
pub use ws_topology::{Placement, Topology, TopologyBuilder};
pub use ws_traffic::{Direction, Pairing, TrafficScheduler};
