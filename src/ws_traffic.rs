//! Traffic Scheduler: installs one constant-bit-rate flow per communicating
//! pair, with jittered start times and a shared stop time.
//!
//! The scheduler plans flows from the topology and the run's seeded random
//! source, installs them on the engine, and holds no state afterwards: the
//! collector later tells flows apart by the five-tuples the engine reports.

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::ws_interface::{
    ExperimentError, Flow, FlowId, NetworkEngine, SimTime, CBR_PACKET_SIZE, CBR_RATE_BPS,
    DESTINATION_PORT, START_JITTER_WINDOW, STOP_TIME,
};
use crate::ws_topology::Topology;

// ============================================================================
// Pairing policies
// ============================================================================

/// Direction of a station/AP flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Station transmits, AP receives.
    Upstream,
    /// AP transmits, station receives.
    Downstream,
}

/// How communicating pairs and their directions are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// Every station exchanges traffic with the AP in the same direction.
    /// With a single station this is exactly one flow.
    FixedDirection(Direction),

    /// One uniform draw in `[0, 1)` per station: `>= 0.5` means the AP
    /// transmits to that station, otherwise the station transmits to the AP.
    /// Decided once per station from the run's seeded random source.
    Randomized,
}

// ============================================================================
// Scheduler
// ============================================================================

pub struct TrafficScheduler {
    pairing: Pairing,
    rate_bps: f64,
    packet_size: u32,
    port: u16,
    stop: SimTime,
}

impl TrafficScheduler {
    pub fn new(pairing: Pairing) -> Self {
        Self {
            pairing,
            rate_bps: CBR_RATE_BPS,
            packet_size: CBR_PACKET_SIZE,
            port: DESTINATION_PORT,
            stop: STOP_TIME,
        }
    }

    /// Plan the flows for a topology. Pure apart from the RNG: per station,
    /// the direction draw (randomized pairing only) comes first, then the
    /// start jitter, so a fixed seed reproduces the exact assignment.
    pub fn plan(&self, rng: &mut StdRng, topology: &Topology) -> Vec<Flow> {
        let ap = topology.access_point;
        let mut flows = Vec::with_capacity(topology.stations.len());

        for station in &topology.stations {
            let direction = match self.pairing {
                Pairing::FixedDirection(direction) => direction,
                Pairing::Randomized => {
                    if rng.gen_range(0.0..1.0) >= 0.5 {
                        Direction::Downstream
                    } else {
                        Direction::Upstream
                    }
                }
            };
            let start = rng.gen_range(0.0..START_JITTER_WINDOW);

            let (source, destination) = match direction {
                Direction::Upstream => (*station, ap),
                Direction::Downstream => (ap, *station),
            };
            flows.push(Flow {
                source: source.id,
                destination: destination.id,
                source_addr: source.address,
                destination_addr: destination.address,
                destination_port: self.port,
                start,
                stop: self.stop,
                rate_bps: self.rate_bps,
                packet_size: self.packet_size,
            });
        }

        flows
    }

    /// Plan and install the flows. Each install puts a sender endpoint on the
    /// source node and a receiver endpoint on the destination node.
    pub fn install_flows(
        &self,
        engine: &mut dyn NetworkEngine,
        rng: &mut StdRng,
        topology: &Topology,
    ) -> Result<Vec<FlowId>, ExperimentError> {
        let mut installed = Vec::new();
        for flow in self.plan(rng, topology) {
            debug!(
                "installing flow {} -> {} start {:.3} s",
                flow.source_addr, flow.destination_addr, flow.start
            );
            installed.push(engine.install_flow(flow)?);
        }
        Ok(installed)
    }
}
