//! Topology Builder: node creation, address allocation and placement.
//!
//! Builds `station_count` stations plus exactly one access point, assigns
//! each a distinct address from a single shared subnet, and registers every
//! node's placement with the engine's mobility subsystem.

use std::f64::consts::TAU;
use std::net::Ipv4Addr;

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::ws_interface::{ExperimentError, NetworkEngine, NodeId, NodeRole, Position};

/// Subnet every node lives in: 10.1.1.0/24.
const SUBNET: [u8; 3] = [10, 1, 1];

/// Usable host numbers in a /24 (network and broadcast excluded).
const SUBNET_CAPACITY: usize = 254;

/// Radius of the disc placement circle, in meters. All stations sit on the
/// circumference so the AP-station distance is constant across seeds.
pub const DISC_RADIUS: f64 = 10.0;

// ============================================================================
// Placement policies
// ============================================================================

/// How nodes are laid out in space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// AP at the origin, station `i` at `x = (i + 1) * spacing` along one
    /// axis. Deterministic; `spacing` is the sweep distance.
    Grid { spacing: f64 },

    /// AP fixed at the origin, each station at a uniformly random angle on a
    /// circle of the given radius. Varies the topology across seeds while
    /// keeping the AP-station distance constant.
    Disc { radius: f64 },
}

// ============================================================================
// Built topology
// ============================================================================

/// A node as the rest of the driver sees it: engine identity plus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle {
    pub id: NodeId,
    pub address: Ipv4Addr,
}

/// The built topology. Nodes are created once and never destroyed mid-run.
#[derive(Debug, Clone)]
pub struct Topology {
    pub stations: Vec<NodeHandle>,
    pub access_point: NodeHandle,
}

impl Topology {
    pub fn node_count(&self) -> usize {
        self.stations.len() + 1
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct TopologyBuilder {
    station_count: usize,
    placement: Placement,
}

impl TopologyBuilder {
    pub fn new(station_count: usize, placement: Placement) -> Self {
        Self {
            station_count,
            placement,
        }
    }

    /// Build the topology against the engine. Fails fast on configuration
    /// preconditions before any engine state is touched.
    pub fn build(
        &self,
        engine: &mut dyn NetworkEngine,
        rng: &mut StdRng,
    ) -> Result<Topology, ExperimentError> {
        if self.station_count < 1 {
            return Err(ExperimentError::InvalidStationCount(self.station_count));
        }
        let needed = self.station_count + 1;
        if needed > SUBNET_CAPACITY {
            return Err(ExperimentError::AddressSpaceExhausted {
                capacity: SUBNET_CAPACITY,
                needed,
            });
        }

        // Stations take the low host numbers, the AP the next one, so the
        // first station / AP pair is always 10.1.1.1 -> 10.1.1.<n+1>.
        let mut stations = Vec::with_capacity(self.station_count);
        for i in 0..self.station_count {
            let address = host_address(i as u8 + 1);
            let id = engine.register_node(NodeRole::Station, address)?;
            stations.push(NodeHandle { id, address });
        }
        let ap_address = host_address(self.station_count as u8 + 1);
        let ap_id = engine.register_node(NodeRole::AccessPoint, ap_address)?;
        let access_point = NodeHandle {
            id: ap_id,
            address: ap_address,
        };

        engine.place_node(access_point.id, Position::origin())?;
        for (i, station) in stations.iter().enumerate() {
            let position = match self.placement {
                Placement::Grid { spacing } => {
                    Position::new((i as f64 + 1.0) * spacing, 0.0, 0.0)
                }
                Placement::Disc { radius } => {
                    let theta = rng.gen_range(0.0..TAU);
                    Position::new(radius * theta.cos(), radius * theta.sin(), 0.0)
                }
            };
            debug!(
                "station {} at ({:.2}, {:.2}), address {}",
                station.id, position.x, position.y, station.address
            );
            engine.place_node(station.id, position)?;
        }

        Ok(Topology {
            stations,
            access_point,
        })
    }
}

fn host_address(host: u8) -> Ipv4Addr {
    Ipv4Addr::new(SUBNET[0], SUBNET[1], SUBNET[2], host)
}
