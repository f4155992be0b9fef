//! Core vocabulary types shared across the experiment driver, plus the
//! boundary trait for the external Network Simulation Engine.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use indexmap::IndexMap;
use thiserror::Error;

// ============================================================================
// Time and traffic constants
// ============================================================================

/// Simulated time in seconds.
pub type SimTime = f64;

/// Flow identifier assigned by the engine at install time.
pub type FlowId = u32;

/// Shared destination port for every installed flow. The collector tells
/// flows apart by their address pair, not by port.
pub const DESTINATION_PORT: u16 = 8000;

/// Simulation horizon shared by all flows.
pub const STOP_TIME: SimTime = 10.0;

/// Flow start times are jittered uniformly over `[0, this)` so flows do not
/// start in lockstep.
pub const START_JITTER_WINDOW: SimTime = 0.1;

/// Constant bit rate of each flow: 20 Mib/s.
pub const CBR_RATE_BPS: f64 = 20.0 * 1024.0 * 1024.0;

/// Packet size used by the constant-bit-rate sender.
pub const CBR_PACKET_SIZE: u32 = 1024;

/// UDP protocol number carried in the five-tuple.
pub const PROTOCOL_UDP: u8 = 17;

// ============================================================================
// Nodes
// ============================================================================

/// Engine-assigned node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node in the infrastructure topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Station,
    AccessPoint,
}

/// A point in the engine's coordinate space, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Euclidean distance to another position.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ============================================================================
// Channel configuration
// ============================================================================

/// Rate-adaptation algorithm selected by name on the engine. Opaque to the
/// core; only the selection is ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAdaptation {
    Aarf,
    Cara,
}

impl fmt::Display for RateAdaptation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateAdaptation::Aarf => write!(f, "AARF"),
            RateAdaptation::Cara => write!(f, "CARA"),
        }
    }
}

/// Fading applied on top of the engine's distance-based loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadingModel {
    None,
    /// Nakagami with m0 = m1 = m2 = 1, i.e. Rayleigh.
    Rayleigh,
}

impl fmt::Display for FadingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FadingModel::None => write!(f, "None"),
            FadingModel::Rayleigh => write!(f, "Rayleigh"),
        }
    }
}

/// Channel and MAC behavior handed to the engine before the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub fading: FadingModel,
    pub rate_adaptation: RateAdaptation,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            fading: FadingModel::None,
            rate_adaptation: RateAdaptation::Aarf,
        }
    }
}

// ============================================================================
// Flows
// ============================================================================

/// A directed constant-bit-rate traffic relation, immutable once installed.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub source: NodeId,
    pub destination: NodeId,
    pub source_addr: Ipv4Addr,
    pub destination_addr: Ipv4Addr,
    pub destination_port: u16,
    pub start: SimTime,
    pub stop: SimTime,
    pub rate_bps: f64,
    pub packet_size: u32,
}

/// Classification key the engine reports for each observed flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub source_addr: Ipv4Addr,
    pub destination_addr: Ipv4Addr,
    pub protocol: u8,
    pub source_port: u16,
    pub destination_port: u16,
}

/// Post-run counters for one observed flow. Owned by the engine, read-only
/// to the core, and only valid once the run has halted and in-flight packets
/// have been reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord {
    pub five_tuple: FiveTuple,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
}

// ============================================================================
// Engine boundary
// ============================================================================

/// Errors surfaced by the Network Simulation Engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    #[error("node {0} was never placed by the mobility subsystem")]
    NodeNotPlaced(NodeId),

    #[error("address {address} is already assigned to another node")]
    DuplicateAddress { address: Ipv4Addr },

    #[error("address {destination} is not reachable from {source}")]
    UnreachableAddress {
        // `r#` keeps thiserror from inferring this field as the error source.
        r#source: Ipv4Addr,
        destination: Ipv4Addr,
    },

    #[error("engine already ran to completion")]
    RunCompleted,
}

/// Contract required from the external Network Simulation Engine.
///
/// The core configures the engine (nodes, positions, channel, flows,
/// observers), blocks on `run_to_completion`, and afterwards reads the
/// per-flow counters. Everything between install and halt is the engine's
/// business: PHY, propagation, MAC and the discrete-event scheduler are not
/// modeled here.
pub trait NetworkEngine {
    /// Register a node with its role and network address. Addresses must be
    /// pairwise distinct.
    fn register_node(&mut self, role: NodeRole, address: Ipv4Addr) -> Result<NodeId, EngineError>;

    /// Register a node's spatial placement with the mobility subsystem.
    fn place_node(&mut self, node: NodeId, position: Position) -> Result<(), EngineError>;

    /// Select channel fading and the rate-adaptation algorithm.
    fn configure_channel(&mut self, config: ChannelConfig);

    /// Install a sender on the flow's source node and a receiver on its
    /// destination node, scheduled for the flow's start/stop times.
    fn install_flow(&mut self, flow: Flow) -> Result<FlowId, EngineError>;

    /// Schedule a periodic position trace for a node. Observers are owned by
    /// the engine and cancelled when the run ends.
    fn schedule_position_observer(
        &mut self,
        node: NodeId,
        interval: SimTime,
    ) -> Result<(), EngineError>;

    /// Run the bounded simulation; blocks until the simulated clock reaches
    /// `stop` or no events remain. A run always proceeds to its stop time
    /// once started; a second call is an error.
    fn run_to_completion(&mut self, stop: SimTime) -> Result<(), EngineError>;

    /// Mark every in-flight packet definitively lost or delivered. Counters
    /// are not observable until this has been called.
    fn reconcile_in_flight(&mut self);

    /// Per-flow counters, indexed by flow id in install order. Empty until
    /// `reconcile_in_flight` has folded the run's pending counters.
    fn flow_records(&self) -> &IndexMap<FlowId, FlowRecord>;
}

// ============================================================================
// Driver-level errors
// ============================================================================

/// Errors raised by the experiment driver itself. Configuration problems are
/// detected before the engine starts; nothing is written to the results sink
/// on any error path.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("station count must be at least 1, got {0}")]
    InvalidStationCount(usize),

    #[error("subnet can address at most {capacity} nodes, topology needs {needed}")]
    AddressSpaceExhausted { capacity: usize, needed: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no flow record matches {source} -> {destination}")]
    FlowNotObserved {
        // `r#` keeps thiserror from inferring this field as the error source.
        r#source: Ipv4Addr,
        destination: Ipv4Addr,
    },

    #[error("failed to append results to {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_distance() {
        let a = Position::origin();
        let b = Position::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_channel_defaults_match_original_cli_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.fading, FadingModel::None);
        assert_eq!(config.rate_adaptation, RateAdaptation::Aarf);
    }

    #[test]
    fn test_error_messages_name_the_addresses() {
        let err = ExperimentError::FlowNotObserved {
            source: Ipv4Addr::new(10, 1, 1, 1),
            destination: Ipv4Addr::new(10, 1, 1, 2),
        };
        assert_eq!(
            err.to_string(),
            "no flow record matches 10.1.1.1 -> 10.1.1.2"
        );
    }
}
