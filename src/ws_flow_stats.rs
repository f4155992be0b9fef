//! Flow Statistics Collector: one-shot reduction of the engine's per-flow
//! counters into throughput figures.
//!
//! Invoked exactly once, after the run halts. The collector first instructs
//! the engine to reconcile in-flight packets so no flow is double-counted or
//! left ambiguous, then classifies each record by its address pair and
//! computes throughput.
//!
//! Throughput normalization: `rx_bytes * 8 / 9.0 / 1e6` megabits per second,
//! applied uniformly in both filter and aggregate mode. The 9.0 s window is
//! the stop time minus the typical jittered start, so startup jitter stays
//! out of the denominator.

use std::net::Ipv4Addr;

use indexmap::IndexMap;
use log::{debug, info};

use crate::ws_interface::{ExperimentError, FlowId, FlowRecord, NetworkEngine};

/// Fixed observation window used as the throughput denominator.
pub const OBSERVATION_WINDOW_SECS: f64 = 9.0;

/// Throughput of one flow in Mbit/s under the documented normalization.
pub fn throughput_mbps(rx_bytes: u64) -> f64 {
    rx_bytes as f64 * 8.0 / OBSERVATION_WINDOW_SECS / 1_000_000.0
}

// ============================================================================
// Selection modes
// ============================================================================

/// Which flow records take part in the reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSelection {
    /// Single fixed pair: only records matching this source/destination pair
    /// are selected. Zero matches is a configuration error, never a zero
    /// throughput.
    Pair {
        source: Ipv4Addr,
        destination: Ipv4Addr,
    },

    /// Multi-pair topology: every record is included and throughputs are
    /// summed.
    All,
}

// ============================================================================
// Results
// ============================================================================

/// Per-flow slice of the reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowThroughput {
    pub id: FlowId,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub rx_bytes: u64,
    pub mbps: f64,
}

/// Reduced result of one run: the selected flows and their summed throughput.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputSummary {
    pub flows: Vec<FlowThroughput>,
    pub total_mbps: f64,
}

// ============================================================================
// Collector
// ============================================================================

pub struct FlowStatsCollector {
    selection: FlowSelection,
}

impl FlowStatsCollector {
    pub fn new(selection: FlowSelection) -> Self {
        Self { selection }
    }

    /// Reconcile the engine's in-flight packets, then reduce its records.
    /// Reads engine state only; no other side effects.
    pub fn collect(
        &self,
        engine: &mut dyn NetworkEngine,
    ) -> Result<ThroughputSummary, ExperimentError> {
        engine.reconcile_in_flight();
        let summary = reduce(engine.flow_records(), self.selection)?;
        info!(
            "collected {} flow(s), total {:.4} Mbit/s",
            summary.flows.len(),
            summary.total_mbps
        );
        Ok(summary)
    }
}

/// Pure reduction over a set of flow records.
pub fn reduce(
    records: &IndexMap<FlowId, FlowRecord>,
    selection: FlowSelection,
) -> Result<ThroughputSummary, ExperimentError> {
    let mut flows = Vec::new();
    let mut total_mbps = 0.0;

    for (&id, record) in records {
        let tuple = record.five_tuple;
        let selected = match selection {
            FlowSelection::Pair {
                source,
                destination,
            } => tuple.source_addr == source && tuple.destination_addr == destination,
            FlowSelection::All => true,
        };
        if !selected {
            continue;
        }

        let mbps = throughput_mbps(record.rx_bytes);
        debug!(
            "flow {} ({} -> {}): tx {} pkts / {} B, rx {} pkts / {} B, {:.4} Mbit/s",
            id,
            tuple.source_addr,
            tuple.destination_addr,
            record.tx_packets,
            record.tx_bytes,
            record.rx_packets,
            record.rx_bytes,
            mbps
        );

        total_mbps += mbps;
        flows.push(FlowThroughput {
            id,
            source: tuple.source_addr,
            destination: tuple.destination_addr,
            rx_bytes: record.rx_bytes,
            mbps,
        });
    }

    if flows.is_empty() {
        if let FlowSelection::Pair {
            source,
            destination,
        } = selection
        {
            // A misconfigured address filter must surface, not read as zero.
            return Err(ExperimentError::FlowNotObserved {
                source,
                destination,
            });
        }
    }

    Ok(ThroughputSummary { flows, total_mbps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_interface::{FiveTuple, DESTINATION_PORT, PROTOCOL_UDP};

    fn addr(host: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 1, 1, host)
    }

    fn record(source: u8, destination: u8, rx_bytes: u64) -> FlowRecord {
        FlowRecord {
            five_tuple: FiveTuple {
                source_addr: addr(source),
                destination_addr: addr(destination),
                protocol: PROTOCOL_UDP,
                source_port: 49152,
                destination_port: DESTINATION_PORT,
            },
            tx_packets: rx_bytes / 1024 + 3,
            tx_bytes: rx_bytes + 3 * 1024,
            rx_packets: rx_bytes / 1024,
            rx_bytes,
        }
    }

    fn records(entries: &[(u8, u8, u64)]) -> IndexMap<FlowId, FlowRecord> {
        entries
            .iter()
            .enumerate()
            .map(|(i, &(s, d, rx))| (i as FlowId, record(s, d, rx)))
            .collect()
    }

    #[test]
    fn test_normalization_formula() {
        // 1_125_000 bytes * 8 = 9e6 bits over 9 s = 1e6 bit/s = 1 Mbit/s.
        assert_eq!(throughput_mbps(1_125_000), 1.0);
        assert_eq!(throughput_mbps(0), 0.0);
    }

    #[test]
    fn test_aggregate_equals_independent_sum() {
        let records = records(&[(1, 4, 2_048_000), (4, 2, 512_000), (3, 4, 1_024_000)]);
        let summary = reduce(&records, FlowSelection::All).unwrap();

        let expected: f64 = records.values().map(|r| throughput_mbps(r.rx_bytes)).sum();
        assert_eq!(summary.flows.len(), 3);
        assert!((summary.total_mbps - expected).abs() < 1e-12);
    }

    #[test]
    fn test_filter_returns_the_matching_flow_unmodified() {
        let records = records(&[(1, 2, 1_125_000), (2, 1, 9_000_000)]);
        let summary = reduce(
            &records,
            FlowSelection::Pair {
                source: addr(1),
                destination: addr(2),
            },
        )
        .unwrap();

        assert_eq!(summary.flows.len(), 1);
        assert_eq!(summary.total_mbps, 1.0);
        assert_eq!(summary.flows[0].rx_bytes, 1_125_000);
    }

    #[test]
    fn test_filter_with_zero_matches_is_an_error() {
        let records = records(&[(1, 2, 1_125_000)]);
        let err = reduce(
            &records,
            FlowSelection::Pair {
                source: addr(7),
                destination: addr(8),
            },
        );
        assert!(matches!(err, Err(ExperimentError::FlowNotObserved { .. })));
    }

    #[test]
    fn test_aggregate_over_no_records_is_zero_not_an_error() {
        let summary = reduce(&IndexMap::new(), FlowSelection::All).unwrap();
        assert!(summary.flows.is_empty());
        assert_eq!(summary.total_mbps, 0.0);
    }
}
