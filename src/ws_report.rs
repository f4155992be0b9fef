//! Run Reporter: appends one result fragment per run to a persistent sink.
//!
//! The output is a comma-separated table: one row per sweep value, one column
//! per seed, with the sweep value as a leading field. Row and column
//! decisions are driven by an explicit [`RunPosition`] instead of sentinel
//! seed/sweep literals, so the formatting logic does not need to know the
//! external iteration order.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::ws_interface::ExperimentError;

// ============================================================================
// Run position
// ============================================================================

/// Where one run sits inside a sweep table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPosition {
    /// Index of the sweep value within the schedule. Only meaningful when
    /// positions come from a schedule; the seed-derived form reports 0.
    pub row_index: usize,

    /// Index of the seed within the row.
    pub column_index: usize,

    /// First column of its row: emit the row prefix (newline + sweep value).
    pub is_first_in_row: bool,

    /// Last column of its row: no trailing separator.
    pub is_last_in_row: bool,

    /// The row for the schedule's final sweep value. The table's trailing
    /// newline is written only at the end of this row.
    pub is_last_row: bool,
}

/// Explicit configuration replacing the original sentinel literals
/// (`seed == 1`, `seed != 5`, sweep value at its maximum).
///
/// The external driver is assumed to iterate sweep values outer-loop and
/// seeds `first_seed..=last_seed` inner-loop; this layout recovers a
/// [`RunPosition`] from `(seed, sweep value)` alone for single-process
/// invocations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepLayout {
    pub first_seed: u64,
    pub last_seed: u64,
    /// Sweep value whose row completes the table.
    pub final_value: f64,
}

impl SweepLayout {
    /// Layout of the distance sweep: seeds 1..=5, last distance 100 m.
    pub fn distance_default() -> Self {
        Self {
            first_seed: 1,
            last_seed: 5,
            final_value: 100.0,
        }
    }

    /// Layout of the station-count sweep: seeds 1..=5, last count 46.
    pub fn station_default() -> Self {
        Self {
            first_seed: 1,
            last_seed: 5,
            final_value: 46.0,
        }
    }

    pub fn position(&self, seed: u64, sweep_value: f64) -> RunPosition {
        RunPosition {
            row_index: 0,
            column_index: seed.saturating_sub(self.first_seed) as usize,
            is_first_in_row: seed == self.first_seed,
            is_last_in_row: seed == self.last_seed,
            is_last_row: sweep_value == self.final_value,
        }
    }
}

// ============================================================================
// Reporter
// ============================================================================

pub struct RunReporter {
    path: PathBuf,
}

impl RunReporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one fragment for a run. The fragment is formatted into a
    /// buffer first and written with a single call, so a run's contribution
    /// to the sink is all-or-nothing.
    pub fn append(
        &self,
        sweep_value: f64,
        throughput_mbps: f64,
        position: &RunPosition,
    ) -> Result<(), ExperimentError> {
        let fragment = format_fragment(sweep_value, throughput_mbps, position);
        debug!("appending {:?} to {}", fragment, self.path.display());

        self.write_fragment(fragment.as_bytes())
            .map_err(|source| ExperimentError::Report {
                path: self.path.clone(),
                source,
            })
    }

    fn write_fragment(&self, fragment: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(fragment)?;
        file.flush()
    }
}

/// Fragment grammar: a row begins with a newline and its sweep value, every
/// fragment carries the throughput, non-final columns get a trailing
/// separator, and the table's last row is closed with a newline.
fn format_fragment(sweep_value: f64, throughput_mbps: f64, position: &RunPosition) -> String {
    let mut fragment = String::new();
    if position.is_first_in_row {
        fragment.push('\n');
        fragment.push_str(&format!("{}, ", sweep_value));
    }
    fragment.push_str(&format!("{}", throughput_mbps));
    if !position.is_last_in_row {
        fragment.push_str(", ");
    } else if position.is_last_row {
        fragment.push('\n');
    }
    fragment
}
