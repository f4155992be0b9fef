// Sweep schedule: the explicit iteration plan a results table is built from.
//
// A schedule enumerates sweep values (outer loop) and seeds (inner loop) and
// turns each pair into a RunPosition, so the reporter never has to infer its
// place in the table from sentinel values.

use serde::Deserialize;

use ws_rust::RunPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepVariant {
    /// One station, swept over AP distance (grid placement, fixed flow).
    Distance,
    /// Swept over station count (disc placement, randomized flows).
    StationCount,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Schedule file format, loaded from YAML.
#[derive(Debug, Deserialize)]
pub struct SweepSchedule {
    #[serde(default)]
    pub meta: ScheduleMeta,

    pub variant: SweepVariant,

    /// Sweep values, one table row each, in row order.
    pub values: Vec<f64>,

    /// Seeds, one table column each, in column order.
    #[serde(default = "default_seeds")]
    pub seeds: Vec<u64>,

    /// Use the CARA rate-adaptation algorithm instead of AARF.
    #[serde(default)]
    pub cara: bool,

    /// Enable Rayleigh fading.
    #[serde(default)]
    pub rayleigh: bool,

    /// Append-only output sink for the whole sweep.
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_seeds() -> Vec<u64> {
    (1..=5).collect()
}

fn default_output() -> String {
    "default.txt".to_string()
}

/// One run of the sweep, in execution order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRun {
    pub value: f64,
    pub seed: u64,
    pub position: RunPosition,
}

impl SweepSchedule {
    /// All runs of the sweep: values outer loop, seeds inner loop.
    pub fn runs(&self) -> Vec<SweepRun> {
        let rows = self.values.len();
        let cols = self.seeds.len();
        let mut runs = Vec::with_capacity(rows * cols);

        for (row, &value) in self.values.iter().enumerate() {
            for (col, &seed) in self.seeds.iter().enumerate() {
                runs.push(SweepRun {
                    value,
                    seed,
                    position: RunPosition {
                        row_index: row,
                        column_index: col,
                        is_first_in_row: col == 0,
                        is_last_in_row: col == cols - 1,
                        is_last_row: row == rows - 1,
                    },
                });
            }
        }

        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(values: Vec<f64>, seeds: Vec<u64>) -> SweepSchedule {
        SweepSchedule {
            meta: ScheduleMeta::default(),
            variant: SweepVariant::Distance,
            values,
            seeds,
            cara: false,
            rayleigh: false,
            output: default_output(),
        }
    }

    #[test]
    fn test_two_by_five_schedule_shape() {
        let runs = schedule(vec![5.0, 10.0], (1..=5).collect()).runs();
        assert_eq!(runs.len(), 10);

        assert!(runs[0].position.is_first_in_row);
        assert!(!runs[0].position.is_last_in_row);
        assert!(runs[4].position.is_last_in_row);
        assert!(!runs[4].position.is_last_row);
        assert!(runs[9].position.is_last_in_row);
        assert!(runs[9].position.is_last_row);

        // Values outer loop, seeds inner loop.
        assert_eq!(runs[3].value, 5.0);
        assert_eq!(runs[3].seed, 4);
        assert_eq!(runs[5].value, 10.0);
        assert_eq!(runs[5].seed, 1);
        assert_eq!(runs[5].position.row_index, 1);
        assert_eq!(runs[5].position.column_index, 0);
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = "variant: station_count\nvalues: [1, 16, 31, 46]\n";
        let schedule: SweepSchedule = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(schedule.variant, SweepVariant::StationCount);
        assert_eq!(schedule.seeds, vec![1, 2, 3, 4, 5]);
        assert_eq!(schedule.output, "default.txt");
        assert!(!schedule.cara && !schedule.rayleigh);
        assert_eq!(schedule.runs().len(), 20);
    }
}
