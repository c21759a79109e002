// ROUTEVAL: Sweep Execution and Statistical Comparison of Routing Protocol Simulations
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Persistence of the sweep results: trial status, per-trial metrics, aggregate tables and
//! verdicts.

use std::{collections::BTreeMap, fs, path::PathBuf};

use routeval_utils::{other::get_timestamp, serde::keyed_map::KeyedMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    aggregate::{GroupKey, MetricStats},
    analysis::Analysis,
    analyzer::{Metric, TrialMetrics},
    records::{MetricsRecord, SummaryRecord, TrialRecord, VerdictRecord},
    util::PathBufExt,
};

pub const TRIALS_FILE: &str = "trials.csv";
pub const METRICS_FILE: &str = "aggregate_results.csv";
pub const STATISTICS_FILE: &str = "summary_statistics.json";
pub const VERDICTS_FILE: &str = "verdicts.csv";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Cannot write the report: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot write a CSV table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Cannot write the summary statistics: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receiver of the results of a sweep.
pub trait ReportSink {
    /// Status of every trial of the sweep.
    fn write_trials(&mut self, trials: &[TrialRecord]) -> Result<(), ReportError>;

    /// Metrics of every successful trial.
    fn write_metrics(&mut self, metrics: &[TrialMetrics]) -> Result<(), ReportError>;

    /// Aggregate tables and verdicts.
    fn write_analysis(&mut self, analysis: &Analysis) -> Result<(), ReportError>;
}

/// Statistics of one group in `summary_statistics.json`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GroupStatistics {
    pub sample_count: usize,
    pub metrics: BTreeMap<Metric, MetricStats>,
}

/// Content of `summary_statistics.json`: the aggregate table of every grouping dimension.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SummaryStatistics {
    pub generated: String,
    pub num_trials: usize,
    pub tables: BTreeMap<String, KeyedMap<GroupKey, GroupStatistics>>,
}

impl From<&Analysis> for SummaryStatistics {
    fn from(analysis: &Analysis) -> Self {
        let metrics = [
            Metric::Pdr,
            Metric::Throughput,
            Metric::Delay,
            Metric::TxPackets,
            Metric::RxPackets,
        ];
        let tables = analysis
            .tables
            .iter()
            .map(|table| {
                let groups = table
                    .records
                    .iter()
                    .map(|r| {
                        let stats = GroupStatistics {
                            sample_count: r.sample_count,
                            metrics: metrics
                                .iter()
                                .filter_map(|m| r.stats(*m).map(|s| (*m, *s)))
                                .collect(),
                        };
                        (r.key.clone(), stats)
                    })
                    .collect();
                (table.group_by.name(), groups)
            })
            .collect();
        Self {
            generated: get_timestamp(),
            num_trials: analysis.num_trials,
            tables,
        }
    }
}

/// Writes the report as CSV and JSON files into one directory. Existing files are overwritten.
#[derive(Clone, Debug)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.as_path().then(file)
    }

    fn write_csv<T: Serialize>(
        &self,
        file: &str,
        rows: impl IntoIterator<Item = T>,
    ) -> Result<(), ReportError> {
        let path = self.path(file);
        let mut csv = csv::Writer::from_path(&path)?;
        for row in rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        log::debug!("Written {path:?}");
        Ok(())
    }
}

impl ReportSink for FileSink {
    fn write_trials(&mut self, trials: &[TrialRecord]) -> Result<(), ReportError> {
        self.write_csv(TRIALS_FILE, trials)
    }

    fn write_metrics(&mut self, metrics: &[TrialMetrics]) -> Result<(), ReportError> {
        let mut rows = metrics.iter().map(MetricsRecord::from).collect::<Vec<_>>();
        rows.sort_by(|a, b| a.trial_id.cmp(&b.trial_id));
        self.write_csv(METRICS_FILE, rows)
    }

    fn write_analysis(&mut self, analysis: &Analysis) -> Result<(), ReportError> {
        for table in analysis.tables.iter() {
            let file = format!("summary_{}.csv", table.group_by.name());
            self.write_csv(&file, table.records.iter().map(SummaryRecord::from))?;
        }
        self.write_csv(
            VERDICTS_FILE,
            analysis.verdicts.iter().map(VerdictRecord::from),
        )?;

        let path = self.path(STATISTICS_FILE);
        let statistics = SummaryStatistics::from(analysis);
        fs::write(&path, serde_json::to_string_pretty(&statistics)?)?;
        log::info!("Written the summary statistics to {path:?}");
        Ok(())
    }
}
