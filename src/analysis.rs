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
//! Analysis stage: aggregate the metrics of a sweep along every grouping dimension and compare the
//! protocols of each table.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{aggregate, AggregateRecord, AggregationError, GroupBy},
    analyzer::TrialMetrics,
    compare::{compare_all, Tolerances, Verdict},
};

/// Aggregate table of one grouping dimension.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SummaryTable {
    pub group_by: GroupBy,
    pub records: Vec<AggregateRecord>,
}

/// Result of the analysis stage.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Analysis {
    /// Number of trials the analysis is based on.
    pub num_trials: usize,
    /// One table per grouping dimension, in the requested order.
    pub tables: Vec<SummaryTable>,
    /// Pairwise verdicts of all tables grouped by protocol.
    pub verdicts: Vec<Verdict>,
}

impl Analysis {
    pub fn table(&self, group_by: &GroupBy) -> Option<&SummaryTable> {
        self.tables.iter().find(|t| &t.group_by == group_by)
    }
}

/// Run the analysis. Fails with `NoValidData` if `metrics` is empty, such that a sweep without a
/// single successful trial does not produce an empty report.
pub fn analyze(
    metrics: &[TrialMetrics],
    group_by: &[GroupBy],
    tolerances: &Tolerances,
) -> Result<Analysis, AggregationError> {
    if metrics.is_empty() {
        let g = group_by.first().cloned().unwrap_or_else(|| GroupBy::new([]));
        return Err(AggregationError::NoValidData(g));
    }
    let mut tables = Vec::new();
    let mut verdicts = Vec::new();
    for g in group_by.iter().unique() {
        let records = aggregate(metrics, g)?;
        log::info!("Aggregated {} trials by {g} into {} groups", metrics.len(), records.len());
        let table_verdicts = compare_all(&records, tolerances);
        for verdict in table_verdicts.iter() {
            log::debug!("{verdict}");
        }
        verdicts.extend(table_verdicts);
        tables.push(SummaryTable {
            group_by: g.clone(),
            records,
        });
    }
    Ok(Analysis {
        num_trials: metrics.len(),
        tables,
        verdicts,
    })
}
