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
//! Module that turns the raw output of a trial into normalized `TrialMetrics`.
//!
//! Two shapes of output are understood: the per-flow CSV table the simulator writes next to its
//! configuration ([`flow_table`]), and the free-text summary it prints ([`log_parser`]). The table
//! takes precedence when both exist. All failures are returned as `ParseError`, so one bad trial
//! never aborts the sweep.

use std::path::PathBuf;

use thiserror::Error;

use crate::experiments::{RawOutput, TrialSpec};

pub mod flow_table;
pub mod log_parser;
mod result;

pub use result::*;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The flow table has a header but no rows.
    #[error("The flow table contains no flows")]
    NoFlows,
    /// A value could not be converted into a number of the expected unit.
    #[error("Bad value on line {line} ({reason}): {content:?}")]
    BadValue {
        line: usize,
        content: String,
        reason: String,
    },
    /// A column required to compute the metrics is missing in the flow table.
    #[error("The flow table has no column {0:?}")]
    MissingColumn(String),
    /// More packets were received than transmitted.
    #[error("Received more packets ({rx}) than transmitted ({tx})")]
    Inconsistent { tx: u64, rx: u64 },
    /// The text output does not contain a single recognized metric.
    #[error("The output contains no recognized metric")]
    NoMetrics,
    #[error("Malformed flow table: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Short name of the failure kind, as written to the trial status table.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFlows => "no_flows",
            Self::BadValue { .. } => "bad_value",
            Self::MissingColumn(_) => "missing_column",
            Self::Inconsistent { .. } => "inconsistent",
            Self::NoMetrics => "no_metrics",
            Self::Csv(_) => "malformed_table",
            Self::Io(_) => "io_error",
        }
    }
}

/// Parse the raw output of a successful trial.
pub fn parse_output(spec: &TrialSpec, raw: &RawOutput) -> Result<TrialMetrics, ParseError> {
    match &raw.artifact {
        Some(path) => flow_table::parse_flow_file(spec, path),
        None => log_parser::parse_log(spec, &raw.stdout),
    }
}

/// Reference to the artifact the metrics of `raw` are read from, for error messages.
pub fn artifact_name(spec: &TrialSpec, raw: &RawOutput) -> PathBuf {
    raw.artifact
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("<stdout of {}>", spec.trial_id())))
}

/// Check the invariants shared by both parsers.
fn check_consistency(metrics: &TrialMetrics) -> Result<(), ParseError> {
    if let (Some(tx), Some(rx)) = (metrics.tx_packets, metrics.rx_packets) {
        if rx > tx {
            return Err(ParseError::Inconsistent { tx, rx });
        }
    }
    Ok(())
}
