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
//! Parser for the structured per-flow table written by the simulator.

use std::{fs, io, path::Path};

use itertools::Itertools;

use super::ParseError;
use crate::{analyzer::TrialMetrics, experiments::TrialSpec, records::FlowRecord};

/// Columns without which a table cannot be rolled up into `TrialMetrics`.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "TxPackets",
    "RxPackets",
    "TxBytes",
    "RxBytes",
    "Throughput",
    "PDR",
    "AvgDelay",
];

/// Parse the flow table stored at `path`.
pub fn parse_flow_file(spec: &TrialSpec, path: &Path) -> Result<TrialMetrics, ParseError> {
    let file = fs::File::open(path)?;
    parse_flow_table(spec, file)
}

/// Parse a flow table and roll all flows up into one `TrialMetrics`: throughput, delay and PDR
/// are averaged over flows, packet and byte counts are summed.
pub fn parse_flow_table<R: io::Read>(
    spec: &TrialSpec,
    reader: R,
) -> Result<TrialMetrics, ParseError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|col| !headers.iter().any(|h| h == **col))
    {
        return Err(ParseError::MissingColumn(missing.to_string()));
    }

    let mut flows: Vec<FlowRecord> = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or_default();
        let bad_value = |reason: String| ParseError::BadValue {
            line,
            content: record.iter().join(","),
            reason,
        };
        let flow: FlowRecord = record
            .deserialize(Some(&headers))
            .map_err(|e| bad_value(e.to_string()))?;
        if let Some(column) = flow.non_finite_column() {
            return Err(bad_value(format!("{column} is not a finite number")));
        }
        if !(0.0..=1.0).contains(&flow.pdr) {
            return Err(bad_value(format!("PDR {} outside [0, 1]", flow.pdr)));
        }
        flows.push(flow);
    }

    if flows.is_empty() {
        return Err(ParseError::NoFlows);
    }

    let n = flows.len() as f64;
    let mean = |f: fn(&FlowRecord) -> f64| flows.iter().map(f).sum::<f64>() / n;
    let sum = |f: fn(&FlowRecord) -> u64| flows.iter().map(f).sum::<u64>();

    let metrics = TrialMetrics {
        throughput: Some(mean(|f| f.throughput)),
        avg_delay: Some(mean(|f| f.avg_delay)),
        pdr: Some(mean(|f| f.pdr)),
        tx_packets: Some(sum(|f| f.tx_packets)),
        rx_packets: Some(sum(|f| f.rx_packets)),
        tx_bytes: Some(sum(|f| f.tx_bytes)),
        rx_bytes: Some(sum(|f| f.rx_bytes)),
        flows: Some(flows.len()),
        successful_flows: Some(flows.iter().filter(|f| f.pdr > 0.0).count()),
        ..TrialMetrics::empty(spec.clone())
    };

    super::check_consistency(&metrics)?;
    Ok(metrics)
}
