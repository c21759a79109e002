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
//! Parser for the free-text metric summary printed by the simulator, e.g.
//!
//! ```text
//! === aodv Results ===
//! Flows: 10
//! Packet Delivery Ratio: 97.5 %
//! Average Throughput: 8.2 kbps
//! Average End-to-End Delay: 12.3 ms
//! Total Tx Packets: 1600
//! Total Rx Packets: 1560
//! ```
//!
//! Only the labels in [`LABELS`] are interpreted. Every other line is ignored.

use lazy_static::lazy_static;
use regex::Regex;

use super::ParseError;
use crate::{analyzer::TrialMetrics, experiments::TrialSpec};

/// Field of `TrialMetrics` a label is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Pdr,
    Throughput,
    Delay,
    TxPackets,
    RxPackets,
    Flows,
}

/// Recognized labels. Matching is exact (after trimming), so `Average Jitter` does not end up in
/// the delay.
pub const LABELS: [(&str, Field); 8] = [
    ("Packet Delivery Ratio", Field::Pdr),
    ("Average Throughput", Field::Throughput),
    ("Average Delay", Field::Delay),
    ("Average End-to-End Delay", Field::Delay),
    ("Total Tx Packets", Field::TxPackets),
    ("Total Rx Packets", Field::RxPackets),
    ("Flows", Field::Flows),
    ("Total Flows", Field::Flows),
];

/// Unit suffixes that are stripped from values. `kbps` and `ms` must be checked before `s`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    Percent,
    Kbps,
    Mbps,
    Millis,
    Secs,
}

const UNITS: [(&str, Unit); 5] = [
    ("kbps", Unit::Kbps),
    ("Mbps", Unit::Mbps),
    ("ms", Unit::Millis),
    ("%", Unit::Percent),
    ("s", Unit::Secs),
];

/// Largest tolerated difference between a reported PDR and `rx / tx` before a warning is logged.
const PDR_TOLERANCE: f64 = 0.01;

lazy_static! {
    static ref METRIC_LINE: Regex =
        Regex::new(r"^\s*(?P<label>[^:]+?)\s*:\s*(?P<value>.*?)\s*$").unwrap();
}

/// Look up the field of a label.
pub fn field_of(label: &str) -> Option<Field> {
    LABELS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, field)| *field)
}

/// Parse the metric lines of `output`.
pub fn parse_log(spec: &TrialSpec, output: &str) -> Result<TrialMetrics, ParseError> {
    let mut metrics = TrialMetrics::empty(spec.clone());
    let mut seen: Vec<Field> = Vec::new();

    for (i, line) in output.lines().enumerate() {
        let Some(caps) = METRIC_LINE.captures(line) else {
            continue;
        };
        let Some(field) = field_of(&caps["label"]) else {
            continue;
        };
        if seen.contains(&field) {
            log::debug!(
                "Ignoring repeated {field:?} on line {} of trial {}",
                i + 1,
                spec.trial_id()
            );
            continue;
        }
        seen.push(field);

        let bad_value = |reason: &str| ParseError::BadValue {
            line: i + 1,
            content: line.to_string(),
            reason: reason.to_string(),
        };
        let (number, unit) = split_unit(&caps["value"]);

        match field {
            Field::Pdr => {
                let x = parse_real(number).ok_or_else(|| bad_value("not a number"))?;
                let pdr = match unit {
                    None => x,
                    Some(Unit::Percent) => x / 100.0,
                    Some(_) => return Err(bad_value("unexpected unit for a ratio")),
                };
                if pdr > 1.0 {
                    return Err(bad_value("PDR outside [0, 1]"));
                }
                metrics.pdr = Some(pdr);
            }
            Field::Throughput => {
                let x = parse_real(number).ok_or_else(|| bad_value("not a number"))?;
                metrics.throughput = Some(match unit {
                    None | Some(Unit::Mbps) => x,
                    Some(Unit::Kbps) => x / 1000.0,
                    Some(_) => return Err(bad_value("unexpected unit for a throughput")),
                });
            }
            Field::Delay => {
                let x = parse_real(number).ok_or_else(|| bad_value("not a number"))?;
                metrics.avg_delay = Some(match unit {
                    None | Some(Unit::Secs) => x,
                    Some(Unit::Millis) => x / 1000.0,
                    Some(_) => return Err(bad_value("unexpected unit for a delay")),
                });
            }
            Field::TxPackets | Field::RxPackets | Field::Flows => {
                if unit.is_some() {
                    return Err(bad_value("unexpected unit for a count"));
                }
                let x: u64 = number
                    .parse()
                    .map_err(|_| bad_value("not a non-negative integer"))?;
                match field {
                    Field::TxPackets => metrics.tx_packets = Some(x),
                    Field::RxPackets => metrics.rx_packets = Some(x),
                    _ => metrics.flows = Some(x as usize),
                }
            }
        }
    }

    if seen.is_empty() {
        return Err(ParseError::NoMetrics);
    }

    super::check_consistency(&metrics)?;

    match (metrics.pdr, metrics.delivery_ratio()) {
        (None, Some(derived)) => metrics.pdr = Some(derived),
        (Some(reported), Some(derived)) if (reported - derived).abs() > PDR_TOLERANCE => {
            log::warn!(
                "Trial {} reports a PDR of {reported:.4}, but rx/tx is {derived:.4}",
                spec.trial_id()
            );
        }
        _ => {}
    }

    for missing in metrics.missing_required() {
        log::debug!("Trial {} does not report {missing}", spec.trial_id());
    }

    Ok(metrics)
}

/// Split a value into its number and its (optional) unit suffix.
fn split_unit(value: &str) -> (&str, Option<Unit>) {
    for (suffix, unit) in UNITS {
        if let Some(number) = value.strip_suffix(suffix) {
            return (number.trim_end(), Some(unit));
        }
    }
    (value, None)
}

/// Parse a finite, non-negative real number.
fn parse_real(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|x| x.is_finite() && *x >= 0.0)
}
