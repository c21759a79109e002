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
//! Pairwise comparison of two protocols at identical factor levels.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    aggregate::{AggregateRecord, GroupKey},
    analyzer::Metric,
};

/// Minimal absolute difference for a metric to decide a verdict, in the units of `TrialMetrics`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Tolerances {
    /// PDR ratio. The default of 0.001 equals 0.1 percentage points.
    pub pdr: f64,
    /// Mbps. The default of 0.0001 equals 0.1 kbps.
    pub throughput: f64,
    /// Seconds. The default of 0.0001 equals 0.1 ms.
    pub delay: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            pdr: 0.001,
            throughput: 0.0001,
            delay: 0.0001,
        }
    }
}

impl Tolerances {
    /// Use the same tolerance for every metric.
    pub fn uniform(eps: f64) -> Self {
        Self {
            pdr: eps,
            throughput: eps,
            delay: eps,
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Pdr => self.pdr,
            Metric::Throughput => self.throughput,
            Metric::Delay => self.delay,
            Metric::TxPackets | Metric::RxPackets => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Winner {
    Protocol(String),
    Tie,
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Winner::Protocol(p) => f.write_str(p),
            Winner::Tie => f.write_str("tie"),
        }
    }
}

/// Mean values of the deciding metrics of one side of a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ComparedValues {
    pub pdr: f64,
    pub throughput: f64,
    pub delay: f64,
}

impl ComparedValues {
    fn of(record: &AggregateRecord, protocol: &str) -> Result<Self, CompareError> {
        let mean = |metric: Metric| {
            record
                .mean(metric)
                .ok_or_else(|| CompareError::MissingMetric(protocol.to_string(), metric))
        };
        Ok(Self {
            pdr: mean(Metric::Pdr)?,
            throughput: mean(Metric::Throughput)?,
            delay: mean(Metric::Delay)?,
        })
    }

    /// Deciding metrics with the values of `self` and `other`, in the order in which they are
    /// considered.
    fn tiers(&self, other: &Self) -> [(Metric, f64, f64); 3] {
        [
            (Metric::Pdr, self.pdr, other.pdr),
            (Metric::Throughput, self.throughput, other.throughput),
            (Metric::Delay, self.delay, other.delay),
        ]
    }
}

/// Outcome of comparing two protocols at the factor levels in `key`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Verdict {
    /// Shared factor levels, without the protocol.
    pub key: GroupKey,
    pub protocol_a: String,
    pub protocol_b: String,
    pub winner: Winner,
    /// Metric that decided the verdict, `None` for a tie.
    pub decided_by: Option<Metric>,
    pub a: ComparedValues,
    pub b: ComparedValues,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} vs {}: {}",
            self.key, self.protocol_a, self.protocol_b, self.winner
        )?;
        if let Some(metric) = self.decided_by {
            write!(f, " (by {metric})")?;
        }
        Ok(())
    }
}

/// Violated preconditions of `compare`.
#[derive(Debug, Error, PartialEq)]
pub enum CompareError {
    #[error("Cannot compare records with different factor levels: [{0}] vs [{1}]")]
    MismatchedKeys(GroupKey, GroupKey),
    #[error("Cannot compare a record that is not grouped by protocol: [{0}]")]
    MissingProtocol(GroupKey),
    #[error("Cannot compare protocol {0} with itself")]
    SameProtocol(String),
    #[error("Protocol {0} has no mean {1}")]
    MissingMetric(String, Metric),
}

/// Compare the aggregates of two protocols. Both records must be grouped by protocol, be of
/// different protocols, and share all other factor levels. The winner does not depend on the
/// order of the arguments.
pub fn compare(
    a: &AggregateRecord,
    b: &AggregateRecord,
    tolerances: &Tolerances,
) -> Result<Verdict, CompareError> {
    let key = a.key.without_protocol();
    if key != b.key.without_protocol() {
        return Err(CompareError::MismatchedKeys(a.key.clone(), b.key.clone()));
    }
    let protocol_a = a
        .key
        .protocol
        .clone()
        .ok_or_else(|| CompareError::MissingProtocol(a.key.clone()))?;
    let protocol_b = b
        .key
        .protocol
        .clone()
        .ok_or_else(|| CompareError::MissingProtocol(b.key.clone()))?;
    if protocol_a == protocol_b {
        return Err(CompareError::SameProtocol(protocol_a));
    }
    let values_a = ComparedValues::of(a, &protocol_a)?;
    let values_b = ComparedValues::of(b, &protocol_b)?;

    let mut winner = Winner::Tie;
    let mut decided_by = None;
    for (metric, x, y) in values_a.tiers(&values_b) {
        let diff = (x - y).abs();
        // an exact tie never decides, even with a tolerance of 0.
        if diff == 0.0 || diff < tolerances.get(metric) {
            continue;
        }
        let a_wins = if metric.higher_is_better() { x > y } else { x < y };
        winner = Winner::Protocol(if a_wins {
            protocol_a.clone()
        } else {
            protocol_b.clone()
        });
        decided_by = Some(metric);
        break;
    }

    Ok(Verdict {
        key,
        protocol_a,
        protocol_b,
        winner,
        decided_by,
        a: values_a,
        b: values_b,
    })
}

/// Compare every pair of protocols that share the same factor levels. Pairs are ordered by key,
/// then by protocol name. Records without a protocol are skipped, as are pairs where one side
/// lacks a deciding metric.
pub fn compare_all(records: &[AggregateRecord], tolerances: &Tolerances) -> Vec<Verdict> {
    let mut groups: BTreeMap<GroupKey, Vec<&AggregateRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.key.protocol.is_some()) {
        groups
            .entry(record.key.without_protocol())
            .or_default()
            .push(record);
    }

    let mut verdicts = Vec::new();
    for (key, mut group) in groups {
        group.sort_by(|a, b| a.key.protocol.cmp(&b.key.protocol));
        for (a, b) in group.into_iter().tuple_combinations() {
            match compare(a, b, tolerances) {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => log::warn!("Skipping comparison at [{key}]: {e}"),
            }
        }
    }
    verdicts
}
