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
//! Aggregation of trial metrics over repeated trials, grouped by a selection of factors.

use std::collections::BTreeMap;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::{
    analyzer::{Metric, TrialMetrics},
    experiments::{TrafficLoad, TrialSpec},
};

/// Factor of the parameter space that trials can be grouped by.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Factor {
    Protocol,
    NodeCount,
    Speed,
    TrafficLoad,
    Seed,
}

/// Ordered set of factors to group by. Duplicates are dropped, keeping the first occurrence.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(from = "Vec<Factor>", into = "Vec<Factor>")]
pub struct GroupBy(Vec<Factor>);

impl GroupBy {
    pub fn new(factors: impl IntoIterator<Item = Factor>) -> Self {
        Self(factors.into_iter().unique().collect())
    }

    pub fn factors(&self) -> &[Factor] {
        &self.0
    }

    pub fn contains(&self, factor: Factor) -> bool {
        self.0.contains(&factor)
    }

    /// Name usable in file names, e.g. `protocol_x_node_count`, or `all` for the empty grouping.
    pub fn name(&self) -> String {
        if self.0.is_empty() {
            "all".to_string()
        } else {
            self.0.iter().join("_x_")
        }
    }

    /// Project a trial onto the grouping factors.
    pub fn key_of(&self, spec: &TrialSpec) -> GroupKey {
        let mut key = GroupKey::default();
        for factor in self.0.iter() {
            match factor {
                Factor::Protocol => key.protocol = Some(spec.protocol.clone()),
                Factor::NodeCount => key.node_count = Some(spec.node_count),
                Factor::Speed => key.speed = Some(spec.speed),
                Factor::TrafficLoad => key.traffic_load = Some(spec.traffic_load),
                Factor::Seed => key.seed = Some(spec.seed),
            }
        }
        key
    }
}

impl From<Vec<Factor>> for GroupBy {
    fn from(factors: Vec<Factor>) -> Self {
        Self::new(factors)
    }
}

impl From<GroupBy> for Vec<Factor> {
    fn from(group_by: GroupBy) -> Self {
        group_by.0
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("all")
        } else {
            write!(f, "{}", self.0.iter().join(" x "))
        }
    }
}

/// Levels of the grouping factors shared by all members of a group. Factors that are not part of
/// the grouping are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct GroupKey {
    pub protocol: Option<String>,
    pub node_count: Option<u32>,
    pub speed: Option<OrderedFloat<f64>>,
    pub traffic_load: Option<TrafficLoad>,
    pub seed: Option<u64>,
}

impl GroupKey {
    /// The same key with the protocol removed, i.e., the factor levels two protocols are compared
    /// at.
    pub fn without_protocol(&self) -> GroupKey {
        GroupKey {
            protocol: None,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(p) = &self.protocol {
            parts.push(format!("protocol={p}"));
        }
        if let Some(n) = self.node_count {
            parts.push(format!("nodes={n}"));
        }
        if let Some(s) = self.speed {
            parts.push(format!("speed={s}"));
        }
        if let Some(t) = self.traffic_load {
            parts.push(format!("traffic={t}"));
        }
        if let Some(s) = self.seed {
            parts.push(format!("seed={s}"));
        }
        if parts.is_empty() {
            f.write_str("all")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Mean and sample standard deviation of one metric within a group.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct MetricStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator), 0 for a single sample.
    pub std: f64,
    /// Number of trials that reported the metric.
    pub count: usize,
}

impl MetricStats {
    /// Compute the statistics of `samples`, or `None` if there are none. The result does not
    /// depend on the order of the samples.
    pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(f64::total_cmp);
        let count = samples.len();
        let all_equal = samples.first() == samples.last();
        let mean = if all_equal {
            samples[0]
        } else {
            samples.iter().mean()
        };
        let std = if count == 1 || all_equal {
            0.0
        } else {
            samples.iter().std_dev()
        };
        Some(Self { mean, std, count })
    }
}

/// Aggregated metrics of one group.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AggregateRecord {
    pub key: GroupKey,
    /// Number of trials in the group. Always at least 1.
    pub sample_count: usize,
    pub pdr: Option<MetricStats>,
    pub throughput: Option<MetricStats>,
    pub delay: Option<MetricStats>,
    pub tx_packets: Option<MetricStats>,
    pub rx_packets: Option<MetricStats>,
}

impl AggregateRecord {
    pub fn stats(&self, metric: Metric) -> Option<&MetricStats> {
        match metric {
            Metric::Pdr => self.pdr.as_ref(),
            Metric::Throughput => self.throughput.as_ref(),
            Metric::Delay => self.delay.as_ref(),
            Metric::TxPackets => self.tx_packets.as_ref(),
            Metric::RxPackets => self.rx_packets.as_ref(),
        }
    }

    /// Mean of `metric`, if any trial of the group reported it.
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        self.stats(metric).map(|s| s.mean)
    }

    fn from_group(key: GroupKey, members: &[&TrialMetrics]) -> Self {
        let stats = |metric: Metric| {
            MetricStats::from_samples(members.iter().filter_map(|m| m.get(metric)).collect())
        };
        Self {
            key,
            sample_count: members.len(),
            pdr: stats(Metric::Pdr),
            throughput: stats(Metric::Throughput),
            delay: stats(Metric::Delay),
            tx_packets: stats(Metric::TxPackets),
            rx_packets: stats(Metric::RxPackets),
        }
    }
}

#[derive(Debug, Error)]
pub enum AggregationError {
    /// Not a single trial produced metrics.
    #[error(
        "No valid data to aggregate by {0}: every trial failed to execute or to parse. \
         Check trials.csv in the output directory for the reason of each failure."
    )]
    NoValidData(GroupBy),
}

/// Group `metrics` by `group_by` and compute the statistics of every group. Records are sorted by
/// their key, and do not depend on the order of `metrics`.
pub fn aggregate(
    metrics: &[TrialMetrics],
    group_by: &GroupBy,
) -> Result<Vec<AggregateRecord>, AggregationError> {
    if metrics.is_empty() {
        return Err(AggregationError::NoValidData(group_by.clone()));
    }

    let incomplete = metrics
        .iter()
        .filter(|m| !m.missing_required().is_empty())
        .count();
    if incomplete > 0 {
        log::warn!(
            "{incomplete} of {} trials miss at least one of {} and only contribute the metrics they report",
            metrics.len(),
            Metric::REQUIRED.iter().join(", ")
        );
    }

    let mut groups: BTreeMap<GroupKey, Vec<&TrialMetrics>> = BTreeMap::new();
    for m in metrics {
        groups.entry(group_by.key_of(&m.spec)).or_default().push(m);
    }

    Ok(groups
        .into_iter()
        .map(|(key, members)| AggregateRecord::from_group(key, &members))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    fn trial(protocol: &str, nodes: u32, seed: u64, pdr: f64, throughput: f64) -> TrialMetrics {
        TrialMetrics {
            pdr: Some(pdr),
            throughput: Some(throughput),
            avg_delay: Some(0.5),
            tx_packets: Some(100),
            rx_packets: Some((pdr * 100.0) as u64),
            ..TrialMetrics::empty(TrialSpec::new(
                protocol,
                nodes,
                0.0,
                TrafficLoad::Low,
                seed,
            ))
        }
    }

    #[test]
    fn single_sample_has_zero_std() {
        let records = aggregate(&[trial("x", 10, 1, 0.75, 2.0)], &GroupBy::new([Factor::Protocol]))
            .unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.sample_count, 1);
        for metric in [
            Metric::Pdr,
            Metric::Throughput,
            Metric::Delay,
            Metric::TxPackets,
            Metric::RxPackets,
        ] {
            let stats = r.stats(metric).unwrap();
            assert_eq!(stats.std, 0.0);
            assert_eq!(stats.count, 1);
        }
        assert_eq!(r.mean(Metric::Pdr), Some(0.75));
    }

    #[test]
    fn identical_samples() {
        let metrics = (1..=7)
            .map(|seed| trial("x", 10, seed, 0.3, 1.1))
            .collect::<Vec<_>>();
        let records = aggregate(&metrics, &GroupBy::new([Factor::Protocol])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sample_count, 7);
        assert_eq!(records[0].mean(Metric::Pdr), Some(0.3));
        assert_eq!(records[0].mean(Metric::Throughput), Some(1.1));
        assert_eq!(records[0].pdr.unwrap().std, 0.0);
        assert_eq!(records[0].throughput.unwrap().std, 0.0);
    }

    #[test]
    fn mean_and_sample_std() {
        let metrics = vec![
            trial("x", 10, 1, 1.0, 2.0),
            trial("x", 10, 2, 1.0, 4.0),
            trial("x", 10, 3, 0.9, 6.0),
        ];
        let records = aggregate(&metrics, &GroupBy::new([Factor::Protocol, Factor::NodeCount]))
            .unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.key.protocol.as_deref(), Some("x"));
        assert_eq!(r.key.node_count, Some(10));
        assert_eq!(r.key.seed, None);
        assert_eq!(r.sample_count, 3);
        assert!((r.mean(Metric::Pdr).unwrap() - 0.9667).abs() < 1e-3);
        assert!((r.mean(Metric::Throughput).unwrap() - 4.0).abs() < 1e-12);
        assert!((r.throughput.unwrap().std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn grouping_is_independent_of_input_order() {
        let mut metrics = vec![
            trial("x", 10, 1, 0.1, 0.7),
            trial("y", 10, 1, 0.2, 0.3),
            trial("x", 20, 1, 0.3, 0.1),
            trial("x", 10, 2, 0.7, 0.2),
            trial("y", 20, 2, 0.9, 0.9),
            trial("x", 10, 3, 0.6, 0.4),
        ];
        let group_by = GroupBy::new([Factor::Protocol]);
        let forward = aggregate(&metrics, &group_by).unwrap();
        metrics.reverse();
        let backward = aggregate(&metrics, &group_by).unwrap();
        metrics.swap(0, 3);
        let shuffled = aggregate(&metrics, &group_by).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].sample_count, 4);
        assert_eq!(forward[1].sample_count, 2);
    }

    #[test]
    fn missing_metrics_do_not_count_as_zero() {
        let mut partial = trial("x", 10, 2, 0.5, 1.0);
        partial.throughput = None;
        let metrics = vec![trial("x", 10, 1, 0.5, 3.0), partial];
        let records = aggregate(&metrics, &GroupBy::new([Factor::Protocol])).unwrap();
        assert_eq!(records[0].sample_count, 2);
        assert_eq!(records[0].throughput.unwrap().count, 1);
        assert_eq!(records[0].mean(Metric::Throughput), Some(3.0));
        assert_eq!(records[0].pdr.unwrap().count, 2);
    }

    #[test]
    fn no_data() {
        let res = aggregate(&[], &GroupBy::new([Factor::Protocol]));
        assert!(matches!(res, Err(AggregationError::NoValidData(_))));
    }

    #[test]
    fn group_by_names() {
        let g = GroupBy::new([Factor::Protocol, Factor::Speed, Factor::Protocol]);
        assert_eq!(g.factors(), &[Factor::Protocol, Factor::Speed]);
        assert_eq!(g.name(), "protocol_x_speed");
        assert_eq!(g.to_string(), "protocol x speed");
        assert_eq!(GroupBy::new([]).name(), "all");
        let g: GroupBy = serde_json::from_str(r#"["protocol", "node_count"]"#).unwrap();
        assert_eq!(g, GroupBy::new([Factor::Protocol, Factor::NodeCount]));
    }
}
