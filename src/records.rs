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
//! Module defining record data types to (de-)serialize flow tables, trial metrics, aggregates and
//! verdicts to CSV.
use std::net::IpAddr;

use serde::{de::IntoDeserializer, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    aggregate::{AggregateRecord, GroupKey, MetricStats},
    analyzer::{Metric, TrialMetrics},
    compare::Verdict,
    experiments::{TrafficLoad, TrialSpec},
};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// One flow of a structured simulator output table.
pub struct FlowRecord {
    #[serde(rename = "FlowId", default)]
    pub flow_id: Option<u64>,
    #[serde(rename = "SourceIP", default)]
    pub source: Option<IpAddr>,
    #[serde(rename = "DestIP", default)]
    pub destination: Option<IpAddr>,
    #[serde(rename = "TxPackets")]
    pub tx_packets: u64,
    #[serde(rename = "RxPackets")]
    pub rx_packets: u64,
    #[serde(rename = "TxBytes")]
    pub tx_bytes: u64,
    #[serde(rename = "RxBytes")]
    pub rx_bytes: u64,
    /// Sum of the delays of all received packets, in seconds.
    #[serde(rename = "DelaySum", default)]
    pub delay_sum: Option<f64>,
    /// Mbps
    #[serde(rename = "Throughput")]
    pub throughput: f64,
    /// Ratio in \[0, 1\], written as 0 by the simulator if nothing was sent.
    #[serde(rename = "PDR")]
    pub pdr: f64,
    /// Seconds
    #[serde(rename = "AvgDelay")]
    pub avg_delay: f64,
}

impl FlowRecord {
    /// Name of the first column that holds NaN or infinity.
    pub fn non_finite_column(&self) -> Option<&'static str> {
        [
            ("DelaySum", self.delay_sum.unwrap_or_default()),
            ("Throughput", self.throughput),
            ("PDR", self.pdr),
            ("AvgDelay", self.avg_delay),
        ]
        .into_iter()
        .find(|(_, x)| !x.is_finite())
        .map(|(col, _)| col)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// Status of one trial of the sweep, as written to `trials.csv`.
pub struct TrialRecord {
    pub trial_id: String,
    pub protocol: String,
    pub node_count: u32,
    pub speed: f64,
    pub traffic_load: TrafficLoad,
    pub seed: u64,
    pub success: bool,
    /// Kind of the failure, e.g. `timeout` or `bad_value`.
    pub failure: Option<String>,
    pub message: Option<String>,
    /// Seconds spent executing the trial, 0 if it was not executed in this run.
    pub wall_time: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// Metrics of one successful trial, as written to `aggregate_results.csv`.
pub struct MetricsRecord {
    pub trial_id: String,
    pub protocol: String,
    pub node_count: u32,
    pub speed: f64,
    pub traffic_load: TrafficLoad,
    pub seed: u64,
    pub pdr: Option<f64>,
    pub throughput: Option<f64>,
    pub avg_delay: Option<f64>,
    pub tx_packets: Option<u64>,
    pub rx_packets: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub rx_bytes: Option<u64>,
    pub flows: Option<usize>,
    pub successful_flows: Option<usize>,
    /// Required metrics the trial did not report.
    #[serde(serialize_with = "serialize_list", deserialize_with = "deserialize_list")]
    pub missing: Vec<Metric>,
}

impl From<&TrialMetrics> for MetricsRecord {
    fn from(m: &TrialMetrics) -> Self {
        let TrialSpec {
            protocol,
            node_count,
            speed,
            traffic_load,
            seed,
        } = m.spec.clone();
        Self {
            trial_id: m.spec.trial_id(),
            protocol,
            node_count,
            speed: speed.into_inner(),
            traffic_load,
            seed,
            pdr: m.pdr,
            throughput: m.throughput,
            avg_delay: m.avg_delay,
            tx_packets: m.tx_packets,
            rx_packets: m.rx_packets,
            tx_bytes: m.tx_bytes,
            rx_bytes: m.rx_bytes,
            flows: m.flows,
            successful_flows: m.successful_flows,
            missing: m.missing_required(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// One group of an aggregate table, as written to `summary_<dims>.csv`. Factors that are not part
/// of the grouping are left empty.
pub struct SummaryRecord {
    pub protocol: Option<String>,
    pub node_count: Option<u32>,
    pub speed: Option<f64>,
    pub traffic_load: Option<TrafficLoad>,
    pub seed: Option<u64>,
    pub sample_count: usize,
    pub pdr_mean: Option<f64>,
    pub pdr_std: Option<f64>,
    pub throughput_mean: Option<f64>,
    pub throughput_std: Option<f64>,
    pub delay_mean: Option<f64>,
    pub delay_std: Option<f64>,
    pub tx_packets_mean: Option<f64>,
    pub tx_packets_std: Option<f64>,
    pub rx_packets_mean: Option<f64>,
    pub rx_packets_std: Option<f64>,
}

impl From<&AggregateRecord> for SummaryRecord {
    fn from(r: &AggregateRecord) -> Self {
        let mean = |s: &Option<MetricStats>| s.map(|s| s.mean);
        let std = |s: &Option<MetricStats>| s.map(|s| s.std);
        let GroupKey {
            protocol,
            node_count,
            speed,
            traffic_load,
            seed,
        } = r.key.clone();
        Self {
            protocol,
            node_count,
            speed: speed.map(|s| s.into_inner()),
            traffic_load,
            seed,
            sample_count: r.sample_count,
            pdr_mean: mean(&r.pdr),
            pdr_std: std(&r.pdr),
            throughput_mean: mean(&r.throughput),
            throughput_std: std(&r.throughput),
            delay_mean: mean(&r.delay),
            delay_std: std(&r.delay),
            tx_packets_mean: mean(&r.tx_packets),
            tx_packets_std: std(&r.tx_packets),
            rx_packets_mean: mean(&r.rx_packets),
            rx_packets_std: std(&r.rx_packets),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// One pairwise verdict, as written to `verdicts.csv`.
pub struct VerdictRecord {
    pub node_count: Option<u32>,
    pub speed: Option<f64>,
    pub traffic_load: Option<TrafficLoad>,
    pub seed: Option<u64>,
    pub protocol_a: String,
    pub protocol_b: String,
    /// Winning protocol, or `tie`.
    pub winner: String,
    pub decided_by: Option<Metric>,
    pub pdr_a: f64,
    pub pdr_b: f64,
    pub throughput_a: f64,
    pub throughput_b: f64,
    pub delay_a: f64,
    pub delay_b: f64,
}

impl From<&Verdict> for VerdictRecord {
    fn from(v: &Verdict) -> Self {
        Self {
            node_count: v.key.node_count,
            speed: v.key.speed.map(|s| s.into_inner()),
            traffic_load: v.key.traffic_load,
            seed: v.key.seed,
            protocol_a: v.protocol_a.clone(),
            protocol_b: v.protocol_b.clone(),
            winner: v.winner.to_string(),
            decided_by: v.decided_by,
            pdr_a: v.a.pdr,
            pdr_b: v.b.pdr,
            throughput_a: v.a.throughput,
            throughput_b: v.b.throughput,
            delay_a: v.a.delay,
            delay_b: v.b.delay,
        }
    }
}

fn serialize_list<S: Serializer, T: ToString>(
    list: &[T],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let list_str = list
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(",");
    serializer.serialize_str(&list_str)
}

fn deserialize_list<'de, D: Deserializer<'de>, T: Deserialize<'de>>(
    deserializer: D,
) -> Result<Vec<T>, D::Error> {
    let buf = String::deserialize(deserializer)?;
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    buf.split(',')
        .map(|x| T::deserialize(x.into_deserializer()))
        .collect()
}
