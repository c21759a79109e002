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
//! Normalized measurements of a single trial.
//!
//! Units are fixed for the whole pipeline:
//! - `pdr`: ratio in \[0, 1\]
//! - `throughput`: Mbps
//! - `avg_delay`: seconds
//! - packet and byte counts: plain integers

use serde::{Deserialize, Serialize};

use crate::experiments::TrialSpec;

/// Metrics tracked through aggregation and comparison.
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
pub enum Metric {
    Pdr,
    Throughput,
    Delay,
    TxPackets,
    RxPackets,
}

impl Metric {
    /// Metrics the comparison of two protocols depends on.
    pub const REQUIRED: [Metric; 3] = [Metric::Pdr, Metric::Throughput, Metric::Delay];

    /// Whether a larger value is better.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::Delay)
    }
}

/// Measurements of one successfully executed and parsed trial. Metrics that the output did not
/// report stay `None`, they are never filled with zeros.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TrialMetrics {
    pub spec: TrialSpec,
    /// Throughput in Mbps.
    pub throughput: Option<f64>,
    /// Average end-to-end delay in seconds.
    pub avg_delay: Option<f64>,
    /// Packet delivery ratio in \[0, 1\].
    pub pdr: Option<f64>,
    pub tx_packets: Option<u64>,
    pub rx_packets: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub rx_bytes: Option<u64>,
    /// Number of flows measured in the trial.
    pub flows: Option<usize>,
    /// Number of flows that delivered at least one packet.
    pub successful_flows: Option<usize>,
}

impl TrialMetrics {
    /// Metrics of `spec` without any measurement.
    pub fn empty(spec: TrialSpec) -> Self {
        Self {
            spec,
            throughput: None,
            avg_delay: None,
            pdr: None,
            tx_packets: None,
            rx_packets: None,
            tx_bytes: None,
            rx_bytes: None,
            flows: None,
            successful_flows: None,
        }
    }

    /// Value of `metric` as a float, if it was measured.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Pdr => self.pdr,
            Metric::Throughput => self.throughput,
            Metric::Delay => self.avg_delay,
            Metric::TxPackets => self.tx_packets.map(|x| x as f64),
            Metric::RxPackets => self.rx_packets.map(|x| x as f64),
        }
    }

    /// Required metrics this trial did not report.
    pub fn missing_required(&self) -> Vec<Metric> {
        Metric::REQUIRED
            .into_iter()
            .filter(|m| self.get(*m).is_none())
            .collect()
    }

    /// `rx / tx`, or 0 if nothing was transmitted. `None` if either count is unknown.
    pub fn delivery_ratio(&self) -> Option<f64> {
        match (self.tx_packets, self.rx_packets) {
            (Some(0), Some(_)) => Some(0.0),
            (Some(tx), Some(rx)) => Some(rx as f64 / tx as f64),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrialMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opt = |x: Option<f64>, scale: f64| {
            x.map(|x| format!("{:.3}", x * scale))
                .unwrap_or_else(|| "?".to_string())
        };
        write!(
            f,
            "{}: pdr {}%, throughput {} Mbps, delay {} ms",
            self.spec,
            opt(self.pdr, 100.0),
            opt(self.throughput, 1.0),
            opt(self.avg_delay, 1000.0),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::experiments::TrafficLoad;

    #[test]
    fn delivery_ratio_without_transmissions_is_zero() {
        let mut m = TrialMetrics::empty(TrialSpec::new("x", 10, 0.0, TrafficLoad::Low, 1));
        assert_eq!(m.delivery_ratio(), None);
        m.tx_packets = Some(0);
        m.rx_packets = Some(0);
        assert_eq!(m.delivery_ratio(), Some(0.0));
        m.tx_packets = Some(4);
        m.rx_packets = Some(3);
        assert_eq!(m.delivery_ratio(), Some(0.75));
    }

    #[test]
    fn missing_metrics_are_reported() {
        let mut m = TrialMetrics::empty(TrialSpec::new("x", 10, 0.0, TrafficLoad::Low, 1));
        m.pdr = Some(1.0);
        assert_eq!(m.missing_required(), vec![Metric::Throughput, Metric::Delay]);
        assert_eq!(m.get(Metric::Pdr), Some(1.0));
        assert_eq!(m.get(Metric::TxPackets), None);
    }
}
