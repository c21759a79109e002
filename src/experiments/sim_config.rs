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
//! Typed configuration handed to the external simulator, and its (only) encoder.
//!
//! The configuration is serialized with `serde_json`. The argument form (`--key=value`) is
//! rendered from the same JSON object, so both delivery modes always agree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ConfigDelivery, RunContext, TrafficLoad, TrialSpec};

/// Configuration of a single simulator invocation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub protocol: String,
    pub nodes: u32,
    /// Maximum node speed, in m/s.
    pub speed: f64,
    pub traffic: TrafficLoad,
    /// Number of flows implied by the traffic load.
    pub flows: u32,
    pub seed: u64,
    /// Simulated time, in seconds.
    pub time: f64,
    /// Where the simulator should write its per-flow table.
    pub output: PathBuf,
}

impl SimulationConfig {
    /// Build the configuration of `spec`. Pure: the same spec and context always give the same
    /// configuration.
    pub fn new(spec: &TrialSpec, ctx: &RunContext) -> Self {
        Self {
            protocol: spec.protocol.clone(),
            nodes: spec.node_count,
            speed: spec.speed.into_inner(),
            traffic: spec.traffic_load,
            flows: spec.traffic_load.num_flows(),
            seed: spec.seed,
            time: ctx.simulation_time,
            output: ctx.result_path(spec),
        }
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Encode as `--key=value` arguments, sorted by key.
    pub fn to_args(&self) -> Result<Vec<String>, serde_json::Error> {
        let Value::Object(fields) = serde_json::to_value(self)? else {
            return Err(serde::ser::Error::custom("configuration is not a JSON object"));
        };
        Ok(fields
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("--{key}={s}"),
                other => format!("--{key}={other}"),
            })
            .collect())
    }

    /// Write the JSON encoding to `path`, overwriting an existing file.
    pub async fn write_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let serialized = self.to_json()?;
        tokio::fs::write(path, serialized.as_bytes()).await
    }

    /// Read a configuration previously written with `write_to_file`.
    pub async fn read_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Arguments passed to the simulator for this configuration. In `File` mode, the configuration
    /// must already be written to `config_path`.
    pub fn invocation_args(
        &self,
        delivery: ConfigDelivery,
        config_path: &Path,
    ) -> Result<Vec<String>, serde_json::Error> {
        match delivery {
            ConfigDelivery::File => Ok(vec![format!("--config={}", config_path.display())]),
            ConfigDelivery::Args => self.to_args(),
        }
    }
}
