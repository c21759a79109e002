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
//! Module describing the experiment sweep: the trials to run, how the external simulator is
//! invoked, and the context shared by all trials of one run.

pub mod executor;
pub mod parameter_space;
pub mod runner;
pub mod sim_config;

pub use executor::*;
pub use parameter_space::*;
pub use runner::*;
pub use sim_config::*;

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use routeval_utils::other::file_name_token;

use crate::{
    aggregate::{Factor, GroupBy},
    compare::Tolerances,
    util::PathBufExt,
};

/// Traffic load generated during a single trial.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrafficLoad {
    Low,
    Medium,
    High,
}

impl TrafficLoad {
    /// Number of concurrent flows the simulator installs for this load.
    pub fn num_flows(&self) -> u32 {
        match self {
            Self::Low => 5,
            Self::Medium => 10,
            Self::High => 20,
        }
    }
}

/// One point of the parameter space. Two specs are the same trial iff all five fields are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct TrialSpec {
    /// Routing protocol under test.
    pub protocol: String,
    /// Number of nodes in the network.
    pub node_count: u32,
    /// Maximum node speed, in m/s.
    pub speed: OrderedFloat<f64>,
    pub traffic_load: TrafficLoad,
    /// Seed (run number) handed to the simulator.
    pub seed: u64,
}

impl TrialSpec {
    pub fn new(
        protocol: impl Into<String>,
        node_count: u32,
        speed: f64,
        traffic_load: TrafficLoad,
        seed: u64,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            node_count,
            speed: OrderedFloat(speed),
            traffic_load,
            seed,
        }
    }

    /// Identifier derived from the full tuple, used to name all artifacts of this trial.
    ///
    /// Protocol names are restricted to `[A-Za-z0-9-]` by the `ParameterSpace`, which makes the
    /// `_`-separated identifier unambiguous.
    pub fn trial_id(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.protocol,
            self.node_count,
            file_name_token(self.speed.into_inner()),
            self.traffic_load,
            self.seed
        )
    }
}

impl Display for TrialSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "protocol={}, nodes={}, speed={}m/s, traffic={}, seed={}",
            self.protocol, self.node_count, self.speed, self.traffic_load, self.seed
        )
    }
}

/// How the simulator configuration is handed to the external program.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    strum::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigDelivery {
    /// Write a JSON file and pass `--config=<path>`.
    #[default]
    File,
    /// Pass every field as `--key=value`.
    Args,
}

/// The external simulator program.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulatorCommand {
    pub program: PathBuf,
    /// Arguments placed before the generated configuration arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory of the simulator. Defaults to the output directory of the run.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub delivery: ConfigDelivery,
}

impl SimulatorCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            delivery: ConfigDelivery::default(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn delivery(mut self, delivery: ConfigDelivery) -> Self {
        self.delivery = delivery;
        self
    }
}

/// Everything a trial needs to know about the run it belongs to. Passed explicitly to every
/// component instead of living in global state, so independent runs never share directories.
#[derive(Clone, Debug)]
pub struct RunContext {
    /// Root of all artifacts of this run.
    pub output_dir: PathBuf,
    pub simulator: SimulatorCommand,
    /// Wall-clock limit of a single trial.
    pub timeout: Duration,
    /// Number of trials executed concurrently.
    pub max_workers: usize,
    /// Simulated time of each trial, in seconds.
    pub simulation_time: f64,
}

impl RunContext {
    pub fn new(output_dir: impl Into<PathBuf>, simulator: SimulatorCommand) -> Self {
        Self {
            output_dir: output_dir.into(),
            simulator,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_workers: DEFAULT_WORKERS,
            simulation_time: DEFAULT_SIMULATION_TIME,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of concurrent trials. `0` uses one worker per CPU.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = match max_workers {
            0 => num_cpus::get(),
            n => n,
        };
        self
    }

    pub fn simulation_time(mut self, simulation_time: f64) -> Self {
        self.simulation_time = simulation_time;
        self
    }

    pub fn config_dir(&self) -> PathBuf {
        self.output_dir.as_path().then("configs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.output_dir.as_path().then("results")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.as_path().then("logs")
    }

    /// Generated simulator configuration of a trial.
    pub fn config_path(&self, spec: &TrialSpec) -> PathBuf {
        self.config_dir().then(format!("{}.json", spec.trial_id()))
    }

    /// Structured (CSV) output the simulator writes for a trial.
    pub fn result_path(&self, spec: &TrialSpec) -> PathBuf {
        self.results_dir()
            .then(format!("results_{}.csv", spec.trial_id()))
    }

    /// Captured standard output of a successful trial.
    pub fn log_path(&self, spec: &TrialSpec) -> PathBuf {
        self.logs_dir().then(format!("{}.log", spec.trial_id()))
    }

    /// Directory the simulator process is started in.
    pub fn working_dir(&self) -> &Path {
        self.simulator
            .working_dir
            .as_deref()
            .unwrap_or(self.output_dir.as_path())
    }
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_SIMULATION_TIME: f64 = 200.0;

/// Description of a full sweep, as read from a JSON file. Missing fields take the defaults of the
/// standard protocol evaluation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    pub protocols: Vec<String>,
    pub node_counts: Vec<u32>,
    pub speeds: Vec<f64>,
    pub traffic_loads: Vec<TrafficLoad>,
    pub seeds: Vec<u64>,
    /// Simulated time of each trial, in seconds.
    pub simulation_time: f64,
    /// Wall-clock limit of each trial, in seconds.
    pub timeout_secs: u64,
    pub max_workers: usize,
    pub tolerances: Tolerances,
    /// Grouping dimensions of the analysis, each an ordered list of factors.
    pub group_by: Vec<GroupBy>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            protocols: ["rtmhr", "aodv", "olsr", "dsr"]
                .into_iter()
                .map(String::from)
                .collect(),
            node_counts: vec![30, 50, 70, 100],
            speeds: vec![0.0, 5.0, 10.0, 15.0, 20.0],
            traffic_loads: vec![TrafficLoad::Low, TrafficLoad::Medium, TrafficLoad::High],
            seeds: vec![1, 2, 3, 4, 5],
            simulation_time: DEFAULT_SIMULATION_TIME,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_workers: DEFAULT_WORKERS,
            tolerances: Tolerances::default(),
            group_by: vec![
                GroupBy::new([Factor::Protocol]),
                GroupBy::new([Factor::Protocol, Factor::NodeCount]),
                GroupBy::new([Factor::Protocol, Factor::Speed]),
            ],
        }
    }
}

impl SweepConfig {
    /// Read a sweep description from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::debug!("{e:?}");
                Err(format!("Invalid sweep configuration {:?}: {e}", path.as_ref()).into())
            }
        }
    }

    /// Build the parameter space of this sweep.
    pub fn parameter_space(&self) -> Result<ParameterSpace, SpaceError> {
        ParameterSpace::new(
            self.protocols.clone(),
            self.node_counts.clone(),
            self.speeds.clone(),
            self.traffic_loads.clone(),
            self.seeds.clone(),
        )
    }

    /// Build the run context of this sweep for the given simulator and output location.
    pub fn run_context(
        &self,
        output_dir: impl Into<PathBuf>,
        simulator: SimulatorCommand,
    ) -> RunContext {
        RunContext::new(output_dir, simulator)
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_workers(self.max_workers)
            .simulation_time(self.simulation_time)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trial_id_covers_all_fields() {
        let spec = TrialSpec::new("aodv", 30, 12.5, TrafficLoad::Medium, 3);
        assert_eq!(spec.trial_id(), "aodv_30_12.5_medium_3");
        let spec = TrialSpec::new("aodv", 30, 0.0, TrafficLoad::Medium, 3);
        assert_eq!(spec.trial_id(), "aodv_30_0_medium_3");
    }

    #[test]
    fn artifact_paths_are_derived_from_the_spec() {
        let ctx = RunContext::new("/tmp/run", SimulatorCommand::new("sim"));
        let spec = TrialSpec::new("olsr", 50, 5.0, TrafficLoad::High, 1);
        assert_eq!(
            ctx.result_path(&spec),
            PathBuf::from("/tmp/run/results/results_olsr_50_5_high_1.csv")
        );
        assert_eq!(
            ctx.config_path(&spec),
            PathBuf::from("/tmp/run/configs/olsr_50_5_high_1.json")
        );
        assert_eq!(
            ctx.log_path(&spec),
            PathBuf::from("/tmp/run/logs/olsr_50_5_high_1.log")
        );
        assert_eq!(ctx.working_dir(), Path::new("/tmp/run"));
    }

    #[test]
    fn partial_sweep_config() {
        let config: SweepConfig =
            serde_json::from_str(r#"{"protocols": ["x", "y"], "seeds": [7], "timeout_secs": 10}"#)
                .unwrap();
        assert_eq!(config.protocols, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(config.seeds, vec![7]);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.node_counts, SweepConfig::default().node_counts);
        assert_eq!(config.parameter_space().unwrap().len(), 2 * 4 * 5 * 3);
    }

    #[test]
    fn traffic_load_names() {
        assert_eq!(TrafficLoad::High.to_string(), "high");
        assert_eq!("medium".parse::<TrafficLoad>().unwrap(), TrafficLoad::Medium);
        assert_eq!(
            serde_json::to_string(&TrafficLoad::Low).unwrap(),
            "\"low\"".to_string()
        );
    }

    #[test]
    fn worker_count() {
        let ctx = RunContext::new("/tmp/run", SimulatorCommand::new("sim"));
        assert_eq!(ctx.clone().max_workers(3).max_workers, 3);
        assert!(ctx.max_workers(0).max_workers >= 1);
    }
}
