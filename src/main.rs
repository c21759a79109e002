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

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use routeval::{
    analysis::analyze,
    compare::Tolerances,
    experiments::{
        collect_artifacts, run_sweep, ConfigDelivery, SimulatorCommand, SweepConfig, TrafficLoad,
    },
    report::{FileSink, ReportSink},
    util,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
enum Mode {
    /// Only run the trials and record their status and metrics.
    Simulate,
    /// Only analyze the artifacts of a previous run.
    Analyze,
    /// Run the trials, then analyze them.
    Both,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sweep a routing protocol simulator and compare the protocols")]
struct Args {
    /// What to do: `simulate`, `analyze` or `both`.
    #[arg(short, long, default_value_t = Mode::Both)]
    mode: Mode,
    /// JSON file describing the sweep. Fields that are missing take their default values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Simulator program.
    #[arg(short, long, default_value = "./ns3")]
    simulator: PathBuf,
    /// Argument passed to the simulator before the trial configuration. Can be repeated.
    #[arg(long = "sim-arg", allow_hyphen_values = true)]
    sim_args: Vec<String>,
    /// Working directory of the simulator. Defaults to the output directory.
    #[arg(short, long)]
    working_dir: Option<PathBuf>,
    /// Directory of all artifacts and reports.
    #[arg(short, long, default_value = "./results/")]
    output_dir: PathBuf,
    /// Number of trials running at the same time.
    #[arg(long)]
    workers: Option<usize>,
    /// Timeout of a single trial, in seconds.
    #[arg(short, long)]
    timeout: Option<u64>,
    /// How the trial configuration is passed to the simulator: `file` or `args`.
    #[arg(long, default_value_t = ConfigDelivery::File)]
    delivery: ConfigDelivery,
    /// Overwrite the protocols of the sweep.
    #[arg(long, value_delimiter = ',')]
    protocols: Vec<String>,
    /// Overwrite the node counts of the sweep.
    #[arg(long, value_delimiter = ',')]
    node_counts: Vec<u32>,
    /// Overwrite the node speeds (m/s) of the sweep.
    #[arg(long, value_delimiter = ',')]
    speeds: Vec<f64>,
    /// Overwrite the traffic loads of the sweep.
    #[arg(long, value_delimiter = ',')]
    traffic_loads: Vec<TrafficLoad>,
    /// Overwrite the seeds of the sweep.
    #[arg(long, value_delimiter = ',')]
    seeds: Vec<u64>,
    /// Use the same comparison tolerance for all metrics.
    #[arg(long)]
    tolerance: Option<f64>,
}

impl Args {
    fn sweep_config(&self) -> Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::from_file(path).map_err(|e| anyhow!("{e}"))?,
            None => SweepConfig::default(),
        };
        if !self.protocols.is_empty() {
            config.protocols = self.protocols.clone();
        }
        if !self.node_counts.is_empty() {
            config.node_counts = self.node_counts.clone();
        }
        if !self.speeds.is_empty() {
            config.speeds = self.speeds.clone();
        }
        if !self.traffic_loads.is_empty() {
            config.traffic_loads = self.traffic_loads.clone();
        }
        if !self.seeds.is_empty() {
            config.seeds = self.seeds.clone();
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(eps) = self.tolerance {
            config.tolerances = Tolerances::uniform(eps);
        }
        Ok(config)
    }

    fn simulator(&self) -> SimulatorCommand {
        let mut simulator = SimulatorCommand::new(&self.simulator)
            .args(self.sim_args.iter().cloned())
            .delivery(self.delivery);
        simulator.working_dir = self.working_dir.clone();
        simulator
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let multi = MultiProgress::new();
    util::init_logging(&multi);

    let args = Args::parse();
    let config = args.sweep_config()?;
    let space = config
        .parameter_space()
        .context("Invalid parameter space")?;
    let mut sink = FileSink::new(&args.output_dir)
        .with_context(|| format!("Cannot create the output directory {:?}", args.output_dir))?;
    // artifact paths are handed to a simulator running in another working directory
    let output_dir = std::fs::canonicalize(&args.output_dir)?;
    let ctx = Arc::new(config.run_context(output_dir, args.simulator()));

    let result = match args.mode {
        Mode::Simulate | Mode::Both => {
            let bar = multi.add(ProgressBar::new(space.len() as u64));
            if let Ok(style) = ProgressStyle::with_template(
                "{wide_bar} {pos}/{len} trials, time: {elapsed}, eta: {eta} {msg}",
            ) {
                bar.set_style(style);
            }
            let result = run_sweep(ctx.clone(), &space, Some(bar.clone())).await;
            bar.finish_and_clear();
            result
        }
        Mode::Analyze => collect_artifacts(&ctx, &space),
    };

    let metrics = result.metrics();
    sink.write_trials(&result.records())?;
    sink.write_metrics(&metrics)?;
    if args.mode == Mode::Simulate {
        return Ok(());
    }

    let analysis = analyze(&metrics, &config.group_by, &config.tolerances)?;
    sink.write_analysis(&analysis)?;
    for verdict in analysis.verdicts.iter() {
        log::info!("{verdict}");
    }

    Ok(())
}
