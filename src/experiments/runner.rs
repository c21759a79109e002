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
//! Sweep driver: runs all trials of a parameter space on a bounded worker pool, parses their
//! output, and keeps the status of every trial.

use std::{
    io,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use indicatif::ProgressBar;
use thiserror::Error;
use tokio::sync::Semaphore;

use super::{
    ExecutionError, ParameterSpace, RawOutput, RunContext, TrialExecutor, TrialOutcome, TrialSpec,
};
use crate::{
    analyzer::{artifact_name, flow_table, log_parser, parse_output, ParseError, TrialMetrics},
    records::TrialRecord,
};

/// Failure of one trial, either while running the simulator or while parsing its output.
#[derive(Debug, Error)]
pub enum TrialError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("{source} (in {artifact:?})")]
    Parse {
        source: ParseError,
        artifact: PathBuf,
    },
    /// Analysis of a previous run found neither a flow table nor a log.
    #[error("No output of a previous run at {0:?} or {1:?}")]
    MissingArtifact(PathBuf, PathBuf),
}

impl TrialError {
    /// Short name of the failure kind, as written to the trial status table.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Execution(e) => e.kind(),
            Self::Parse { source, .. } => source.kind(),
            Self::MissingArtifact(_, _) => "missing_artifact",
        }
    }
}

/// One executed trial, before parsing.
#[derive(Debug)]
pub struct TrialRun {
    pub spec: TrialSpec,
    pub outcome: TrialOutcome,
    pub wall_time: Duration,
}

/// Execute all `trials` with at most `max_workers` simulators running at the same time. Every
/// trial is executed exactly once, no matter how many fail. The result is sorted by the trial
/// spec, independent of the order in which the trials completed.
pub async fn run_trials(
    executor: &TrialExecutor,
    trials: Vec<TrialSpec>,
    progress: Option<ProgressBar>,
) -> Vec<TrialRun> {
    let workers = Arc::new(Semaphore::new(executor.ctx().max_workers));

    let handles = trials
        .into_iter()
        .map(|spec| {
            let executor = executor.clone();
            let workers = workers.clone();
            let progress = progress.clone();
            let task_spec = spec.clone();
            let handle = tokio::spawn(async move {
                let spec = task_spec;
                // the semaphore is never closed
                let _permit = workers.acquire_owned().await.ok();
                let start = Instant::now();
                let outcome = executor.execute(&spec).await;
                let wall_time = start.elapsed();
                if let Some(bar) = progress {
                    bar.set_message(spec.trial_id());
                    bar.inc(1);
                }
                (outcome, wall_time)
            });
            (spec, handle)
        })
        .collect::<Vec<_>>();

    let mut runs = Vec::with_capacity(handles.len());
    for (spec, handle) in handles {
        let (outcome, wall_time) = match handle.await {
            Ok(x) => x,
            Err(e) => {
                let e = io::Error::new(io::ErrorKind::Other, format!("worker failed: {e}"));
                (TrialOutcome::Failure(e.into()), Duration::ZERO)
            }
        };
        runs.push(TrialRun {
            spec,
            outcome,
            wall_time,
        });
    }
    runs.sort_by(|a, b| a.spec.cmp(&b.spec));
    runs
}

/// Final status of one trial.
#[derive(Debug)]
pub struct TrialStatus {
    pub spec: TrialSpec,
    /// Time spent executing the trial, zero if the trial was not executed in this run.
    pub wall_time: Duration,
    pub result: Result<TrialMetrics, TrialError>,
}

impl TrialStatus {
    fn new(spec: TrialSpec, wall_time: Duration, result: Result<TrialMetrics, TrialError>) -> Self {
        if let Err(e) = &result {
            log::warn!("Trial {spec:?} failed ({}): {e}", e.kind());
        }
        Self {
            spec,
            wall_time,
            result,
        }
    }

    pub fn record(&self) -> TrialRecord {
        let (failure, message) = match &self.result {
            Ok(_) => (None, None),
            Err(e) => (Some(e.kind().to_string()), Some(e.to_string())),
        };
        TrialRecord {
            trial_id: self.spec.trial_id(),
            protocol: self.spec.protocol.clone(),
            node_count: self.spec.node_count,
            speed: self.spec.speed.into_inner(),
            traffic_load: self.spec.traffic_load,
            seed: self.spec.seed,
            success: self.result.is_ok(),
            failure,
            message,
            wall_time: self.wall_time.as_secs_f64(),
        }
    }
}

/// Status of every trial of a sweep, sorted by trial spec.
#[derive(Debug, Default)]
pub struct SweepResult {
    pub trials: Vec<TrialStatus>,
}

impl SweepResult {
    /// Metrics of all successful trials. Failed trials are dropped, not filled with zeros.
    pub fn metrics(&self) -> Vec<TrialMetrics> {
        self.trials
            .iter()
            .filter_map(|t| t.result.as_ref().ok())
            .cloned()
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TrialSpec, &TrialError)> {
        self.trials
            .iter()
            .filter_map(|t| t.result.as_ref().err().map(|e| (&t.spec, e)))
    }

    pub fn num_failed(&self) -> usize {
        self.failures().count()
    }

    pub fn records(&self) -> Vec<TrialRecord> {
        self.trials.iter().map(TrialStatus::record).collect()
    }

    fn log_summary(&self) {
        log::info!(
            "{} of {} trials succeeded, {} failed",
            self.trials.len() - self.num_failed(),
            self.trials.len(),
            self.num_failed()
        );
    }
}

/// Parse the output of all executed trials.
pub fn process_runs(runs: Vec<TrialRun>) -> SweepResult {
    let trials = runs
        .into_iter()
        .map(|run| {
            let result = match run.outcome {
                TrialOutcome::Success(raw) => parse_raw(&run.spec, &raw),
                TrialOutcome::Failure(e) => Err(e.into()),
            };
            TrialStatus::new(run.spec, run.wall_time, result)
        })
        .collect();
    let result = SweepResult { trials };
    result.log_summary();
    result
}

fn parse_raw(spec: &TrialSpec, raw: &RawOutput) -> Result<TrialMetrics, TrialError> {
    parse_output(spec, raw).map_err(|source| TrialError::Parse {
        source,
        artifact: artifact_name(spec, raw),
    })
}

/// Run the full sweep over `space` and parse the output of every trial.
pub async fn run_sweep(
    ctx: Arc<RunContext>,
    space: &ParameterSpace,
    progress: Option<ProgressBar>,
) -> SweepResult {
    log::info!(
        "Running {} trials with {} workers and a timeout of {:?}",
        space.len(),
        ctx.max_workers,
        ctx.timeout
    );
    let executor = TrialExecutor::new(ctx);
    let runs = run_trials(&executor, space.trials(), progress).await;
    process_runs(runs)
}

/// Rebuild the sweep result from the artifacts a previous run left in the output directory of
/// `ctx`, without running the simulator. The flow table of a trial takes precedence over its log.
pub fn collect_artifacts(ctx: &RunContext, space: &ParameterSpace) -> SweepResult {
    let trials = space
        .iter()
        .map(|spec| {
            let result = collect_trial(ctx, &spec);
            TrialStatus::new(spec, Duration::ZERO, result)
        })
        .collect();
    let result = SweepResult { trials };
    result.log_summary();
    result
}

fn collect_trial(ctx: &RunContext, spec: &TrialSpec) -> Result<TrialMetrics, TrialError> {
    let table = ctx.result_path(spec);
    let log = ctx.log_path(spec);
    let parse_err = |artifact: &PathBuf| {
        let artifact = artifact.clone();
        move |source: ParseError| TrialError::Parse { source, artifact }
    };
    if table.exists() {
        flow_table::parse_flow_file(spec, &table).map_err(parse_err(&table))
    } else if log.exists() {
        let output = std::fs::read_to_string(&log)
            .map_err(ParseError::from)
            .map_err(parse_err(&log))?;
        log_parser::parse_log(spec, &output).map_err(parse_err(&log))
    } else {
        Err(TrialError::MissingArtifact(table, log))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        experiments::{ConfigDelivery, SimulatorCommand, TrafficLoad},
        test::{fake_simulator, tmp_dir},
    };

    fn space(seeds: Vec<u64>) -> ParameterSpace {
        ParameterSpace::new(
            vec!["x".to_string()],
            vec![10],
            vec![0.0],
            vec![TrafficLoad::Low],
            seeds,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn failures_are_recorded_per_trial() {
        // seed 2 fails, seed 3 prints garbage
        let script = r#"for a in "$@"; do
                case $a in --seed=*) seed=${a#--seed=};; esac
            done
            case $seed in
                2) echo "boom" >&2; exit 1;;
                3) echo "Average Delay: fast";;
                *) echo "Packet Delivery Ratio: 0.5"; echo "Average Throughput: 100 kbps"; echo "Average Delay: 20 ms";;
            esac"#;
        let ctx = RunContext::new(
            tmp_dir("runner-failures"),
            SimulatorCommand::new("sh")
                .args(["-c", script, "sim"])
                .delivery(ConfigDelivery::Args),
        )
        .max_workers(2);
        let result = run_sweep(Arc::new(ctx), &space(vec![4, 3, 2, 1]), None).await;

        assert_eq!(result.trials.len(), 4);
        let seeds = result.trials.iter().map(|t| t.spec.seed).collect::<Vec<_>>();
        assert_eq!(seeds, vec![1, 2, 3, 4]);
        assert_eq!(result.num_failed(), 2);
        let kinds = result
            .failures()
            .map(|(s, e)| (s.seed, e.kind()))
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![(2, "nonzero_exit"), (3, "bad_value")]);

        let metrics = result.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].pdr, Some(0.5));
        assert_eq!(metrics[0].throughput, Some(0.1));
        assert_eq!(metrics[0].avg_delay, Some(0.02));

        let records = result.records();
        assert!(records[0].success);
        assert!(!records[1].success);
        assert_eq!(records[1].failure.as_deref(), Some("nonzero_exit"));
        assert!(records[1].message.as_ref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn failed_trial_table_is_not_analyzed() {
        let dir = tmp_dir("runner-partial");
        let sim = fake_simulator(
            r#"echo "FlowId,SourceIP,DestIP,TxPackets,RxPackets,TxBytes,RxBytes,DelaySum,Throughput,PDR,AvgDelay" > "$output"
            echo "1,10.0.0.1,10.0.0.2,10,10,5120,5120,0.1,0.5,1.0,0.01" >> "$output"
            exit 1"#,
        );
        let ctx = RunContext::new(&dir, sim);
        let space = space(vec![1]);

        let ran = run_sweep(Arc::new(ctx.clone()), &space, None).await;
        assert_eq!(ran.num_failed(), 1);
        assert!(ran.metrics().is_empty());

        let collected = collect_artifacts(&ctx, &space);
        assert_eq!(collected.num_failed(), 1);
        assert!(collected.metrics().is_empty());
    }

    #[tokio::test]
    async fn analyze_previous_run() {
        let dir = tmp_dir("runner-collect");
        let ctx = RunContext::new(
            &dir,
            SimulatorCommand::new("sh").args(["-c", "echo 'Packet Delivery Ratio: 75%'", "sim"]),
        );
        let space = space(vec![1, 2, 3]);
        let ran = run_sweep(Arc::new(ctx.clone()), &space, None).await;
        assert_eq!(ran.num_failed(), 0);

        // a flow table takes precedence over the log, a missing trial is reported
        let table = ctx.result_path(&TrialSpec::new("x", 10, 0.0, TrafficLoad::Low, 2));
        std::fs::write(
            &table,
            "FlowId,SourceIP,DestIP,TxPackets,RxPackets,TxBytes,RxBytes,DelaySum,Throughput,PDR,AvgDelay\n\
             1,10.0.0.1,10.0.0.2,10,5,1000,500,0.5,0.25,0.5,0.1\n",
        )
        .unwrap();
        std::fs::remove_file(ctx.log_path(&TrialSpec::new("x", 10, 0.0, TrafficLoad::Low, 3)))
            .unwrap();

        let collected = collect_artifacts(&ctx, &space);
        assert_eq!(collected.trials.len(), 3);
        assert_eq!(collected.trials[0].result.as_ref().unwrap().pdr, Some(0.75));
        assert_eq!(collected.trials[1].result.as_ref().unwrap().pdr, Some(0.5));
        assert!(matches!(
            collected.trials[2].result,
            Err(TrialError::MissingArtifact(_, _))
        ));
        assert_eq!(collected.trials[2].wall_time, Duration::ZERO);
    }
}
