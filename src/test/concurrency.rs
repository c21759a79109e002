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
//! Worker pool bound and timeout isolation.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::experiments::{
    run_sweep, run_trials, ExecutionError, ParameterSpace, RunContext, TrafficLoad, TrialExecutor,
    TrialOutcome,
};

use super::{fake_simulator, tmp_dir};

fn space(seeds: u64) -> ParameterSpace {
    ParameterSpace::new(
        vec!["x".to_string()],
        vec![10],
        vec![0.0],
        vec![TrafficLoad::Low],
        (1..=seeds).collect(),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_pool_is_bounded() {
    let ctx = RunContext::new(
        tmp_dir("pool-bound"),
        fake_simulator("sleep 0.4; echo 'Packet Delivery Ratio: 1'"),
    )
    .max_workers(2);
    let executor = TrialExecutor::new(Arc::new(ctx));

    let start = Instant::now();
    let runs = run_trials(&executor, space(4).trials(), None).await;
    let elapsed = start.elapsed();

    assert_eq!(runs.len(), 4);
    assert!(runs.iter().all(|r| r.outcome.is_success()));
    // four trials on two workers need at least two rounds
    assert!(elapsed >= Duration::from_millis(800), "{elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_does_not_block_siblings() {
    let ctx = RunContext::new(
        tmp_dir("timeout-siblings"),
        fake_simulator(
            r#"if [ "$seed" = "1" ]; then exec sleep 30; fi
            echo 'Packet Delivery Ratio: 90%'"#,
        ),
    )
    .max_workers(2)
    .timeout(Duration::from_secs(1));
    let executor = TrialExecutor::new(Arc::new(ctx));

    let start = Instant::now();
    let runs = run_trials(&executor, space(6).trials(), None).await;
    assert!(start.elapsed() < Duration::from_secs(20));

    assert_eq!(runs.len(), 6);
    assert!(matches!(
        runs[0].outcome,
        TrialOutcome::Failure(ExecutionError::Timeout(_))
    ));
    assert!(runs[1..].iter().all(|r| r.outcome.is_success()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_trial_times_out() {
    let ctx = RunContext::new(tmp_dir("timeout-all"), fake_simulator("exec sleep 30"))
        .max_workers(3)
        .timeout(Duration::from_millis(300));
    let result = run_sweep(Arc::new(ctx), &space(3), None).await;
    assert_eq!(result.num_failed(), 3);
    assert!(result.metrics().is_empty());
    assert!(result
        .records()
        .iter()
        .all(|r| r.failure.as_deref() == Some("timeout")));
}
