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
//! Execution of a single trial as an isolated simulator process.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    time::{timeout_at, Instant},
};

use super::{RunContext, SimulationConfig, TrialSpec};

/// Error of a single trial execution. Local to that trial, it never aborts the sweep.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The simulator did not finish in time and was killed.
    #[error("Simulator exceeded the timeout of {0:?} and was killed")]
    Timeout(Duration),
    /// The simulator exited with a non-zero status (or was terminated by a signal).
    #[error("Simulator exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    /// The simulator could not be launched, or its artifacts could not be prepared.
    #[error("Process error: {0}")]
    Process(#[from] io::Error),
}

impl ExecutionError {
    /// Short name of the failure kind, as written to the trial status table.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::NonZeroExit { .. } => "nonzero_exit",
            Self::Process(_) => "process_error",
        }
    }
}

/// Raw output of a successful trial, handed to the parser unmodified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// Everything the simulator wrote to its standard output.
    pub stdout: String,
    /// Per-flow table written by the simulator, if it produced one.
    pub artifact: Option<PathBuf>,
}

/// Result of executing one trial.
#[derive(Debug)]
pub enum TrialOutcome {
    Success(RawOutput),
    Failure(ExecutionError),
}

impl TrialOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Runs trials against the external simulator described by the run context.
#[derive(Clone, Debug)]
pub struct TrialExecutor {
    ctx: Arc<RunContext>,
}

impl TrialExecutor {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &RunContext {
        &self.ctx
    }

    /// Execute a single trial. Blocks (asynchronously) until the simulator exits or the timeout
    /// fires. On timeout, the process is killed and reaped before this function returns.
    pub async fn execute(&self, spec: &TrialSpec) -> TrialOutcome {
        match self.try_execute(spec).await {
            Ok(raw) => TrialOutcome::Success(raw),
            Err(e) => {
                // a partial table of a failed trial must not be picked up by a later analysis
                if let Err(rm) = remove_stale(&self.ctx.result_path(spec)).await {
                    log::error!("Could not remove the table of failed trial {}: {rm}", spec.trial_id());
                }
                TrialOutcome::Failure(e)
            }
        }
    }

    async fn try_execute(&self, spec: &TrialSpec) -> Result<RawOutput, ExecutionError> {
        let ctx = &self.ctx;
        let deadline = Instant::now() + ctx.timeout;

        for dir in [ctx.config_dir(), ctx.results_dir(), ctx.logs_dir()] {
            tokio::fs::create_dir_all(dir).await?;
        }

        // prepare the configuration and make sure no artifact of an earlier run survives
        let config = SimulationConfig::new(spec, ctx);
        let config_path = ctx.config_path(spec);
        config.write_to_file(&config_path).await?;
        let log_path = ctx.log_path(spec);
        remove_stale(&config.output).await?;
        remove_stale(&log_path).await?;

        let args = config
            .invocation_args(ctx.simulator.delivery, &config_path)
            .map_err(io::Error::from)?;

        log::trace!(
            "run {:?} {:?} {:?} in {:?}",
            ctx.simulator.program,
            ctx.simulator.args,
            args,
            ctx.working_dir()
        );

        let mut command = Command::new(&ctx.simulator.program);
        command
            .args(&ctx.simulator.args)
            .args(&args)
            .current_dir(ctx.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // the simulator leads its own process group, so everything it forks can be killed with it
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;
        let group = child.id();

        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::time::sleep_until(deadline) => {
                log::debug!("Trial {} timed out, killing the simulator.", spec.trial_id());
                kill_group(group);
                // `kill` also waits for the process, so nothing is left behind.
                if let Err(e) = child.kill().await {
                    log::error!("Could not kill the simulator of trial {}: {e}", spec.trial_id());
                }
                stdout.abort();
                stderr.abort();
                return Err(ExecutionError::Timeout(ctx.timeout));
            }
        };

        // Children of the simulator may keep the pipes open after it exited.
        let abort_stdout = stdout.abort_handle();
        let abort_stderr = stderr.abort_handle();
        let (stdout, stderr) = match timeout_at(deadline, async { tokio::join!(stdout, stderr) })
            .await
        {
            Ok((stdout, stderr)) => (joined(stdout)?, joined(stderr)?),
            Err(_) => {
                kill_group(group);
                abort_stdout.abort();
                abort_stderr.abort();
                return Err(ExecutionError::Timeout(ctx.timeout));
            }
        };

        if !status.success() {
            return Err(ExecutionError::NonZeroExit {
                code: status.code(),
                stderr,
            });
        }

        tokio::fs::write(&log_path, stdout.as_bytes()).await?;

        let artifact = tokio::fs::try_exists(&config.output)
            .await?
            .then_some(config.output);
        Ok(RawOutput { stdout, artifact })
    }
}

/// Send `SIGKILL` to the process group led by the simulator with pid `group`.
#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::{
        errno::Errno,
        sys::signal::{killpg, Signal},
        unistd::Pid,
    };

    let Some(pid) = group.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        // the whole group already exited
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::error!("Could not kill process group {pid}: {e}"),
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

async fn read_pipe<R>(pipe: Option<R>) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn joined(
    res: Result<io::Result<String>, tokio::task::JoinError>,
) -> Result<String, ExecutionError> {
    Ok(res.map_err(|e| io::Error::new(io::ErrorKind::Other, e))??)
}

/// Remove the artifact at `path` if it exists.
async fn remove_stale(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            log::trace!("Removed stale artifact {path:?}");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        experiments::{SimulatorCommand, TrafficLoad},
        test::tmp_dir,
    };

    fn executor(name: &str, script: &str, timeout: Duration) -> TrialExecutor {
        let ctx = RunContext::new(
            tmp_dir(name),
            SimulatorCommand::new("sh").args(["-c", script, "sim"]),
        )
        .timeout(timeout);
        TrialExecutor::new(Arc::new(ctx))
    }

    fn spec() -> TrialSpec {
        TrialSpec::new("aodv", 10, 0.0, TrafficLoad::Low, 1)
    }

    #[tokio::test]
    async fn captures_stdout_and_writes_log() {
        let exec = executor(
            "exec-stdout",
            "echo 'Packet Delivery Ratio: 100 %'",
            Duration::from_secs(10),
        );
        let TrialOutcome::Success(raw) = exec.execute(&spec()).await else {
            panic!("trial should succeed")
        };
        assert_eq!(raw.stdout, "Packet Delivery Ratio: 100 %\n");
        assert_eq!(raw.artifact, None);
        let log = std::fs::read_to_string(exec.ctx().log_path(&spec())).unwrap();
        assert_eq!(log, raw.stdout);
        assert!(exec.ctx().config_path(&spec()).exists());
    }

    #[tokio::test]
    async fn reports_structured_artifact() {
        let script = r#"for a in "$@"; do
                case $a in --config=*) cfg=${a#--config=};; esac
            done
            out=$(sed -n 's/.*"output": "\(.*\)".*/\1/p' "$cfg")
            echo "FlowId,SourceIP,DestIP,TxPackets,RxPackets,TxBytes,RxBytes,DelaySum,Throughput,PDR,AvgDelay" > "$out""#;
        let exec = executor("exec-artifact", script, Duration::from_secs(10));
        let TrialOutcome::Success(raw) = exec.execute(&spec()).await else {
            panic!("trial should succeed")
        };
        assert_eq!(raw.artifact, Some(exec.ctx().result_path(&spec())));
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_stderr() {
        let exec = executor(
            "exec-nonzero",
            "echo 'no such protocol' >&2; exit 3",
            Duration::from_secs(10),
        );
        match exec.execute(&spec()).await {
            TrialOutcome::Failure(ExecutionError::NonZeroExit { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "no such protocol\n");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!exec.ctx().log_path(&spec()).exists());
    }

    #[tokio::test]
    async fn missing_program_is_a_process_error() {
        let ctx = RunContext::new(
            tmp_dir("exec-missing"),
            SimulatorCommand::new("/this/simulator/does/not/exist"),
        );
        let exec = TrialExecutor::new(Arc::new(ctx));
        let outcome = exec.execute(&spec()).await;
        assert!(matches!(
            outcome,
            TrialOutcome::Failure(ExecutionError::Process(_))
        ));
    }

    #[tokio::test]
    async fn timeout_kills_the_simulator() {
        let dir = tmp_dir("exec-timeout");
        let pid_file = dir.join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());
        let ctx = RunContext::new(dir, SimulatorCommand::new("sh").args(["-c", &script]))
            .timeout(Duration::from_millis(500));
        let exec = TrialExecutor::new(Arc::new(ctx));

        let start = std::time::Instant::now();
        let outcome = exec.execute(&spec()).await;
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            outcome,
            TrialOutcome::Failure(ExecutionError::Timeout(_))
        ));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(process_gone(pid.trim()), "simulator process is still alive");
    }

    #[tokio::test]
    async fn timeout_kills_forked_children() {
        let dir = tmp_dir("exec-timeout-fork");
        let pid_file = dir.join("gpid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let ctx = RunContext::new(dir, SimulatorCommand::new("sh").args(["-c", &script]))
            .timeout(Duration::from_millis(500));
        let exec = TrialExecutor::new(Arc::new(ctx));

        let start = std::time::Instant::now();
        let outcome = exec.execute(&spec()).await;
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            outcome,
            TrialOutcome::Failure(ExecutionError::Timeout(_))
        ));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(process_gone(pid.trim()), "forked child is still alive");
    }

    #[tokio::test]
    async fn failed_trial_leaves_no_table() {
        let script = r#"for a in "$@"; do
                case $a in --config=*) cfg=${a#--config=};; esac
            done
            out=$(sed -n 's/.*"output": "\(.*\)".*/\1/p' "$cfg")
            echo "FlowId,SourceIP,DestIP,TxPackets,RxPackets,TxBytes,RxBytes,DelaySum,Throughput,PDR,AvgDelay" > "$out"
            echo "1,10.0.0.1,10.0.0.2,10,10,5120,5120,0.1,0.5,1.0,0.01" >> "$out"
            exit 1"#;
        let exec = executor("exec-partial", script, Duration::from_secs(10));
        let outcome = exec.execute(&spec()).await;
        assert!(matches!(
            outcome,
            TrialOutcome::Failure(ExecutionError::NonZeroExit { .. })
        ));
        assert!(!exec.ctx().result_path(&spec()).exists());
    }

    /// Whether the process `pid` has terminated. Zombies count as terminated, since nobody may be
    /// left to reap an orphan. Returns `true` on systems without `/proc`.
    fn process_gone(pid: &str) -> bool {
        if !Path::new("/proc/self").exists() {
            return true;
        }
        let stat = PathBuf::from(format!("/proc/{pid}/stat"));
        for _ in 0..20 {
            let Ok(content) = std::fs::read_to_string(&stat) else {
                return true;
            };
            let state = content.rsplit(')').next().unwrap_or_default().trim_start();
            if state.starts_with('Z') {
                return true;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        false
    }

    #[tokio::test]
    async fn rerun_replaces_old_artifacts() {
        let exec = executor("exec-rerun", "exit 1", Duration::from_secs(10));
        let result = exec.ctx().result_path(&spec());
        std::fs::create_dir_all(result.parent().unwrap()).unwrap();
        std::fs::write(&result, "stale").unwrap();
        assert!(!exec.execute(&spec()).await.is_success());
        assert!(!result.exists());
    }
}
