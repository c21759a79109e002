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
//! End-to-end tests that drive whole sweeps against a shell script standing in for the simulator.
//!
//! ```shell
//! cargo test -- --nocapture
//! ```

use std::path::PathBuf;

use crate::experiments::{ConfigDelivery, SimulatorCommand};

/// Fresh, empty directory for the test `name`. Directories of different tests (and of concurrent
/// test processes) never overlap.
pub(crate) fn tmp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("routeval-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Simulator that receives its configuration as `--key=value` arguments and runs `body` with the
/// variables `protocol`, `nodes`, `speed`, `traffic`, `seed` and `output` set.
pub(crate) fn fake_simulator(body: &str) -> SimulatorCommand {
    let script = format!(
        r#"for a in "$@"; do
            case $a in
                --protocol=*) protocol=${{a#--protocol=}};;
                --nodes=*) nodes=${{a#--nodes=}};;
                --speed=*) speed=${{a#--speed=}};;
                --traffic=*) traffic=${{a#--traffic=}};;
                --seed=*) seed=${{a#--seed=}};;
                --output=*) output=${{a#--output=}};;
            esac
        done
        {body}"#
    );
    SimulatorCommand::new("sh")
        .args(["-c".to_string(), script, "sim".to_string()])
        .delivery(ConfigDelivery::Args)
}

mod concurrency;
