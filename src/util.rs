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
//! Utility module collection of functions

use std::path::{Path, PathBuf};

use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

/// Configuration file of `log4rs`, relative to the current directory.
pub const LOG_CONFIG: &str = "log4rs.yml";

/// Initialize logging from `log4rs.yml`. If the file cannot be loaded, log to the terminal through
/// `pretty_env_logger` (filtered by `RUST_LOG`, `info` by default) without tearing the progress
/// bars drawn by `multi`.
pub fn init_logging(multi: &MultiProgress) {
    let err = match log4rs::init_file(LOG_CONFIG, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .build();
    let level = logger.filter();
    if LogWrapper::new(multi.clone(), logger).try_init().is_ok() {
        log::set_max_level(level);
        log::debug!("Not using {LOG_CONFIG}: {err}");
    }
}

pub trait PathBufExt: Sized {
    fn then(self, p: impl AsRef<Path>) -> PathBuf;
}

impl PathBufExt for PathBuf {
    fn then(mut self, p: impl AsRef<Path>) -> PathBuf {
        self.push(p);
        self
    }
}

impl PathBufExt for &Path {
    fn then(self, p: impl AsRef<Path>) -> PathBuf {
        let mut path = self.to_path_buf();
        path.push(p);
        path
    }
}
