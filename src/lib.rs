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
//! Library for running parameter sweeps of routing protocol simulations and statistically
//! comparing the protocols.

pub mod aggregate;
pub mod analysis;
pub mod analyzer;
pub mod compare;
pub mod experiments;
pub mod records;
pub mod report;
pub mod util;

#[cfg(test)]
mod test;

pub mod prelude {
    pub use super::{
        aggregate::{aggregate, AggregateRecord, AggregationError, Factor, GroupBy, GroupKey},
        analysis::{analyze, Analysis},
        analyzer::{Metric, ParseError, TrialMetrics},
        compare::{compare, compare_all, CompareError, Tolerances, Verdict, Winner},
        experiments::{
            collect_artifacts, run_sweep, ConfigDelivery, ExecutionError, ParameterSpace,
            RunContext, SimulatorCommand, SweepConfig, SweepResult, TrafficLoad, TrialExecutor,
            TrialOutcome, TrialSpec,
        },
        report::{FileSink, ReportSink},
    };
}
