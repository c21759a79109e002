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
//! Enumeration of the experiment parameter space.

use itertools::iproduct;
use ordered_float::OrderedFloat;
use thiserror::Error;

use super::{TrafficLoad, TrialSpec};

/// Error thrown when the parameter space is misconfigured.
#[derive(Debug, Error, PartialEq)]
pub enum SpaceError {
    /// One of the factor lists is empty, which would silently produce zero trials.
    #[error("The list of {0} is empty, the sweep would not run a single trial.")]
    EmptyFactor(&'static str),
    /// A factor level appears twice, which would produce duplicate trials.
    #[error("The list of {0} contains the level {1} more than once.")]
    DuplicateLevel(&'static str, String),
    /// Protocol names end up in artifact names and must only contain `[A-Za-z0-9-]`.
    #[error("Invalid protocol name {0:?}: only ASCII letters, digits and '-' are allowed.")]
    InvalidProtocol(String),
    #[error("Invalid number of nodes: {0}")]
    InvalidNodeCount(u32),
    #[error("Invalid speed: {0} (must be finite and non-negative)")]
    InvalidSpeed(f64),
    #[error("Invalid seed: {0} (must be positive)")]
    InvalidSeed(u64),
}

/// Ordered factor levels of a sweep. Iterates over the Cartesian product in a fixed nested order:
/// protocol (outermost), node count, speed, traffic load, seed (innermost).
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpace {
    protocols: Vec<String>,
    node_counts: Vec<u32>,
    speeds: Vec<OrderedFloat<f64>>,
    traffic_loads: Vec<TrafficLoad>,
    seeds: Vec<u64>,
}

impl ParameterSpace {
    pub fn new(
        protocols: Vec<String>,
        node_counts: Vec<u32>,
        speeds: Vec<f64>,
        traffic_loads: Vec<TrafficLoad>,
        seeds: Vec<u64>,
    ) -> Result<Self, SpaceError> {
        if let Some(p) = protocols
            .iter()
            .find(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
        {
            return Err(SpaceError::InvalidProtocol(p.clone()));
        }
        if let Some(n) = node_counts.iter().find(|n| **n == 0) {
            return Err(SpaceError::InvalidNodeCount(*n));
        }
        if let Some(s) = speeds.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(SpaceError::InvalidSpeed(*s));
        }
        if let Some(s) = seeds.iter().find(|s| **s == 0) {
            return Err(SpaceError::InvalidSeed(*s));
        }

        let speeds = speeds.into_iter().map(OrderedFloat).collect::<Vec<_>>();
        check_levels("protocols", &protocols)?;
        check_levels("node counts", &node_counts)?;
        check_levels("speeds", &speeds)?;
        check_levels("traffic loads", &traffic_loads)?;
        check_levels("seeds", &seeds)?;

        Ok(Self {
            protocols,
            node_counts,
            speeds,
            traffic_loads,
            seeds,
        })
    }

    /// Number of trials in the sweep.
    pub fn len(&self) -> usize {
        self.protocols.len()
            * self.node_counts.len()
            * self.speeds.len()
            * self.traffic_loads.len()
            * self.seeds.len()
    }

    /// Always false, a constructed parameter space has at least one trial.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Iterate over all trials. Every call starts from the first trial again.
    pub fn iter(&self) -> impl Iterator<Item = TrialSpec> + '_ {
        iproduct!(
            self.protocols.iter(),
            self.node_counts.iter(),
            self.speeds.iter(),
            self.traffic_loads.iter(),
            self.seeds.iter()
        )
        .map(|(protocol, node_count, speed, traffic_load, seed)| TrialSpec {
            protocol: protocol.clone(),
            node_count: *node_count,
            speed: *speed,
            traffic_load: *traffic_load,
            seed: *seed,
        })
    }

    /// All trials in iteration order.
    pub fn trials(&self) -> Vec<TrialSpec> {
        self.iter().collect()
    }
}

fn check_levels<T: PartialEq + std::fmt::Debug>(
    name: &'static str,
    levels: &[T],
) -> Result<(), SpaceError> {
    if levels.is_empty() {
        return Err(SpaceError::EmptyFactor(name));
    }
    for (i, level) in levels.iter().enumerate() {
        if levels[..i].contains(level) {
            return Err(SpaceError::DuplicateLevel(name, format!("{level:?}")));
        }
    }
    Ok(())
}
