//! Utility module for serde of types.

pub mod keyed_map;
