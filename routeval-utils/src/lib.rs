//! Utility library for the routeval project

pub mod other;
pub mod serde;
