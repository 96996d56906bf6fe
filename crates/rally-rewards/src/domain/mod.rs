//! Reward domain types.

pub mod plan;
