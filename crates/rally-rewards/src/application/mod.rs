//! Reward application services.

pub mod distributor;
