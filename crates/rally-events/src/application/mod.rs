//! Application layer for the event lifecycle context.

mod actions;
pub mod config;
mod contribute;
pub mod engine;
pub mod scheduler;
pub mod store;
pub mod tasks;
