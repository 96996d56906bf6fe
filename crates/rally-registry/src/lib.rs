//! Rally — event definition registry.
//!
//! Responsible for the static catalog of event definitions: schema,
//! validation, and loading from YAML with per-definition failure isolation.

pub mod application;
pub mod domain;
