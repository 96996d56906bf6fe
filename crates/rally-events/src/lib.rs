//! Rally — event lifecycle bounded context.
//!
//! Responsible for starting and ending community events, owning each run's
//! type-specific state, aggregating concurrent contributions, firing
//! milestones, and driving all of it from a periodic trigger loop.

pub mod application;
pub mod domain;
