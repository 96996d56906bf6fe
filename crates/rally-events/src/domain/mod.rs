//! Domain layer for the event lifecycle context.

pub mod handlers;
pub mod milestones;
pub mod outcomes;
pub mod state;
