//! Registry domain types.

pub mod definition;
pub mod schedule;
