//! Registry loading and lookup.

pub mod loader;
pub mod registry;
