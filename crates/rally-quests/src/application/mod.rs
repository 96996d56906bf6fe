//! Quest tracking service.

pub mod tracker;
