//! Quest book model and outcome types.

pub mod book;
pub mod outcomes;
