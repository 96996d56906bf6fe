//! Route modules grouped by caller.

pub mod health;
pub mod operator;
pub mod participation;
pub mod quests;

#[cfg(test)]
pub(crate) mod fixtures;
