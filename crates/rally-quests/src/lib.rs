//! Rally — quest progress.
//!
//! Each participant of a running event holds a quest book: a few daily
//! quests drawn from the event's pool, reshuffled at the local day
//! boundary, plus fixed quests kept for the whole run.

pub mod application;
pub mod domain;
