//! Rally Core — shared abstractions for the community event engine.
//!
//! This crate defines the identifiers, error types, and collaborator traits
//! (persistence, ledger, inventory, notifications) that every other crate
//! depends on. It contains no infrastructure code.

pub mod clock;
pub mod economy;
pub mod error;
pub mod ids;
pub mod locks;
pub mod notify;
pub mod repository;
pub mod rng;
