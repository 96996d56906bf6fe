//! Rally — reward plans and distribution.
//!
//! Responsible for turning reward tables into concrete, idempotent grant
//! lists and applying them through the ledger and inventory collaborators.

pub mod application;
pub mod domain;
