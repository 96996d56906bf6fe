//! Shared test doubles and utilities for the Rally community event engine.

mod clock;
mod economy;
mod notify;
mod repository;
mod rng;

pub use clock::{FixedClock, ManualClock};
pub use economy::{InMemoryInventory, InMemoryLedger};
pub use notify::RecordingNotificationSink;
pub use repository::{FailingStateRepository, InMemoryStateRepository, StallingStateRepository};
pub use rng::{MockRng, SequenceRng};
