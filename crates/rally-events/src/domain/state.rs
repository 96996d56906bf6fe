//! The persisted state of one running event.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rally_core::error::EngineError;
use rally_core::ids::{CommunityId, ParticipantId};
use rally_registry::domain::definition::EventDefinition;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::handlers::SubState;

/// One run of an event in one community. At most one exists per community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEventState {
    /// Owning community.
    pub community: CommunityId,
    /// Definition this run was started from.
    pub definition_id: String,
    /// Identifies this run to its background tasks.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run expires.
    pub ends_at: DateTime<Utc>,
    /// Type-specific state.
    pub sub_state: SubState,
    /// Cumulative applied contribution per participant.
    #[serde(default)]
    pub totals: BTreeMap<ParticipantId, u64>,
    /// Milestone percentages already rewarded.
    #[serde(default)]
    pub reached: BTreeSet<u32>,
    /// End warnings already announced.
    #[serde(default)]
    pub warned: BTreeSet<EndWarning>,
}

/// Advance notice that a run is about to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndWarning {
    /// Sent once a day or less remains.
    DayBefore,
    /// Sent once an hour or less remains.
    HourBefore,
}

impl EndWarning {
    /// How long before the end this warning is due.
    #[must_use]
    pub fn lead(self) -> Duration {
        match self {
            Self::DayBefore => Duration::hours(24),
            Self::HourBefore => Duration::hours(1),
        }
    }
}

impl ActiveEventState {
    /// A fresh run of `definition` starting at `now`.
    ///
    /// # Errors
    ///
    /// Propagates the handler's setup error.
    pub fn begin(
        community: CommunityId,
        definition: &EventDefinition,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            community,
            definition_id: definition.id.clone(),
            run_id: Uuid::new_v4(),
            started_at: now,
            ends_at: now + definition.schedule.duration(),
            sub_state: SubState::setup(definition)?,
            totals: BTreeMap::new(),
            reached: BTreeSet::new(),
            warned: BTreeSet::new(),
        })
    }

    /// Whether the run's time is up.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// The end warning to announce at `now`, if it has not gone out yet.
    ///
    /// Only the nearest threshold counts, and a run no longer than a
    /// threshold never gets that warning.
    #[must_use]
    pub fn due_warning(&self, now: DateTime<Utc>) -> Option<EndWarning> {
        let remaining = self.ends_at - now;
        let length = self.ends_at - self.started_at;
        [EndWarning::HourBefore, EndWarning::DayBefore]
            .into_iter()
            .find(|w| remaining <= w.lead())
            .filter(|w| length > w.lead() && !self.warned.contains(w))
    }

    /// Adds an applied amount to the participant's running total.
    pub fn record(&mut self, participant: ParticipantId, applied: u64) {
        if applied == 0 {
            return;
        }
        let total = self.totals.entry(participant).or_insert(0);
        *total = total.saturating_add(applied);
    }

    /// Participants with a recorded total, in id order.
    #[must_use]
    pub fn participants(&self) -> Vec<ParticipantId> {
        self.totals.keys().copied().collect()
    }
}
