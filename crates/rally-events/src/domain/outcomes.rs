//! Results returned by engine operations.
//!
//! Business rejections are ordinary outcomes, not errors: the call succeeded
//! in deciding that nothing should change.

use chrono::{DateTime, Utc};
use rally_core::error::Rejection;
use rally_core::ids::{CommunityId, ParticipantId};
use rally_rewards::domain::plan::Grant;
use serde::Serialize;
use uuid::Uuid;

use super::handlers::{Progress, SubState};

/// What one scheduler tick did for a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Startup has not finished; nothing was evaluated.
    NotReady,
    /// No event running and none eligible to start.
    Idle,
    /// A new run started.
    Started {
        /// Definition started.
        event_id: String,
        /// The new run.
        run_id: Uuid,
    },
    /// The running event expired or finished and was finalized.
    Ended {
        /// Definition ended.
        event_id: String,
        /// Whether the goal was reached.
        completed: bool,
    },
    /// The running event keeps going.
    Continued {
        /// Definition running.
        event_id: String,
    },
}

/// Result of an operator start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// The run started.
    Started {
        /// Definition started.
        event_id: String,
        /// The new run.
        run_id: Uuid,
        /// When it will expire.
        ends_at: DateTime<Utc>,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

/// Result of ending a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EndOutcome {
    /// The run was finalized and cleared.
    Ended {
        /// Definition ended.
        event_id: String,
        /// Whether the goal was reached.
        completed: bool,
        /// Grants applied.
        delivered: usize,
        /// Grants that failed.
        failed: usize,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

/// Result of a contribution or operator progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContributionOutcome {
    /// The contribution was applied. `applied` may be less than `requested`;
    /// the shortfall was not consumed.
    Applied {
        /// Amount that counted.
        applied: u64,
        /// Amount asked for.
        requested: u64,
        /// Milestone percentages fired by this update.
        milestones: Vec<u32>,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

/// Result of a generic action execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Cost paid, usage recorded, rewards granted.
    Executed {
        /// Action executed.
        action_index: usize,
        /// Rewards that rolled and were applied.
        grants: Vec<Grant>,
        /// Executions by this participant today, this one included.
        used_today: u32,
        /// Configured daily limit; `0` is unlimited.
        daily_limit: u32,
        /// Text for the participant: the action's success message, or the
        /// miss text when nothing landed.
        message: Option<String>,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

/// Result of an operator currency grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GrantOutcome {
    /// Currency credited.
    Granted {
        /// Balance after the grant.
        balance: u64,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

/// Read-only view of a running event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStatus {
    /// Owning community.
    pub community: CommunityId,
    /// Definition id.
    pub event_id: String,
    /// Display name.
    pub name: String,
    /// Event type label.
    pub kind: &'static str,
    /// Current run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run expires.
    pub ends_at: DateTime<Utc>,
    /// Type-specific state.
    pub sub_state: SubState,
    /// Progress toward the goal, if the type has one.
    pub progress: Option<Progress>,
    /// Number of participants with a total.
    pub participants: usize,
    /// Best contributors, at most three.
    pub leaders: Vec<(ParticipantId, u64)>,
    /// Milestone percentages already fired.
    pub reached: Vec<u32>,
}

/// What startup found in each community.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Runs rehydrated and resumed.
    pub resumed: Vec<(CommunityId, String)>,
    /// Runs found past their end and discarded without payout.
    pub discarded: Vec<(CommunityId, String)>,
    /// Communities whose state could not be read.
    pub failed: Vec<CommunityId>,
}
