//! Engine error types.
//!
//! Business rejections and infrastructure faults are separate types: a
//! `Rejection` is an expected outcome reported to the caller with no state
//! change, while an `EngineError` is a genuine fault.

use serde::Serialize;
use thiserror::Error;

use crate::ids::CommunityId;

/// Expected, recoverable business outcomes. Never logged as errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Rejection {
    /// No event is running in the community.
    #[error("no event is active in community {community}")]
    NoActiveEvent {
        /// The community that was addressed.
        community: CommunityId,
    },

    /// The caller addressed an event other than the one running.
    #[error("event {requested} is not the active event ({active})")]
    EventMismatch {
        /// The event id the caller asked for.
        requested: String,
        /// The event id that is actually running.
        active: String,
    },

    /// The community is not one the engine schedules.
    #[error("community {community} is not managed by this engine")]
    UnknownCommunity {
        /// The community that was addressed.
        community: CommunityId,
    },

    /// An event is already running in the community.
    #[error("event {active} is already running")]
    EventAlreadyRunning {
        /// The event id that is running.
        active: String,
    },

    /// The registry has no definition with this id.
    #[error("unknown event definition {event_id}")]
    UnknownEvent {
        /// The requested definition id.
        event_id: String,
    },

    /// The participant cannot pay the currency cost.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Currency required.
        required: u64,
        /// Currency available.
        available: u64,
    },

    /// The participant cannot pay the item cost.
    #[error("insufficient items: need {required} {item_key}, have {available}")]
    InsufficientItems {
        /// Item key required.
        item_key: String,
        /// Quantity required.
        required: u64,
        /// Quantity available.
        available: u64,
    },

    /// The participant used up today's allowance for this action.
    #[error("daily limit reached ({limit}/{limit})")]
    LimitReached {
        /// Configured per-day limit.
        limit: u32,
    },

    /// The active event has no action at this index.
    #[error("unknown action index {index}")]
    UnknownAction {
        /// Requested action index.
        index: usize,
    },

    /// The active event does not accept this kind of operation.
    #[error("event {event_id} does not support {operation}")]
    UnsupportedOperation {
        /// The active event id.
        event_id: String,
        /// The attempted operation.
        operation: &'static str,
    },

    /// The participant has no quest with this id.
    #[error("quest {quest_id} not found")]
    QuestNotFound {
        /// Requested quest id.
        quest_id: String,
    },

    /// The quest has not reached its target yet.
    #[error("quest {quest_id} is not completed")]
    QuestNotCompleted {
        /// Requested quest id.
        quest_id: String,
    },

    /// The quest reward was already handed out.
    #[error("quest {quest_id} already claimed")]
    AlreadyClaimed {
        /// Requested quest id.
        quest_id: String,
    },

    /// Amounts must be strictly positive.
    #[error("amount must be greater than zero")]
    InvalidAmount,
}

impl Rejection {
    /// Machine-readable code for this rejection.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveEvent { .. } => "no_active_event",
            Self::EventMismatch { .. } => "event_mismatch",
            Self::UnknownCommunity { .. } => "unknown_community",
            Self::EventAlreadyRunning { .. } => "event_already_running",
            Self::UnknownEvent { .. } => "unknown_event",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientItems { .. } => "insufficient_items",
            Self::LimitReached { .. } => "limit_reached",
            Self::UnknownAction { .. } => "unknown_action",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::QuestNotFound { .. } => "quest_not_found",
            Self::QuestNotCompleted { .. } => "quest_not_completed",
            Self::AlreadyClaimed { .. } => "already_claimed",
            Self::InvalidAmount => "invalid_amount",
        }
    }
}

/// Top-level engine fault type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A bounded persistence call timed out or hit contention. Retryable.
    #[error("transient error: {0}")]
    Transient(String),

    /// A persistence or collaborator call failed.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// An operation would break an engine invariant and was refused.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Configuration could not be loaded at all.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Persisted state could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the caller may retry the same call unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
