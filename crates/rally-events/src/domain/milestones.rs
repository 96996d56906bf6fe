//! Milestone evaluation.

use rally_core::ids::ParticipantId;
use rally_registry::domain::definition::EventDefinition;
use serde::Serialize;

use super::state::ActiveEventState;

/// A milestone that fired on this update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneHit {
    /// Threshold percentage.
    pub percent: u32,
    /// Participants with a total at the moment it fired.
    pub recipients: Vec<ParticipantId>,
    /// Announcement text, if configured.
    pub announcement: Option<String>,
}

/// Marks every newly crossed threshold as reached and returns them in
/// ascending order.
///
/// The reached set is a test-and-set: a percentage already present never
/// fires again, however far a single update jumps.
pub fn evaluate(definition: &EventDefinition, state: &mut ActiveEventState) -> Vec<MilestoneHit> {
    let Some(progress) = state.sub_state.progress() else {
        return Vec::new();
    };
    let mut thresholds: Vec<_> = definition.milestones.iter().collect();
    thresholds.sort_by_key(|m| m.percent);

    let mut hits = Vec::new();
    for milestone in thresholds {
        if !progress.reached(milestone.percent) || !state.reached.insert(milestone.percent) {
            continue;
        }
        hits.push(MilestoneHit {
            percent: milestone.percent,
            recipients: state.participants(),
            announcement: milestone.announcement.clone(),
        });
    }
    hits
}
