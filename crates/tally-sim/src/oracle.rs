//! Invariant checks run against viewers while a simulation executes.
//!
//! Every check compares what a widget renders with what the harness
//! independently knows: the set reduced from the snapshot it delivered and
//! the ids of the clicks it issued.

use serde::{Deserialize, Serialize};
use tally_core::reducer::ActiveSet;
use tally_core::widget::RenderState;
use tally_core::{IntentId, Resolution, WriteOutcome};

use crate::viewer::{ViewerId, ViewerState};

/// Diagnostic for a single failed invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// Rendered view does not match `|A \ {viewer}| + desired`, or the plain
    /// membership when no intent is held.
    CountFormula {
        viewer: ViewerId,
        round: u64,
        expected: RenderState,
        actual: RenderState,
    },
    /// A completion for a superseded intent changed the current intent.
    StaleCompletionApplied {
        viewer: ViewerId,
        round: u64,
        completed: IntentId,
        current: Option<IntentId>,
        resolution: Resolution,
    },
    /// A rejected current intent did not fall back to the observed view.
    RevertMismatch {
        viewer: ViewerId,
        round: u64,
        expected: RenderState,
        actual: RenderState,
        resolution: Resolution,
    },
    /// After quiescence the viewer still disagrees with the reduced log.
    Divergence {
        viewer: ViewerId,
        expected: RenderState,
        actual: RenderState,
        intent_outstanding: bool,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CountFormula {
                viewer,
                round,
                expected,
                actual,
            } => write!(
                f,
                "CountFormula: viewer {viewer} at round {round} rendered {actual:?}, expected {expected:?}"
            ),
            Self::StaleCompletionApplied {
                viewer,
                round,
                completed,
                current,
                resolution,
            } => write!(
                f,
                "StaleCompletion: viewer {viewer} at round {round} resolved superseded {completed} \
                 as {resolution:?} (current={current:?})"
            ),
            Self::RevertMismatch {
                viewer,
                round,
                expected,
                actual,
                resolution,
            } => write!(
                f,
                "Revert: viewer {viewer} at round {round} resolved rejection as {resolution:?}, \
                 rendered {actual:?}, expected {expected:?}"
            ),
            Self::Divergence {
                viewer,
                expected,
                actual,
                intent_outstanding,
            } => write!(
                f,
                "Divergence: viewer {viewer} rendered {actual:?} after quiescence, expected \
                 {expected:?} (intent_outstanding={intent_outstanding})"
            ),
        }
    }
}

/// The view with no intent held.
#[must_use]
pub fn base_view(observed: Option<&ActiveSet>, actor: &str) -> RenderState {
    RenderState {
        count: observed.map_or(0, ActiveSet::len),
        is_active: observed.map(|set| set.contains(actor)),
    }
}

/// The view for `state` over `observed`, honoring any held intent.
#[must_use]
pub fn expected_view(state: &ViewerState, observed: Option<&ActiveSet>) -> RenderState {
    match state.intent {
        Some(intent) => RenderState {
            count: observed.map_or(0, |set| set.len_without(&state.actor))
                + usize::from(intent.desired_active),
            is_active: Some(intent.desired_active),
        },
        None => base_view(observed, &state.actor),
    }
}

/// Rendered state must follow the overlay formula.
#[must_use]
pub fn check_count_formula(
    round: u64,
    state: &ViewerState,
    observed: Option<&ActiveSet>,
) -> Option<InvariantViolation> {
    let expected = expected_view(state, observed);
    (expected != state.render).then(|| InvariantViolation::CountFormula {
        viewer: state.id,
        round,
        expected,
        actual: state.render,
    })
}

/// What happened when one completion was delivered.
#[derive(Debug, Clone, Copy)]
pub struct CompletionCheck<'a> {
    pub round: u64,
    pub completed: IntentId,
    pub outcome: WriteOutcome,
    pub resolution: Resolution,
    pub before: &'a ViewerState,
    pub after: &'a ViewerState,
    pub observed: Option<&'a ActiveSet>,
}

/// A superseded completion is a no-op; a rejected current intent reverts.
#[must_use]
pub fn check_completion(check: &CompletionCheck<'_>) -> Option<InvariantViolation> {
    let current = check.before.intent.map(|intent| intent.id);
    if current != Some(check.completed) {
        let untouched = check.resolution == Resolution::Stale && check.after.intent == check.before.intent;
        return (!untouched).then(|| InvariantViolation::StaleCompletionApplied {
            viewer: check.before.id,
            round: check.round,
            completed: check.completed,
            current,
            resolution: check.resolution,
        });
    }

    if check.outcome == WriteOutcome::Rejected {
        let expected = base_view(check.observed, &check.after.actor);
        let reverted = check.resolution == Resolution::Reverted
            && check.after.intent.is_none()
            && check.after.render == expected;
        return (!reverted).then(|| InvariantViolation::RevertMismatch {
            viewer: check.before.id,
            round: check.round,
            expected,
            actual: check.after.render,
            resolution: check.resolution,
        });
    }
    None
}

/// After quiescence the view equals the reduced log and no intent remains.
#[must_use]
pub fn check_convergence(state: &ViewerState, log: &ActiveSet) -> Option<InvariantViolation> {
    let expected = base_view(Some(log), &state.actor);
    let converged = state.intent.is_none() && state.render == expected;
    (!converged).then(|| InvariantViolation::Divergence {
        viewer: state.id,
        expected,
        actual: state.render,
        intent_outstanding: state.intent.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::overlay::{IntentPhase, Overlay};
    use tally_core::PendingIntent;

    fn set(members: &[&str]) -> ActiveSet {
        members.iter().map(|m| (*m).to_string()).collect()
    }

    fn state(render: RenderState, intent: Option<PendingIntent>) -> ViewerState {
        ViewerState {
            id: 0,
            actor: "me".into(),
            render,
            intent,
        }
    }

    fn intent(desired_active: bool) -> PendingIntent {
        let id = Overlay::default().begin(desired_active);
        PendingIntent {
            id,
            desired_active,
            phase: IntentPhase::Pending,
        }
    }

    fn rs(count: usize, is_active: Option<bool>) -> RenderState {
        RenderState { count, is_active }
    }

    #[test]
    fn formula_with_intent() {
        let observed = set(&["me", "a"]);
        let s = state(rs(1, Some(false)), Some(intent(false)));
        assert!(check_count_formula(0, &s, Some(&observed)).is_none());

        let wrong = state(rs(2, Some(false)), Some(intent(false)));
        assert!(check_count_formula(0, &wrong, Some(&observed)).is_some());
    }

    #[test]
    fn formula_while_loading() {
        assert!(check_count_formula(0, &state(rs(0, None), None), None).is_none());
        assert!(check_count_formula(0, &state(rs(1, Some(true)), Some(intent(true))), None).is_none());
    }

    #[test]
    fn stale_completion_must_not_touch_intent() {
        let held = intent(true);
        let before = state(rs(1, Some(true)), Some(held));
        let mut superseded = held.id;
        // Any id other than the held one.
        let mut overlay = Overlay::default();
        while superseded == held.id {
            superseded = overlay.begin(false);
        }
        let after_ok = before.clone();
        let ok = CompletionCheck {
            round: 3,
            completed: superseded,
            outcome: WriteOutcome::Rejected,
            resolution: Resolution::Stale,
            before: &before,
            after: &after_ok,
            observed: None,
        };
        assert!(check_completion(&ok).is_none());

        let after_bad = state(rs(0, Some(false)), None);
        let bad = CompletionCheck {
            resolution: Resolution::Reverted,
            after: &after_bad,
            ..ok
        };
        assert!(matches!(
            check_completion(&bad),
            Some(InvariantViolation::StaleCompletionApplied { .. })
        ));
    }

    #[test]
    fn rejection_must_revert() {
        let held = intent(true);
        let observed = set(&["a"]);
        let before = state(rs(2, Some(true)), Some(held));
        let after = state(rs(1, Some(false)), None);
        let check = CompletionCheck {
            round: 1,
            completed: held.id,
            outcome: WriteOutcome::Rejected,
            resolution: Resolution::Reverted,
            before: &before,
            after: &after,
            observed: Some(&observed),
        };
        assert!(check_completion(&check).is_none());

        let still_on = state(rs(2, Some(true)), Some(held));
        assert!(check_completion(&CompletionCheck { after: &still_on, ..check }).is_some());
    }

    #[test]
    fn convergence_requires_no_intent() {
        let log = set(&["me"]);
        assert!(check_convergence(&state(rs(1, Some(true)), None), &log).is_none());
        assert!(check_convergence(&state(rs(1, Some(true)), Some(intent(true))), &log).is_some());
    }
}
