use serde::{Deserialize, Serialize};
use tally_core::config::{ReconcileConfig, WidgetConfig};
use tally_core::reducer::{ActiveSet, reduce_entries};
use tally_core::widget::RenderState;
use tally_core::{ClickOutcome, PendingIntent, Snapshot, Subject, ToggleWidget};

/// Stable identifier for a simulated viewer.
pub type ViewerId = usize;

/// One browser session rendering the toggle.
#[derive(Debug)]
pub struct SimulatedViewer {
    id: ViewerId,
    widget: ToggleWidget,
    /// The set reduced from the last snapshot delivered, computed here
    /// rather than read back from the widget.
    last_observed: Option<ActiveSet>,
}

/// Immutable summary of a viewer at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerState {
    pub id: ViewerId,
    pub actor: String,
    pub render: RenderState,
    pub intent: Option<PendingIntent>,
}

impl SimulatedViewer {
    #[must_use]
    pub fn new(
        id: ViewerId,
        widget: &WidgetConfig,
        reconcile: &ReconcileConfig,
        subject: Subject,
    ) -> Self {
        Self {
            id,
            widget: ToggleWidget::new(widget, reconcile, subject, Some(actor_name(id))),
            last_observed: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ViewerId {
        self.id
    }

    #[must_use]
    pub const fn widget(&self) -> &ToggleWidget {
        &self.widget
    }

    pub const fn widget_mut(&mut self) -> &mut ToggleWidget {
        &mut self.widget
    }

    #[must_use]
    pub const fn last_observed(&self) -> Option<&ActiveSet> {
        self.last_observed.as_ref()
    }

    pub fn click(&mut self) -> ClickOutcome {
        self.widget.click()
    }

    /// Deliver a snapshot to the widget, keeping an independent reduction.
    pub fn observe(&mut self, snapshot: Snapshot) {
        self.last_observed = snapshot
            .as_deref()
            .map(|entries| reduce_entries(entries, self.widget.pair()));
        self.widget.observe(snapshot);
    }

    #[must_use]
    pub fn state(&self) -> ViewerState {
        ViewerState {
            id: self.id,
            actor: actor_name(self.id),
            render: self.widget.render(),
            intent: self.widget.intent().copied(),
        }
    }
}

/// Account id used by viewer `id`.
#[must_use]
pub fn actor_name(id: ViewerId) -> String {
    format!("viewer-{id}.near")
}
