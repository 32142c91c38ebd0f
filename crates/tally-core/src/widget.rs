//! Per-widget state container.
//!
//! [`ToggleWidget`] owns everything one rendered toggle needs: its
//! configuration, the subject, the viewer's identity, the latest reduced
//! [`Observation`], and the [`Overlay`]. It is driven by three explicit
//! events rather than by a UI framework's re-render cycle:
//!
//! - [`ToggleWidget::observe`]: a fresh snapshot arrived.
//! - [`ToggleWidget::click`]: the viewer pressed the button.
//! - [`ToggleWidget::complete`]: the store answered a submitted write.
//!
//! Listeners registered with [`ToggleWidget::subscribe`] are called with the
//! new [`RenderState`] whenever one of these changes what the viewer sees.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument};

use crate::action::{AccountId, ActionPair, Snapshot};
use crate::command::{ToggleCommand, ToggleRequest, build_payload};
use crate::config::{ReconcileConfig, WidgetConfig};
use crate::overlay::{IntentId, Overlay, PendingIntent, Resolution, WriteOutcome};
use crate::reducer::{Observation, reduce};
use crate::store::ActionStore;
use crate::subject::Subject;

/// What the render function receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderState {
    pub count: usize,
    /// `None` means unknown (log still loading), distinct from `Some(false)`.
    pub is_active: Option<bool>,
}

/// Why a click did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// No viewer identity.
    Unauthenticated,
    /// The log has not loaded, so there is no base state to toggle.
    Loading,
}

/// Result of a click.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The view flipped and this command should be submitted.
    Submitted(ToggleCommand),
    Ignored(IgnoreReason),
}

/// Handle returned by [`ToggleWidget::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&RenderState)>;

pub struct ToggleWidget {
    pair: ActionPair,
    index_slot: String,
    notify_account_id: Option<AccountId>,
    subject: Subject,
    actor: Option<AccountId>,
    observation: Observation,
    overlay: Overlay,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    last_render: RenderState,
}

impl fmt::Debug for ToggleWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToggleWidget")
            .field("pair", &self.pair)
            .field("subject", &self.subject)
            .field("actor", &self.actor)
            .field("observation", &self.observation)
            .field("overlay", &self.overlay)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl ToggleWidget {
    /// Create a widget in the loading state.
    #[must_use]
    pub fn new(
        widget: &WidgetConfig,
        reconcile: &ReconcileConfig,
        subject: Subject,
        actor: Option<AccountId>,
    ) -> Self {
        let observation = Observation::Loading;
        let overlay = Overlay::new(reconcile.stale_snapshot_tolerance);
        let last_render = render_of(&overlay, &observation, actor.as_deref());
        Self {
            pair: widget.pair(),
            index_slot: widget.index_slot().to_string(),
            notify_account_id: widget.notify_account_id.clone(),
            subject,
            actor,
            observation,
            overlay,
            listeners: Vec::new(),
            next_subscription: 0,
            last_render,
        }
    }

    #[must_use]
    pub const fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    #[must_use]
    pub const fn pair(&self) -> &ActionPair {
        &self.pair
    }

    #[must_use]
    pub const fn observation(&self) -> &Observation {
        &self.observation
    }

    #[must_use]
    pub const fn intent(&self) -> Option<&PendingIntent> {
        self.overlay.intent()
    }

    /// Current render state.
    #[must_use]
    pub fn render(&self) -> RenderState {
        render_of(&self.overlay, &self.observation, self.actor.as_deref())
    }

    /// Reduce a fresh snapshot and reconcile the overlay against it.
    #[instrument(skip_all, fields(subject = %self.subject))]
    pub fn observe(&mut self, snapshot: Snapshot) {
        self.observation = reduce(snapshot.as_deref(), &self.pair);
        if self.overlay.reconcile(&self.observation, self.actor.as_deref()) {
            debug!("overlay reconciled with snapshot");
        }
        self.publish();
    }

    /// Read the subject's log from `store` and [`observe`](Self::observe) it.
    pub fn refresh<S: ActionStore + ?Sized>(&mut self, store: &S) {
        let snapshot = store.index(&self.index_slot, &self.subject);
        self.observe(snapshot);
    }

    /// Handle a click: flip the displayed membership and build the write.
    ///
    /// Clicks are ignored without an identity or while the log is loading.
    /// A click while another intent is in flight supersedes it; the earlier
    /// write is not cancelled.
    #[instrument(skip_all, fields(subject = %self.subject))]
    pub fn click(&mut self) -> ClickOutcome {
        let Some(actor) = self.actor.clone() else {
            debug!("click ignored: no viewer identity");
            return ClickOutcome::Ignored(IgnoreReason::Unauthenticated);
        };
        if self.observation.is_loading() {
            debug!("click ignored: action log still loading");
            return ClickOutcome::Ignored(IgnoreReason::Loading);
        }

        let desired_active = !self.render().is_active.unwrap_or(false);
        let payload = build_payload(&ToggleRequest {
            subject: &self.subject,
            pair: &self.pair,
            index_slot: &self.index_slot,
            desired_active,
            actor: &actor,
            notify_account_id: self.notify_account_id.as_deref(),
        });
        let intent = self.overlay.begin(desired_active);
        info!(%intent, %actor, desired_active, "toggle requested");
        self.publish();

        ClickOutcome::Submitted(ToggleCommand {
            intent,
            actor,
            desired_active,
            payload,
        })
    }

    /// Deliver the store's answer for the write issued under `intent`.
    pub fn complete(&mut self, intent: IntentId, outcome: WriteOutcome) -> Resolution {
        let resolution =
            self.overlay
                .resolve(intent, outcome, &self.observation, self.actor.as_deref());
        self.publish();
        resolution
    }

    /// Click, submit to `store` synchronously, and deliver the outcome.
    ///
    /// Returns `None` when the click was ignored.
    pub fn click_and_submit<S: ActionStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Option<(IntentId, Resolution)> {
        let ClickOutcome::Submitted(command) = self.click() else {
            return None;
        };
        let outcome = command.submit(store);
        Some((command.intent, self.complete(command.intent, outcome)))
    }

    /// Replace the viewer identity. Any intent belonged to the previous
    /// viewer and is dropped.
    pub fn set_actor(&mut self, actor: Option<AccountId>) {
        if self.actor == actor {
            return;
        }
        self.actor = actor;
        self.overlay.clear();
        self.publish();
    }

    /// Register a listener called with each new render state.
    pub fn subscribe(&mut self, listener: impl FnMut(&RenderState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn publish(&mut self) {
        let state = self.render();
        if state == self.last_render {
            return;
        }
        self.last_render = state;
        for (_, listener) in &mut self.listeners {
            listener(&state);
        }
    }
}

fn render_of(overlay: &Overlay, observation: &Observation, actor: Option<&str>) -> RenderState {
    let view = overlay.view(observation, actor);
    RenderState {
        count: view.count,
        is_active: view.is_active,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
