//! End-to-end toggle flows through `ToggleWidget` and `MemoryStore`.
//!
//! Covers the click -> submit -> complete -> observe cycle, races between a
//! viewer's own writes and background snapshot refreshes, and the guards
//! that keep clicks inert while the base state is unknown.

use serde_json::json;
use tally_core::config::{ReconcileConfig, WidgetConfig};
use tally_core::overlay::Resolution;
use tally_core::store::{ActionStore, MemoryStore};
use tally_core::widget::{ClickOutcome, IgnoreReason, RenderState};
use tally_core::{ActionEntry, Subject, ToggleWidget, WriteOutcome};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn like_config() -> WidgetConfig {
    WidgetConfig {
        action_name: "like".into(),
        action_undo_name: "unlike".into(),
        index_key: None,
        notify_account_id: Some("author.near".into()),
    }
}

fn subject() -> Subject {
    Subject::social("author.near/widget/Gallery")
}

fn viewer(actor: &str) -> ToggleWidget {
    ToggleWidget::new(
        &like_config(),
        &ReconcileConfig::default(),
        subject(),
        Some(actor.to_string()),
    )
}

fn rs(count: usize, is_active: Option<bool>) -> RenderState {
    RenderState { count, is_active }
}

fn submitted(outcome: ClickOutcome) -> tally_core::ToggleCommand {
    match outcome {
        ClickOutcome::Submitted(cmd) => cmd,
        ClickOutcome::Ignored(reason) => panic!("click ignored: {reason:?}"),
    }
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[test]
fn like_then_unlike_round_trip() {
    let mut store = MemoryStore::new();
    store.append("like", &subject(), ActionEntry::new("x.near", "like"));
    let mut w = viewer("me.near");
    w.refresh(&store);
    assert_eq!(w.render(), rs(1, Some(false)));

    w.click_and_submit(&mut store).expect("like accepted");
    w.refresh(&store);
    assert_eq!(w.render(), rs(2, Some(true)));
    assert!(w.intent().is_none());

    w.click_and_submit(&mut store).expect("unlike accepted");
    w.refresh(&store);
    assert_eq!(w.render(), rs(1, Some(false)));

    let tags: Vec<String> = store
        .index("like", &subject())
        .expect("loaded")
        .into_iter()
        .filter(|e| e.actor == "me.near")
        .map(|e| e.value.tag)
        .collect();
    assert_eq!(tags, ["like", "unlike"]);
    assert_eq!(store.notifications().len(), 1);
    assert_eq!(
        store.graph(),
        &json!({"like": {"author.near": {"widget": {"Gallery": null}}}})
    );
}

#[test]
fn stale_background_snapshot_does_not_flicker() {
    let mut store = MemoryStore::new();
    let mut w = viewer("me.near");
    w.refresh(&store);
    let stale_height = store.height();

    let cmd = submitted(w.click());
    assert_eq!(cmd.submit(&mut store), WriteOutcome::Committed);

    // A refresh that raced the write still shows the old log.
    w.observe(Some(store.index_at("like", &subject(), stale_height)));
    assert_eq!(w.render(), rs(1, Some(true)));

    assert_eq!(w.complete(cmd.intent, WriteOutcome::Committed), Resolution::Acknowledged);
    w.observe(Some(store.index_at("like", &subject(), stale_height)));
    assert_eq!(w.render(), rs(1, Some(true)));

    w.refresh(&store);
    assert_eq!(w.render(), rs(1, Some(true)));
    assert!(w.intent().is_none());
}

#[test]
fn out_of_order_completions_keep_latest_click() {
    let mut store = MemoryStore::new();
    let mut w = viewer("me.near");
    w.refresh(&store);

    let first = submitted(w.click());
    let second = submitted(w.click());
    assert!(first.desired_active);
    assert!(!second.desired_active);

    // Second write lands first. The last observed log already shows the
    // viewer inactive, so the commit clears the override at once.
    assert_eq!(second.submit(&mut store), WriteOutcome::Committed);
    assert_eq!(w.complete(second.intent, WriteOutcome::Committed), Resolution::Cleared);
    assert_eq!(first.submit(&mut store), WriteOutcome::Committed);
    assert_eq!(w.complete(first.intent, WriteOutcome::Committed), Resolution::Stale);
    assert_eq!(w.render(), rs(0, Some(false)));

    // The first write landed last, so the log says "like" and wins.
    w.refresh(&store);
    assert!(w.intent().is_none());
    assert_eq!(w.render(), rs(1, Some(true)));
}

#[test]
fn acknowledged_intent_yields_to_persistent_disagreement() {
    let mut store = MemoryStore::new();
    let mut w = viewer("me.near");
    w.refresh(&store);

    let cmd = submitted(w.click());
    // The store accepted the write but another session undid it right after.
    assert_eq!(cmd.submit(&mut store), WriteOutcome::Committed);
    store.append("like", &subject(), ActionEntry::new("me.near", "unlike"));
    assert_eq!(w.complete(cmd.intent, WriteOutcome::Committed), Resolution::Acknowledged);

    let tolerance = ReconcileConfig::default().stale_snapshot_tolerance;
    for _ in 0..tolerance {
        w.refresh(&store);
        assert_eq!(w.render(), rs(1, Some(true)));
    }
    w.refresh(&store);
    assert!(w.intent().is_none());
    assert_eq!(w.render(), rs(0, Some(false)));
}

#[test]
fn other_writers_are_picked_up_while_pending() {
    let mut store = MemoryStore::new();
    let mut w = viewer("me.near");
    w.refresh(&store);
    let cmd = submitted(w.click());

    store.append("like", &subject(), ActionEntry::new("a.near", "like"));
    store.append("like", &subject(), ActionEntry::new("b.near", "like"));
    w.refresh(&store);
    assert_eq!(w.render(), rs(3, Some(true)));

    w.complete(cmd.intent, WriteOutcome::Rejected);
    assert_eq!(w.render(), rs(2, Some(false)));
}

#[test]
fn loading_log_blocks_clicks_until_loaded() {
    let mut store = MemoryStore::new().unloaded();
    let mut w = viewer("me.near");
    w.refresh(&store);
    assert_eq!(w.render(), rs(0, None));
    assert_eq!(w.click(), ClickOutcome::Ignored(IgnoreReason::Loading));

    store.set_loaded(true);
    w.refresh(&store);
    assert!(matches!(w.click(), ClickOutcome::Submitted(_)));
}

#[test]
fn self_authored_subject_does_not_notify() {
    let mut store = MemoryStore::new();
    let mut w = viewer("author.near");
    w.refresh(&store);
    w.click_and_submit(&mut store).expect("accepted");
    assert!(store.notifications().is_empty());
}

#[test]
fn malformed_path_still_records_the_like() {
    let mut store = MemoryStore::new();
    let bad = Subject::social("author.near");
    let mut w = ToggleWidget::new(
        &like_config(),
        &ReconcileConfig::default(),
        bad.clone(),
        Some("me.near".into()),
    );
    w.refresh(&store);
    w.click_and_submit(&mut store).expect("accepted");
    w.refresh(&store);
    assert_eq!(w.render(), rs(1, Some(true)));
    assert_eq!(store.graph(), &serde_json::Value::Null);
    assert_eq!(store.index("like", &bad).map(|e| e.len()), Some(1));
}

#[test]
fn config_with_only_action_name_sees_its_own_likes() {
    let root = tempfile::tempdir().expect("temp dir");
    std::fs::create_dir_all(root.path().join(".tally")).expect("create .tally");
    std::fs::write(
        root.path().join(".tally/config.toml"),
        "[widget]\naction_name = \"like\"\n",
    )
    .expect("write config");
    let cfg = tally_core::config::load_project_config(root.path()).expect("load config");

    let mut store = MemoryStore::new();
    let mut w = ToggleWidget::new(&cfg.widget, &cfg.reconcile, subject(), Some("me.near".into()));
    w.refresh(&store);
    w.click_and_submit(&mut store).expect("like accepted");

    let tolerance = cfg.reconcile.stale_snapshot_tolerance;
    for _ in 0..=tolerance + 1 {
        w.refresh(&store);
        assert_eq!(w.render(), rs(1, Some(true)));
    }
    assert!(w.intent().is_none());
    assert_eq!(store.index("like", &subject()).map(|e| e.len()), Some(1));
}
