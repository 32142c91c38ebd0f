use proptest::prelude::*;
use std::collections::BTreeMap;
use tally_core::overlay::{Overlay, WriteOutcome};
use tally_core::reducer::{ActiveSet, Observation, reduce_entries};
use tally_core::{ActionEntry, ActionPair};

fn pair() -> ActionPair {
    ActionPair::new("like", "unlike")
}

fn arb_actor() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["alice", "bob", "carol", "dave", "erin"]).prop_map(String::from)
}

fn arb_tag() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => Just("like".to_string()),
        3 => Just("unlike".to_string()),
        1 => Just("repost".to_string()),
    ]
}

fn arb_entries() -> impl Strategy<Value = Vec<ActionEntry>> {
    prop::collection::vec(
        (arb_actor(), arb_tag()).prop_map(|(actor, tag)| ActionEntry::new(actor, tag)),
        0..40,
    )
}

/// Entries with distinct heights, so their order is fully determined.
fn arb_heighted_entries() -> impl Strategy<Value = Vec<ActionEntry>> {
    arb_entries().prop_map(|entries| {
        entries
            .into_iter()
            .zip(1_u64..)
            .map(|(entry, height)| entry.at_height(height))
            .collect()
    })
}

fn arb_active_set() -> impl Strategy<Value = ActiveSet> {
    prop::collection::btree_set(arb_actor(), 0..5).prop_map(|s| s.into_iter().collect())
}

/// Reference semantics: per actor, the last recognised tag in sequence order.
fn last_tag_per_actor(entries: &[&ActionEntry]) -> ActiveSet {
    let mut last: BTreeMap<&str, bool> = BTreeMap::new();
    for entry in entries {
        match entry.tag() {
            "like" => {
                last.insert(&entry.actor, true);
            }
            "unlike" => {
                last.insert(&entry.actor, false);
            }
            _ => {}
        }
    }
    last.into_iter()
        .filter(|(_, active)| *active)
        .map(|(actor, _)| actor.to_string())
        .collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn fold_matches_last_tag_semantics(entries in arb_entries()) {
        let refs: Vec<&ActionEntry> = entries.iter().collect();
        prop_assert_eq!(reduce_entries(&entries, &pair()), last_tag_per_actor(&refs));
    }

    #[test]
    fn heighted_fold_is_order_independent(
        entries in arb_heighted_entries(),
        seed in any::<u64>(),
    ) {
        let mut shuffled = entries.clone();
        // Deterministic Fisher-Yates driven by the seed.
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = usize::try_from(state % (i as u64 + 1)).unwrap_or(0);
            shuffled.swap(i, j);
        }
        prop_assert_eq!(reduce_entries(&entries, &pair()), reduce_entries(&shuffled, &pair()));
    }

    #[test]
    fn interleaving_other_actors_does_not_matter(entries in arb_entries()) {
        // Stable-partition by actor keeps each actor's own order intact.
        let mut grouped = entries.clone();
        grouped.sort_by(|a, b| a.actor.cmp(&b.actor));
        prop_assert_eq!(reduce_entries(&entries, &pair()), reduce_entries(&grouped, &pair()));
    }

    #[test]
    fn repeating_do_is_idempotent(entries in arb_entries(), actor in arb_actor()) {
        let mut once = entries.clone();
        once.push(ActionEntry::new(actor.clone(), "like"));
        let mut twice = once.clone();
        twice.push(ActionEntry::new(actor, "like"));
        let a = reduce_entries(&once, &pair());
        let b = reduce_entries(&twice, &pair());
        prop_assert_eq!(a.len(), b.len());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn optimistic_count_formula(
        base in arb_active_set(),
        actor in arb_actor(),
        desired in any::<bool>(),
    ) {
        let mut overlay = Overlay::new(2);
        overlay.begin(desired);
        let view = overlay.view(&Observation::Loaded(base.clone()), Some(&actor));
        let without: usize = base.iter().filter(|m| **m != actor).count();
        prop_assert_eq!(view.count, without + usize::from(desired));
        prop_assert_eq!(view.is_active, Some(desired));
    }

    #[test]
    fn rejection_restores_pre_click_view(
        base in arb_active_set(),
        actor in arb_actor(),
        desired in any::<bool>(),
    ) {
        let obs = Observation::Loaded(base);
        let mut overlay = Overlay::new(2);
        let before = overlay.view(&obs, Some(&actor));
        let id = overlay.begin(desired);
        overlay.resolve(id, WriteOutcome::Rejected, &obs, Some(&actor));
        prop_assert_eq!(overlay.view(&obs, Some(&actor)), before);
    }

    #[test]
    fn stale_completion_never_clears_newer_intent(
        clicks in prop::collection::vec(any::<bool>(), 2..8),
        rejected in any::<bool>(),
        actor in arb_actor(),
    ) {
        let obs = Observation::Loaded(ActiveSet::new());
        let mut overlay = Overlay::new(2);
        let ids: Vec<_> = clicks.iter().map(|d| overlay.begin(*d)).collect();
        let newest = *ids.last().expect("at least two clicks");
        let outcome = if rejected { WriteOutcome::Rejected } else { WriteOutcome::Committed };
        for id in &ids[..ids.len() - 1] {
            overlay.resolve(*id, outcome, &obs, Some(&actor));
        }
        prop_assert_eq!(overlay.intent().map(|i| i.id), Some(newest));
    }
}
