//! Property tests for path correctness, wrap totality, delete
//! idempotence, and patch-replay agreement of the observed tree.

#![allow(clippy::unwrap_used)]

use mirador_tree::ObservedTree;
use mirador_types::{Key, Patch, Path};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(Key::from),
        (0_u64..1000).prop_map(Key::Index),
    ]
}

fn path_strategy() -> impl Strategy<Value = Vec<Key>> {
    proptest::collection::vec(key_strategy(), 1..7)
}

/// Nest `leaf` under `keys` as plain JSON objects.
fn nest(keys: &[Key], leaf: Value) -> Value {
    keys.iter().rev().fold(leaf, |inner, key| {
        let mut map = Map::new();
        map.insert(key.to_member_name(), inner);
        Value::Object(map)
    })
}

proptest! {
    #[test]
    fn leaf_write_reports_exact_path(keys in path_strategy(), leaf in any::<i64>()) {
        let mut tree = ObservedTree::wrap(json!({}), Vec::<Patch>::new()).unwrap();

        // Build the intermediate mappings one level at a time.
        let mut prefix = Path::root();
        for key in keys.iter().take(keys.len().saturating_sub(1)) {
            prefix.push(key.clone());
            tree.set(&prefix, json!({})).unwrap();
        }
        tree.handler_mut().clear();

        let full = Path::from(keys.clone());
        tree.set(&full, leaf).unwrap();

        prop_assert_eq!(tree.handler().len(), 1);
        let patch = &tree.handler()[0];
        prop_assert_eq!(patch.path().len(), keys.len());
        prop_assert_eq!(patch.path().keys(), keys.as_slice());
        prop_assert_eq!(patch, &Patch::set(full, json!(leaf)));
    }

    #[test]
    fn assigned_subtree_is_fully_observed(
        head in key_strategy(),
        inner in proptest::collection::vec(key_strategy(), 2..6),
        leaf in any::<bool>(),
    ) {
        let mut tree = ObservedTree::wrap(json!({}), Vec::<Patch>::new()).unwrap();
        tree.set(&Path::from(vec![head.clone()]), nest(&inner, json!(null))).unwrap();
        tree.handler_mut().clear();

        // Write two (or more) levels inside the freshly assigned value.
        let mut deep = vec![head];
        deep.extend(inner.iter().cloned());
        let deep = Path::from(deep);
        tree.set(&deep, leaf).unwrap();

        prop_assert_eq!(tree.handler().as_slice(), &[Patch::set(deep.clone(), json!(leaf))]);
        prop_assert_eq!(tree.get(&deep), Some(json!(leaf)));
    }

    #[test]
    fn second_delete_is_silent(keys in path_strategy()) {
        let root = nest(&keys, json!({"payload": [1, 2, 3]}));
        let mut tree = ObservedTree::wrap(root, Vec::<Patch>::new()).unwrap();
        let baseline_slots = tree.arena_slots();
        let full = Path::from(keys);

        prop_assert!(tree.delete(&full).unwrap());
        prop_assert!(!tree.delete(&full).unwrap());
        prop_assert_eq!(tree.handler().as_slice(), &[Patch::delete(full.clone())]);

        // Re-assigning reuses the released slots.
        tree.set(&full, json!({"payload": [1, 2, 3]})).unwrap();
        prop_assert_eq!(tree.arena_slots(), baseline_slots);
    }

    #[test]
    fn replayed_patches_match_snapshot_after_array_edits(
        len in 1_usize..8,
        deletes in proptest::collection::vec(0_u64..10, 0..8),
        appends in 0_usize..3,
    ) {
        let initial = json!({"list": (0..len).collect::<Vec<_>>()});
        let mut tree = ObservedTree::wrap(initial.clone(), Vec::<Patch>::new()).unwrap();
        let list = Path::from(vec![Key::from("list")]);

        for index in deletes {
            tree.delete(&list.child(index)).unwrap();
        }
        for value in 0..appends {
            let next = tree.len_at(&list).unwrap();
            tree.set(&list.child(u64::try_from(next).unwrap()), value).unwrap();
        }

        let mut mirror = initial;
        for patch in tree.handler() {
            prop_assert!(patch.apply_to(&mut mirror));
        }
        prop_assert_eq!(&mirror, &tree.snapshot());
        prop_assert_eq!(tree.len_at(&list), Some(len.saturating_add(appends)));
    }
}
