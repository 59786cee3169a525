//! Tests for KeyValueStore
//!
//! These tests verify:
//! - Put / delete inside a batch
//! - Position tracking (applied index, generation)
//! - Replace and clear
//! - Key-ordered dumps

use replikv::store::KeyValueStore;
use replikv::Mutation;

#[test]
fn test_new_store_is_empty() {
    let store = KeyValueStore::new();
    assert!(store.is_empty());
    assert_eq!(store.applied_index(), 0);
    assert_eq!(store.generation(), 0);
}

#[test]
fn test_apply_batch_puts_and_deletes() {
    let mut store = KeyValueStore::new();
    store.apply_batch(
        1,
        1,
        &[Mutation::put("a", b"1".to_vec()), Mutation::put("b", b"2".to_vec())],
    );
    store.apply_batch(2, 1, &[Mutation::delete("a"), Mutation::put("c", b"3".to_vec())]);

    assert_eq!(store.get("a"), None);
    assert_eq!(store.get("b"), Some(&b"2".to_vec()));
    assert_eq!(store.get("c"), Some(&b"3".to_vec()));
    assert_eq!(store.applied_index(), 2);
}

#[test]
fn test_later_mutation_in_batch_wins() {
    let mut store = KeyValueStore::new();
    store.apply_batch(
        1,
        1,
        &[Mutation::put("k", b"first".to_vec()), Mutation::put("k", b"second".to_vec())],
    );
    assert_eq!(store.get("k"), Some(&b"second".to_vec()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_missing_key_is_harmless() {
    let mut store = KeyValueStore::new();
    store.apply_batch(1, 1, &[Mutation::delete("ghost")]);
    assert!(store.is_empty());
    assert_eq!(store.applied_index(), 1);
}

#[test]
fn test_advance_never_lowers_generation() {
    let mut store = KeyValueStore::new();
    store.advance(1, 5);
    store.advance(2, 3);
    assert_eq!(store.generation(), 5);
    assert_eq!(store.applied_index(), 2);
}

#[test]
fn test_dump_is_key_ordered() {
    let mut store = KeyValueStore::new();
    store.apply_batch(
        1,
        1,
        &[
            Mutation::put("zeta", b"z".to_vec()),
            Mutation::put("alpha", b"a".to_vec()),
            Mutation::put("mid", b"m".to_vec()),
        ],
    );

    let keys: Vec<String> = store.dump().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_replace_and_clear() {
    let mut store = KeyValueStore::new();
    store.apply_batch(1, 1, &[Mutation::put("old", b"x".to_vec())]);

    store.replace(10, 3, vec![("new".to_string(), b"y".to_vec())]);
    assert!(!store.contains_key("old"));
    assert_eq!(store.applied_index(), 10);
    assert_eq!(store.generation(), 3);

    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.applied_index(), 0);
    assert_eq!(store.generation(), 0);
}
