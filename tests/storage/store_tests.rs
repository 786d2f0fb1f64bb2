//! Store interface tests.
//!
//! These tests verify the contract of the Store trait.
//! Each storage implementation should run these tests against a writable,
//! initially empty store. Every test uses its own key prefix.

use bytes::Bytes;
use futures::TryStreamExt;
use tokio_test::{assert_err, assert_ok};

use storewatch::interfaces::{AccessMode, ByteRange, Store, StoreError};

fn value(data: &'static [u8]) -> Bytes {
    Bytes::from_static(data)
}

fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys
}

// =============================================================================
// Store::get / Store::set tests
// =============================================================================

pub async fn test_set_and_get<S: Store>(store: &S) {
    let key = "test_set_get/zarr.json";

    store.set(key, value(b"{}")).await.expect("set should succeed");

    let stored = store.get(key, None).await.expect("get should succeed");
    assert_eq!(stored, Some(value(b"{}")));
}

pub async fn test_get_missing<S: Store>(store: &S) {
    let stored = assert_ok!(store.get("test_get_missing/absent", None).await);
    assert!(stored.is_none(), "missing key should read as None");
}

pub async fn test_set_overwrites<S: Store>(store: &S) {
    let key = "test_overwrite/c/0";

    store.set(key, value(b"first")).await.unwrap();
    store.set(key, value(b"second")).await.unwrap();

    assert_eq!(store.get(key, None).await.unwrap(), Some(value(b"second")));
}

pub async fn test_get_byte_ranges<S: Store>(store: &S) {
    let key = "test_byte_range/c/0";
    store.set(key, value(b"0123456789")).await.unwrap();

    let bounded = store.get(key, Some(ByteRange::new(Some(2), Some(5)))).await;
    assert_eq!(bounded.unwrap(), Some(value(b"234")));

    let suffix = store.get(key, Some(ByteRange::starting_at(7))).await;
    assert_eq!(suffix.unwrap(), Some(value(b"789")));

    let head = store.get(key, Some(ByteRange::up_to(2))).await;
    assert_eq!(head.unwrap(), Some(value(b"01")));

    let past_end = store.get(key, Some(ByteRange::new(Some(8), Some(100)))).await;
    assert_eq!(past_end.unwrap(), Some(value(b"89")));
}

pub async fn test_get_partial_values<S: Store>(store: &S) {
    store.set("test_partial_get/a", value(b"abcdef")).await.unwrap();
    store.set("test_partial_get/b", value(b"xyz")).await.unwrap();

    let values = store
        .get_partial_values(&[
            ("test_partial_get/b".to_string(), None),
            ("test_partial_get/missing".to_string(), None),
            (
                "test_partial_get/a".to_string(),
                Some(ByteRange::new(Some(1), Some(3))),
            ),
        ])
        .await
        .expect("get_partial_values should succeed");

    assert_eq!(values, vec![Some(value(b"xyz")), None, Some(value(b"bc"))]);
}

pub async fn test_exists<S: Store>(store: &S) {
    let key = "test_exists/k";
    assert!(!store.exists(key).await.unwrap());

    store.set(key, value(b"1")).await.unwrap();

    assert!(store.exists(key).await.unwrap());
}

// =============================================================================
// Conditional and partial writes
// =============================================================================

pub async fn test_set_if_not_exists<S: Store>(store: &S) {
    let key = "test_set_if_not_exists/k";

    let first = store.set_if_not_exists(key, value(b"first")).await.unwrap();
    let second = store.set_if_not_exists(key, value(b"second")).await.unwrap();

    assert!(first, "first write should happen");
    assert!(!second, "second write should be skipped");
    assert_eq!(store.get(key, None).await.unwrap(), Some(value(b"first")));
}

pub async fn test_set_partial_values<S: Store>(store: &S) {
    if !store.supports_partial_writes() {
        return;
    }
    let key = "test_partial_set/c/0";
    store.set(key, value(b"0123456789")).await.unwrap();

    store
        .set_partial_values(&[
            (key.to_string(), 2, value(b"ab")),
            (key.to_string(), 8, value(b"XYZ")),
        ])
        .await
        .expect("set_partial_values should succeed");

    assert_eq!(
        store.get(key, None).await.unwrap(),
        Some(value(b"01ab4567XYZ"))
    );
}

pub async fn test_set_partial_values_invalid_offset<S: Store>(store: &S) {
    if !store.supports_partial_writes() {
        return;
    }
    let good = "test_partial_offset/good";

    let result = store
        .set_partial_values(&[
            ("test_partial_offset/bad".to_string(), u64::MAX, value(b"x")),
            (good.to_string(), 0, value(b"y")),
        ])
        .await;

    let err = assert_err!(result);
    assert!(
        matches!(err, StoreError::InvalidOffset { offset: u64::MAX, .. }),
        "unexpected error: {err}"
    );
    assert_eq!(store.get(good, None).await.unwrap(), Some(value(b"y")));
}

// =============================================================================
// Key validation
// =============================================================================

pub async fn test_rejects_invalid_keys<S: Store>(store: &S) {
    let err = assert_err!(store.set("../escaped", value(b"x")).await);
    assert!(matches!(err, StoreError::InvalidKey(_)), "unexpected error: {err}");

    let err = assert_err!(store.get("a/../../escaped", None).await);
    assert!(matches!(err, StoreError::InvalidKey(_)), "unexpected error: {err}");

    let err = assert_err!(store.exists("").await);
    assert!(matches!(err, StoreError::InvalidKey(_)), "unexpected error: {err}");
}

// =============================================================================
// Store::delete tests
// =============================================================================

pub async fn test_delete<S: Store>(store: &S) {
    let key = "test_delete/k";
    store.set(key, value(b"1")).await.unwrap();

    store.delete(key).await.expect("delete should succeed");

    assert!(!store.exists(key).await.unwrap());
    assert!(store.get(key, None).await.unwrap().is_none());
}

pub async fn test_delete_missing<S: Store>(store: &S) {
    assert_ok!(store.delete("test_delete_missing/k").await);
}

// =============================================================================
// Listing tests
// =============================================================================

pub async fn test_list_prefix<S: Store>(store: &S) {
    for key in ["test_list_prefix/a", "test_list_prefix/b/c", "test_list_prefixed"] {
        store.set(key, value(b"1")).await.unwrap();
    }

    let keys: Vec<String> = store
        .list_prefix("test_list_prefix/")
        .try_collect()
        .await
        .expect("list_prefix should succeed");

    assert_eq!(
        sorted(keys),
        vec!["test_list_prefix/a", "test_list_prefix/b/c"]
    );
}

pub async fn test_list_dir<S: Store>(store: &S) {
    for key in ["test_list_dir/zarr.json", "test_list_dir/c/0/0", "test_list_dir/c/1/0"] {
        store.set(key, value(b"1")).await.unwrap();
    }

    let children: Vec<String> = store.list_dir("test_list_dir").try_collect().await.unwrap();
    assert_eq!(sorted(children), vec!["c", "zarr.json"]);

    let nested: Vec<String> = store.list_dir("test_list_dir/c").try_collect().await.unwrap();
    assert_eq!(sorted(nested), vec!["0", "1"]);

    let absent: Vec<String> = store
        .list_dir("test_list_dir_absent")
        .try_collect()
        .await
        .unwrap();
    assert!(absent.is_empty());
}

pub async fn test_list_contains_written_keys<S: Store>(store: &S) {
    store.set("test_list/one", value(b"1")).await.unwrap();
    store.set("test_list/two", value(b"2")).await.unwrap();

    let keys: Vec<String> = store.list().try_collect().await.unwrap();

    assert!(keys.contains(&"test_list/one".to_string()));
    assert!(keys.contains(&"test_list/two".to_string()));
}

// =============================================================================
// Modes
// =============================================================================

pub async fn test_read_mode_rejects_writes<S: Store>(store: &S) {
    let key = "test_read_mode/k";
    store.set(key, value(b"1")).await.unwrap();

    let reader = store.with_mode(AccessMode::Read).expect("with_mode should succeed");

    assert_eq!(reader.mode(), AccessMode::Read);
    assert_eq!(reader.get(key, None).await.unwrap(), Some(value(b"1")));
    let err = assert_err!(reader.set(key, value(b"2")).await);
    assert!(matches!(err, StoreError::ReadOnly), "unexpected error: {err}");
    assert_ne!(store.mode(), AccessMode::Read, "mode of the source store must not change");
}

pub async fn test_empty_and_clear<S: Store>(store: &S) {
    store.set("test_clear/k", value(b"1")).await.unwrap();
    assert!(!store.empty().await.unwrap());

    store.clear().await.expect("clear should succeed");

    assert!(store.empty().await.unwrap());
    let keys: Vec<String> = store.list().try_collect().await.unwrap();
    assert!(keys.is_empty());
}

/// Run all Store interface tests against an implementation.
#[macro_export]
macro_rules! run_store_tests {
    ($store:expr) => {
        use $crate::storage::store_tests::*;

        test_set_and_get($store).await;
        println!("  test_set_and_get: PASSED");

        test_get_missing($store).await;
        println!("  test_get_missing: PASSED");

        test_set_overwrites($store).await;
        println!("  test_set_overwrites: PASSED");

        test_get_byte_ranges($store).await;
        println!("  test_get_byte_ranges: PASSED");

        test_get_partial_values($store).await;
        println!("  test_get_partial_values: PASSED");

        test_exists($store).await;
        println!("  test_exists: PASSED");

        test_set_if_not_exists($store).await;
        println!("  test_set_if_not_exists: PASSED");

        test_set_partial_values($store).await;
        println!("  test_set_partial_values: PASSED");

        test_set_partial_values_invalid_offset($store).await;
        println!("  test_set_partial_values_invalid_offset: PASSED");

        test_rejects_invalid_keys($store).await;
        println!("  test_rejects_invalid_keys: PASSED");

        test_delete($store).await;
        println!("  test_delete: PASSED");

        test_delete_missing($store).await;
        println!("  test_delete_missing: PASSED");

        test_list_prefix($store).await;
        println!("  test_list_prefix: PASSED");

        test_list_dir($store).await;
        println!("  test_list_dir: PASSED");

        test_list_contains_written_keys($store).await;
        println!("  test_list_contains_written_keys: PASSED");

        test_read_mode_rejects_writes($store).await;
        println!("  test_read_mode_rejects_writes: PASSED");

        // clears the store; keep last
        test_empty_and_clear($store).await;
        println!("  test_empty_and_clear: PASSED");
    };
}
