//! Worker-pool behaviour at a realistic batch size.

use std::sync::atomic::{AtomicUsize, Ordering};

use ftis::dispatch::{map_items, parallel, sequential, ItemDispatch};
use ftis::error::{DispatchError, Result, StageError};

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("item-{:03}", i)).collect()
}

#[test]
fn test_one_failure_among_hundred_items() {
    let items = keys(100);
    let calls = AtomicUsize::new(0);

    let report = parallel("Pool", &items, 4, |key: &String| -> Result<usize> {
        calls.fetch_add(1, Ordering::SeqCst);
        if key == "item-057" {
            return Err(StageError::analysis("Pool", "unreadable header").into());
        }
        Ok(key.len())
    })
    .unwrap();

    // Every item ran: a failure does not stop the other workers
    assert_eq!(calls.load(Ordering::SeqCst), 100);
    assert_eq!(report.results.len(), 99);
    assert!(!report.results.contains_key("item-057"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, "item-057");
    assert!(report.failures[0].message.contains("unreadable header"));
    assert!(report.missing.is_empty());

    match report.into_complete() {
        Err(DispatchError::Incomplete { failed, missing, .. }) => {
            assert_eq!(failed.len(), 1);
            assert!(missing.is_empty());
        }
        other => panic!("expected an incomplete dispatch, got {:?}", other.map(|r| r.len())),
    }
}

#[test]
fn test_panicking_item_is_reported_not_propagated() {
    let items = keys(100);

    let report = parallel("Pool", &items, 4, |key: &String| -> Result<String> {
        if key == "item-057" {
            panic!("decoder crashed on {}", key);
        }
        Ok(key.to_uppercase())
    })
    .unwrap();

    assert_eq!(report.results.len(), 99);
    assert_eq!(report.results["item-000"], "ITEM-000");
    assert_eq!(report.failures[0].key, "item-057");
    assert!(report.failures[0].message.contains("decoder crashed"));
}

#[test]
fn test_more_workers_than_items() {
    let items = keys(3);
    let report = parallel("Pool", &items, 64, |key: &String| -> Result<usize> { Ok(key.len()) })
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.results.len(), 3);
}

#[test]
fn test_empty_batch() {
    let items: Vec<String> = Vec::new();
    let report = parallel("Pool", &items, 4, |key: &String| -> Result<usize> { Ok(key.len()) })
        .unwrap();
    assert!(report.is_complete());
    assert!(report.results.is_empty());
}

#[test]
fn test_sequential_stops_at_first_failure() {
    let items = keys(10);
    let calls = AtomicUsize::new(0);

    let err = sequential("Seq", &items, |key: &String| -> Result<()> {
        calls.fetch_add(1, Ordering::SeqCst);
        if key == "item-004" {
            return Err(StageError::analysis("Seq", "bad frame").into());
        }
        Ok(())
    })
    .unwrap_err();

    assert!(matches!(err, DispatchError::ItemFailed { ref key, .. } if key == "item-004"));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_both_strategies_agree() {
    let items = keys(40);
    let f = |key: &String| -> Result<usize> { Ok(key.bytes().map(usize::from).sum()) };

    let seq = map_items("Agree", ItemDispatch::Sequential, &items, 1, f).unwrap();
    let par = map_items("Agree", ItemDispatch::Parallel, &items, 8, f).unwrap();
    assert_eq!(seq, par);
}

#[test]
fn test_duplicate_keys_rejected_before_work() {
    let items = vec!["same".to_string(), "same".to_string()];
    let calls = AtomicUsize::new(0);

    let err = parallel("Dup", &items, 2, |_: &String| -> Result<()> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap_err();

    assert!(matches!(err, DispatchError::DuplicateKey { ref key, .. } if key == "same"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
