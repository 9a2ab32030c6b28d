//! Per-resolver fact memoization.
//!
//! Every resolver owns one [`FactMemo`]. The first request for a fact runs the
//! resolver's OS read under the memo's exclusive lock and stores the result,
//! absent results included, so the read never repeats for the lifetime of the
//! memo. A single read may record several sibling facts at once.
//!
//! Locks are per memo, never global: two threads asking the same resolver
//! serialize on its lock while threads asking different resolvers proceed
//! independently.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{trace, warn};

/// Entries written by a resolver's read routine.
#[derive(Debug, Default)]
pub struct MemoEntries {
    values: HashMap<String, Option<Value>>,
}

impl MemoEntries {
    /// Record a fact value; `None` records "computed but absent".
    pub fn insert(&mut self, fact: impl Into<String>, value: Option<Value>) {
        self.values.insert(fact.into(), value);
    }

    /// Record a serializable value.
    ///
    /// A value that fails to serialize is recorded as absent.
    pub fn insert_serialized<T: Serialize>(&mut self, fact: impl Into<String>, value: &T) {
        let fact = fact.into();
        match serde_json::to_value(value) {
            Ok(value) => self.values.insert(fact, Some(value)),
            Err(e) => {
                warn!(fact = %fact, error = %e, "failed to serialize fact value");
                self.values.insert(fact, None)
            }
        };
    }

    /// Whether a fact has been recorded (present or absent).
    pub fn contains(&self, fact: &str) -> bool {
        self.values.contains_key(fact)
    }

    /// A recorded value.
    pub fn get(&self, fact: &str) -> Option<&Value> {
        self.values.get(fact).and_then(Option::as_ref)
    }
}

/// Process-lifetime memo for one resolver.
#[derive(Debug, Default)]
pub struct FactMemo {
    entries: RwLock<MemoEntries>,
}

impl FactMemo {
    /// Create an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized value for `fact`, running `read` first if the fact
    /// has never been computed.
    ///
    /// `read` receives the entry table and may record any number of facts.
    /// If it does not record `fact` itself, `fact` is recorded as absent.
    pub fn fetch_or_resolve<F>(&self, fact: &str, read: F) -> Option<Value>
    where
        F: FnOnce(&mut MemoEntries),
    {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = entries.values.get(fact) {
                trace!(fact, "memo hit");
                return value.clone();
            }
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Another thread may have resolved it while we waited.
        if let Some(value) = entries.values.get(fact) {
            return value.clone();
        }

        trace!(fact, "memo miss, reading");
        read(&mut *entries);

        entries
            .values
            .entry(fact.to_string())
            .or_insert(None)
            .clone()
    }

    /// Whether `fact` has been computed.
    pub fn is_resolved(&self, fact: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(fact)
    }

    /// Number of recorded facts.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_reads_once() {
        let memo = FactMemo::new();
        let reads = AtomicUsize::new(0);

        let read = |entries: &mut MemoEntries| {
            reads.fetch_add(1, Ordering::SeqCst);
            entries.insert("version", Some(json!("12.4")));
        };

        let first = memo.fetch_or_resolve("version", read);
        let second = memo.fetch_or_resolve("version", |_| {
            reads.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(first, Some(json!("12.4")));
        assert_eq!(first, second);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_absent_result_is_memoized() {
        let memo = FactMemo::new();
        let reads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo.fetch_or_resolve("bios_vendor", |_| {
                reads.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(value, None);
        }

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(memo.is_resolved("bios_vendor"));
    }

    #[test]
    fn test_siblings_are_free() {
        let memo = FactMemo::new();
        memo.fetch_or_resolve("total", |entries| {
            entries.insert("total", Some(json!(1024)));
            entries.insert("available", Some(json!(512)));
        });

        assert!(memo.is_resolved("available"));
        let available = memo.fetch_or_resolve("available", |_| panic!("re-read"));
        assert_eq!(available, Some(json!(512)));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn test_concurrent_callers_read_once() {
        let memo = Arc::new(FactMemo::new());
        let reads = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let reads = Arc::clone(&reads);
                thread::spawn(move || {
                    memo.fetch_or_resolve("partitions", |entries| {
                        reads.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        entries.insert("partitions", Some(json!({})));
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(json!({})));
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_insert_serialized() {
        let mut entries = MemoEntries::default();
        entries.insert_serialized("sizes", &vec![1u64, 2, 3]);
        assert_eq!(entries.get("sizes"), Some(&json!([1, 2, 3])));
    }
}
