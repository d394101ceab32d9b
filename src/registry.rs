// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide registry of in-flight operation names.
//!
//! Every inbound call gets an ephemeral, collision-free key for its lifetime. Code
//! running anywhere inside that call's logical flow can label the enclosing request
//! through the key without holding a reference to the call itself (see
//! [`set_current_operation_name`](crate::remoting::set_current_operation_name)).
//!
//! The registry is the one mutable structure shared across calls, so every
//! operation is a single atomic step on a concurrent map:
//!
//! - [`allocate`](OperationRegistry::allocate) draws random keys until one inserts
//!   cleanly. The key space (u64) is vastly larger than any realistic number of
//!   concurrent calls, so retries are effectively zero.
//! - [`set_name`](OperationRegistry::set_name) quietly ignores keys that are gone;
//!   naming may race call completion and that is not an error.
//! - [`resolve_and_remove`](OperationRegistry::resolve_and_remove) returns
//!   [`DEFAULT_OPERATION_NAME`] for unknown keys.
//!
//! Invariant: the set of live keys is exactly the set of in-flight inbound calls.

use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Name reported for a call that was never explicitly labeled.
pub const DEFAULT_OPERATION_NAME: &str = "Unknown";

/// Process-wide default registry, shared by handlers that are not given their own.
pub static GLOBAL_REGISTRY: Lazy<Arc<OperationRegistry>> =
    Lazy::new(|| Arc::new(OperationRegistry::new()));

/// Source of candidate operation keys.
///
/// Injectable so tests can drive the collision-retry path deterministically.
pub trait KeySource: Send + Sync {
    /// Produce the next candidate key.
    fn next_key(&self) -> u64;
}

/// Default key source: a seeded-from-entropy [`StdRng`] behind a mutex.
pub struct RandomKeySource {
    rng: Mutex<StdRng>,
}

impl RandomKeySource {
    /// Create a key source seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a key source with a fixed seed, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for RandomKeySource {
    fn next_key(&self) -> u64 {
        // Lock poisoning only happens if a holder panicked; take the value anyway.
        match self.rng.lock() {
            Ok(mut rng) => rng.gen(),
            Err(poisoned) => poisoned.into_inner().gen(),
        }
    }
}

/// Registry mapping live operation keys to mutable operation names.
pub struct OperationRegistry {
    names: DashMap<u64, String>,
    keys: Box<dyn KeySource>,
}

impl OperationRegistry {
    /// Create a registry with the default random key source.
    pub fn new() -> Self {
        Self::with_key_source(Box::new(RandomKeySource::new()))
    }

    /// Create a registry drawing keys from the given source.
    pub fn with_key_source(keys: Box<dyn KeySource>) -> Self {
        Self {
            names: DashMap::new(),
            keys,
        }
    }

    /// Allocate a fresh key, inserting it with the placeholder name.
    ///
    /// Retries with a new random key until the insert succeeds, so the returned key
    /// is guaranteed distinct from every currently live key.
    pub fn allocate(&self) -> u64 {
        loop {
            let key = self.keys.next_key();
            match self.names.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(DEFAULT_OPERATION_NAME.to_string());
                    return key;
                }
                Entry::Occupied(_) => continue,
            }
        }
    }

    /// Overwrite the name of a live entry.
    ///
    /// A missing key means the call already completed; the update is dropped.
    pub fn set_name(&self, key: u64, name: impl Into<String>) {
        if let Some(mut entry) = self.names.get_mut(&key) {
            *entry = name.into();
        }
    }

    /// Atomically remove the entry and return its final name.
    ///
    /// Returns [`DEFAULT_OPERATION_NAME`] if the key is not live.
    pub fn resolve_and_remove(&self, key: u64) -> String {
        match self.names.remove(&key) {
            Some((_, name)) => name,
            None => DEFAULT_OPERATION_NAME.to_string(),
        }
    }

    /// Number of currently live entries (in-flight inbound calls).
    pub fn live_count(&self) -> usize {
        self.names.len()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("live", &self.names.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Key source that yields a fixed sequence, forcing collisions on repeats.
    struct SequenceKeySource {
        seq: Vec<u64>,
        next: AtomicU64,
    }

    impl SequenceKeySource {
        fn new(seq: Vec<u64>) -> Self {
            Self {
                seq,
                next: AtomicU64::new(0),
            }
        }
    }

    impl KeySource for SequenceKeySource {
        fn next_key(&self) -> u64 {
            let i = self.next.fetch_add(1, Ordering::SeqCst) as usize;
            self.seq[i % self.seq.len()]
        }
    }

    #[test]
    fn test_allocate_inserts_placeholder() {
        let registry = OperationRegistry::new();
        let key = registry.allocate();
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.resolve_and_remove(key), DEFAULT_OPERATION_NAME);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_allocate_retries_on_collision() {
        let registry =
            OperationRegistry::with_key_source(Box::new(SequenceKeySource::new(vec![7, 7, 8])));
        let first = registry.allocate();
        let second = registry.allocate();
        assert_eq!(first, 7);
        // The source yields 7 again, which collides and forces a retry onto 8.
        assert_eq!(second, 8);
    }

    #[test]
    fn test_set_name_updates_live_entry() {
        let registry = OperationRegistry::new();
        let key = registry.allocate();
        registry.set_name(key, "GetCount");
        assert_eq!(registry.resolve_and_remove(key), "GetCount");
    }

    #[test]
    fn test_set_name_after_remove_is_noop() {
        let registry = OperationRegistry::new();
        let key = registry.allocate();
        assert_eq!(registry.resolve_and_remove(key), DEFAULT_OPERATION_NAME);
        registry.set_name(key, "TooLate");
        // The entry must not be resurrected.
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.resolve_and_remove(key), DEFAULT_OPERATION_NAME);
    }

    #[test]
    fn test_concurrent_allocations_are_distinct() {
        let registry = Arc::new(OperationRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                (0..200).map(|_| registry.allocate()).collect::<Vec<_>>()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        assert_eq!(all.len(), 1600);
        assert_eq!(registry.live_count(), 1600);

        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1600, "allocated keys must be pairwise distinct");
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = RandomKeySource::seeded(42);
        let b = RandomKeySource::seeded(42);
        assert_eq!(a.next_key(), b.next_key());
    }
}
