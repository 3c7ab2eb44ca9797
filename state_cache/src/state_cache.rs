use core::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use im::{HashMap, OrdMap};
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use std_ext::ArcExt as _;
use tap::Pipe as _;
use thiserror::Error;
use types::{
    primitives::{Slot, H256},
    state::BeaconState,
};

type StateMap = OrdMap<Slot, Arc<BeaconState>>;
type StateMapLock = Arc<Mutex<StateMap>>;

#[derive(Debug, Error)]
enum CacheLockError {
    #[error("could not obtain state cache lock in {} ms", timeout.as_millis())]
    CacheLockTimeout { timeout: Duration },
    #[error(
        "could not obtain state map lock in {} ms with state root {state_root:?}",
        timeout.as_millis()
    )]
    StateMapLockTimeout { state_root: H256, timeout: Duration },
}

/// Cache of advanced states keyed by the structural root of the state they
/// were advanced from.
///
/// A per-root mutex is held for the whole duration of a computation, so
/// concurrent callers asking for the same (root, slot) pair block until the
/// first one publishes its result and then receive a cheap copy of it.
/// Lookups for distinct roots proceed in parallel.
///
/// Every lock acquisition carries a timeout. A caller that cannot take a lock
/// in time falls back to computing without the cache, so cache-internal
/// contention can cost time but never correctness.
pub struct StateCache {
    cache: Mutex<HashMap<H256, StateMapLock>>,
    enabled: AtomicBool,
    max_states_per_root: usize,
    try_lock_timeout: Duration,
}

impl StateCache {
    #[must_use]
    pub fn new(try_lock_timeout: Duration, max_states_per_root: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            max_states_per_root,
            try_lock_timeout,
        }
    }

    /// Makes subsequent lookups go through the cache.
    /// Computations already in flight are not affected.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Makes subsequent lookups bypass the cache entirely.
    /// Computations already in flight are not affected.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn before_or_at_slot(
        &self,
        state_root: H256,
        slot: Slot,
    ) -> Result<Option<Arc<BeaconState>>> {
        let Some(state_map_lock) = self.get_by_root(state_root)? else {
            return Ok(None);
        };

        let state_map = self.try_lock_map(&state_map_lock, state_root)?;

        state_map
            .get_prev(&slot)
            .map(|(_, state)| state.clone_arc())
            .pipe(Ok)
    }

    /// Returns the cached state for `(state_root, slot)` or computes it with
    /// `f` while holding the per-root lock, deduplicating concurrent callers.
    ///
    /// `f` receives the closest already-cached state at or below `slot`, if
    /// any, so it can resume from partial progress instead of starting over.
    ///
    /// When a lock cannot be taken in time the caller computes directly,
    /// without reading or updating the cache.
    pub fn get_or_insert_with(
        &self,
        state_root: H256,
        slot: Slot,
        f: impl FnOnce(Option<&Arc<BeaconState>>) -> Result<Arc<BeaconState>>,
    ) -> Result<Arc<BeaconState>> {
        let state_map_lock = match self.get_or_init_by_root(state_root) {
            Ok(lock) => lock,
            Err(error) => {
                if error.is::<CacheLockError>() {
                    return f(None);
                }

                return Err(error);
            }
        };

        let mut state_map_guard = match self.try_lock_map(&state_map_lock, state_root) {
            Ok(guard) => guard,
            Err(error) => {
                if error.is::<CacheLockError>() {
                    return f(None);
                }

                return Err(error);
            }
        };

        let pre_state = state_map_guard.get_prev(&slot).map(|(_, state)| state);

        if let Some(state) = pre_state {
            if state.slot() >= slot {
                return Ok(state.clone_arc());
            }
        }

        let post_state = f(pre_state)?;

        Self::insert_into_map(
            &mut state_map_guard,
            post_state.clone_arc(),
            self.max_states_per_root,
        );

        Ok(post_state)
    }

    pub fn insert(&self, state_root: H256, state: Arc<BeaconState>) -> Result<()> {
        let state_map_lock = self.get_or_init_by_root(state_root)?;

        Self::insert_into_map(
            &mut *self.try_lock_map(&state_map_lock, state_root)?,
            state,
            self.max_states_per_root,
        );

        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let lengths = self
            .all_state_map_locks()?
            .into_iter()
            .map(|(state_root, state_map_lock)| {
                self.try_lock_map(&state_map_lock, state_root)?
                    .len()
                    .pipe(Ok)
            })
            .collect::<Result<Vec<_>>>()?;

        lengths.into_iter().sum::<usize>().pipe(Ok)
    }

    /// Drops every cached state at or below `last_pruned_slot`
    /// and forgets roots whose maps become empty.
    pub fn prune(&self, last_pruned_slot: Slot) -> Result<()> {
        for (state_root, state_map_lock) in self.all_state_map_locks()? {
            let mut state_map = self.try_lock_map(&state_map_lock, state_root)?;
            let (_, retained) = state_map.split(&last_pruned_slot);
            *state_map = retained;
        }

        self.try_lock_cache()?.retain(|state_root, state_map_lock| {
            self.try_lock_map(state_map_lock, *state_root)
                .ok()
                .is_some_and(|state_map| !state_map.is_empty())
        });

        debug!("pruned state cache up to slot {last_pruned_slot}");

        Ok(())
    }

    fn insert_into_map(state_map: &mut StateMap, state: Arc<BeaconState>, max_states: usize) {
        state_map.insert(state.slot(), state);

        // Size-bounded eviction. The oldest entries go first. An entry being
        // computed cannot be evicted because this runs under the same lock.
        while state_map.len() > max_states {
            let oldest = state_map
                .get_min()
                .map(|(slot, _)| *slot)
                .expect("state map is not empty because its length exceeds max_states");

            state_map.remove(&oldest);
        }
    }

    fn all_state_map_locks(&self) -> Result<Vec<(H256, StateMapLock)>> {
        self.try_lock_cache()?
            .iter()
            .map(|(state_root, state_map_lock)| (*state_root, state_map_lock.clone_arc()))
            .collect::<Vec<_>>()
            .pipe(Ok)
    }

    fn get_or_init_by_root(&self, state_root: H256) -> Result<StateMapLock> {
        self.try_lock_cache()?
            .entry(state_root)
            .or_insert_with(StateMapLock::default)
            .clone_arc()
            .pipe(Ok)
    }

    fn get_by_root(&self, state_root: H256) -> Result<Option<StateMapLock>> {
        self.try_lock_cache()?.get(&state_root).cloned().pipe(Ok)
    }

    fn try_lock_cache(&self) -> Result<MutexGuard<HashMap<H256, StateMapLock>>> {
        let timeout = self.try_lock_timeout;

        self.cache.try_lock_for(timeout).ok_or_else(|| {
            let error = CacheLockError::CacheLockTimeout { timeout };

            warn!("{error}");

            anyhow!(error)
        })
    }

    fn try_lock_map<'map>(
        &self,
        state_map_lock: &'map StateMapLock,
        state_root: H256,
    ) -> Result<MutexGuard<'map, StateMap>> {
        let timeout = self.try_lock_timeout;

        state_map_lock.try_lock_for(timeout).ok_or_else(|| {
            let error = CacheLockError::StateMapLockTimeout {
                state_root,
                timeout,
            };

            warn!("{error}");

            anyhow!(error)
        })
    }
}

#[cfg(test)]
mod tests {
    use types::config::Config;

    use super::*;

    const ROOT_1: H256 = H256::repeat_byte(1);
    const ROOT_2: H256 = H256::repeat_byte(2);
    const ROOT_3: H256 = H256::repeat_byte(3);

    #[test]
    fn test_state_cache_len() -> Result<()> {
        let cache = new_test_cache()?;

        assert_eq!(cache.len()?, 4);

        Ok(())
    }

    #[test]
    fn test_state_cache_before_or_at_slot() -> Result<()> {
        let cache = new_test_cache()?;

        assert_eq!(cache.before_or_at_slot(ROOT_2, 1)?, None);
        assert_eq!(cache.before_or_at_slot(ROOT_2, 3)?, Some(state_at_slot(3)));
        assert_eq!(cache.before_or_at_slot(ROOT_2, 4)?, Some(state_at_slot(3)));
        assert_eq!(cache.before_or_at_slot(ROOT_2, 9)?, Some(state_at_slot(5)));
        assert_eq!(cache.before_or_at_slot(ROOT_3, 9)?, None);

        Ok(())
    }

    #[test]
    fn test_state_cache_get_or_insert_with() -> Result<()> {
        let cache = new_test_cache()?;

        cache.get_or_insert_with(ROOT_2, 1, |_| Ok(state_at_slot(1)))?;

        assert_eq!(cache.before_or_at_slot(ROOT_2, 1)?, Some(state_at_slot(1)));
        assert_eq!(cache.len()?, 5);

        // A cached state at or past the requested slot short-circuits.
        let cached =
            cache.get_or_insert_with(ROOT_2, 3, |_| unreachable!("slot 3 is already cached"))?;

        assert_eq!(cached, state_at_slot(3));

        // The closure receives the nearest cached predecessor.
        cache.get_or_insert_with(ROOT_1, 2, |pre_state| {
            assert_eq!(pre_state, Some(&state_at_slot(1)));

            Ok(state_at_slot(2))
        })?;

        assert_eq!(cache.before_or_at_slot(ROOT_1, 2)?, Some(state_at_slot(2)));
        assert_eq!(cache.len()?, 6);

        Ok(())
    }

    #[test]
    fn test_state_cache_prune() -> Result<()> {
        let cache = new_test_cache()?;

        cache.prune(2)?;

        assert_eq!(cache.before_or_at_slot(ROOT_1, 1)?, None);
        assert_eq!(cache.before_or_at_slot(ROOT_2, 2)?, None);
        assert_eq!(cache.before_or_at_slot(ROOT_2, 3)?, Some(state_at_slot(3)));
        assert_eq!(cache.before_or_at_slot(ROOT_2, 5)?, Some(state_at_slot(5)));
        assert_eq!(cache.len()?, 2);

        Ok(())
    }

    #[test]
    fn test_state_cache_size_bound() -> Result<()> {
        let cache = StateCache::new(Duration::from_secs(1), 2);

        for slot in 1..=4 {
            cache.insert(ROOT_1, state_at_slot(slot))?;
        }

        // Only the two newest states survive.
        assert_eq!(cache.len()?, 2);
        assert_eq!(cache.before_or_at_slot(ROOT_1, 2)?, None);
        assert_eq!(cache.before_or_at_slot(ROOT_1, 4)?, Some(state_at_slot(4)));

        Ok(())
    }

    #[test]
    fn test_state_cache_toggle() {
        let cache = StateCache::new(Duration::from_secs(1), 16);

        assert!(cache.is_enabled());

        cache.disable();
        assert!(!cache.is_enabled());

        cache.enable();
        assert!(cache.is_enabled());
    }

    fn new_test_cache() -> Result<StateCache> {
        let cache = StateCache::new(Duration::from_secs(1), 16);

        cache.insert(ROOT_1, state_at_slot(1))?;
        cache.insert(ROOT_2, state_at_slot(2))?;
        cache.insert(ROOT_2, state_at_slot(3))?;
        cache.insert(ROOT_2, state_at_slot(5))?;

        Ok(cache)
    }

    fn state_at_slot(slot: Slot) -> Arc<BeaconState> {
        let mut state = BeaconState::empty(&Config::minimal());
        *state.slot_mut() = slot;
        Arc::new(state)
    }
}
