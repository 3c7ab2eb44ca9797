use std::{sync::Arc, time::Instant};

use anyhow::Result;
use state_cache::StateCache;
use types::{config::Config, primitives::Slot, state::BeaconState};

use crate::slot_processing;

/// Advances `state` to `target_slot`, deduplicating concurrent identical
/// requests through `cache`.
///
/// The caller's state is never mutated: the advance happens on a cheap copy,
/// so failures (including deadline expiry) leave no observable trace and the
/// call is always safe to retry.
///
/// Whether the cache is enabled, disabled, or toggled concurrently, the
/// returned state's structural root is identical to the one produced by
/// sequential, uncached application of the same transition rules. The cache
/// only affects how often the transition actually runs.
pub fn advance(
    config: &Config,
    cache: &StateCache,
    state: &Arc<BeaconState>,
    target_slot: Slot,
    deadline: Option<Instant>,
) -> Result<Arc<BeaconState>> {
    if !cache.is_enabled() {
        return advance_directly(config, state, target_slot, deadline);
    }

    let state_root = state.hash_tree_root();

    cache.get_or_insert_with(state_root, target_slot, |pre_state| {
        // Cached entries under this key were all advanced from this same
        // state. Resuming from the closest one is sound because slot
        // advancement composes.
        let starting_point = pre_state.unwrap_or(state);
        advance_directly(config, starting_point, target_slot, deadline)
    })
}

fn advance_directly(
    config: &Config,
    state: &Arc<BeaconState>,
    target_slot: Slot,
    deadline: Option<Instant>,
) -> Result<Arc<BeaconState>> {
    let mut working = (**state).clone();

    slot_processing::process_slots(config, &mut working, target_slot, deadline)?;

    Ok(Arc::new(working))
}

#[cfg(test)]
mod tests {
    use core::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use types::{consts::FAR_FUTURE_EPOCH, containers::Validator, primitives::H256};

    use crate::error::Error;

    use super::*;

    fn test_cache() -> StateCache {
        StateCache::new(Duration::from_secs(5), 64)
    }

    fn forked_state(config: &Config, fork_byte: u8) -> Arc<BeaconState> {
        let mut state = BeaconState::empty(config);

        for index in 0..8_u64 {
            let mut pubkey = [0; bls::PUBLIC_KEY_BYTES];
            pubkey[0] = fork_byte;
            pubkey[1..9].copy_from_slice(&index.to_le_bytes());

            let validator = Validator {
                pubkey: pubkey.into(),
                effective_balance: config.max_effective_balance,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..Validator::default()
            };

            state
                .push_validator(validator, config.max_effective_balance)
                .expect("validator count is below the registry limit");
        }

        // Make the two forks diverge in contents, not just in keys.
        *state.randao_mixes_mut().mod_index_mut(0) = H256::repeat_byte(fork_byte);

        Arc::new(state)
    }

    #[test]
    fn the_cache_is_transparent() -> Result<()> {
        let config = Config::minimal();
        let state = forked_state(&config, 1);
        let target_slot = 11;

        let mut expected = (*state).clone();
        slot_processing::process_slots(&config, &mut expected, target_slot, None)?;

        let cached_cache = test_cache();
        let through_cache = advance(&config, &cached_cache, &state, target_slot, None)?;

        let disabled_cache = test_cache();
        disabled_cache.disable();
        let without_cache = advance(&config, &disabled_cache, &state, target_slot, None)?;

        assert_eq!(through_cache.hash_tree_root(), expected.hash_tree_root());
        assert_eq!(without_cache.hash_tree_root(), expected.hash_tree_root());

        // The disabled cache never stored anything.
        assert_eq!(disabled_cache.len()?, 0);

        Ok(())
    }

    #[test]
    fn concurrent_identical_requests_compute_once() -> Result<()> {
        let config = Config::minimal();
        let cache = test_cache();
        let state = forked_state(&config, 1);
        let target_slot = 9;

        let results = std::thread::scope(|scope| {
            let handles = [
                scope.spawn(|| advance(&config, &cache, &state, target_slot, None)),
                scope.spawn(|| advance(&config, &cache, &state, target_slot, None)),
            ];

            handles.map(|handle| handle.join().expect("advancing does not panic"))
        });

        let [first, second] = results;
        let first = first?;
        let second = second?;

        assert_eq!(first.hash_tree_root(), second.hash_tree_root());

        // Both callers hold the same published result, which means the
        // transition itself ran only once.
        assert!(Arc::ptr_eq(&first, &second));

        Ok(())
    }

    #[test]
    fn blocked_callers_receive_the_published_result() -> Result<()> {
        let cache = test_cache();
        let config = Config::minimal();
        let state = forked_state(&config, 1);
        let root = H256::repeat_byte(9);
        let computations = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    cache.get_or_insert_with(root, 5, |_| {
                        computations.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(50));

                        let mut advanced = (*state).clone();
                        *advanced.slot_mut() = 5;

                        Ok(Arc::new(advanced))
                    })
                });
            }
        });

        assert_eq!(computations.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[test]
    fn concurrent_forks_do_not_mix() -> Result<()> {
        let config = Config::minimal();
        let cache = test_cache();
        let target_slot = 10;

        let fork_1 = forked_state(&config, 1);
        let fork_2 = forked_state(&config, 2);

        let expected_1 = advance_directly(&config, &fork_1, target_slot, None)?.hash_tree_root();
        let expected_2 = advance_directly(&config, &fork_2, target_slot, None)?.hash_tree_root();

        assert_ne!(expected_1, expected_2);

        std::thread::scope(|scope| {
            for index in 0..8 {
                let (state, expected) = if index % 2 == 0 {
                    (&fork_1, expected_1)
                } else {
                    (&fork_2, expected_2)
                };

                let cache = &cache;
                let config = &config;

                scope.spawn(move || {
                    // Keep increasing the target to hit and extend the cache.
                    let target = target_slot + index / 2;

                    let advanced = advance(config, cache, state, target, None)
                        .expect("advancing does not fail");

                    let check = advance_directly(config, state, target, None)
                        .expect("advancing does not fail");

                    assert_eq!(advanced.hash_tree_root(), check.hash_tree_root());

                    if target == target_slot {
                        assert_eq!(advanced.hash_tree_root(), expected);
                    }
                });
            }
        });

        Ok(())
    }

    #[test]
    fn failures_leave_the_caller_state_untouched() -> Result<()> {
        let config = Config::minimal();
        let cache = test_cache();
        let state = forked_state(&config, 1);
        let root_before = state.hash_tree_root();

        let expired = Instant::now() - Duration::from_millis(1);
        let error = advance(&config, &cache, &state, 20, Some(expired))
            .expect_err("the deadline has already passed");

        assert_eq!(
            error.downcast_ref::<Error>(),
            Some(&Error::DeadlineExceeded {
                start: 0,
                target: 20,
            }),
        );

        assert_eq!(state.hash_tree_root(), root_before);

        // The failed computation published nothing and the retry succeeds.
        let advanced = advance(&config, &cache, &state, 20, None)?;
        assert_eq!(advanced.slot(), 20);

        Ok(())
    }
}
