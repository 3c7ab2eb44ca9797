use std::time::Instant;

use anyhow::{bail, ensure, Result};
use helper_functions::misc;
use ssz::SszHash as _;
use types::{config::Config, primitives::Slot, state::BeaconState};

use crate::{epoch_processing, error::Error};

/// Caches the roots of the slot that is ending.
pub fn process_slot(state: &mut BeaconState) {
    let slot = state.slot();

    // > Cache state root
    let previous_state_root = state.hash_tree_root();
    *state.state_roots_mut().mod_index_mut(slot) = previous_state_root;

    // > Cache latest block header state root
    if state.latest_block_header().state_root.is_zero() {
        state.latest_block_header_mut().state_root = previous_state_root;
    }

    // > Cache block root
    let previous_block_root = state.latest_block_header().hash_tree_root();
    *state.block_roots_mut().mod_index_mut(slot) = previous_block_root;
}

/// Advances `state` in place to `slot`, running epoch processing at every
/// epoch boundary crossed on the way.
///
/// `deadline` is checked before each slot. On expiry the call fails with
/// [`Error::DeadlineExceeded`] and the state is left mid-advance; callers
/// that hand out states to other components must advance a copy and discard
/// it on failure (see [`advance`](crate::advance)).
pub fn process_slots(
    config: &Config,
    state: &mut BeaconState,
    slot: Slot,
    deadline: Option<Instant>,
) -> Result<()> {
    ensure!(
        state.slot() < slot,
        Error::SlotNotLater {
            current: state.slot(),
            target: slot,
        },
    );

    let start = state.slot();

    while state.slot() < slot {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            bail!(Error::DeadlineExceeded {
                start,
                target: slot,
            });
        }

        process_slot(state);

        if misc::is_epoch_start(config, state.slot() + 1) {
            epoch_processing::process_epoch(config, state)?;
        }

        *state.slot_mut() += 1;
    }

    Ok(())
}
