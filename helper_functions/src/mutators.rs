use core::cmp::Ordering;

use anyhow::Result;
use types::{
    config::Config,
    consts::FAR_FUTURE_EPOCH,
    primitives::{Gwei, ValidatorIndex},
    state::BeaconState,
};

use crate::{
    accessors::{get_current_epoch, get_validator_churn_limit},
    error::Error,
    misc::compute_activation_exit_epoch,
};

pub fn balance<'state>(
    state: &'state mut BeaconState,
    validator_index: ValidatorIndex,
) -> Result<&'state mut Gwei> {
    state
        .balances_mut()
        .get_mut(validator_index)
        .map_err(Into::into)
}

#[inline]
pub fn increase_balance(balance: &mut Gwei, delta: Gwei) {
    *balance += delta;
}

#[inline]
pub fn decrease_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_sub(delta);
}

pub fn clamp_balance(config: &Config, balance: &mut Gwei) {
    *balance = config.effective_balance_increment.get().max(*balance);
}

/// Schedules a validator's exit at the earliest epoch the churn limit allows.
pub fn initiate_validator_exit(
    config: &Config,
    state: &mut BeaconState,
    validator_index: ValidatorIndex,
) -> Result<()> {
    // > Return if validator already initiated exit
    if state.validators().get(validator_index)?.exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(());
    }

    // > Compute exit queue epoch
    let mut exit_queue_epoch = compute_activation_exit_epoch(config, get_current_epoch(config, state));
    let mut exit_queue_churn = 0;

    for validator in state.validators() {
        let exit_epoch = validator.exit_epoch;

        if exit_epoch == FAR_FUTURE_EPOCH {
            continue;
        }

        match exit_epoch.cmp(&exit_queue_epoch) {
            Ordering::Less => {}
            Ordering::Equal => exit_queue_churn += 1,
            Ordering::Greater => {
                exit_queue_epoch = exit_epoch;
                exit_queue_churn = 1;
            }
        }
    }

    if exit_queue_churn >= get_validator_churn_limit(config, state) {
        exit_queue_epoch += 1;
    }

    // > Set validator exit epoch and withdrawable epoch
    let withdrawable_epoch = exit_queue_epoch
        .checked_add(config.min_validator_withdrawability_delay)
        .ok_or(Error::EpochOverflow)?;

    let validator = state.validators_mut().get_mut(validator_index)?;

    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch = withdrawable_epoch;

    Ok(())
}
