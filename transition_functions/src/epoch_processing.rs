use anyhow::Result;
use arithmetic::{U128Ext as _, U64Ext};
use helper_functions::{
    accessors::{
        combined_participation, get_block_root_at_slot, get_current_epoch, get_next_epoch,
        get_previous_epoch, get_randao_mix, get_sync_committee_for_period,
        get_validator_churn_limit, total_active_balance,
    },
    misc,
    mutators::{decrease_balance, increase_balance, initiate_validator_exit},
    predicates::{
        is_active_validator, is_eligible_for_activation, is_eligible_for_activation_queue,
        is_in_inactivity_leak,
    },
};
use itertools::Itertools as _;
use types::{
    config::Config,
    consts::GENESIS_EPOCH,
    containers::Checkpoint,
    collections::ParticipationList,
    nonstandard::Participation,
    primitives::{Epoch, Gwei},
    state::BeaconState,
};

use crate::epoch_intermediates::{
    self, EpochDeltas as _, EpochDeltasForTransition, Statistics, ValidatorSummary,
};

/// Runs the epoch transition in place.
/// Expected to be called on the last slot of an epoch.
pub fn process_epoch(config: &Config, state: &mut BeaconState) -> Result<()> {
    let participation = combined_participation(state);
    let (statistics, mut summaries) = epoch_intermediates::statistics(config, state, &participation)?;

    process_justification_and_finalization(config, state, statistics);

    process_inactivity_updates(
        config,
        state,
        summaries.iter().copied(),
        participation.iter().copied(),
    );

    // Epoch deltas must be computed after justification and inactivity
    // updates because they read the updated finalized checkpoint and
    // inactivity scores.
    let epoch_deltas: Vec<EpochDeltasForTransition> = epoch_intermediates::epoch_deltas(
        config,
        state,
        statistics,
        summaries.iter().copied(),
        participation,
    )?;

    process_rewards_and_penalties(config, state, epoch_deltas);
    process_registry_updates(config, state, summaries.as_mut_slice())?;
    process_slashings(config, state, summaries)?;
    process_effective_balance_updates(config, state);
    process_slashings_reset(config, state);
    process_randao_mixes_reset(config, state);
    process_participation_flag_updates(config, state);
    process_sync_committee_updates(config, state)?;

    state.cache_mut().advance_epoch();

    Ok(())
}

pub fn process_justification_and_finalization(
    config: &Config,
    state: &mut BeaconState,
    statistics: Statistics,
) {
    if !should_process_justification_and_finalization(config, state) {
        return;
    }

    weigh_justification_and_finalization(
        config,
        state,
        total_active_balance(config, state),
        statistics.previous_epoch_target_participating_balance,
        statistics.current_epoch_target_participating_balance,
    );
}

fn weigh_justification_and_finalization(
    config: &Config,
    state: &mut BeaconState,
    current_epoch_active_balance: Gwei,
    previous_epoch_target_balance: Gwei,
    current_epoch_target_balance: Gwei,
) {
    let old_previous_justified_checkpoint = state.previous_justified_checkpoint();
    let old_current_justified_checkpoint = state.current_justified_checkpoint();

    let previous_epoch = get_previous_epoch(config, state);
    let current_epoch = get_current_epoch(config, state);

    // > Process justifications
    *state.previous_justified_checkpoint_mut() = state.current_justified_checkpoint();
    state.justification_bits_mut().shift_up_by_1();

    let mut justify_if_supermajority = |epoch: Epoch, bit, target_balance: Gwei| {
        if target_balance * 3 >= current_epoch_active_balance * 2 {
            let slot = misc::compute_start_slot_at_epoch(config, epoch);

            let root = get_block_root_at_slot(state, slot).expect(
                "get_block_root_at_slot can fail during the first slot of an epoch but \
                 justification is only weighed at the end of an epoch",
            );

            *state.current_justified_checkpoint_mut() = Checkpoint { epoch, root };

            state.justification_bits_mut().set(bit, true);
        }
    };

    justify_if_supermajority(previous_epoch, 1, previous_epoch_target_balance);
    justify_if_supermajority(current_epoch, 0, current_epoch_target_balance);

    // > Process finalizations
    let bits = state.justification_bits();

    // > The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if bits.all_in(1..4) && old_previous_justified_checkpoint.epoch + 3 == current_epoch {
        *state.finalized_checkpoint_mut() = old_previous_justified_checkpoint;
    }

    // > The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if bits.all_in(1..3) && old_previous_justified_checkpoint.epoch + 2 == current_epoch {
        *state.finalized_checkpoint_mut() = old_previous_justified_checkpoint;
    }

    // > The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if bits.all_in(0..3) && old_current_justified_checkpoint.epoch + 2 == current_epoch {
        *state.finalized_checkpoint_mut() = old_current_justified_checkpoint;
    }

    // > The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if bits.all_in(0..2) && old_current_justified_checkpoint.epoch + 1 == current_epoch {
        *state.finalized_checkpoint_mut() = old_current_justified_checkpoint;
    }
}

pub fn process_inactivity_updates(
    config: &Config,
    state: &mut BeaconState,
    summaries: impl IntoIterator<Item = ValidatorSummary>,
    participation: impl IntoIterator<Item = Participation>,
) {
    if !should_process_inactivity_updates(config, state) {
        return;
    }

    let in_inactivity_leak = is_in_inactivity_leak(config, state);
    let inactivity_score_bias = config.inactivity_score_bias.get();
    let inactivity_score_recovery_rate = config.inactivity_score_recovery_rate;

    let mut summaries = summaries.into_iter();
    let mut participation = participation.into_iter();

    state.inactivity_scores_mut().update(|inactivity_score| {
        let summary = summaries
            .next()
            .expect("summaries should have as many elements as there are validators");

        let participation = participation
            .next()
            .expect("participation should have as many elements as there are validators");

        if !summary.eligible_for_penalties {
            return;
        }

        let unslashed_and_participating = !summary.slashed
            && summary.active_in_previous_epoch
            && participation.previous_epoch_matching_target();

        // > Increase the inactivity score of inactive validators
        if unslashed_and_participating {
            *inactivity_score = inactivity_score.saturating_sub(1);
        } else {
            *inactivity_score += inactivity_score_bias;
        }

        // > Decrease the inactivity score of all eligible validators during a
        // > leak-free epoch
        if !in_inactivity_leak {
            *inactivity_score = inactivity_score.saturating_sub(inactivity_score_recovery_rate);
        }
    });
}

pub fn process_rewards_and_penalties(
    config: &Config,
    state: &mut BeaconState,
    deltas: impl IntoIterator<Item = EpochDeltasForTransition>,
) {
    if !should_process_rewards_and_penalties(config, state) {
        return;
    }

    let mut deltas = deltas.into_iter();

    state.balances_mut().update(|balance| {
        let deltas = deltas
            .next()
            .expect("deltas should have as many elements as there are validators");

        increase_balance(balance, deltas.combined_reward());
        decrease_balance(balance, deltas.combined_penalty());
    });
}

pub fn process_registry_updates(
    config: &Config,
    state: &mut BeaconState,
    summaries: &mut [ValidatorSummary],
) -> Result<()> {
    let current_epoch = get_current_epoch(config, state);
    let next_epoch = get_next_epoch(config, state);

    // The indices collected in these do not overlap.
    let mut eligible_for_activation_queue = vec![];
    let mut ejections = vec![];
    let mut activation_queue = vec![];

    for (validator, validator_index) in state.validators().into_iter().zip(0..) {
        if is_eligible_for_activation_queue(config, validator) {
            eligible_for_activation_queue.push(validator_index);
        }

        if is_active_validator(validator, current_epoch)
            && validator.effective_balance <= config.ejection_balance
        {
            ejections.push(validator_index);
        }

        if is_eligible_for_activation(state, validator) {
            activation_queue.push((validator_index, validator.activation_eligibility_epoch));
        }
    }

    // > Process activation eligibility and ejections
    for validator_index in eligible_for_activation_queue {
        state
            .validators_mut()
            .get_mut(validator_index)?
            .activation_eligibility_epoch = next_epoch;
    }

    for validator_index in ejections {
        let index = usize::try_from(validator_index)?;

        initiate_validator_exit(config, state, validator_index)?;

        // Slashing processing reads `Validator.withdrawable_epoch`,
        // which may have just been modified.
        summaries[index].update_from(state.validators().get(validator_index)?);
    }

    // > Queue validators eligible for activation and not yet dequeued for activation
    let activation_queue = activation_queue
        .into_iter()
        .enumerate()
        .sorted_unstable_by_key(|&(position_in_queue, (_, activation_eligibility_epoch))| {
            // > Order by the sequence of activation_eligibility_epoch setting and then index
            (activation_eligibility_epoch, position_in_queue)
        })
        .map(|(_, (validator_index, _))| validator_index);

    // > Dequeued validators for activation up to churn limit
    let churn_limit = get_validator_churn_limit(config, state).try_into()?;
    let activation_exit_epoch = misc::compute_activation_exit_epoch(config, current_epoch);

    for validator_index in activation_queue.take(churn_limit) {
        state
            .validators_mut()
            .get_mut(validator_index)?
            .activation_epoch = activation_exit_epoch;
    }

    Ok(())
}

fn process_slashings(
    config: &Config,
    state: &mut BeaconState,
    summaries: impl IntoIterator<Item = ValidatorSummary>,
) -> Result<()> {
    let current_epoch = get_current_epoch(config, state);
    let total_active_balance = total_active_balance(config, state);

    let slashings_span = u64::try_from(state.slashings().len())
        .expect("ring buffer length fits in u64");

    let adjusted_total_slashing_balance = (u128::from(
        state.slashings().iter().sum::<Gwei>(),
    ) * u128::from(config.proportional_slashing_multiplier))
    .min(u128::from(total_active_balance));

    let mut summaries = summaries.into_iter();
    let mut result = Ok(());

    let increment = config.effective_balance_increment;

    state.balances_mut().update(|balance| {
        let summary = summaries
            .next()
            .expect("list of validators and list of balances should have the same length");

        let ValidatorSummary {
            effective_balance,
            slashed,
            withdrawable_epoch,
            ..
        } = summary;

        if result.is_err() || !slashed {
            return;
        }

        if current_epoch + slashings_span / 2 != withdrawable_epoch {
            return;
        }

        // > Factored out from penalty numerator to avoid uint64 overflow
        let penalty_numerator =
            u128::from(effective_balance / increment) * adjusted_total_slashing_balance;

        let penalty = penalty_numerator / u128::from(total_active_balance)
            * u128::from(increment.get());

        match penalty.try_into_u64() {
            Ok(penalty) => decrease_balance(balance, penalty),
            Err(error) => result = Err(error),
        }
    });

    result.map_err(Into::into)
}

pub fn process_effective_balance_updates(config: &Config, state: &mut BeaconState) {
    let hysteresis_increment =
        config.effective_balance_increment.get() / config.hysteresis_quotient;
    let downward_threshold = hysteresis_increment * config.hysteresis_downward_multiplier;
    let upward_threshold = hysteresis_increment * config.hysteresis_upward_multiplier;

    let mut balances = state.balances().iter().collect_vec().into_iter();

    // > Update effective balances with hysteresis
    state.validators_mut().update(|validator| {
        let balance = balances
            .next()
            .expect("list of validators and list of balances should have the same length");

        let below = balance + downward_threshold < validator.effective_balance;
        let above = validator.effective_balance + upward_threshold < balance;

        if below || above {
            validator.effective_balance = balance
                .prev_multiple_of(config.effective_balance_increment)
                .min(config.max_effective_balance);
        }
    });
}

pub fn process_slashings_reset(config: &Config, state: &mut BeaconState) {
    let next_epoch = get_next_epoch(config, state);

    // > Reset slashings
    *state.slashings_mut().mod_index_mut(next_epoch) = 0;
}

pub fn process_randao_mixes_reset(config: &Config, state: &mut BeaconState) {
    let current_epoch = get_current_epoch(config, state);
    let next_epoch = get_next_epoch(config, state);

    // > Set randao mix
    *state.randao_mixes_mut().mod_index_mut(next_epoch) = get_randao_mix(state, current_epoch);
}

pub fn process_participation_flag_updates(config: &Config, state: &mut BeaconState) {
    // > Rotate current/previous epoch participation
    let zero_participation = ParticipationList::zeroed(
        state.validators().len_usize(),
        config.validator_registry_limit,
    );

    *state.previous_epoch_participation_mut() = core::mem::replace(
        state.current_epoch_participation_mut(),
        zero_participation,
    );
}

pub fn process_sync_committee_updates(config: &Config, state: &mut BeaconState) -> Result<()> {
    let next_epoch = get_next_epoch(config, state);

    if U64Ext::is_multiple_of(next_epoch, config.epochs_per_sync_committee_period) {
        // The epoch being entered starts a new period. Its committee was
        // already staged in `next_sync_committee`; the slot to fill is the
        // period after it.
        let upcoming_period = misc::sync_committee_period(config, next_epoch) + 1;
        let committee = get_sync_committee_for_period(config, state, upcoming_period)?;

        *state.current_sync_committee_mut() =
            core::mem::replace(state.next_sync_committee_mut(), committee);
    }

    Ok(())
}

pub fn should_process_justification_and_finalization(
    config: &Config,
    state: &BeaconState,
) -> bool {
    // > Initial FFG checkpoint values have a `0x00` stub for `root`.
    // > Skip FFG updates in the first two epochs to avoid
    // > corner cases that might result in modifying this stub.
    GENESIS_EPOCH + 1 < get_current_epoch(config, state)
}

pub fn should_process_rewards_and_penalties(config: &Config, state: &BeaconState) -> bool {
    // > No rewards are applied at the end of `GENESIS_EPOCH`
    // > because rewards are for work done in the previous epoch
    GENESIS_EPOCH < get_current_epoch(config, state)
}

fn should_process_inactivity_updates(config: &Config, state: &BeaconState) -> bool {
    // > Skip the genesis epoch as score updates are based on the previous
    // > epoch participation
    GENESIS_EPOCH < get_current_epoch(config, state)
}
