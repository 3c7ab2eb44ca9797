use anyhow::{ensure, Result};
use arithmetic::{U128Ext as _, U64Ext as _};
use helper_functions::{
    accessors::{
        compute_base_reward, get_base_reward_per_increment, get_current_epoch,
        get_previous_epoch, total_active_balance,
    },
    mutators::clamp_balance,
    predicates::{is_active_validator, is_eligible_for_penalties, is_in_inactivity_leak},
};
use itertools::izip;
use types::{
    config::Config,
    consts::{
        TIMELY_HEAD_WEIGHT, TIMELY_SOURCE_WEIGHT, TIMELY_TARGET_WEIGHT, WEIGHT_DENOMINATOR,
    },
    containers::Validator,
    nonstandard::Participation,
    primitives::{Epoch, Gwei},
    state::BeaconState,
};

use crate::{epoch_processing, error::Error};

/// Accumulator for the per-validator output of epoch accounting.
///
/// Epoch transitions only need the combined totals; reporting consumers want
/// the individual dimensions. Both are fed through this trait so the
/// accounting logic exists exactly once.
pub trait EpochDeltas: Default {
    fn add_source_reward(&mut self, value: Gwei);
    fn add_source_penalty(&mut self, value: Gwei);
    fn add_target_reward(&mut self, value: Gwei);
    fn add_target_penalty(&mut self, value: Gwei);
    fn add_head_reward(&mut self, value: Gwei);
    fn add_inactivity_penalty(&mut self, value: Gwei);

    fn combined_reward(self) -> Gwei;
    fn combined_penalty(self) -> Gwei;
}

#[derive(Clone, Copy, Default)]
pub struct EpochDeltasForTransition {
    reward: Gwei,
    penalty: Gwei,
}

impl EpochDeltas for EpochDeltasForTransition {
    fn add_source_reward(&mut self, value: Gwei) {
        self.reward += value;
    }

    fn add_source_penalty(&mut self, value: Gwei) {
        self.penalty += value;
    }

    fn add_target_reward(&mut self, value: Gwei) {
        self.reward += value;
    }

    fn add_target_penalty(&mut self, value: Gwei) {
        self.penalty += value;
    }

    fn add_head_reward(&mut self, value: Gwei) {
        self.reward += value;
    }

    fn add_inactivity_penalty(&mut self, value: Gwei) {
        self.penalty += value;
    }

    fn combined_reward(self) -> Gwei {
        self.reward
    }

    fn combined_penalty(self) -> Gwei {
        self.penalty
    }
}

#[derive(Clone, Copy, Default, Debug)]
pub struct EpochDeltasForReport {
    pub source_reward: Gwei,
    pub source_penalty: Gwei,
    pub target_reward: Gwei,
    pub target_penalty: Gwei,
    pub head_reward: Gwei,
    pub inactivity_penalty: Gwei,
}

impl EpochDeltas for EpochDeltasForReport {
    fn add_source_reward(&mut self, value: Gwei) {
        self.source_reward += value;
    }

    fn add_source_penalty(&mut self, value: Gwei) {
        self.source_penalty += value;
    }

    fn add_target_reward(&mut self, value: Gwei) {
        self.target_reward += value;
    }

    fn add_target_penalty(&mut self, value: Gwei) {
        self.target_penalty += value;
    }

    fn add_head_reward(&mut self, value: Gwei) {
        self.head_reward += value;
    }

    fn add_inactivity_penalty(&mut self, value: Gwei) {
        self.inactivity_penalty += value;
    }

    fn combined_reward(self) -> Gwei {
        self.source_reward + self.target_reward + self.head_reward
    }

    fn combined_penalty(self) -> Gwei {
        self.source_penalty + self.target_penalty + self.inactivity_penalty
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ValidatorSummary {
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub withdrawable_epoch: Epoch,
    pub active_in_previous_epoch: bool,
    pub eligible_for_penalties: bool,
}

impl ValidatorSummary {
    // This does not update derived fields because slashing processing
    // does not use them.
    pub fn update_from(&mut self, validator: &Validator) {
        self.effective_balance = validator.effective_balance;
        self.slashed = validator.slashed;
        self.withdrawable_epoch = validator.withdrawable_epoch;
    }
}

/// Stake totals behind each accounted dimension.
#[derive(Clone, Copy, Default, Debug)]
pub struct Statistics {
    pub previous_epoch_source_participating_balance: Gwei,
    pub previous_epoch_target_participating_balance: Gwei,
    pub previous_epoch_head_participating_balance: Gwei,
    pub current_epoch_target_participating_balance: Gwei,
}

impl Statistics {
    fn clamp_balances(&mut self, config: &Config) {
        clamp_balance(config, &mut self.previous_epoch_source_participating_balance);
        clamp_balance(config, &mut self.previous_epoch_target_participating_balance);
        clamp_balance(config, &mut self.previous_epoch_head_participating_balance);
        clamp_balance(config, &mut self.current_epoch_target_participating_balance);
    }
}

pub fn statistics(
    config: &Config,
    state: &BeaconState,
    participation: &[Participation],
) -> Result<(Statistics, Vec<ValidatorSummary>)> {
    ensure!(
        participation.len() == state.validators().len_usize(),
        Error::ParticipationLengthMismatch {
            expected: state.validators().len_usize(),
            actual: participation.len(),
        },
    );

    let current_epoch = get_current_epoch(config, state);
    let previous_epoch = get_previous_epoch(config, state);

    let mut statistics = Statistics::default();

    let summaries = state
        .validators()
        .into_iter()
        .zip(participation.iter().copied())
        .map(|(validator, participation)| {
            let Validator {
                effective_balance,
                slashed,
                withdrawable_epoch,
                ..
            } = *validator;

            let active_in_previous_epoch = is_active_validator(validator, previous_epoch);
            let active_in_current_epoch = is_active_validator(validator, current_epoch);
            let eligible_for_penalties = is_eligible_for_penalties(validator, previous_epoch);

            // Slashed validators do not count toward participating stake even
            // when their timely flags are set.
            if !slashed {
                if active_in_previous_epoch {
                    if participation.previous_epoch_matching_source() {
                        statistics.previous_epoch_source_participating_balance +=
                            effective_balance;
                    }

                    if participation.previous_epoch_matching_target() {
                        statistics.previous_epoch_target_participating_balance +=
                            effective_balance;
                    }

                    if participation.previous_epoch_matching_head() {
                        statistics.previous_epoch_head_participating_balance += effective_balance;
                    }
                }

                if active_in_current_epoch && participation.current_epoch_matching_target() {
                    statistics.current_epoch_target_participating_balance += effective_balance;
                }
            }

            ValidatorSummary {
                effective_balance,
                slashed,
                withdrawable_epoch,
                active_in_previous_epoch,
                eligible_for_penalties,
            }
        })
        .collect();

    statistics.clamp_balances(config);

    Ok((statistics, summaries))
}

/// Computes one delta accumulator per validator.
///
/// All arithmetic is unsigned. Intermediates that could exceed 64 bits are
/// computed in 128 bits and narrowed with a check; any overflow fails the
/// whole call rather than producing partially correct output.
pub fn epoch_deltas<D: EpochDeltas>(
    config: &Config,
    state: &BeaconState,
    statistics: Statistics,
    summaries: impl IntoIterator<Item = ValidatorSummary>,
    participation: impl IntoIterator<Item = Participation>,
) -> Result<Vec<D>> {
    let in_inactivity_leak = is_in_inactivity_leak(config, state);
    let base_reward_per_increment = get_base_reward_per_increment(config, state);

    let increment = config.effective_balance_increment;
    let source_increments = statistics.previous_epoch_source_participating_balance / increment;
    let target_increments = statistics.previous_epoch_target_participating_balance / increment;
    let head_increments = statistics.previous_epoch_head_participating_balance / increment;
    let active_increments = total_active_balance(config, state) / increment;

    izip!(summaries, participation, state.inactivity_scores().iter())
        .map(|(summary, participation, inactivity_score)| {
            let mut deltas = D::default();

            let ValidatorSummary {
                effective_balance,
                slashed,
                eligible_for_penalties,
                ..
            } = summary;

            if !eligible_for_penalties {
                return Ok(deltas);
            }

            let base_reward = compute_base_reward(config, effective_balance, base_reward_per_increment);

            let participation_component_reward = |weight, participating_increments| {
                let reward_numerator = u128::from(base_reward)
                    * u128::from(weight)
                    * u128::from(participating_increments);

                let reward_denominator =
                    u128::from(active_increments) * u128::from(WEIGHT_DENOMINATOR.get());

                (reward_numerator / reward_denominator).try_into_u64()
            };

            let participation_component_penalty =
                |weight| base_reward.mul_div(weight, WEIGHT_DENOMINATOR);

            if !slashed && participation.previous_epoch_matching_source() {
                if !in_inactivity_leak {
                    deltas.add_source_reward(participation_component_reward(
                        TIMELY_SOURCE_WEIGHT,
                        source_increments,
                    )?);
                }
            } else {
                deltas.add_source_penalty(participation_component_penalty(TIMELY_SOURCE_WEIGHT)?);
            }

            if !slashed && participation.previous_epoch_matching_target() {
                if !in_inactivity_leak {
                    deltas.add_target_reward(participation_component_reward(
                        TIMELY_TARGET_WEIGHT,
                        target_increments,
                    )?);
                }
            } else {
                deltas.add_target_penalty(participation_component_penalty(TIMELY_TARGET_WEIGHT)?);

                let penalty_numerator =
                    u128::from(effective_balance) * u128::from(inactivity_score);

                let penalty_denominator = u128::from(config.inactivity_score_bias.get())
                    * u128::from(config.inactivity_penalty_quotient.get());

                deltas.add_inactivity_penalty(
                    (penalty_numerator / penalty_denominator).try_into_u64()?,
                );
            }

            if !slashed && participation.previous_epoch_matching_head() && !in_inactivity_leak {
                deltas.add_head_reward(participation_component_reward(
                    TIMELY_HEAD_WEIGHT,
                    head_increments,
                )?);
            }

            Ok(deltas)
        })
        .collect()
}

/// Reward and penalty totals per validator for one epoch transition.
///
/// The output vectors are always exactly as long as the validator registry,
/// no matter how many validators participated. States in the genesis epoch
/// have no epoch to account and yield all-zero deltas.
pub fn deltas(
    config: &Config,
    state: &BeaconState,
    participation: &[Participation],
) -> Result<(Vec<Gwei>, Vec<Gwei>)> {
    if !epoch_processing::should_process_rewards_and_penalties(config, state) {
        let zeros = vec![0; state.validators().len_usize()];
        return Ok((zeros.clone(), zeros));
    }

    let (stats, summaries) = statistics(config, state, participation)?;

    let epoch_deltas: Vec<EpochDeltasForReport> = epoch_deltas(
        config,
        state,
        stats,
        summaries,
        participation.iter().copied(),
    )?;

    Ok(epoch_deltas
        .iter()
        .map(|deltas| (deltas.combined_reward(), deltas.combined_penalty()))
        .unzip())
}

#[cfg(test)]
mod tests {
    use helper_functions::accessors::combined_participation;
    use types::consts::FAR_FUTURE_EPOCH;

    use super::*;

    const FULL_PARTICIPATION: u8 = 0b0000_0111;

    fn accounting_test_state(config: &Config, participants: u64, absentees: u64) -> BeaconState {
        let mut state = BeaconState::empty(config);

        // Epoch 2, with epoch 1 finalized: finality is recent, no leak.
        *state.slot_mut() = 2 * config.slots_per_epoch.get();
        state.finalized_checkpoint_mut().epoch = 1;

        for index in 0..participants + absentees {
            let validator = Validator {
                effective_balance: config.max_effective_balance,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..Validator::default()
            };

            state
                .push_validator(validator, config.max_effective_balance)
                .expect("validator count is below the registry limit");

            if index < participants {
                *state
                    .previous_epoch_participation_mut()
                    .get_mut(index)
                    .expect("the validator was just appended") = FULL_PARTICIPATION;
            }
        }

        state
    }

    #[test]
    fn output_lengths_always_match_the_validator_count() -> Result<()> {
        let config = Config::minimal();

        for count in [0, 32, 64] {
            let state = accounting_test_state(&config, count / 2, count - count / 2);
            let participation = combined_participation(&state);

            let (rewards, penalties) = deltas(&config, &state, &participation)?;

            let expected = usize::try_from(count).expect("count fits in usize");
            assert_eq!(rewards.len(), expected);
            assert_eq!(penalties.len(), expected);
        }

        Ok(())
    }

    #[test]
    fn participants_are_rewarded_and_absentees_penalized() -> Result<()> {
        let config = Config::minimal();
        let state = accounting_test_state(&config, 4, 4);
        let participation = combined_participation(&state);

        let (rewards, penalties) = deltas(&config, &state, &participation)?;

        for participant in 0..4 {
            assert!(rewards[participant] > 0);
            assert_eq!(penalties[participant], 0);
        }

        for absentee in 4..8 {
            assert_eq!(rewards[absentee], 0);
            assert!(penalties[absentee] > 0);
        }

        Ok(())
    }

    #[test]
    fn rewards_are_withheld_during_an_inactivity_leak() -> Result<()> {
        let config = Config::minimal();
        let mut state = accounting_test_state(&config, 4, 4);

        // Nothing finalized for 10 epochs. That is well past the leak
        // threshold.
        *state.slot_mut() = 10 * config.slots_per_epoch.get();
        state.finalized_checkpoint_mut().epoch = 0;

        for index in 0..8 {
            *state
                .inactivity_scores_mut()
                .get_mut(index)
                .expect("validator exists") = 100;
        }

        let participation = combined_participation(&state);
        let (rewards, penalties) = deltas(&config, &state, &participation)?;

        // No attestation rewards at all while the chain is not finalizing.
        assert!(rewards.iter().all(|reward| *reward == 0));

        // Absentees additionally accrue the inactivity penalty.
        assert!(penalties[4] > penalties[0]);

        Ok(())
    }

    #[test]
    fn inactive_validators_accrue_nothing() -> Result<()> {
        let config = Config::minimal();
        let mut state = accounting_test_state(&config, 0, 3);

        // Exited long ago and fully withdrawable.
        state
            .validators_mut()
            .get_mut(2)
            .expect("validator exists")
            .exit_epoch = 1;
        state
            .validators_mut()
            .get_mut(2)
            .expect("validator exists")
            .withdrawable_epoch = 1;

        let participation = combined_participation(&state);
        let (rewards, penalties) = deltas(&config, &state, &participation)?;

        assert_eq!(rewards[2], 0);
        assert_eq!(penalties[2], 0);

        Ok(())
    }

    #[test]
    fn mismatched_participation_length_is_rejected() {
        let config = Config::minimal();
        let state = accounting_test_state(&config, 2, 2);

        let error = deltas(&config, &state, &[]).expect_err("the slice is too short");

        assert_eq!(
            error.downcast_ref::<Error>(),
            Some(&Error::ParticipationLengthMismatch {
                expected: 4,
                actual: 0,
            }),
        );
    }

    #[test]
    fn genesis_epoch_deltas_are_zero() -> Result<()> {
        let config = Config::minimal();
        let mut state = accounting_test_state(&config, 2, 2);
        *state.slot_mut() = 0;
        state.finalized_checkpoint_mut().epoch = 0;

        let participation = combined_participation(&state);
        let (rewards, penalties) = deltas(&config, &state, &participation)?;

        assert!(rewards.iter().all(|reward| *reward == 0));
        assert!(penalties.iter().all(|penalty| *penalty == 0));

        Ok(())
    }
}
