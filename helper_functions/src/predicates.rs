use types::{
    config::Config,
    consts::FAR_FUTURE_EPOCH,
    containers::Validator,
    primitives::Epoch,
    state::BeaconState,
};

use crate::accessors;

#[must_use]
pub fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

/// Whether a validator takes part in epoch accounting at all.
/// Slashed validators keep accruing penalties until they are withdrawable.
#[must_use]
pub fn is_eligible_for_penalties(validator: &Validator, previous_epoch: Epoch) -> bool {
    is_active_validator(validator, previous_epoch)
        || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch)
}

/// Whether a validator may be drawn into a sync committee forming at `epoch`.
#[must_use]
pub fn is_sync_committee_candidate(config: &Config, validator: &Validator, epoch: Epoch) -> bool {
    is_active_validator(validator, epoch) && validator.effective_balance >= config.min_deposit_amount
}

#[must_use]
pub fn is_in_inactivity_leak(config: &Config, state: &BeaconState) -> bool {
    accessors::get_finality_delay(config, state) > config.min_epochs_to_inactivity_penalty
}

#[must_use]
pub fn is_eligible_for_activation_queue(config: &Config, validator: &Validator) -> bool {
    validator.activation_eligibility_epoch == FAR_FUTURE_EPOCH
        && validator.effective_balance == config.max_effective_balance
}

#[must_use]
pub fn is_eligible_for_activation(state: &BeaconState, validator: &Validator) -> bool {
    validator.activation_eligibility_epoch <= state.finalized_checkpoint().epoch
        && validator.activation_epoch == FAR_FUTURE_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_follows_activation_and_exit_epochs() {
        let validator = Validator {
            activation_epoch: 2,
            exit_epoch: 5,
            ..Validator::default()
        };

        assert!(!is_active_validator(&validator, 1));
        assert!(is_active_validator(&validator, 2));
        assert!(is_active_validator(&validator, 4));
        assert!(!is_active_validator(&validator, 5));
    }

    #[test]
    fn slashed_validators_remain_eligible_for_penalties() {
        let validator = Validator {
            activation_epoch: 0,
            exit_epoch: 3,
            slashed: true,
            withdrawable_epoch: 10,
            ..Validator::default()
        };

        // No longer active in epoch 5, but not yet withdrawable.
        assert!(!is_active_validator(&validator, 5));
        assert!(is_eligible_for_penalties(&validator, 5));
        assert!(!is_eligible_for_penalties(&validator, 9));
    }

    #[test]
    fn committee_candidates_need_a_minimum_deposit() {
        let config = Config::minimal();

        let poor = Validator {
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            effective_balance: config.min_deposit_amount - 1,
            ..Validator::default()
        };

        let funded = Validator {
            effective_balance: config.min_deposit_amount,
            ..poor.clone()
        };

        assert!(!is_sync_committee_candidate(&config, &poor, 0));
        assert!(is_sync_committee_candidate(&config, &funded, 0));
    }
}
