use core::num::NonZeroU64;
use std::borrow::Cow;

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::primitives::{Gwei, Version, H32};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "sync committee size {committee_size} is not divisible \
         by subnet count {subnet_count}"
    )]
    CommitteeSizeNotDivisible {
        committee_size: u64,
        subnet_count: u64,
    },
    #[error("validator registry limit {limit} exceeds the supported tree depth")]
    RegistryLimitTooLarge { limit: u64 },
    #[error(
        "seed look-back {lookahead} does not fit in the RANDAO mix history \
         of {history_length} epochs"
    )]
    SeedLookaheadTooLarge {
        lookahead: u64,
        history_length: u64,
    },
}

/// Protocol constants customizable at runtime.
///
/// The core treats every value here as an injected constant. Nothing that
/// differs between networks is hardcoded anywhere else, so the same code
/// serves mainnet-scale and test configurations.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Genesis
    pub genesis_fork_version: Version,
    pub min_genesis_active_validator_count: NonZeroU64,

    // Time
    pub slots_per_epoch: NonZeroU64,
    pub epochs_per_sync_committee_period: NonZeroU64,

    // Committee sampling
    pub sync_committee_size: NonZeroU64,
    pub sync_committee_subnet_count: NonZeroU64,
    pub shuffle_round_count: u8,
    pub min_seed_lookahead: u64,
    pub max_seed_lookahead: u64,

    // State dimensions
    pub slots_per_historical_root: NonZeroU64,
    pub epochs_per_historical_vector: NonZeroU64,
    pub epochs_per_slashings_vector: NonZeroU64,
    pub validator_registry_limit: NonZeroU64,

    // Balances
    pub min_deposit_amount: Gwei,
    pub max_effective_balance: Gwei,
    pub effective_balance_increment: NonZeroU64,
    pub hysteresis_quotient: NonZeroU64,
    pub hysteresis_downward_multiplier: u64,
    pub hysteresis_upward_multiplier: u64,

    // Rewards and penalties
    pub base_reward_factor: u64,
    pub min_epochs_to_inactivity_penalty: u64,
    pub inactivity_score_bias: NonZeroU64,
    pub inactivity_score_recovery_rate: u64,
    pub inactivity_penalty_quotient: NonZeroU64,
    pub proportional_slashing_multiplier: u64,

    // Validator cycle
    pub min_per_epoch_churn_limit: u64,
    pub churn_limit_quotient: NonZeroU64,
    pub ejection_balance: Gwei,
    pub min_validator_withdrawability_delay: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("mainnet"),

            // Genesis
            genesis_fork_version: H32(hex!("00000000")),
            min_genesis_active_validator_count: nonzero!(16_384_u64),

            // Time
            slots_per_epoch: nonzero!(32_u64),
            epochs_per_sync_committee_period: nonzero!(256_u64),

            // Committee sampling
            sync_committee_size: nonzero!(512_u64),
            sync_committee_subnet_count: nonzero!(4_u64),
            shuffle_round_count: 90,
            min_seed_lookahead: 1,
            max_seed_lookahead: 4,

            // State dimensions
            slots_per_historical_root: nonzero!(8192_u64),
            epochs_per_historical_vector: nonzero!(65_536_u64),
            epochs_per_slashings_vector: nonzero!(8192_u64),
            validator_registry_limit: nonzero!(1_099_511_627_776_u64),

            // Balances
            min_deposit_amount: 1_000_000_000,
            max_effective_balance: 32_000_000_000,
            effective_balance_increment: nonzero!(1_000_000_000_u64),
            hysteresis_quotient: nonzero!(4_u64),
            hysteresis_downward_multiplier: 1,
            hysteresis_upward_multiplier: 5,

            // Rewards and penalties
            base_reward_factor: 64,
            min_epochs_to_inactivity_penalty: 4,
            inactivity_score_bias: nonzero!(4_u64),
            inactivity_score_recovery_rate: 16,
            inactivity_penalty_quotient: nonzero!(3_u64 << 24),
            proportional_slashing_multiplier: 2,

            // Validator cycle
            min_per_epoch_churn_limit: 4,
            churn_limit_quotient: nonzero!(65_536_u64),
            ejection_balance: 16_000_000_000,
            min_validator_withdrawability_delay: 256,
        }
    }

    /// Configuration for tests and local development.
    /// Shrinks every dimension that affects running time.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("minimal"),

            // Genesis
            genesis_fork_version: H32(hex!("00000001")),
            min_genesis_active_validator_count: nonzero!(64_u64),

            // Time
            slots_per_epoch: nonzero!(8_u64),
            epochs_per_sync_committee_period: nonzero!(8_u64),

            // Committee sampling
            sync_committee_size: nonzero!(32_u64),
            sync_committee_subnet_count: nonzero!(4_u64),
            shuffle_round_count: 10,

            // State dimensions
            slots_per_historical_root: nonzero!(64_u64),
            epochs_per_historical_vector: nonzero!(64_u64),
            epochs_per_slashings_vector: nonzero!(64_u64),

            // Validator cycle
            min_per_epoch_churn_limit: 2,
            churn_limit_quotient: nonzero!(32_u64),

            ..Self::mainnet()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let committee_size = self.sync_committee_size.get();
        let subnet_count = self.sync_committee_subnet_count.get();

        if committee_size % subnet_count != 0 {
            return Err(ConfigError::CommitteeSizeNotDivisible {
                committee_size,
                subnet_count,
            });
        }

        let limit = self.validator_registry_limit.get();

        // The zero hash table must cover the registry tree.
        let depth = usize::try_from(limit.ilog2()).expect("ilog2 of u64 fits in usize");

        if !limit.is_power_of_two() || depth >= hashing::ZERO_HASH_COUNT {
            return Err(ConfigError::RegistryLimitTooLarge { limit });
        }

        let history_length = self.epochs_per_historical_vector.get();
        let lookahead = self.min_seed_lookahead + 1;

        if history_length <= lookahead {
            return Err(ConfigError::SeedLookaheadTooLarge {
                lookahead,
                history_length,
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn sync_subcommittee_size(&self) -> u64 {
        self.sync_committee_size.get() / self.sync_committee_subnet_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_configs_are_valid() {
        Config::mainnet().validate().expect("mainnet is valid");
        Config::minimal().validate().expect("minimal is valid");
    }

    #[test]
    fn subcommittee_sizes_divide_evenly() {
        assert_eq!(Config::mainnet().sync_subcommittee_size(), 128);
        assert_eq!(Config::minimal().sync_subcommittee_size(), 8);
    }

    #[test]
    fn config_deserializes_from_standard_field_names() {
        let config: Config = serde_json::from_str(
            r#"{"CONFIG_NAME": "custom", "SYNC_COMMITTEE_SIZE": 64}"#,
        )
        .expect("fields use SCREAMING_SNAKE_CASE");

        assert_eq!(config.config_name, "custom");
        assert_eq!(config.sync_committee_size.get(), 64);
        assert_eq!(config.slots_per_epoch, Config::mainnet().slots_per_epoch);
    }
}
