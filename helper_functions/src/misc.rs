use ssz::SszHash as _;
use types::{
    config::Config,
    containers::ForkData,
    primitives::{Epoch, ForkDigest, Slot, SyncCommitteePeriod, Version, H256},
};

#[must_use]
pub fn compute_epoch_at_slot(config: &Config, slot: Slot) -> Epoch {
    slot / config.slots_per_epoch
}

#[must_use]
pub fn compute_start_slot_at_epoch(config: &Config, epoch: Epoch) -> Slot {
    epoch.saturating_mul(config.slots_per_epoch.get())
}

#[must_use]
pub fn is_epoch_start(config: &Config, slot: Slot) -> bool {
    slots_since_epoch_start(config, slot) == 0
}

#[must_use]
pub fn slots_since_epoch_start(config: &Config, slot: Slot) -> u64 {
    slot - compute_start_slot_at_epoch(config, compute_epoch_at_slot(config, slot))
}

#[must_use]
pub fn sync_committee_period(config: &Config, epoch: Epoch) -> SyncCommitteePeriod {
    epoch / config.epochs_per_sync_committee_period
}

#[must_use]
pub fn start_of_sync_committee_period(config: &Config, period: SyncCommitteePeriod) -> Epoch {
    period.saturating_mul(config.epochs_per_sync_committee_period.get())
}

#[must_use]
pub fn compute_activation_exit_epoch(config: &Config, epoch: Epoch) -> Epoch {
    epoch + 1 + config.max_seed_lookahead
}

// > Return the 32-byte fork data root for the ``current_version`` and
// > ``genesis_validators_root``.
fn compute_fork_data_root(current_version: Version, genesis_validators_root: H256) -> H256 {
    ForkData {
        current_version,
        genesis_validators_root,
    }
    .hash_tree_root()
}

/// The short identifier used to separate network traffic by protocol version.
#[must_use]
pub fn compute_fork_digest(current_version: Version, genesis_validators_root: H256) -> ForkDigest {
    let root = compute_fork_data_root(current_version, genesis_validators_root);
    ForkDigest::from_slice(&root[..ForkDigest::len_bytes()])
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use types::primitives::H32;

    use super::*;

    #[test]
    fn test_epoch_at_slot() {
        let config = Config::minimal();

        assert_eq!(compute_epoch_at_slot(&config, 9), 1);
        assert_eq!(compute_epoch_at_slot(&config, 8), 1);
        assert_eq!(compute_epoch_at_slot(&config, 7), 0);
    }

    #[test]
    fn test_start_slot_at_epoch() {
        assert_eq!(compute_start_slot_at_epoch(&Config::minimal(), 1), 8);
    }

    #[test]
    fn test_epoch_start() {
        let config = Config::minimal();

        assert!(is_epoch_start(&config, 0));
        assert!(!is_epoch_start(&config, 7));
        assert!(is_epoch_start(&config, 8));
    }

    #[test]
    fn test_sync_committee_period_boundaries() {
        let config = Config::minimal();

        assert_eq!(sync_committee_period(&config, 0), 0);
        assert_eq!(sync_committee_period(&config, 7), 0);
        assert_eq!(sync_committee_period(&config, 8), 1);
        assert_eq!(start_of_sync_committee_period(&config, 1), 8);
    }

    #[test]
    fn test_activation_exit_epoch() {
        assert_eq!(compute_activation_exit_epoch(&Config::minimal(), 1), 6);
    }

    #[test]
    fn fork_digests_separate_versions_and_chains() {
        let version_a = H32(hex!("00000000"));
        let version_b = H32(hex!("01000000"));

        let digest = |version, root| compute_fork_digest(version, root);

        assert_ne!(
            digest(version_a, H256::zero()),
            digest(version_b, H256::zero()),
        );
        assert_ne!(
            digest(version_a, H256::zero()),
            digest(version_a, H256::repeat_byte(1)),
        );
    }
}
