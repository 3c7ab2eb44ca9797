use core::num::NonZeroU64;

use bls::{AggregatePublicKeyBytes, PublicKeyBytes};

use crate::{
    consts::JUSTIFICATION_BITS_COUNT,
    primitives::{Epoch, Gwei, Slot, ValidatorIndex, Version, H256},
};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: Epoch,
}

/// Only used to compute fork digests for network traffic separation.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ForkData {
    pub current_version: Version,
    pub genesis_validators_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

/// The members of one sync committee.
///
/// Members are selected with replacement, so `pubkeys` may contain the same
/// key more than once and the committee always has the configured size.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SyncCommittee {
    pub pubkeys: Box<[PublicKeyBytes]>,
    pub aggregate_pubkey: AggregatePublicKeyBytes,
}

impl SyncCommittee {
    /// The all-zero placeholder used before the first committee computation.
    #[must_use]
    pub fn empty(committee_size: NonZeroU64) -> Self {
        let size = usize::try_from(committee_size.get()).expect("committee size fits in usize");

        Self {
            pubkeys: vec![PublicKeyBytes::default(); size].into_boxed_slice(),
            aggregate_pubkey: AggregatePublicKeyBytes::default(),
        }
    }
}

/// A bit vector tracking which of the last four epochs were justified.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct JustificationBits(u8);

impl JustificationBits {
    pub(crate) const MASK: u8 = (1 << JUSTIFICATION_BITS_COUNT) - 1;

    #[must_use]
    pub fn is_set(self, index: usize) -> bool {
        assert!(index < JUSTIFICATION_BITS_COUNT);
        self.0 & (1 << index) != 0
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < JUSTIFICATION_BITS_COUNT);

        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    pub fn shift_up_by_1(&mut self) {
        self.0 = (self.0 << 1) & Self::MASK;
    }

    /// Whether every bit in `range` is set.
    #[must_use]
    pub fn all_in(self, range: core::ops::Range<usize>) -> bool {
        assert!(range.end <= JUSTIFICATION_BITS_COUNT);
        range.into_iter().all(|index| self.is_set(index))
    }

    #[must_use]
    pub const fn into_byte(self) -> u8 {
        self.0
    }

    pub(crate) const fn from_byte_unchecked(byte: u8) -> Self {
        Self(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn justification_bits_shift_discards_the_oldest_epoch() {
        let mut bits = JustificationBits::default();

        bits.set(0, true);
        bits.set(3, true);
        bits.shift_up_by_1();

        assert!(!bits.is_set(0));
        assert!(bits.is_set(1));
        assert!(!bits.is_set(2));
        assert!(!bits.is_set(3));
    }

    #[test]
    fn justification_bits_ranges() {
        let mut bits = JustificationBits::default();

        bits.set(1, true);
        bits.set(2, true);
        bits.set(3, true);

        assert!(bits.all_in(1..4));
        assert!(bits.all_in(1..3));
        assert!(!bits.all_in(0..3));
    }
}
