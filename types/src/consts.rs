use core::num::NonZeroU64;

use hex_literal::hex;
use nonzero_ext::nonzero;

use crate::primitives::{DomainType, Epoch, Slot, H32};

pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;

/// Sentinel for epoch fields of validators that have not scheduled the
/// corresponding event yet.
pub const FAR_FUTURE_EPOCH: Epoch = u64::MAX;

pub const DOMAIN_SYNC_COMMITTEE: DomainType = H32(hex!("07000000"));

pub const JUSTIFICATION_BITS_COUNT: usize = 4;

pub const TIMELY_SOURCE_FLAG_INDEX: usize = 0;
pub const TIMELY_TARGET_FLAG_INDEX: usize = 1;
pub const TIMELY_HEAD_FLAG_INDEX: usize = 2;

pub const TIMELY_SOURCE_WEIGHT: u64 = 14;
pub const TIMELY_TARGET_WEIGHT: u64 = 26;
pub const TIMELY_HEAD_WEIGHT: u64 = 14;
pub const WEIGHT_DENOMINATOR: NonZeroU64 = nonzero!(64_u64);
