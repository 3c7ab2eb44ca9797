use bit_field::BitField as _;
use enum_map::Enum;

use crate::{
    consts::{TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX},
    primitives::ParticipationFlags,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Enum)]
pub enum RelativeEpoch {
    Previous,
    Current,
    Next,
}

/// Participation flags of one validator in both accounted epochs.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Participation {
    pub previous: ParticipationFlags,
    pub current: ParticipationFlags,
}

impl Participation {
    #[inline]
    #[must_use]
    pub fn previous_epoch_matching_source(self) -> bool {
        self.previous.get_bit(TIMELY_SOURCE_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn previous_epoch_matching_target(self) -> bool {
        self.previous.get_bit(TIMELY_TARGET_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn previous_epoch_matching_head(self) -> bool {
        self.previous.get_bit(TIMELY_HEAD_FLAG_INDEX)
    }

    #[inline]
    #[must_use]
    pub fn current_epoch_matching_target(self) -> bool {
        self.current.get_bit(TIMELY_TARGET_FLAG_INDEX)
    }
}
