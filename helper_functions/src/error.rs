use thiserror::Error;

use types::primitives::SubcommitteeIndex;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("epoch is after next one relative to state")]
    EpochAfterNext,
    #[error("epoch is before previous one relative to state")]
    EpochBeforePrevious,
    #[error("epoch number overflowed")]
    EpochOverflow,
    #[error("no validators are eligible for sync committee selection")]
    NoEligibleValidators,
    #[error("slot is out of range")]
    SlotOutOfRange,
    #[error("subcommittee index {index} is out of range (subnet count: {subnet_count})")]
    SubcommitteeIndexOutOfRange {
        index: SubcommitteeIndex,
        subnet_count: u64,
    },
}
