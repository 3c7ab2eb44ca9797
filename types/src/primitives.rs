pub use ethereum_types::{H256, H32};

pub type Epoch = u64;
pub type Gwei = u64;
pub type Slot = u64;
pub type SubcommitteeIndex = u64;
pub type SyncCommitteePeriod = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;

/// One bit per timely attestation dimension. See `consts::TIMELY_*_FLAG_INDEX`.
pub type ParticipationFlags = u8;

pub type DomainType = H32;
pub type ForkDigest = H32;
pub type Version = H32;
