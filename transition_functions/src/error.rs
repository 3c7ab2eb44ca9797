use thiserror::Error;

use types::primitives::Slot;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("target slot ({target}) is not later than current slot ({current})")]
    SlotNotLater { current: Slot, target: Slot },
    #[error("deadline exceeded while advancing from slot {start} toward slot {target}")]
    DeadlineExceeded { start: Slot, target: Slot },
    #[error("participation list has {actual} entries, the registry has {expected} validators")]
    ParticipationLengthMismatch { expected: usize, actual: usize },
}
