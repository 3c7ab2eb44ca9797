use core::num::NonZeroU64;

use bls::PublicKeyBytes;
use enum_map::EnumMap;
use im::HashMap;
use once_cell::sync::OnceCell;

use crate::{nonstandard::RelativeEpoch, primitives::ValidatorIndex};

pub type NonZeroGwei = NonZeroU64;

/// Values derived from the state that are expensive to recompute.
///
/// The cache is advisory: it is copied together with the state and rotated by
/// epoch processing. Code that mutates the validator registry outside of
/// epoch processing must not rely on previously initialized cells.
#[derive(Clone, Default, Debug)]
pub struct Cache {
    pub total_active_balance: EnumMap<RelativeEpoch, OnceCell<NonZeroGwei>>,
    // The registry is append-only, so this mapping only ever grows.
    pub validator_indices: OnceCell<HashMap<PublicKeyBytes, ValidatorIndex>>,
}

impl Cache {
    pub fn advance_epoch(&mut self) {
        let balance = &mut self.total_active_balance;

        balance[RelativeEpoch::Previous] = core::mem::take(&mut balance[RelativeEpoch::Current]);
        balance[RelativeEpoch::Current] = core::mem::take(&mut balance[RelativeEpoch::Next]);
    }
}
