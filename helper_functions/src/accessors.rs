use core::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{bail, ensure, Context as _, Result};
use bls::{AggregatePublicKey, PublicKeyBytes};
use im::HashMap;
use itertools::Itertools as _;
use num_integer::Roots as _;
use ssz::Hc;
use tap::{Pipe as _, TryConv as _};
use types::{
    cache::NonZeroGwei,
    config::Config,
    consts::{DOMAIN_SYNC_COMMITTEE, GENESIS_EPOCH},
    containers::SyncCommittee,
    nonstandard::{Participation, RelativeEpoch},
    primitives::{
        DomainType, Epoch, Gwei, Slot, SubcommitteeIndex, SyncCommitteePeriod, ValidatorIndex,
        H256,
    },
    state::BeaconState,
};

use crate::{error::Error, misc, predicates};

#[must_use]
pub fn get_current_epoch(config: &Config, state: &BeaconState) -> Epoch {
    misc::compute_epoch_at_slot(config, state.slot())
}

#[must_use]
pub fn get_previous_epoch(config: &Config, state: &BeaconState) -> Epoch {
    get_current_epoch(config, state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

#[must_use]
pub fn get_next_epoch(config: &Config, state: &BeaconState) -> Epoch {
    get_current_epoch(config, state) + 1
}

#[must_use]
pub fn absolute_epoch(config: &Config, state: &BeaconState, relative_epoch: RelativeEpoch) -> Epoch {
    match relative_epoch {
        RelativeEpoch::Previous => get_previous_epoch(config, state),
        RelativeEpoch::Current => get_current_epoch(config, state),
        RelativeEpoch::Next => get_next_epoch(config, state),
    }
}

pub fn relative_epoch(config: &Config, state: &BeaconState, epoch: Epoch) -> Result<RelativeEpoch> {
    match get_next_epoch(config, state).checked_sub(epoch) {
        None => bail!(Error::EpochAfterNext),
        Some(0) => Ok(RelativeEpoch::Next),
        Some(1) => Ok(RelativeEpoch::Current),
        Some(2) => Ok(RelativeEpoch::Previous),
        Some(_) => bail!(Error::EpochBeforePrevious),
    }
}

/// How many epochs have passed since the chain last finalized.
/// The inactivity leak kicks in when this grows too large.
#[must_use]
pub fn get_finality_delay(config: &Config, state: &BeaconState) -> u64 {
    get_previous_epoch(config, state) - state.finalized_checkpoint().epoch
}

pub fn get_block_root_at_slot(state: &BeaconState, slot: Slot) -> Result<H256> {
    ensure!(slot < state.slot(), Error::SlotOutOfRange);

    let ring_length = u64::try_from(state.block_roots().len())
        .expect("ring buffer length fits in u64");

    ensure!(state.slot() <= slot + ring_length, Error::SlotOutOfRange);

    Ok(*state.block_roots().mod_index(slot))
}

#[must_use]
pub fn get_randao_mix(state: &BeaconState, epoch: Epoch) -> H256 {
    *state.randao_mixes().mod_index(epoch)
}

/// The domain-separated seed for randomness-driven selection at `epoch`.
///
/// The RANDAO mix is taken at a fixed look-back so that the seed for an epoch
/// is known (and immutable) before the epoch begins.
#[must_use]
pub fn get_seed_by_epoch(
    config: &Config,
    state: &BeaconState,
    epoch: Epoch,
    domain_type: DomainType,
) -> H256 {
    let mix = get_randao_mix(
        state,
        epoch + config.epochs_per_historical_vector.get() - config.min_seed_lookahead - 1,
    );

    hashing::hash_32_64_256(domain_type.to_fixed_bytes(), epoch, mix)
}

pub fn get_active_validator_indices_by_epoch<'state>(
    state: &'state BeaconState,
    epoch: Epoch,
) -> impl Iterator<Item = ValidatorIndex> + 'state {
    (0..)
        .zip(state.validators())
        .filter(move |(_, validator)| predicates::is_active_validator(validator, epoch))
        .map(|(index, _)| index)
}

fn active_validator_count_u64(config: &Config, state: &BeaconState) -> u64 {
    let current_epoch = get_current_epoch(config, state);

    get_active_validator_indices_by_epoch(state, current_epoch)
        .count()
        .try_into()
        .expect("active validator count fits in u64")
}

#[must_use]
pub fn get_validator_churn_limit(config: &Config, state: &BeaconState) -> u64 {
    (active_validator_count_u64(config, state) / config.churn_limit_quotient)
        .max(config.min_per_epoch_churn_limit)
}

#[must_use]
pub fn index_of_public_key(
    state: &BeaconState,
    public_key: PublicKeyBytes,
) -> Option<ValidatorIndex> {
    get_or_init_validator_indices(state).get(&public_key).copied()
}

pub fn get_or_init_validator_indices(
    state: &BeaconState,
) -> &HashMap<PublicKeyBytes, ValidatorIndex> {
    state.cache().validator_indices.get_or_init(|| {
        state
            .validators()
            .into_iter()
            .map(|validator| validator.pubkey)
            .zip(0..)
            .collect()
    })
}

pub fn total_active_balance(config: &Config, state: &BeaconState) -> Gwei {
    state.cache().total_active_balance[RelativeEpoch::Current]
        .get_or_init(|| {
            let current_epoch = get_current_epoch(config, state);

            state
                .validators()
                .into_iter()
                .filter(|validator| predicates::is_active_validator(validator, current_epoch))
                .map(|validator| validator.effective_balance)
                .sum::<Gwei>()
                .max(config.effective_balance_increment.get())
                .pipe(NonZeroGwei::new)
                .expect("the balance is at least effective_balance_increment, which is nonzero")
        })
        .get()
}

#[must_use]
pub fn compute_base_reward(
    config: &Config,
    effective_balance: Gwei,
    base_reward_per_increment: Gwei,
) -> Gwei {
    let increments = effective_balance / config.effective_balance_increment;
    increments * base_reward_per_increment
}

/// Base reward per effective balance increment. Inversely proportional to
/// the square root of the total active stake.
pub fn get_base_reward_per_increment(config: &Config, state: &BeaconState) -> Gwei {
    config.effective_balance_increment.get() * config.base_reward_factor
        / total_active_balance(config, state).sqrt()
}

#[must_use]
pub fn combined_participation(state: &BeaconState) -> Vec<Participation> {
    itertools::zip_eq(
        state.previous_epoch_participation().iter(),
        state.current_epoch_participation().iter(),
    )
    .map(|(previous, current)| Participation { previous, current })
    .collect()
}

/// Selects the members of the sync committee for the *next* period.
///
/// Candidates are drawn with replacement by rejection sampling: a shuffled
/// candidate position per attempt, accepted with probability proportional to
/// effective balance, one pseudo-random byte per attempt from repeated
/// hashing of the seed and a block counter.
///
/// The seed is pinned to the first epoch of the period being formed, so every
/// slot within one period produces the identical committee, and different
/// periods produce different committees with overwhelming probability.
pub fn next_sync_committee_indices(
    config: &Config,
    state: &BeaconState,
) -> Result<Vec<ValidatorIndex>> {
    let current_epoch = get_current_epoch(config, state);

    let next_period = misc::sync_committee_period(config, current_epoch)
        .checked_add(1)
        .ok_or(Error::EpochOverflow)?;

    sync_committee_indices_for_period(config, state, next_period)
}

/// Selects the committee for an arbitrary period. Epoch processing uses this
/// to form the committee one period past the incoming one.
pub fn sync_committee_indices_for_period(
    config: &Config,
    state: &BeaconState,
    period: SyncCommitteePeriod,
) -> Result<Vec<ValidatorIndex>> {
    let base_epoch = misc::start_of_sync_committee_period(config, period);

    let candidates = (0..)
        .zip(state.validators())
        .filter(|(_, validator)| {
            predicates::is_sync_committee_candidate(config, validator, base_epoch)
        })
        .map(|(index, _)| index)
        .collect_vec();

    let total = candidates
        .len()
        .try_conv::<u64>()?
        .pipe(NonZeroU64::new)
        .ok_or(Error::NoEligibleValidators)?;

    let seed = get_seed_by_epoch(config, state, base_epoch, DOMAIN_SYNC_COMMITTEE);
    let max_random_byte = u64::from(u8::MAX);

    let committee_size = config
        .sync_committee_size
        .get()
        .try_conv::<usize>()
        .expect("committee size fits in usize");

    (0..u64::MAX / H256::len_bytes() as u64)
        .flat_map(|quotient| {
            hashing::hash_256_64(seed, quotient)
                .to_fixed_bytes()
                .into_iter()
                .map(u64::from)
        })
        .zip(0..)
        .filter_map(|(random_byte, attempt)| {
            let position = shuffling::shuffle_single(config, attempt % total, total, seed)
                .try_conv::<usize>()
                .expect("shuffled position is less than candidates.len()");

            let candidate_index = candidates[position];

            let effective_balance = state
                .validators()
                .get(candidate_index)
                .expect("candidate_index was produced by enumerating the registry")
                .effective_balance;

            (effective_balance * max_random_byte >= config.max_effective_balance * random_byte)
                .then_some(candidate_index)
        })
        .take(committee_size)
        .collect_vec()
        .pipe(Ok)
}

/// Builds the next period's committee, including the aggregate of its keys.
pub fn get_next_sync_committee(
    config: &Config,
    state: &BeaconState,
) -> Result<Arc<Hc<SyncCommittee>>> {
    let current_epoch = get_current_epoch(config, state);

    let next_period = misc::sync_committee_period(config, current_epoch)
        .checked_add(1)
        .ok_or(Error::EpochOverflow)?;

    get_sync_committee_for_period(config, state, next_period)
}

/// Builds the committee for an arbitrary period,
/// including the aggregate of its keys.
pub fn get_sync_committee_for_period(
    config: &Config,
    state: &BeaconState,
    period: SyncCommitteePeriod,
) -> Result<Arc<Hc<SyncCommittee>>> {
    let indices = sync_committee_indices_for_period(config, state, period)
        .context("sync committee member selection failed")?;

    let pubkeys = indices
        .iter()
        .map(|validator_index| {
            state
                .validators()
                .get(*validator_index)
                .map(|validator| validator.pubkey)
        })
        .collect::<Result<Box<[_]>, _>>()
        .context("sync committee member lookup failed")?;

    let decompressed = pubkeys
        .iter()
        .map(|pubkey| pubkey.decompress())
        .collect::<Result<Vec<_>, _>>()
        .context("sync committee member key decompression failed")?;

    let aggregate_pubkey = AggregatePublicKey::aggregate_nonempty(decompressed)
        .context("sync committee key aggregation failed")?
        .compress();

    Ok(Arc::new(Hc::from(SyncCommittee {
        pubkeys,
        aggregate_pubkey,
    })))
}

/// The contiguous slice of committee members assigned to one subnet.
pub fn sync_subcommittee_pubkeys<'committee>(
    config: &Config,
    committee: &'committee SyncCommittee,
    subcommittee_index: SubcommitteeIndex,
) -> Result<&'committee [PublicKeyBytes]> {
    let subnet_count = config.sync_committee_subnet_count.get();

    ensure!(
        subcommittee_index < subnet_count,
        Error::SubcommitteeIndexOutOfRange {
            index: subcommittee_index,
            subnet_count,
        },
    );

    let size = committee.pubkeys.len()
        / usize::try_from(subnet_count).expect("subnet count fits in usize");

    let offset = usize::try_from(subcommittee_index).expect("subcommittee index fits in usize")
        * size;

    Ok(&committee.pubkeys[offset..offset + size])
}
