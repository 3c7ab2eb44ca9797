use std::sync::Arc;

use derivative::Derivative;
use ssz::{
    merkleize_chunks, read_offset, write_offset, Hc, ReadError, SszHash, SszRead, SszWrite,
    BYTES_PER_OFFSET,
};
use std_ext::ArcExt as _;

use crate::{
    cache::Cache,
    collections::{
        Balances, GweiVector, InactivityScores, ListFull, ParticipationList, RootVector,
        Validators,
    },
    config::Config,
    consts::{GENESIS_EPOCH, GENESIS_SLOT},
    containers::{
        BeaconBlockHeader, Checkpoint, Fork, JustificationBits, SyncCommittee, Validator,
    },
    primitives::{Gwei, Slot, UnixSeconds, H256},
};

/// The canonical protocol state.
///
/// Bulky fields are held behind shared handles. Cloning a state copies the
/// handles, not their contents, so fork branches can hold thousands of states
/// cheaply. Mutable accessors privately clone a handle's contents when it is
/// shared with another state, which guarantees that no state ever observes a
/// mutation performed through another instance.
///
/// Read accessors take `&self` and are safe to call from multiple threads.
/// Mutators take `&mut self`, so a single writer per instance is enforced at
/// compile time.
#[derive(Clone, Debug, Derivative)]
#[derivative(PartialEq)]
pub struct BeaconState {
    // Versioning
    genesis_time: UnixSeconds,
    genesis_validators_root: H256,
    slot: Slot,
    fork: Fork,

    // History
    latest_block_header: BeaconBlockHeader,
    block_roots: Arc<Hc<RootVector>>,
    state_roots: Arc<Hc<RootVector>>,

    // Registry
    validators: Arc<Hc<Validators>>,
    balances: Arc<Hc<Balances>>,

    // Randomness
    randao_mixes: Arc<Hc<RootVector>>,

    // Slashings
    slashings: Arc<Hc<GweiVector>>,

    // Participation
    previous_epoch_participation: Arc<Hc<ParticipationList>>,
    current_epoch_participation: Arc<Hc<ParticipationList>>,

    // Finality
    justification_bits: JustificationBits,
    previous_justified_checkpoint: Checkpoint,
    current_justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,

    // Inactivity
    inactivity_scores: Arc<Hc<InactivityScores>>,

    // Sync committees
    current_sync_committee: Arc<Hc<SyncCommittee>>,
    next_sync_committee: Arc<Hc<SyncCommittee>>,

    // Cache
    #[derivative(PartialEq = "ignore")]
    cache: Cache,
}

impl BeaconState {
    /// A state at the genesis slot with an empty registry,
    /// sized according to `config`.
    #[must_use]
    pub fn empty(config: &Config) -> Self {
        let limit = config.validator_registry_limit;

        let fork = Fork {
            previous_version: config.genesis_fork_version,
            current_version: config.genesis_fork_version,
            epoch: GENESIS_EPOCH,
        };

        Self {
            genesis_time: 0,
            genesis_validators_root: H256::zero(),
            slot: GENESIS_SLOT,
            fork,
            latest_block_header: BeaconBlockHeader::default(),
            block_roots: arc(RootVector::repeat_zero(config.slots_per_historical_root)),
            state_roots: arc(RootVector::repeat_zero(config.slots_per_historical_root)),
            validators: arc(Validators::new(limit)),
            balances: arc(Balances::new(limit)),
            randao_mixes: arc(RootVector::repeat_zero(config.epochs_per_historical_vector)),
            slashings: arc(GweiVector::repeat_zero(config.epochs_per_slashings_vector)),
            previous_epoch_participation: arc(ParticipationList::new(limit)),
            current_epoch_participation: arc(ParticipationList::new(limit)),
            justification_bits: JustificationBits::default(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
            inactivity_scores: arc(InactivityScores::new(limit)),
            current_sync_committee: arc(SyncCommittee::empty(config.sync_committee_size)),
            next_sync_committee: arc(SyncCommittee::empty(config.sync_committee_size)),
            cache: Cache::default(),
        }
    }

    // Read accessors

    #[must_use]
    pub const fn genesis_time(&self) -> UnixSeconds {
        self.genesis_time
    }

    #[must_use]
    pub const fn genesis_validators_root(&self) -> H256 {
        self.genesis_validators_root
    }

    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    #[must_use]
    pub const fn fork(&self) -> Fork {
        self.fork
    }

    #[must_use]
    pub const fn latest_block_header(&self) -> BeaconBlockHeader {
        self.latest_block_header
    }

    #[must_use]
    pub fn block_roots(&self) -> &RootVector {
        &self.block_roots
    }

    #[must_use]
    pub fn state_roots(&self) -> &RootVector {
        &self.state_roots
    }

    #[must_use]
    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    #[must_use]
    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    #[must_use]
    pub fn randao_mixes(&self) -> &RootVector {
        &self.randao_mixes
    }

    #[must_use]
    pub fn slashings(&self) -> &GweiVector {
        &self.slashings
    }

    #[must_use]
    pub fn previous_epoch_participation(&self) -> &ParticipationList {
        &self.previous_epoch_participation
    }

    #[must_use]
    pub fn current_epoch_participation(&self) -> &ParticipationList {
        &self.current_epoch_participation
    }

    #[must_use]
    pub const fn justification_bits(&self) -> JustificationBits {
        self.justification_bits
    }

    #[must_use]
    pub const fn previous_justified_checkpoint(&self) -> Checkpoint {
        self.previous_justified_checkpoint
    }

    #[must_use]
    pub const fn current_justified_checkpoint(&self) -> Checkpoint {
        self.current_justified_checkpoint
    }

    #[must_use]
    pub const fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    #[must_use]
    pub fn inactivity_scores(&self) -> &InactivityScores {
        &self.inactivity_scores
    }

    #[must_use]
    pub fn current_sync_committee(&self) -> &SyncCommittee {
        &self.current_sync_committee
    }

    #[must_use]
    pub fn next_sync_committee(&self) -> &SyncCommittee {
        &self.next_sync_committee
    }

    #[must_use]
    pub const fn cache(&self) -> &Cache {
        &self.cache
    }

    // Mutators. The ones returning references to shared fields perform the
    // copy-on-write clone on first access.

    pub fn set_genesis_time(&mut self, genesis_time: UnixSeconds) {
        self.genesis_time = genesis_time;
    }

    pub fn set_genesis_validators_root(&mut self, root: H256) {
        self.genesis_validators_root = root;
    }

    pub fn slot_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }

    pub fn latest_block_header_mut(&mut self) -> &mut BeaconBlockHeader {
        &mut self.latest_block_header
    }

    pub fn block_roots_mut(&mut self) -> &mut RootVector {
        self.block_roots.make_mut().as_mut()
    }

    pub fn state_roots_mut(&mut self) -> &mut RootVector {
        self.state_roots.make_mut().as_mut()
    }

    pub fn validators_mut(&mut self) -> &mut Validators {
        self.validators.make_mut().as_mut()
    }

    pub fn balances_mut(&mut self) -> &mut Balances {
        self.balances.make_mut().as_mut()
    }

    pub fn randao_mixes_mut(&mut self) -> &mut RootVector {
        self.randao_mixes.make_mut().as_mut()
    }

    pub fn slashings_mut(&mut self) -> &mut GweiVector {
        self.slashings.make_mut().as_mut()
    }

    pub fn previous_epoch_participation_mut(&mut self) -> &mut ParticipationList {
        self.previous_epoch_participation.make_mut().as_mut()
    }

    pub fn current_epoch_participation_mut(&mut self) -> &mut ParticipationList {
        self.current_epoch_participation.make_mut().as_mut()
    }

    pub fn justification_bits_mut(&mut self) -> &mut JustificationBits {
        &mut self.justification_bits
    }

    pub fn previous_justified_checkpoint_mut(&mut self) -> &mut Checkpoint {
        &mut self.previous_justified_checkpoint
    }

    pub fn current_justified_checkpoint_mut(&mut self) -> &mut Checkpoint {
        &mut self.current_justified_checkpoint
    }

    pub fn finalized_checkpoint_mut(&mut self) -> &mut Checkpoint {
        &mut self.finalized_checkpoint
    }

    pub fn inactivity_scores_mut(&mut self) -> &mut InactivityScores {
        self.inactivity_scores.make_mut().as_mut()
    }

    pub fn current_sync_committee_mut(&mut self) -> &mut Arc<Hc<SyncCommittee>> {
        &mut self.current_sync_committee
    }

    pub fn next_sync_committee_mut(&mut self) -> &mut Arc<Hc<SyncCommittee>> {
        &mut self.next_sync_committee
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    /// Appends a validator together with its entries in the parallel lists.
    /// This is the only way the registry grows. Indices are never reused.
    pub fn push_validator(&mut self, validator: Validator, balance: Gwei) -> Result<(), ListFull> {
        self.validators_mut().push(validator)?;
        self.balances_mut().push(balance)?;
        self.previous_epoch_participation_mut().push(0)?;
        self.current_epoch_participation_mut().push(0)?;
        self.inactivity_scores_mut().push(0)?;

        Ok(())
    }

    /// Replaces the balance list wholesale.
    ///
    /// # Panics
    ///
    /// Panics if the length does not match the registry. Calling this with a
    /// mismatched list is a bug in the caller; production code must normalize
    /// inputs before calling.
    pub fn set_balances(&mut self, balances: Balances) {
        assert_eq!(
            balances.len(),
            self.validators().len_usize(),
            "balance list length must match the validator registry",
        );

        self.balances = arc(balances);
    }

    /// The structural root: a commitment over all field contents.
    ///
    /// Fields unchanged since their last hashing reuse their cached roots;
    /// only the combining layer and dirty fields are recomputed.
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        let chunks = [
            self.genesis_time.hash_tree_root(),
            self.genesis_validators_root,
            self.slot.hash_tree_root(),
            self.fork.hash_tree_root(),
            self.latest_block_header.hash_tree_root(),
            self.block_roots.hash_tree_root(),
            self.state_roots.hash_tree_root(),
            self.validators.hash_tree_root(),
            self.balances.hash_tree_root(),
            self.randao_mixes.hash_tree_root(),
            self.slashings.hash_tree_root(),
            self.previous_epoch_participation.hash_tree_root(),
            self.current_epoch_participation.hash_tree_root(),
            self.justification_bits.hash_tree_root(),
            self.previous_justified_checkpoint.hash_tree_root(),
            self.current_justified_checkpoint.hash_tree_root(),
            self.finalized_checkpoint.hash_tree_root(),
            self.inactivity_scores.hash_tree_root(),
            self.current_sync_committee.hash_tree_root(),
            self.next_sync_committee.hash_tree_root(),
        ];

        merkleize_chunks(&chunks, FIELD_TREE_DEPTH)
    }

    fn fixed_part_size(config: &Config) -> usize {
        let roots = usize::try_from(config.slots_per_historical_root.get())
            .expect("ring length fits in usize")
            * H256::len_bytes();

        let mixes = usize::try_from(config.epochs_per_historical_vector.get())
            .expect("ring length fits in usize")
            * H256::len_bytes();

        let slashings = usize::try_from(config.epochs_per_slashings_vector.get())
            .expect("ring length fits in usize")
            * size_of::<Gwei>();

        let committee = SyncCommittee::ssz_size(config.sync_committee_size);

        size_of::<UnixSeconds>()
            + H256::len_bytes()
            + size_of::<Slot>()
            + Fork::SSZ_SIZE
            + BeaconBlockHeader::SSZ_SIZE
            + 2 * roots
            + mixes
            + slashings
            + JustificationBits::SSZ_SIZE
            + 3 * Checkpoint::SSZ_SIZE
            + 2 * committee
            + VARIABLE_FIELD_COUNT * BYTES_PER_OFFSET
    }
}

const VARIABLE_FIELD_COUNT: usize = 5;
const FIELD_TREE_DEPTH: u8 = 5;

fn arc<T>(value: T) -> Arc<Hc<T>> {
    Arc::new(Hc::from(value))
}

impl SszWrite for BeaconState {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        // Variable payloads are built up front so that offsets are known
        // before the fixed part is written.
        let validator_bytes = self.validators.to_ssz();
        let balance_bytes = self.balances.to_ssz();
        let previous_participation_bytes = self.previous_epoch_participation.to_ssz();
        let current_participation_bytes = self.current_epoch_participation.to_ssz();
        let inactivity_bytes = self.inactivity_scores.to_ssz();

        // Offsets are relative to the start of the container. The state is
        // only ever serialized as a top-level object.
        let fixed_size = size_of::<UnixSeconds>()
            + H256::len_bytes()
            + size_of::<Slot>()
            + Fork::SSZ_SIZE
            + BeaconBlockHeader::SSZ_SIZE
            + 2 * self.block_roots.len() * H256::len_bytes()
            + self.randao_mixes.len() * H256::len_bytes()
            + self.slashings.len() * size_of::<Gwei>()
            + JustificationBits::SSZ_SIZE
            + 3 * Checkpoint::SSZ_SIZE
            + 2 * (self.current_sync_committee.pubkeys.len() + 1) * bls::PUBLIC_KEY_BYTES
            + VARIABLE_FIELD_COUNT * BYTES_PER_OFFSET;

        let validator_offset = fixed_size;
        let balance_offset = validator_offset + validator_bytes.len();
        let previous_participation_offset = balance_offset + balance_bytes.len();
        let current_participation_offset =
            previous_participation_offset + previous_participation_bytes.len();
        let inactivity_offset =
            current_participation_offset + current_participation_bytes.len();

        self.genesis_time.write_ssz(bytes);
        self.genesis_validators_root.write_ssz(bytes);
        self.slot.write_ssz(bytes);
        self.fork.write_ssz(bytes);
        self.latest_block_header.write_ssz(bytes);
        self.block_roots.write_ssz(bytes);
        self.state_roots.write_ssz(bytes);
        write_offset(bytes, validator_offset);
        write_offset(bytes, balance_offset);
        self.randao_mixes.write_ssz(bytes);
        self.slashings.write_ssz(bytes);
        write_offset(bytes, previous_participation_offset);
        write_offset(bytes, current_participation_offset);
        self.justification_bits.write_ssz(bytes);
        self.previous_justified_checkpoint.write_ssz(bytes);
        self.current_justified_checkpoint.write_ssz(bytes);
        self.finalized_checkpoint.write_ssz(bytes);
        write_offset(bytes, inactivity_offset);
        self.current_sync_committee.write_ssz(bytes);
        self.next_sync_committee.write_ssz(bytes);

        bytes.extend_from_slice(&validator_bytes);
        bytes.extend_from_slice(&balance_bytes);
        bytes.extend_from_slice(&previous_participation_bytes);
        bytes.extend_from_slice(&current_participation_bytes);
        bytes.extend_from_slice(&inactivity_bytes);
    }
}

impl SszRead<Config> for BeaconState {
    fn from_ssz(config: &Config, bytes: &[u8]) -> Result<Self, ReadError> {
        let fixed_size = Self::fixed_part_size(config);

        if bytes.len() < fixed_size {
            return Err(ReadError::TooShort {
                minimum: fixed_size,
                actual: bytes.len(),
            });
        }

        let roots_size = usize::try_from(config.slots_per_historical_root.get())
            .expect("ring length fits in usize")
            * H256::len_bytes();

        let mixes_size = usize::try_from(config.epochs_per_historical_vector.get())
            .expect("ring length fits in usize")
            * H256::len_bytes();

        let slashings_size = usize::try_from(config.epochs_per_slashings_vector.get())
            .expect("ring length fits in usize")
            * size_of::<Gwei>();

        let committee_size = SyncCommittee::ssz_size(config.sync_committee_size);

        let mut position = 0;

        let mut take = |size: usize| {
            let slice = &bytes[position..position + size];
            position += size;
            slice
        };

        let genesis_time = u64::from_ssz(config, take(8))?;
        let genesis_validators_root = H256::from_ssz(config, take(32))?;
        let slot = u64::from_ssz(config, take(8))?;
        let fork = Fork::read_ssz(take(Fork::SSZ_SIZE))?;
        let latest_block_header = BeaconBlockHeader::read_ssz(take(BeaconBlockHeader::SSZ_SIZE))?;

        let block_roots =
            RootVector::from_ssz(take(roots_size), config.slots_per_historical_root)?;
        let state_roots =
            RootVector::from_ssz(take(roots_size), config.slots_per_historical_root)?;

        let validator_offset = read_offset(take(BYTES_PER_OFFSET), 0)?;
        let balance_offset = read_offset(take(BYTES_PER_OFFSET), 0)?;

        let randao_mixes =
            RootVector::from_ssz(take(mixes_size), config.epochs_per_historical_vector)?;
        let slashings =
            GweiVector::from_ssz(take(slashings_size), config.epochs_per_slashings_vector)?;

        let previous_participation_offset = read_offset(take(BYTES_PER_OFFSET), 0)?;
        let current_participation_offset = read_offset(take(BYTES_PER_OFFSET), 0)?;

        let justification_bits = JustificationBits::read_ssz(take(JustificationBits::SSZ_SIZE))?;
        let previous_justified_checkpoint = Checkpoint::read_ssz(take(Checkpoint::SSZ_SIZE))?;
        let current_justified_checkpoint = Checkpoint::read_ssz(take(Checkpoint::SSZ_SIZE))?;
        let finalized_checkpoint = Checkpoint::read_ssz(take(Checkpoint::SSZ_SIZE))?;

        let inactivity_offset = read_offset(take(BYTES_PER_OFFSET), 0)?;

        let current_sync_committee =
            SyncCommittee::from_ssz(take(committee_size), config.sync_committee_size)?;
        let next_sync_committee =
            SyncCommittee::from_ssz(take(committee_size), config.sync_committee_size)?;

        debug_assert_eq!(position, fixed_size);

        let offsets = [
            validator_offset,
            balance_offset,
            previous_participation_offset,
            current_participation_offset,
            inactivity_offset,
            bytes.len(),
        ];

        if offsets[0] != fixed_size {
            return Err(ReadError::OffsetOutOfBounds {
                offset: offsets[0],
                length: bytes.len(),
            });
        }

        for pair in offsets.windows(2) {
            if pair[0] > pair[1] {
                return Err(ReadError::OffsetsNotIncreasing {
                    previous: pair[0],
                    next: pair[1],
                });
            }

            if pair[1] > bytes.len() {
                return Err(ReadError::OffsetOutOfBounds {
                    offset: pair[1],
                    length: bytes.len(),
                });
            }
        }

        let limit = config.validator_registry_limit;

        let validators = Validators::from_ssz(&bytes[offsets[0]..offsets[1]], limit)?;
        let balances = Balances::from_ssz(&bytes[offsets[1]..offsets[2]], limit)?;
        let previous_epoch_participation =
            ParticipationList::from_ssz(&bytes[offsets[2]..offsets[3]], limit)?;
        let current_epoch_participation =
            ParticipationList::from_ssz(&bytes[offsets[3]..offsets[4]], limit)?;
        let inactivity_scores = InactivityScores::from_ssz(&bytes[offsets[4]..offsets[5]], limit)?;

        // The registry and the sequences indexed by validator index must stay
        // parallel. A mismatch means the input was not produced by this code.
        let expected = validators.len_usize();

        for actual in [
            balances.len(),
            previous_epoch_participation.len(),
            current_epoch_participation.len(),
            inactivity_scores.len(),
        ] {
            if actual != expected {
                return Err(ReadError::VectorLengthMismatch { expected, actual });
            }
        }

        Ok(Self {
            genesis_time,
            genesis_validators_root,
            slot,
            fork,
            latest_block_header,
            block_roots: arc(block_roots),
            state_roots: arc(state_roots),
            validators: arc(validators),
            balances: arc(balances),
            randao_mixes: arc(randao_mixes),
            slashings: arc(slashings),
            previous_epoch_participation: arc(previous_epoch_participation),
            current_epoch_participation: arc(current_epoch_participation),
            justification_bits,
            previous_justified_checkpoint,
            current_justified_checkpoint,
            finalized_checkpoint,
            inactivity_scores: arc(inactivity_scores),
            current_sync_committee: arc(current_sync_committee),
            next_sync_committee: arc(next_sync_committee),
            cache: Cache::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use ssz::mix_in_length;

    use crate::{consts::FAR_FUTURE_EPOCH, containers::Validator};

    use super::*;

    fn test_state(config: &Config, validator_count: u64) -> BeaconState {
        let mut state = BeaconState::empty(config);

        for index in 0..validator_count {
            let mut pubkey = [0; bls::PUBLIC_KEY_BYTES];
            pubkey[..8].copy_from_slice(&index.to_le_bytes());

            let validator = Validator {
                pubkey: pubkey.into(),
                effective_balance: config.max_effective_balance,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..Validator::default()
            };

            state
                .push_validator(validator, config.max_effective_balance)
                .expect("validator count is below the registry limit");
        }

        state
    }

    #[test]
    fn cloning_shares_field_handles() {
        let config = Config::minimal();
        let state = test_state(&config, 4);
        let copy = state.clone();

        assert!(Arc::ptr_eq(&state.validators, &copy.validators));
        assert!(Arc::ptr_eq(&state.balances, &copy.balances));
        assert!(Arc::ptr_eq(&state.randao_mixes, &copy.randao_mixes));
    }

    #[test]
    fn mutating_a_copy_leaves_the_original_unchanged() {
        let config = Config::minimal();
        let state = test_state(&config, 4);
        let root_before = state.hash_tree_root();

        let mut copy = state.clone();
        *copy
            .balances_mut()
            .get_mut(0)
            .expect("validator 0 exists") += 1;

        // The copy now owns a private balance list. The original is intact.
        assert!(!Arc::ptr_eq(&state.balances, &copy.balances));
        assert!(Arc::ptr_eq(&state.validators, &copy.validators));
        assert_eq!(*state.balances().get(0).expect("validator 0 exists"), config.max_effective_balance);
        assert_eq!(state.hash_tree_root(), root_before);
        assert_ne!(copy.hash_tree_root(), root_before);
    }

    #[test]
    fn exclusively_owned_fields_are_mutated_in_place() {
        let config = Config::minimal();
        let mut state = test_state(&config, 4);

        let before = Arc::as_ptr(&state.balances);
        *state
            .balances_mut()
            .get_mut(0)
            .expect("validator 0 exists") += 1;

        assert_eq!(Arc::as_ptr(&state.balances), before);
    }

    #[test]
    fn empty_list_fields_hash_to_protocol_defaults() {
        let config = Config::minimal();
        let state = BeaconState::empty(&config);

        let depth = config
            .validator_registry_limit
            .get()
            .ilog2()
            .try_into()
            .expect("registry depth fits in u8");

        assert_eq!(
            state.validators().hash_tree_root(),
            mix_in_length(merkleize_chunks(&[], depth), 0),
        );
    }

    #[test]
    fn state_round_trips_through_ssz() -> Result<(), ReadError> {
        let config = Config::minimal();
        let mut state = test_state(&config, 7);

        *state.slot_mut() = 42;
        *state.randao_mixes_mut().mod_index_mut(3) = H256::repeat_byte(0xab);
        state.finalized_checkpoint_mut().epoch = 2;

        let bytes = state.to_ssz();
        let decoded = BeaconState::from_ssz(&config, &bytes)?;

        assert_eq!(decoded, state);
        assert_eq!(decoded.hash_tree_root(), state.hash_tree_root());

        Ok(())
    }

    #[test]
    fn deserialization_rejects_mismatched_parallel_lists() {
        let config = Config::minimal();
        let mut state = test_state(&config, 3);

        // Grow the balance list past the registry to corrupt the invariant.
        state
            .balances_mut()
            .push(1)
            .expect("registry limit is far away");

        let bytes = state.to_ssz();

        assert_eq!(
            BeaconState::from_ssz(&config, &bytes),
            Err(ReadError::VectorLengthMismatch {
                expected: 3,
                actual: 4,
            }),
        );
    }

    #[test]
    #[should_panic = "balance list length must match the validator registry"]
    fn replacing_balances_with_a_mismatched_list_is_a_caller_bug() {
        let config = Config::minimal();
        let mut state = test_state(&config, 3);

        state.set_balances(Balances::new(config.validator_registry_limit));
    }

    #[test]
    fn rehashing_an_untouched_copy_is_consistent() {
        let config = Config::minimal();
        let state = test_state(&config, 5);

        let root = state.hash_tree_root();
        let copy = state.clone();

        assert_eq!(copy.hash_tree_root(), root);
    }
}
