//! Collections stored in `BeaconState` fields.
//!
//! Lists carry their configured limit so that Merkle roots can be computed
//! without consulting the configuration again. Limits reach the collections
//! exactly once, at construction or deserialization.

use core::num::NonZeroU64;

use arithmetic::{U64Ext as _, UsizeExt as _};
use ethereum_types::H256;
use ssz::{merkleize_chunks, mix_in_length, pack_bytes, pack_u64s, ReadError, SszHash, SszWrite};
use thiserror::Error;

use crate::{
    containers::Validator,
    primitives::{Gwei, ParticipationFlags, ValidatorIndex},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("index {index} is out of bounds (length {length})")]
pub struct IndexOutOfBounds {
    pub index: u64,
    pub length: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("list is full (limit {limit})")]
pub struct ListFull {
    pub limit: u64,
}

fn index_usize(index: u64, length: usize) -> Result<usize, IndexOutOfBounds> {
    let error = IndexOutOfBounds { index, length };
    let index = usize::try_from(index).map_err(|_| error)?;

    if index >= length {
        return Err(error);
    }

    Ok(index)
}

fn u64_chunk_depth(element_limit: NonZeroU64) -> u8 {
    element_limit
        .get()
        .div_ceil(ssz::U64S_PER_CHUNK as u64)
        .ilog2_ceil()
}

/// Fixed-length vector of roots indexed modulo its length.
/// Backs the block root, state root, and RANDAO mix ring buffers.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RootVector {
    roots: Vec<H256>,
}

impl RootVector {
    #[must_use]
    pub fn repeat_zero(length: NonZeroU64) -> Self {
        let length = usize::try_from(length.get()).expect("vector length fits in usize");

        Self {
            roots: vec![H256::zero(); length],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn mod_index(&self, index: u64) -> &H256 {
        let length = u64::try_from(self.roots.len()).expect("vector length fits in u64");
        let position = usize::try_from(index % length).expect("remainder fits in usize");
        &self.roots[position]
    }

    pub fn mod_index_mut(&mut self, index: u64) -> &mut H256 {
        let length = u64::try_from(self.roots.len()).expect("vector length fits in u64");
        let position = usize::try_from(index % length).expect("remainder fits in usize");
        &mut self.roots[position]
    }

    pub fn from_ssz(bytes: &[u8], expected_length: NonZeroU64) -> Result<Self, ReadError> {
        let expected =
            usize::try_from(expected_length.get()).expect("vector length fits in usize");

        if bytes.len() != expected * H256::len_bytes() {
            return Err(ReadError::WrongSize {
                expected: expected * H256::len_bytes(),
                actual: bytes.len(),
            });
        }

        let roots = bytes
            .chunks_exact(H256::len_bytes())
            .map(H256::from_slice)
            .collect();

        Ok(Self { roots })
    }
}

impl SszWrite for RootVector {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        for root in &self.roots {
            root.write_ssz(bytes);
        }
    }
}

impl SszHash for RootVector {
    fn hash_tree_root(&self) -> H256 {
        merkleize_chunks(&self.roots, self.roots.len().ilog2_ceil())
    }
}

/// Fixed-length vector of balances. Backs the slashings ring buffer.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GweiVector {
    values: Vec<Gwei>,
}

impl GweiVector {
    #[must_use]
    pub fn repeat_zero(length: NonZeroU64) -> Self {
        let length = usize::try_from(length.get()).expect("vector length fits in usize");

        Self {
            values: vec![0; length],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Gwei> + '_ {
        self.values.iter().copied()
    }

    #[must_use]
    pub fn mod_index(&self, index: u64) -> &Gwei {
        let length = u64::try_from(self.values.len()).expect("vector length fits in u64");
        let position = usize::try_from(index % length).expect("remainder fits in usize");
        &self.values[position]
    }

    pub fn mod_index_mut(&mut self, index: u64) -> &mut Gwei {
        let length = u64::try_from(self.values.len()).expect("vector length fits in u64");
        let position = usize::try_from(index % length).expect("remainder fits in usize");
        &mut self.values[position]
    }

    pub fn from_ssz(bytes: &[u8], expected_length: NonZeroU64) -> Result<Self, ReadError> {
        let expected =
            usize::try_from(expected_length.get()).expect("vector length fits in usize");

        if bytes.len() != expected * size_of::<Gwei>() {
            return Err(ReadError::WrongSize {
                expected: expected * size_of::<Gwei>(),
                actual: bytes.len(),
            });
        }

        let values = read_u64s(bytes)?;

        Ok(Self { values })
    }
}

impl SszWrite for GweiVector {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        for value in &self.values {
            value.write_ssz(bytes);
        }
    }
}

impl SszHash for GweiVector {
    fn hash_tree_root(&self) -> H256 {
        let chunks = pack_u64s(self.values.iter().copied());
        merkleize_chunks(&chunks, chunks.len().ilog2_ceil())
    }
}

/// The validator registry. Append-only; indices are stable forever.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Validators {
    validators: Vec<Validator>,
    limit: NonZeroU64,
}

impl Validators {
    #[must_use]
    pub fn new(limit: NonZeroU64) -> Self {
        Self {
            validators: vec![],
            limit,
        }
    }

    #[must_use]
    pub fn len_usize(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn len_u64(&self) -> u64 {
        u64::try_from(self.validators.len()).expect("validator count fits in u64")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn get(&self, index: ValidatorIndex) -> Result<&Validator, IndexOutOfBounds> {
        let position = index_usize(index, self.validators.len())?;
        Ok(&self.validators[position])
    }

    pub fn get_mut(&mut self, index: ValidatorIndex) -> Result<&mut Validator, IndexOutOfBounds> {
        let position = index_usize(index, self.validators.len())?;
        Ok(&mut self.validators[position])
    }

    pub fn push(&mut self, validator: Validator) -> Result<(), ListFull> {
        if self.len_u64() >= self.limit.get() {
            return Err(ListFull {
                limit: self.limit.get(),
            });
        }

        self.validators.push(validator);

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    pub fn update(&mut self, f: impl FnMut(&mut Validator)) {
        self.validators.iter_mut().for_each(f);
    }

    pub fn from_ssz(bytes: &[u8], limit: NonZeroU64) -> Result<Self, ReadError> {
        if bytes.len() % Validator::SSZ_SIZE != 0 {
            return Err(ReadError::UnevenElements {
                element_size: Validator::SSZ_SIZE,
                length: bytes.len(),
            });
        }

        let actual = bytes.len() / Validator::SSZ_SIZE;

        if u64::try_from(actual).expect("element count fits in u64") > limit.get() {
            return Err(ReadError::ListTooLong {
                limit: limit.get(),
                actual,
            });
        }

        let validators = bytes
            .chunks_exact(Validator::SSZ_SIZE)
            .map(Validator::read_ssz)
            .collect::<Result<_, _>>()?;

        Ok(Self { validators, limit })
    }
}

impl<'list> IntoIterator for &'list Validators {
    type Item = &'list Validator;
    type IntoIter = core::slice::Iter<'list, Validator>;

    fn into_iter(self) -> Self::IntoIter {
        self.validators.iter()
    }
}

impl SszWrite for Validators {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        for validator in &self.validators {
            validator.write_ssz(bytes);
        }
    }
}

impl SszHash for Validators {
    fn hash_tree_root(&self) -> H256 {
        let chunks = self
            .validators
            .iter()
            .map(SszHash::hash_tree_root)
            .collect::<Vec<_>>();

        let root = merkleize_chunks(&chunks, self.limit.get().ilog2_ceil());

        mix_in_length(root, self.len_u64())
    }
}

macro_rules! u64_list {
    ($name: ident, $element: ty, $doc: literal) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Debug)]
        pub struct $name {
            values: Vec<$element>,
            limit: NonZeroU64,
        }

        impl $name {
            #[must_use]
            pub fn new(limit: NonZeroU64) -> Self {
                Self {
                    values: vec![],
                    limit,
                }
            }

            #[must_use]
            pub fn zeroed(length: usize, limit: NonZeroU64) -> Self {
                Self {
                    values: vec![0; length],
                    limit,
                }
            }

            #[must_use]
            pub fn len(&self) -> usize {
                self.values.len()
            }

            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.values.is_empty()
            }

            pub fn get(&self, index: u64) -> Result<&$element, IndexOutOfBounds> {
                let position = index_usize(index, self.values.len())?;
                Ok(&self.values[position])
            }

            pub fn get_mut(&mut self, index: u64) -> Result<&mut $element, IndexOutOfBounds> {
                let position = index_usize(index, self.values.len())?;
                Ok(&mut self.values[position])
            }

            pub fn push(&mut self, value: $element) -> Result<(), ListFull> {
                let length = u64::try_from(self.values.len()).expect("length fits in u64");

                if length >= self.limit.get() {
                    return Err(ListFull {
                        limit: self.limit.get(),
                    });
                }

                self.values.push(value);

                Ok(())
            }

            pub fn iter(&self) -> impl Iterator<Item = $element> + '_ {
                self.values.iter().copied()
            }

            pub fn update(&mut self, f: impl FnMut(&mut $element)) {
                self.values.iter_mut().for_each(f);
            }

            pub fn from_ssz(bytes: &[u8], limit: NonZeroU64) -> Result<Self, ReadError> {
                let element_size = size_of::<$element>();

                if bytes.len() % element_size != 0 {
                    return Err(ReadError::UnevenElements {
                        element_size,
                        length: bytes.len(),
                    });
                }

                let actual = bytes.len() / element_size;

                if u64::try_from(actual).expect("element count fits in u64") > limit.get() {
                    return Err(ReadError::ListTooLong {
                        limit: limit.get(),
                        actual,
                    });
                }

                let values = bytes
                    .chunks_exact(element_size)
                    .map(|chunk| {
                        <$element>::from_le_bytes(
                            chunk.try_into().expect("chunk has element_size bytes"),
                        )
                    })
                    .collect();

                Ok(Self { values, limit })
            }
        }

        impl SszWrite for $name {
            fn write_ssz(&self, bytes: &mut Vec<u8>) {
                for value in &self.values {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
    };
}

u64_list!(
    Balances,
    Gwei,
    "Validator balances in Gwei, parallel to the registry."
);

u64_list!(
    InactivityScores,
    u64,
    "Inactivity leak scores, parallel to the registry."
);

impl SszHash for Balances {
    fn hash_tree_root(&self) -> H256 {
        let chunks = pack_u64s(self.iter());
        let root = merkleize_chunks(&chunks, u64_chunk_depth(self.limit));
        let length = u64::try_from(self.len()).expect("length fits in u64");

        mix_in_length(root, length)
    }
}

impl SszHash for InactivityScores {
    fn hash_tree_root(&self) -> H256 {
        let chunks = pack_u64s(self.iter());
        let root = merkleize_chunks(&chunks, u64_chunk_depth(self.limit));
        let length = u64::try_from(self.len()).expect("length fits in u64");

        mix_in_length(root, length)
    }
}

/// Participation flags, parallel to the registry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParticipationList {
    flags: Vec<ParticipationFlags>,
    limit: NonZeroU64,
}

impl ParticipationList {
    #[must_use]
    pub fn new(limit: NonZeroU64) -> Self {
        Self {
            flags: vec![],
            limit,
        }
    }

    #[must_use]
    pub fn zeroed(length: usize, limit: NonZeroU64) -> Self {
        Self {
            flags: vec![0; length],
            limit,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn get(&self, index: ValidatorIndex) -> Result<&ParticipationFlags, IndexOutOfBounds> {
        let position = index_usize(index, self.flags.len())?;
        Ok(&self.flags[position])
    }

    pub fn get_mut(
        &mut self,
        index: ValidatorIndex,
    ) -> Result<&mut ParticipationFlags, IndexOutOfBounds> {
        let position = index_usize(index, self.flags.len())?;
        Ok(&mut self.flags[position])
    }

    pub fn push(&mut self, flags: ParticipationFlags) -> Result<(), ListFull> {
        let length = u64::try_from(self.flags.len()).expect("length fits in u64");

        if length >= self.limit.get() {
            return Err(ListFull {
                limit: self.limit.get(),
            });
        }

        self.flags.push(flags);

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = ParticipationFlags> + '_ {
        self.flags.iter().copied()
    }

    pub fn from_ssz(bytes: &[u8], limit: NonZeroU64) -> Result<Self, ReadError> {
        let actual = bytes.len();

        if u64::try_from(actual).expect("element count fits in u64") > limit.get() {
            return Err(ReadError::ListTooLong {
                limit: limit.get(),
                actual,
            });
        }

        Ok(Self {
            flags: bytes.to_vec(),
            limit,
        })
    }
}

impl SszWrite for ParticipationList {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.flags);
    }
}

impl SszHash for ParticipationList {
    fn hash_tree_root(&self) -> H256 {
        let chunks = pack_bytes(&self.flags);

        let chunk_limit = self
            .limit
            .get()
            .div_ceil(ssz::BYTES_PER_CHUNK as u64)
            .ilog2_ceil();

        let root = merkleize_chunks(&chunks, chunk_limit);
        let length = u64::try_from(self.len()).expect("length fits in u64");

        mix_in_length(root, length)
    }
}

fn read_u64s(bytes: &[u8]) -> Result<Vec<u64>, ReadError> {
    if bytes.len() % size_of::<u64>() != 0 {
        return Err(ReadError::UnevenElements {
            element_size: size_of::<u64>(),
            length: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(size_of::<u64>())
        .map(|chunk| u64::from_le_bytes(chunk.try_into().expect("chunk has 8 bytes")))
        .collect())
}
