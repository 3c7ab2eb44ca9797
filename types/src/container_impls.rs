//! SSZ serialization and hashing for the fixed-size containers.

use core::num::NonZeroU64;

use arithmetic::UsizeExt as _;
use bls::{AggregatePublicKeyBytes, PublicKeyBytes, PUBLIC_KEY_BYTES};
use ethereum_types::H256;
use ssz::{merkleize_chunks, pack_bytes, ReadError, SszHash, SszWrite};

use crate::{
    containers::{BeaconBlockHeader, Checkpoint, Fork, ForkData, JustificationBits, SyncCommittee,
        Validator},
    primitives::Version,
};

fn version_chunk(version: Version) -> H256 {
    let mut chunk = H256::zero();
    chunk[..Version::len_bytes()].copy_from_slice(version.as_bytes());
    chunk
}

fn compressed_key_root(bytes: &[u8; PUBLIC_KEY_BYTES]) -> H256 {
    let chunks = pack_bytes(bytes);
    merkleize_chunks(&chunks, 1)
}

fn read_u64(bytes: &[u8], position: usize) -> Result<u64, ReadError> {
    let end = position + size_of::<u64>();

    let slice = bytes.get(position..end).ok_or(ReadError::TooShort {
        minimum: end,
        actual: bytes.len(),
    })?;

    Ok(u64::from_le_bytes(
        slice.try_into().expect("slice has 8 bytes"),
    ))
}

fn read_h256(bytes: &[u8], position: usize) -> Result<H256, ReadError> {
    let end = position + H256::len_bytes();

    let slice = bytes.get(position..end).ok_or(ReadError::TooShort {
        minimum: end,
        actual: bytes.len(),
    })?;

    Ok(H256::from_slice(slice))
}

impl Fork {
    pub const SSZ_SIZE: usize = 2 * Version::len_bytes() + size_of::<u64>();

    pub fn read_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() != Self::SSZ_SIZE {
            return Err(ReadError::WrongSize {
                expected: Self::SSZ_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            previous_version: Version::from_slice(&bytes[..4]),
            current_version: Version::from_slice(&bytes[4..8]),
            epoch: read_u64(bytes, 8)?,
        })
    }
}

impl SszWrite for Fork {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(self.previous_version.as_bytes());
        bytes.extend_from_slice(self.current_version.as_bytes());
        self.epoch.write_ssz(bytes);
    }
}

impl SszHash for Fork {
    fn hash_tree_root(&self) -> H256 {
        let chunks = [
            version_chunk(self.previous_version),
            version_chunk(self.current_version),
            self.epoch.hash_tree_root(),
        ];

        merkleize_chunks(&chunks, 2)
    }
}

impl SszHash for ForkData {
    fn hash_tree_root(&self) -> H256 {
        let chunks = [
            version_chunk(self.current_version),
            self.genesis_validators_root,
        ];

        merkleize_chunks(&chunks, 1)
    }
}

impl Checkpoint {
    pub const SSZ_SIZE: usize = size_of::<u64>() + H256::len_bytes();

    pub fn read_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() != Self::SSZ_SIZE {
            return Err(ReadError::WrongSize {
                expected: Self::SSZ_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            epoch: read_u64(bytes, 0)?,
            root: read_h256(bytes, 8)?,
        })
    }
}

impl SszWrite for Checkpoint {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        self.epoch.write_ssz(bytes);
        self.root.write_ssz(bytes);
    }
}

impl SszHash for Checkpoint {
    fn hash_tree_root(&self) -> H256 {
        hashing::hash_256_256(self.epoch.hash_tree_root(), self.root)
    }
}

impl BeaconBlockHeader {
    pub const SSZ_SIZE: usize = 2 * size_of::<u64>() + 3 * H256::len_bytes();

    pub fn read_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() != Self::SSZ_SIZE {
            return Err(ReadError::WrongSize {
                expected: Self::SSZ_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            slot: read_u64(bytes, 0)?,
            proposer_index: read_u64(bytes, 8)?,
            parent_root: read_h256(bytes, 16)?,
            state_root: read_h256(bytes, 48)?,
            body_root: read_h256(bytes, 80)?,
        })
    }
}

impl SszWrite for BeaconBlockHeader {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        self.slot.write_ssz(bytes);
        self.proposer_index.write_ssz(bytes);
        self.parent_root.write_ssz(bytes);
        self.state_root.write_ssz(bytes);
        self.body_root.write_ssz(bytes);
    }
}

impl SszHash for BeaconBlockHeader {
    fn hash_tree_root(&self) -> H256 {
        let chunks = [
            self.slot.hash_tree_root(),
            self.proposer_index.hash_tree_root(),
            self.parent_root,
            self.state_root,
            self.body_root,
        ];

        merkleize_chunks(&chunks, 3)
    }
}

impl Validator {
    pub const SSZ_SIZE: usize =
        PUBLIC_KEY_BYTES + H256::len_bytes() + size_of::<u64>() + 1 + 4 * size_of::<u64>();

    pub fn read_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() != Self::SSZ_SIZE {
            return Err(ReadError::WrongSize {
                expected: Self::SSZ_SIZE,
                actual: bytes.len(),
            });
        }

        let pubkey: [u8; PUBLIC_KEY_BYTES] = bytes[..PUBLIC_KEY_BYTES]
            .try_into()
            .expect("slice has PUBLIC_KEY_BYTES bytes");

        let slashed = match bytes[88] {
            0 => false,
            1 => true,
            value => return Err(ReadError::InvalidBool { value }),
        };

        Ok(Self {
            pubkey: pubkey.into(),
            withdrawal_credentials: read_h256(bytes, 48)?,
            effective_balance: read_u64(bytes, 80)?,
            slashed,
            activation_eligibility_epoch: read_u64(bytes, 89)?,
            activation_epoch: read_u64(bytes, 97)?,
            exit_epoch: read_u64(bytes, 105)?,
            withdrawable_epoch: read_u64(bytes, 113)?,
        })
    }
}

impl SszWrite for Validator {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(self.pubkey.as_bytes());
        self.withdrawal_credentials.write_ssz(bytes);
        self.effective_balance.write_ssz(bytes);
        self.slashed.write_ssz(bytes);
        self.activation_eligibility_epoch.write_ssz(bytes);
        self.activation_epoch.write_ssz(bytes);
        self.exit_epoch.write_ssz(bytes);
        self.withdrawable_epoch.write_ssz(bytes);
    }
}

impl SszHash for Validator {
    fn hash_tree_root(&self) -> H256 {
        let chunks = [
            compressed_key_root(self.pubkey.as_bytes()),
            self.withdrawal_credentials,
            self.effective_balance.hash_tree_root(),
            self.slashed.hash_tree_root(),
            self.activation_eligibility_epoch.hash_tree_root(),
            self.activation_epoch.hash_tree_root(),
            self.exit_epoch.hash_tree_root(),
            self.withdrawable_epoch.hash_tree_root(),
        ];

        merkleize_chunks(&chunks, 3)
    }
}

impl SyncCommittee {
    #[must_use]
    pub fn ssz_size(committee_size: NonZeroU64) -> usize {
        let size = usize::try_from(committee_size.get()).expect("committee size fits in usize");
        (size + 1) * PUBLIC_KEY_BYTES
    }

    pub fn from_ssz(bytes: &[u8], committee_size: NonZeroU64) -> Result<Self, ReadError> {
        let expected = Self::ssz_size(committee_size);

        if bytes.len() != expected {
            return Err(ReadError::WrongSize {
                expected,
                actual: bytes.len(),
            });
        }

        let (member_bytes, aggregate_bytes) = bytes.split_at(expected - PUBLIC_KEY_BYTES);

        let pubkeys = member_bytes
            .chunks_exact(PUBLIC_KEY_BYTES)
            .map(|chunk| {
                let bytes: [u8; PUBLIC_KEY_BYTES] =
                    chunk.try_into().expect("chunk has PUBLIC_KEY_BYTES bytes");
                PublicKeyBytes::from(bytes)
            })
            .collect();

        let aggregate: [u8; PUBLIC_KEY_BYTES] = aggregate_bytes
            .try_into()
            .expect("split_at leaves PUBLIC_KEY_BYTES bytes");

        Ok(Self {
            pubkeys,
            aggregate_pubkey: AggregatePublicKeyBytes::from(aggregate),
        })
    }
}

impl SszWrite for SyncCommittee {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        for pubkey in &self.pubkeys {
            bytes.extend_from_slice(pubkey.as_bytes());
        }

        bytes.extend_from_slice(self.aggregate_pubkey.as_ref());
    }
}

impl SszHash for SyncCommittee {
    fn hash_tree_root(&self) -> H256 {
        let chunks = self
            .pubkeys
            .iter()
            .map(|pubkey| compressed_key_root(pubkey.as_bytes()))
            .collect::<Vec<_>>();

        let pubkeys_root = merkleize_chunks(&chunks, chunks.len().ilog2_ceil());
        let aggregate_root = compressed_key_root(self.aggregate_pubkey.as_ref());

        hashing::hash_256_256(pubkeys_root, aggregate_root)
    }
}

impl JustificationBits {
    pub const SSZ_SIZE: usize = 1;

    pub fn read_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        match bytes {
            [byte] if *byte <= Self::MASK => Ok(Self::from_byte_unchecked(*byte)),
            [byte] => Err(ReadError::ExtraBits { value: *byte }),
            _ => Err(ReadError::WrongSize {
                expected: Self::SSZ_SIZE,
                actual: bytes.len(),
            }),
        }
    }
}

impl SszWrite for JustificationBits {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.push(self.into_byte());
    }
}

impl SszHash for JustificationBits {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = H256::zero();
        chunk.as_bytes_mut()[0] = self.into_byte();
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_round_trips_through_ssz() -> Result<(), ReadError> {
        let validator = Validator {
            withdrawal_credentials: H256::repeat_byte(3),
            effective_balance: 32_000_000_000,
            slashed: true,
            activation_eligibility_epoch: 1,
            activation_epoch: 2,
            exit_epoch: 3,
            withdrawable_epoch: 4,
            ..Validator::default()
        };

        let bytes = validator.to_ssz();

        assert_eq!(bytes.len(), Validator::SSZ_SIZE);
        assert_eq!(Validator::read_ssz(&bytes)?, validator);

        Ok(())
    }

    #[test]
    fn header_round_trips_through_ssz() -> Result<(), ReadError> {
        let header = BeaconBlockHeader {
            slot: 7,
            proposer_index: 1,
            parent_root: H256::repeat_byte(1),
            state_root: H256::repeat_byte(2),
            body_root: H256::repeat_byte(3),
        };

        assert_eq!(BeaconBlockHeader::read_ssz(&header.to_ssz())?, header);

        Ok(())
    }

    #[test]
    fn justification_bits_reject_extra_bits() {
        assert!(JustificationBits::read_ssz(&[0b0000_1111]).is_ok());
        assert_eq!(
            JustificationBits::read_ssz(&[0b0001_0000]),
            Err(ReadError::ExtraBits {
                value: 0b0001_0000
            }),
        );
    }
}
