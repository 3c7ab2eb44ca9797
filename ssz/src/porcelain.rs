use ethereum_types::H256;

use crate::error::ReadError;

pub const BYTES_PER_OFFSET: usize = 4;

/// Produces the Merkle root of a value.
///
/// Implementations must be pure functions of the serialized representation.
pub trait SszHash {
    fn hash_tree_root(&self) -> H256;
}

pub trait SszWrite {
    fn write_ssz(&self, bytes: &mut Vec<u8>);

    #[must_use]
    fn to_ssz(&self) -> Vec<u8> {
        let mut bytes = vec![];
        self.write_ssz(&mut bytes);
        bytes
    }
}

/// Deserialization is context-aware: collection lengths and limits are not
/// part of the wire format and must come from the configuration.
pub trait SszRead<C>: Sized {
    fn from_ssz(context: &C, bytes: &[u8]) -> Result<Self, ReadError>;
}

pub fn write_offset(bytes: &mut Vec<u8>, offset: usize) {
    let offset = u32::try_from(offset).expect("SSZ offsets fit in u32 by definition");
    bytes.extend_from_slice(&offset.to_le_bytes());
}

pub fn read_offset(bytes: &[u8], position: usize) -> Result<usize, ReadError> {
    let end = position + BYTES_PER_OFFSET;

    let slice = bytes.get(position..end).ok_or(ReadError::TooShort {
        minimum: end,
        actual: bytes.len(),
    })?;

    let offset = u32::from_le_bytes(slice.try_into().expect("slice has BYTES_PER_OFFSET bytes"));

    Ok(offset as usize)
}

impl SszHash for u64 {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = H256::zero();
        chunk[..size_of::<Self>()].copy_from_slice(&self.to_le_bytes());
        chunk
    }
}

impl SszWrite for u64 {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.to_le_bytes());
    }
}

impl<C> SszRead<C> for u64 {
    fn from_ssz(_context: &C, bytes: &[u8]) -> Result<Self, ReadError> {
        let bytes: [u8; size_of::<Self>()] =
            bytes.try_into().map_err(|_| ReadError::WrongSize {
                expected: size_of::<Self>(),
                actual: bytes.len(),
            })?;

        Ok(Self::from_le_bytes(bytes))
    }
}

impl SszHash for bool {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = H256::zero();
        chunk.as_bytes_mut()[0] = u8::from(*self);
        chunk
    }
}

impl SszWrite for bool {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.push(u8::from(*self));
    }
}

impl<C> SszRead<C> for bool {
    fn from_ssz(_context: &C, bytes: &[u8]) -> Result<Self, ReadError> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [value] => Err(ReadError::InvalidBool { value: *value }),
            _ => Err(ReadError::WrongSize {
                expected: 1,
                actual: bytes.len(),
            }),
        }
    }
}

impl SszHash for H256 {
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

impl SszWrite for H256 {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(self.as_bytes());
    }
}

impl<C> SszRead<C> for H256 {
    fn from_ssz(_context: &C, bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() != Self::len_bytes() {
            return Err(ReadError::WrongSize {
                expected: Self::len_bytes(),
                actual: bytes.len(),
            });
        }

        Ok(Self::from_slice(bytes))
    }
}
