use ethereum_types::H256;
use once_cell::sync::Lazy;
use sha2::{Digest as _, Sha256};

/// Number of precomputed zero subtree roots.
///
/// The deepest Merkle tree in the state is the one over the validator
/// registry. Its limit is `Config.validator_registry_limit` (2⁴⁰ on every
/// supported network), which needs `ZERO_HASHES[40]` when the registry is
/// empty.
pub const ZERO_HASH_COUNT: usize = 41;

/// `ZERO_HASHES[depth]` is the root of a Merkle tree of the given depth whose
/// leaves are all zero chunks.
pub static ZERO_HASHES: Lazy<[H256; ZERO_HASH_COUNT]> = Lazy::new(|| {
    let mut hashes = [H256::zero(); ZERO_HASH_COUNT];

    for depth in 1..ZERO_HASH_COUNT {
        hashes[depth] = hash_256_256(hashes[depth - 1], hashes[depth - 1]);
    }

    hashes
});

fn digest_parts(parts: &[&[u8]]) -> H256 {
    let mut hasher = Sha256::new();

    for part in parts {
        hasher.update(part);
    }

    H256(hasher.finalize().into())
}

#[inline]
#[must_use]
pub fn hash_64(value: u64) -> H256 {
    digest_parts(&[&value.to_le_bytes()])
}

#[inline]
#[must_use]
pub fn hash_256_8(a: H256, b: u8) -> H256 {
    digest_parts(&[a.as_bytes(), &[b]])
}

#[inline]
#[must_use]
pub fn hash_256_8_32(a: H256, b: u8, c: u32) -> H256 {
    digest_parts(&[a.as_bytes(), &[b], &c.to_le_bytes()])
}

#[inline]
#[must_use]
pub fn hash_256_64(a: H256, b: u64) -> H256 {
    digest_parts(&[a.as_bytes(), &b.to_le_bytes()])
}

#[inline]
#[must_use]
pub fn hash_32_64_256(a: [u8; 4], b: u64, c: H256) -> H256 {
    digest_parts(&[&a, &b.to_le_bytes(), c.as_bytes()])
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    digest_parts(&[left.as_bytes(), right.as_bytes()])
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use itertools::Itertools as _;

    use super::*;

    #[test]
    fn higher_zero_hashes_are_calculated_from_lower_ones() {
        for (lower, higher) in ZERO_HASHES.into_iter().tuple_windows() {
            assert_eq!(hash_256_256(lower, lower), higher);
        }
    }

    #[test]
    fn first_zero_hashes_match_known_values() {
        assert_eq!(ZERO_HASHES[0], H256::zero());
        assert_eq!(
            ZERO_HASHES[1],
            H256(hex!(
                "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
            )),
        );
        assert_eq!(
            ZERO_HASHES[2],
            H256(hex!(
                "db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71"
            )),
        );
    }
}
