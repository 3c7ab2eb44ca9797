use ethereum_types::H256;
use hashing::{ZERO_HASHES, ZERO_HASH_COUNT};

use crate::porcelain::SszHash as _;

pub const BYTES_PER_CHUNK: usize = 32;
pub const U64S_PER_CHUNK: usize = BYTES_PER_CHUNK / size_of::<u64>();

/// Merkleizes `chunks` into a tree of exactly `depth` levels, padding with
/// zero subtrees on the right. An empty input yields the zero subtree root of
/// the full depth, which is the protocol-defined default for empty fields.
#[must_use]
pub fn merkleize_chunks(chunks: &[H256], depth: u8) -> H256 {
    let depth = usize::from(depth);

    assert!(depth < ZERO_HASH_COUNT, "tree depth exceeds zero hash table");

    if depth < usize::BITS as usize {
        assert!(
            chunks.len() <= 1 << depth,
            "chunk count exceeds tree capacity",
        );
    }

    if chunks.is_empty() {
        return ZERO_HASHES[depth];
    }

    let mut layer = chunks.to_vec();

    for height in 0..depth {
        if layer.len() % 2 == 1 {
            layer.push(ZERO_HASHES[height]);
        }

        layer = layer
            .chunks_exact(2)
            .map(|pair| hashing::hash_256_256(pair[0], pair[1]))
            .collect();
    }

    layer[0]
}

#[must_use]
pub fn mix_in_length(root: H256, length: u64) -> H256 {
    hashing::hash_256_256(root, length.hash_tree_root())
}

#[must_use]
pub fn pack_u64s(values: impl IntoIterator<Item = u64>) -> Vec<H256> {
    let mut chunks = vec![];
    let mut filled = U64S_PER_CHUNK;

    for value in values {
        if filled == U64S_PER_CHUNK {
            chunks.push(H256::zero());
            filled = 0;
        }

        let start = filled * size_of::<u64>();
        let chunk = chunks.last_mut().expect("a chunk was pushed above");
        chunk[start..start + size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
        filled += 1;
    }

    chunks
}

#[must_use]
pub fn pack_bytes(bytes: &[u8]) -> Vec<H256> {
    bytes
        .chunks(BYTES_PER_CHUNK)
        .map(|bytes| {
            let mut chunk = H256::zero();
            chunk[..bytes.len()].copy_from_slice(bytes);
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_to_zero_subtree() {
        assert_eq!(merkleize_chunks(&[], 0), ZERO_HASHES[0]);
        assert_eq!(merkleize_chunks(&[], 3), ZERO_HASHES[3]);
        assert_eq!(merkleize_chunks(&[], 40), ZERO_HASHES[40]);
    }

    #[test]
    fn single_chunk_is_padded_to_depth() {
        let chunk = H256::repeat_byte(1);

        assert_eq!(merkleize_chunks(&[chunk], 0), chunk);

        let expected = hashing::hash_256_256(
            hashing::hash_256_256(chunk, ZERO_HASHES[0]),
            ZERO_HASHES[1],
        );

        assert_eq!(merkleize_chunks(&[chunk], 2), expected);
    }

    #[test]
    fn packing_u64s_fills_chunks_in_order() {
        let chunks = pack_u64s([1, 2, 3, 4, 5]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0][..8], 1_u64.to_le_bytes());
        assert_eq!(chunks[0][24..], 4_u64.to_le_bytes());
        assert_eq!(chunks[1][..8], 5_u64.to_le_bytes());
        assert_eq!(chunks[1][8..], [0; 24]);
    }
}
