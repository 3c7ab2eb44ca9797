use core::num::NonZeroU64;

use bit_field::BitArray as _;
use types::{config::Config, primitives::H256};

const BITS_PER_HASH: usize = H256::len_bytes() * 8;

/// Maps `index` to its position in a pseudo-random permutation of
/// `0..index_count` determined by `seed`.
///
/// This is the swap-or-not shuffle applied to a single index, the form used
/// by committee sampling: the caller feeds in a running attempt counter and
/// receives an unpredictable but deterministic candidate position.
#[must_use]
pub fn shuffle_single(
    config: &Config,
    mut index: u64,
    index_count: NonZeroU64,
    seed: H256,
) -> u64 {
    assert!(index < index_count.get());

    for round in 0..config.shuffle_round_count {
        let pivot = compute_pivot(seed, round, index_count);
        let flip = (pivot + index_count.get() - index) % index_count;
        let position = index.max(flip);
        let source = compute_source(seed, round, position / BITS_PER_HASH as u64);
        let bit_index = position.to_le_bytes()[0].into();
        let bit = source.as_bytes().get_bit(bit_index);

        if bit {
            index = flip;
        }
    }

    index
}

fn compute_pivot(seed: H256, round: u8, index_count: NonZeroU64) -> u64 {
    let digest = hashing::hash_256_8(seed, round);

    let prefix: [u8; size_of::<u64>()] = digest[..size_of::<u64>()]
        .try_into()
        .expect("slice has the same size as u64");

    u64::from_le_bytes(prefix) % index_count
}

fn compute_source(seed: H256, round: u8, position_window: u64) -> H256 {
    // Truncate to match the round function used by the protocol.
    #[allow(clippy::cast_possible_truncation)]
    let position_window = position_window as u32;

    hashing::hash_256_8_32(seed, round, position_window)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools as _;
    use nonzero_ext::nonzero;

    use super::*;

    #[test]
    fn shuffled_index_is_in_range() {
        let config = Config::minimal();
        let index_count = nonzero!(25_u64);

        for index in 0..index_count.get() {
            let shuffled = shuffle_single(&config, index, index_count, H256::repeat_byte(7));
            assert!(shuffled < index_count.get());
        }
    }

    #[test]
    fn shuffling_is_a_permutation() {
        let config = Config::minimal();
        let index_count = nonzero!(25_u64);
        let seed = H256::repeat_byte(3);

        let shuffled = (0..index_count.get())
            .map(|index| shuffle_single(&config, index, index_count, seed))
            .sorted_unstable()
            .collect_vec();

        itertools::assert_equal(shuffled, 0..index_count.get());
    }

    #[test]
    fn different_seeds_produce_different_permutations() {
        let config = Config::minimal();
        let index_count = nonzero!(1000_u64);

        let permutation = |seed_byte| {
            (0..index_count.get())
                .map(|index| {
                    shuffle_single(&config, index, index_count, H256::repeat_byte(seed_byte))
                })
                .collect_vec()
        };

        assert_ne!(permutation(1), permutation(2));
    }
}
