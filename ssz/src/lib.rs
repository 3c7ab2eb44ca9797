pub use crate::{
    error::ReadError,
    hc::Hc,
    merkle::{
        merkleize_chunks, mix_in_length, pack_bytes, pack_u64s, BYTES_PER_CHUNK, U64S_PER_CHUNK,
    },
    porcelain::{read_offset, write_offset, SszHash, SszRead, SszWrite, BYTES_PER_OFFSET},
};

mod error;
mod hc;
mod merkle;
mod porcelain;
