use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ReadError {
    #[error("SSZ input is {actual} bytes long, expected {expected}")]
    WrongSize { expected: usize, actual: usize },
    #[error("SSZ input is {actual} bytes long, expected at least {minimum}")]
    TooShort { minimum: usize, actual: usize },
    #[error("offset {offset} points outside the input ({length} bytes)")]
    OffsetOutOfBounds { offset: usize, length: usize },
    #[error("offsets are not increasing ({previous} followed by {next})")]
    OffsetsNotIncreasing { previous: usize, next: usize },
    #[error("list has {actual} elements, limit is {limit}")]
    ListTooLong { limit: u64, actual: usize },
    #[error("vector has {actual} elements, expected {expected}")]
    VectorLengthMismatch { expected: usize, actual: usize },
    #[error("boolean byte has invalid value {value}")]
    InvalidBool { value: u8 },
    #[error("bit vector byte {value:#010b} has bits set beyond its length")]
    ExtraBits { value: u8 },
    #[error("element size {element_size} does not divide input length {length}")]
    UnevenElements { element_size: usize, length: usize },
}
