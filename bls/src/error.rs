use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("public key bytes do not represent a valid public key")]
    InvalidPublicKey,
    #[error("secret key seed does not produce a valid secret key")]
    InvalidSecretKey,
    #[error("no public keys to aggregate")]
    NoPublicKeysToAggregate,
}
