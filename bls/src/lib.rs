//! Opaque BLS12-381 public key handling.
//!
//! The consensus core only needs to carry compressed public keys around and
//! aggregate them when building sync committees. Signing and verification
//! belong to external collaborators and are not exposed here.

use core::fmt::{Debug, Formatter, Result as FmtResult};

use blst::min_pk::{
    AggregatePublicKey as RawAggregatePublicKey, PublicKey as RawPublicKey,
    SecretKey as RawSecretKey,
};

pub use crate::error::Error;

mod error;

pub const PUBLIC_KEY_BYTES: usize = 48;

/// A compressed public key as it appears in the state.
///
/// The bytes are not guaranteed to represent a valid curve point.
/// Decompression is deferred until a point is actually needed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes([u8; PUBLIC_KEY_BYTES]);

impl Default for PublicKeyBytes {
    fn default() -> Self {
        Self([0; PUBLIC_KEY_BYTES])
    }
}

impl Debug for PublicKeyBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

impl AsRef<[u8; PUBLIC_KEY_BYTES]> for PublicKeyBytes {
    fn as_ref(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.0
    }
}

impl From<[u8; PUBLIC_KEY_BYTES]> for PublicKeyBytes {
    fn from(bytes: [u8; PUBLIC_KEY_BYTES]) -> Self {
        Self(bytes)
    }
}

impl PublicKeyBytes {
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.0
    }

    pub fn decompress(self) -> Result<PublicKey, Error> {
        let raw = RawPublicKey::uncompress(&self.0).map_err(|_| Error::InvalidPublicKey)?;

        // Subgroup membership is not implied by successful decompression.
        raw.validate().map_err(|_| Error::InvalidPublicKey)?;

        Ok(PublicKey(raw))
    }
}

/// A compressed aggregate of sync committee member keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregatePublicKeyBytes([u8; PUBLIC_KEY_BYTES]);

impl Default for AggregatePublicKeyBytes {
    fn default() -> Self {
        Self([0; PUBLIC_KEY_BYTES])
    }
}

impl Debug for AggregatePublicKeyBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

impl AsRef<[u8; PUBLIC_KEY_BYTES]> for AggregatePublicKeyBytes {
    fn as_ref(&self) -> &[u8; PUBLIC_KEY_BYTES] {
        &self.0
    }
}

impl From<[u8; PUBLIC_KEY_BYTES]> for AggregatePublicKeyBytes {
    fn from(bytes: [u8; PUBLIC_KEY_BYTES]) -> Self {
        Self(bytes)
    }
}

#[derive(Clone, Copy)]
pub struct PublicKey(RawPublicKey);

impl PublicKey {
    #[must_use]
    pub fn compress(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.0.compress())
    }
}

pub struct AggregatePublicKey(RawAggregatePublicKey);

impl AggregatePublicKey {
    pub fn aggregate_nonempty(
        public_keys: impl IntoIterator<Item = PublicKey>,
    ) -> Result<Self, Error> {
        let mut public_keys = public_keys.into_iter();

        let first = public_keys
            .next()
            .ok_or(Error::NoPublicKeysToAggregate)?;

        let mut aggregate = RawAggregatePublicKey::from_public_key(&first.0);

        for public_key in public_keys {
            aggregate.add_aggregate(&RawAggregatePublicKey::from_public_key(&public_key.0));
        }

        Ok(Self(aggregate))
    }

    #[must_use]
    pub fn compress(&self) -> AggregatePublicKeyBytes {
        AggregatePublicKeyBytes(self.0.to_public_key().compress())
    }
}

/// Only needed to derive valid public keys deterministically.
/// The core never signs anything.
pub struct SecretKey(RawSecretKey);

impl SecretKey {
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, Error> {
        RawSecretKey::key_gen(seed, &[])
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }

    #[must_use]
    pub fn to_public_key(&self) -> PublicKey {
        PublicKey(self.0.sk_to_pk())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_key_bytes(seed_byte: u8) -> PublicKeyBytes {
        SecretKey::from_seed(&[seed_byte; 32])
            .expect("seed is valid key material")
            .to_public_key()
            .compress()
    }

    #[test]
    fn decompression_round_trips() -> Result<(), Error> {
        let bytes = public_key_bytes(1);

        assert_eq!(bytes.decompress()?.compress(), bytes);

        Ok(())
    }

    #[test]
    fn default_bytes_do_not_decompress() {
        assert_eq!(
            PublicKeyBytes::default().decompress().err(),
            Some(Error::InvalidPublicKey),
        );
    }

    #[test]
    fn aggregation_requires_at_least_one_key() {
        assert_eq!(
            AggregatePublicKey::aggregate_nonempty([]).err(),
            Some(Error::NoPublicKeysToAggregate),
        );
    }

    #[test]
    fn aggregation_is_order_independent() -> Result<(), Error> {
        let key_1 = public_key_bytes(1).decompress()?;
        let key_2 = public_key_bytes(2).decompress()?;

        let forward = AggregatePublicKey::aggregate_nonempty([key_1, key_2])?.compress();
        let backward = AggregatePublicKey::aggregate_nonempty([key_2, key_1])?.compress();

        assert_eq!(forward, backward);

        Ok(())
    }
}
