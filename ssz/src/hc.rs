use core::{
    fmt::{Debug, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
};

use ethereum_types::H256;
use once_cell::race::OnceBox;

use crate::porcelain::{SszHash, SszWrite};

/// A "hash cell": a value paired with its lazily computed Merkle root.
///
/// The root survives cloning, which is what makes copy-on-write state fields
/// cheap to rehash: a field copied between states keeps its cached root until
/// one of the copies mutates it.
#[derive(Default)]
pub struct Hc<T> {
    value: T,
    // `OnceBox` fits in one word, unlike `once_cell::sync::OnceCell`.
    // The tradeoff is that racing threads may compute the root redundantly.
    cached_root: OnceBox<H256>,
}

impl<T: Clone> Clone for Hc<T> {
    fn clone(&self) -> Self {
        let Self { value, cached_root } = self;
        let value = value.clone();

        match cached_root.get().copied() {
            Some(root) => Self::with_root(value, root),
            None => Self::from(value),
        }
    }
}

impl<T: PartialEq> PartialEq for Hc<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Hc<T> {}

impl<T: Debug> Debug for Hc<T> {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter
            .debug_struct("Hc")
            .field("value", &self.value)
            .field("cached_root", &self.cached_root.get())
            .finish()
    }
}

impl<T> From<T> for Hc<T> {
    fn from(value: T) -> Self {
        Self {
            value,
            cached_root: OnceBox::new(),
        }
    }
}

impl<T> Deref for Hc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Hc<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.as_mut()
    }
}

impl<T> AsRef<T> for Hc<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T> AsMut<T> for Hc<T> {
    fn as_mut(&mut self) -> &mut T {
        // Invalidate `cached_root` whenever `value` could potentially be modified.
        self.cached_root = OnceBox::new();
        &mut self.value
    }
}

impl<T: SszWrite> SszWrite for Hc<T> {
    fn write_ssz(&self, bytes: &mut Vec<u8>) {
        self.value.write_ssz(bytes);
    }
}

impl<T: SszHash> SszHash for Hc<T> {
    fn hash_tree_root(&self) -> H256 {
        *self
            .cached_root
            .get_or_init(|| Box::new(self.value.hash_tree_root()))
    }
}

impl<T> Hc<T> {
    fn with_root(value: T, root: H256) -> Self {
        let cached_root = OnceBox::new();

        cached_root
            .set(Box::new(root))
            .expect("cached_root is empty because OnceBox::new returns an empty cell");

        Self { value, cached_root }
    }
}
