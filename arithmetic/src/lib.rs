use core::num::NonZeroU64;

use easy_ext::ext;
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ArithmeticError {
    #[error("arithmetic operation overflowed")]
    Overflow,
}

#[ext(UsizeExt)]
pub impl usize {
    #[inline]
    #[must_use]
    fn ilog2_ceil(self) -> u8 {
        self.checked_next_power_of_two()
            .map_or(Self::BITS, Self::trailing_zeros)
            .try_into()
            .expect("number of bits in usize should fit in u8")
    }
}

#[ext(U64Ext)]
pub impl u64 {
    #[inline]
    #[must_use]
    fn is_multiple_of(self, factor: NonZeroU64) -> bool {
        self % factor == 0
    }

    #[inline]
    #[must_use]
    fn prev_multiple_of(self, factor: NonZeroU64) -> Self {
        self - self % factor
    }

    #[inline]
    #[must_use]
    fn ilog2_ceil(self) -> u8 {
        self.checked_next_power_of_two()
            .map_or(Self::BITS, Self::trailing_zeros)
            .try_into()
            .expect("number of bits in u64 should fit in u8")
    }

    /// `self * multiplier / divisor` with a 128 bit intermediate.
    /// Fails only if the final quotient does not fit back in `u64`.
    #[inline]
    fn mul_div(self, multiplier: u64, divisor: NonZeroU64) -> Result<Self, ArithmeticError>
    where
        Self: Sized,
    {
        let product = u128::from(self) * u128::from(multiplier);
        (product / u128::from(divisor.get())).try_into_u64()
    }
}

#[ext(U128Ext)]
pub impl u128 {
    #[inline]
    fn try_into_u64(self) -> Result<u64, ArithmeticError> {
        self.try_into().map_err(|_| ArithmeticError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;

    use super::*;

    #[test]
    fn test_prev_multiple_of() {
        assert_eq!(37_u64.prev_multiple_of(nonzero!(8_u64)), 32);
        assert_eq!(32_u64.prev_multiple_of(nonzero!(8_u64)), 32);
    }

    #[test]
    fn test_ilog2_ceil() {
        assert_eq!(1_usize.ilog2_ceil(), 0);
        assert_eq!(2_usize.ilog2_ceil(), 1);
        assert_eq!(3_usize.ilog2_ceil(), 2);
        assert_eq!(512_usize.ilog2_ceil(), 9);
    }

    #[test]
    fn test_mul_div_uses_wide_intermediate() {
        // The product alone overflows u64. The quotient does not.
        let result = u64::MAX
            .mul_div(1_000_000_000, nonzero!(1_000_000_000_u64))
            .expect("quotient fits in u64");

        assert_eq!(result, u64::MAX);
    }

    #[test]
    fn test_mul_div_overflow() {
        assert_eq!(
            u64::MAX.mul_div(2, nonzero!(1_u64)),
            Err(ArithmeticError::Overflow),
        );
    }
}
