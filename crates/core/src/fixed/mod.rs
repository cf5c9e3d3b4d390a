//! 64-bit fixed-point sample positions.
//!
//! A position encodes the whole-sample index in the upper 32 bits and the
//! sub-sample phase in the lower [`RESAMPLE_FIXED_BITS`] bits. Advancing a
//! position by a per-frame increment performs nearest-sample resampling
//! without interpolation.

use std::ops::{Add, AddAssign};

/// Number of fractional bits in a [`Fixed64`].
pub const RESAMPLE_FIXED_BITS: u32 = 32;

/// Signed 32.32 fixed-point sample position or per-frame step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed64(i64);

impl Fixed64 {
    /// Start of a buffer.
    pub const ZERO: Self = Self(0);
    /// One whole sample.
    pub const ONE: Self = Self(1 << RESAMPLE_FIXED_BITS);

    /// Wraps an already scaled value.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Underlying scaled value.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Position of whole sample `index` with zero phase.
    pub const fn from_index(index: i64) -> Self {
        Self(index << RESAMPLE_FIXED_BITS)
    }

    /// Per-frame increment that plays `source_rate` material at
    /// `output_rate`. The remainder of the division is truncated once.
    pub fn ratio(source_rate: u32, output_rate: u32) -> Self {
        if output_rate == 0 {
            return Self::ZERO;
        }
        let step = (i128::from(source_rate) << RESAMPLE_FIXED_BITS) / i128::from(output_rate);
        Self(step.min(i128::from(i64::MAX)) as i64)
    }

    /// Whole-sample index (the position with its phase discarded).
    pub const fn index(self) -> i64 {
        self.0 >> RESAMPLE_FIXED_BITS
    }

    /// Folds the position back into `[0, len)` samples, keeping the
    /// fractional phase intact.
    pub fn wrap_into(self, len: usize) -> Self {
        let span = (len as i64) << RESAMPLE_FIXED_BITS;
        if span <= 0 {
            return self;
        }
        Self(self.0.rem_euclid(span))
    }
}

impl Add for Fixed64 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed64 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_ratio_is_one_sample() {
        assert_eq!(Fixed64::ratio(44_100, 44_100), Fixed64::ONE);
        assert_eq!(Fixed64::ONE.raw(), 1_i64 << 32);
    }

    #[test]
    fn ratio_truncates_remainder() {
        let step = Fixed64::ratio(22_050, 48_000);
        let exact = (22_050_i64 << 32) / 48_000;
        assert_eq!(step.raw(), exact);
        assert_eq!(step.index(), 0);
    }

    #[test]
    fn extreme_rates_never_go_negative() {
        let step = Fixed64::ratio(u32::MAX, 1);
        assert_eq!(step.raw(), i64::MAX);
        assert!(Fixed64::ratio(3_000_000_000, 44_100) > Fixed64::ZERO);
    }

    #[test]
    fn wrap_preserves_phase() {
        let half = Fixed64::from_raw(1 << 31);
        let pos = Fixed64::from_index(5) + half;
        let wrapped = pos.wrap_into(4);
        assert_eq!(wrapped.index(), 1);
        assert_eq!(wrapped.raw() & 0xFFFF_FFFF, 1 << 31);
    }
}
