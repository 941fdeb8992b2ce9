// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP sequence number arithmetic.
//!
//! Sequence numbers live in a 32-bit space that wraps around. Ordering and
//! distance between two sequence numbers are only ever computed through
//! [`Sequence::difference`] and `Sequence + i64`; nothing else in the crate
//! compares raw sequence values.
//!
//! # Rollover
//!
//! ```text
//!  0                 2^32/4                      3*2^32/4              2^32-1
//!  |-------------------|--------------------------------|---------------------|
//!  [ low quarter       ]                                [ high quarter        ]
//! ```
//!
//! A value in the high quarter compared with a value in the low quarter is
//! treated as preceding it: the low operand is shifted by 2^32 before the
//! subtraction.

use std::fmt;
use std::ops;

/// Size of the sequence space.
pub const SEQ_MODULUS: i64 = 1 << 32;

const QUARTER: u32 = u32::MAX / 4;

/// A TCP sequence number in `[0, 2^32-1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sequence(u32);

impl Sequence {
    /// Wrap a raw 32-bit sequence number.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw 32-bit value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Signed distance from `self` to `other` (`other - self`).
    ///
    /// Positive when `other` comes after `self` in stream order, negative when
    /// it comes before. Handles rollover between the high and the low quarter
    /// of the space.
    ///
    /// ```
    /// use tcpreasm::Sequence;
    ///
    /// let a = Sequence::new(10);
    /// assert_eq!(a.difference(Sequence::new(15)), 5);
    ///
    /// // 0xFFFF_FFFE is two bytes before 0 once the space wraps.
    /// let b = Sequence::new(0xFFFF_FFFE);
    /// assert_eq!(b.difference(Sequence::new(0)), 2);
    /// assert_eq!(Sequence::new(0).difference(b), -2);
    /// ```
    pub fn difference(self, other: Sequence) -> i64 {
        let mut s = i64::from(self.0);
        let mut t = i64::from(other.0);

        if self.0 > u32::MAX - QUARTER && other.0 < QUARTER {
            t += SEQ_MODULUS;
        } else if other.0 > u32::MAX - QUARTER && self.0 < QUARTER {
            s += SEQ_MODULUS;
        }

        t - s
    }
}

impl ops::Add<i64> for Sequence {
    type Output = Sequence;

    /// `(self + rhs) mod 2^32`; `rhs` may be negative.
    fn add(self, rhs: i64) -> Sequence {
        Sequence((i64::from(self.0) + rhs).rem_euclid(SEQ_MODULUS) as u32)
    }
}

impl ops::Add<usize> for Sequence {
    type Output = Sequence;

    fn add(self, rhs: usize) -> Sequence {
        self + (rhs as u64 % SEQ_MODULUS as u64) as i64
    }
}

impl From<u32> for Sequence {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Sequence> for u32 {
    fn from(seq: Sequence) -> Self {
        seq.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
