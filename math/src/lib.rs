//! Fixed-width unsigned arithmetic for consensus quantities.

use borsh_derive::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// 192-bit unsigned integer implemented as 3 little-endian u64 limbs.
///
/// Used as the blue work type: cumulative proof-of-work of a block's blue past.
/// Addition saturates at [`Uint192::MAX`] so work totals can never wrap around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Uint192([u64; 3]);

impl Uint192 {
    pub const ZERO: Self = Self([0; 3]);
    pub const MAX: Self = Self([u64::MAX; 3]);

    pub const fn from_limbs(limbs: [u64; 3]) -> Self {
        Self(limbs)
    }

    pub const fn limbs(&self) -> [u64; 3] {
        self.0
    }

    pub fn from_u128(v: u128) -> Self {
        Self([v as u64, (v >> 64) as u64, 0])
    }

    /// Returns little-endian bytes (24 bytes)
    pub fn to_le_bytes(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        for (i, limb) in self.0.iter().enumerate() {
            out[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: [u8; 24]) -> Self {
        let mut limbs = [0u64; 3];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut le = [0u8; 8];
            le.copy_from_slice(chunk);
            limbs[i] = u64::from_le_bytes(le);
        }
        Self(limbs)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 3]
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let mut out = [0u64; 3];
        let mut carry = false;
        for (i, limb) in out.iter_mut().enumerate() {
            let (sum, c1) = self.0[i].overflowing_add(rhs.0[i]);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            *limb = sum;
            carry = c1 || c2;
        }
        (!carry).then_some(Self(out))
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let mut out = [0u64; 3];
        let mut borrow = false;
        for (i, limb) in out.iter_mut().enumerate() {
            let (diff, b1) = self.0[i].overflowing_sub(rhs.0[i]);
            let (diff, b2) = diff.overflowing_sub(borrow as u64);
            *limb = diff;
            borrow = b1 || b2;
        }
        (!borrow).then_some(Self(out))
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        self.checked_add(rhs).unwrap_or(Self::MAX)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        self.checked_sub(rhs).unwrap_or(Self::ZERO)
    }
}

impl From<u64> for Uint192 {
    fn from(v: u64) -> Self {
        Self([v, 0, 0])
    }
}

impl From<u128> for Uint192 {
    fn from(v: u128) -> Self {
        Self::from_u128(v)
    }
}

impl Ord for Uint192 {
    fn cmp(&self, other: &Self) -> Ordering {
        // Most significant limb first
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for Uint192 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AddAssign for Uint192 {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Add for Uint192 {
    type Output = Uint192;
    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub for Uint192 {
    type Output = Uint192;
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sum for Uint192 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for Uint192 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_le_bytes();
        let significant: Vec<u8> = bytes.iter().rev().copied().skip_while(|b| *b == 0).collect();
        if significant.is_empty() {
            return write!(f, "0x0");
        }
        write!(f, "0x")?;
        for byte in significant {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Uint192;

    #[test]
    fn add_assign_no_overflow() {
        let mut a = Uint192::from(1u64);
        a += Uint192::from(2u64);
        assert_eq!(a, Uint192::from(3u64));
    }

    #[test]
    fn add_carries_across_limbs() {
        let a = Uint192::from(u64::MAX);
        let b = a + Uint192::from(1u64);
        assert_eq!(b.limbs(), [0, 1, 0]);
        assert_eq!(b - Uint192::from(1u64), a);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        assert_eq!(Uint192::MAX + Uint192::from(5u64), Uint192::MAX);
        assert_eq!(Uint192::from(1u64) - Uint192::from(5u64), Uint192::ZERO);
        assert!(Uint192::MAX.checked_add(Uint192::from(1u64)).is_none());
    }

    #[test]
    fn ordering_uses_most_significant_limb() {
        let small = Uint192::from_limbs([u64::MAX, 0, 0]);
        let big = Uint192::from_limbs([0, 1, 0]);
        assert!(small < big);
        assert!(Uint192::from_limbs([0, 0, 1]) > big);
    }

    #[test]
    fn bytes_roundtrip_and_display() {
        let a = Uint192::from_u128(0x0102_0000_0000_0000_0003);
        assert_eq!(Uint192::from_le_bytes(a.to_le_bytes()), a);
        assert_eq!(Uint192::from(255u64).to_string(), "0xff");
        assert_eq!(Uint192::ZERO.to_string(), "0x0");
    }

    #[test]
    fn sum_of_iter() {
        let total: Uint192 = (1..=4u64).map(Uint192::from).sum();
        assert_eq!(total, Uint192::from(10u64));
    }
}
