//! Fixed-bit-width machine integers with explicit signedness and
//! wrap-on-overflow normalization.

use crate::BigInt;
use std::fmt;

/// Signedness of a [`MachineInt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signedness {
    /// Two's complement, `[-2^(w-1), 2^(w-1))`.
    Signed,
    /// `[0, 2^w)`.
    Unsigned,
}

/// The widest bit width representable with the native `i128` payload before
/// falling back to [`BigInt`], matching the reference implementation's
/// 64-bit "small number" boundary (with one extra bit of headroom so the
/// signed/unsigned normalized form of any 64-bit value fits one
/// representation without a second payload variant).
const SMALL_WIDTH_LIMIT: u32 = 64;

#[derive(Clone, Debug)]
enum Payload {
    Small(i128),
    Big(BigInt),
}

/// A fixed-width, signed-or-unsigned machine integer, always stored
/// normalized to `(bit_width, signedness)`.
#[derive(Clone, Debug)]
pub struct MachineInt {
    payload: Payload,
    bit_width: u32,
    signedness: Signedness,
}

/// The result of an operation that can overflow: the wrapped value plus a
/// flag reporting whether wrapping occurred.
#[derive(Clone, Debug)]
pub struct OverflowingResult {
    /// The wrapped (normalized) result.
    pub value: MachineInt,
    /// `true` iff the mathematical result did not fit the target width.
    pub overflow: bool,
}

impl MachineInt {
    fn is_small(bit_width: u32) -> bool {
        bit_width <= SMALL_WIDTH_LIMIT
    }

    fn normalize_small(v: i128, bit_width: u32, signedness: Signedness) -> i128 {
        if bit_width >= 128 {
            return v;
        }
        let modulus: i128 = 1i128 << bit_width;
        let mut unsigned = v.rem_euclid(modulus);
        if let Signedness::Signed = signedness {
            let half: i128 = 1i128 << (bit_width - 1);
            if unsigned >= half {
                unsigned -= modulus;
            }
        }
        unsigned
    }

    fn normalize_big(v: BigInt, bit_width: u32, signedness: Signedness) -> BigInt {
        let modulus = BigInt::one().shl(bit_width);
        let mut unsigned = v.rem_euclid(&modulus);
        if let Signedness::Signed = signedness {
            let half = BigInt::one().shl(bit_width - 1);
            if unsigned >= half {
                unsigned = &unsigned - &modulus;
            }
        }
        unsigned
    }

    /// Builds a normalized `MachineInt` from a native `i128` payload.
    pub fn new(value: i128, bit_width: u32, signedness: Signedness) -> Self {
        assert!(bit_width >= 1, "bit width must be at least 1");
        let payload = if Self::is_small(bit_width) {
            Payload::Small(Self::normalize_small(value, bit_width, signedness))
        } else {
            Payload::Big(Self::normalize_big(BigInt::from(value as i64), bit_width, signedness))
        };
        MachineInt {
            payload,
            bit_width,
            signedness,
        }
    }

    /// Builds a normalized `MachineInt` from a [`BigInt`] payload — the
    /// usual entry point for widths above 64 bits.
    pub fn from_big_int(value: BigInt, bit_width: u32, signedness: Signedness) -> Self {
        assert!(bit_width >= 1, "bit width must be at least 1");
        let payload = if Self::is_small(bit_width) {
            let as_i128 = Self::big_to_i128(&value);
            Payload::Small(Self::normalize_small(as_i128, bit_width, signedness))
        } else {
            Payload::Big(Self::normalize_big(value, bit_width, signedness))
        };
        MachineInt {
            payload,
            bit_width,
            signedness,
        }
    }

    fn big_to_i128(v: &BigInt) -> i128 {
        let digits = v.to_str_radix(10);
        digits.parse::<i128>().unwrap_or(0)
    }

    /// This value's bit width.
    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// This value's signedness.
    pub fn signedness(&self) -> Signedness {
        self.signedness
    }

    /// `true` iff signed.
    pub fn is_signed(&self) -> bool {
        matches!(self.signedness, Signedness::Signed)
    }

    /// As a [`BigInt`], exactly (works for both payload representations).
    pub fn to_big_int(&self) -> BigInt {
        match &self.payload {
            Payload::Small(v) => {
                if *v >= i64::MIN as i128 && *v <= i64::MAX as i128 {
                    BigInt::from(*v as i64)
                } else {
                    // Build via repeated i64 chunks to stay exact.
                    let neg = *v < 0;
                    let mut mag = v.unsigned_abs();
                    let mut acc = BigInt::zero();
                    let chunk = BigInt::from(1i64 << 32);
                    let mut place = BigInt::one();
                    while mag > 0 {
                        let low = (mag & 0xFFFF_FFFF) as i64;
                        acc = &acc + &(&BigInt::from(low) * &place);
                        place = &place * &chunk;
                        mag >>= 32;
                    }
                    if neg {
                        acc.neg()
                    } else {
                        acc
                    }
                }
            }
            Payload::Big(b) => b.clone(),
        }
    }

    fn min_small(bit_width: u32, signedness: Signedness) -> i128 {
        match signedness {
            Signedness::Signed => -(1i128 << (bit_width - 1)),
            Signedness::Unsigned => 0,
        }
    }

    fn max_small(bit_width: u32, signedness: Signedness) -> i128 {
        match signedness {
            Signedness::Signed => (1i128 << (bit_width - 1)) - 1,
            Signedness::Unsigned => (1i128 << bit_width) - 1,
        }
    }

    /// The minimum representable value for `(bit_width, signedness)`.
    pub fn min_value(bit_width: u32, signedness: Signedness) -> Self {
        if Self::is_small(bit_width) {
            MachineInt::new(Self::min_small(bit_width, signedness), bit_width, signedness)
        } else {
            let big = match signedness {
                Signedness::Signed => BigInt::one().shl(bit_width - 1).neg(),
                Signedness::Unsigned => BigInt::zero(),
            };
            MachineInt::from_big_int(big, bit_width, signedness)
        }
    }

    /// The maximum representable value for `(bit_width, signedness)`.
    pub fn max_value(bit_width: u32, signedness: Signedness) -> Self {
        if Self::is_small(bit_width) {
            MachineInt::new(Self::max_small(bit_width, signedness), bit_width, signedness)
        } else {
            let big = match signedness {
                Signedness::Signed => &BigInt::one().shl(bit_width - 1) - &BigInt::one(),
                Signedness::Unsigned => &BigInt::one().shl(bit_width) - &BigInt::one(),
            };
            MachineInt::from_big_int(big, bit_width, signedness)
        }
    }

    fn require_compatible(&self, other: &MachineInt) {
        assert_eq!(
            self.bit_width, other.bit_width,
            "MachineInt binary operation requires equal bit widths"
        );
        assert_eq!(
            self.signedness, other.signedness,
            "MachineInt binary operation requires equal signedness"
        );
    }

    fn binary_checked(
        &self,
        other: &MachineInt,
        small_op: impl Fn(i128, i128) -> i128,
        big_op: impl Fn(&BigInt, &BigInt) -> BigInt,
    ) -> OverflowingResult {
        self.require_compatible(other);
        match (&self.payload, &other.payload) {
            (Payload::Small(a), Payload::Small(b)) => {
                let raw = small_op(*a, *b);
                let normalized = Self::normalize_small(raw, self.bit_width, self.signedness);
                OverflowingResult {
                    overflow: normalized != raw,
                    value: MachineInt {
                        payload: Payload::Small(normalized),
                        bit_width: self.bit_width,
                        signedness: self.signedness,
                    },
                }
            }
            _ => {
                let a = self.to_big_int();
                let b = other.to_big_int();
                let raw = big_op(&a, &b);
                let normalized = Self::normalize_big(raw.clone(), self.bit_width, self.signedness);
                OverflowingResult {
                    overflow: normalized != raw,
                    value: MachineInt::from_big_int(normalized, self.bit_width, self.signedness),
                }
            }
        }
    }

    /// Wrapping add; reports overflow.
    pub fn add(&self, other: &MachineInt) -> OverflowingResult {
        self.binary_checked(other, |a, b| a + b, |a, b| a + b)
    }

    /// Wrapping subtract; reports overflow.
    pub fn sub(&self, other: &MachineInt) -> OverflowingResult {
        self.binary_checked(other, |a, b| a - b, |a, b| a - b)
    }

    /// Wrapping multiply; reports overflow.
    pub fn mul(&self, other: &MachineInt) -> OverflowingResult {
        self.binary_checked(other, |a, b| a * b, |a, b| a * b)
    }

    /// Truncated-toward-zero division. Panics if `other` is zero
    /// (programmer precondition violation, never a recoverable error — see
    /// the engine error design: callers must pre-filter divisors via the
    /// interval domain's split-around-zero rule).
    pub fn div(&self, other: &MachineInt) -> OverflowingResult {
        self.require_compatible(other);
        assert!(!other.is_zero(), "MachineInt division by zero");
        self.binary_checked(
            other,
            |a, b| a.checked_div(b).expect("division by zero"),
            |a, b| a.div_trunc(b),
        )
    }

    /// Truncated-toward-zero remainder. Panics if `other` is zero.
    pub fn rem_trunc(&self, other: &MachineInt) -> OverflowingResult {
        self.require_compatible(other);
        assert!(!other.is_zero(), "MachineInt division by zero");
        self.binary_checked(
            other,
            |a, b| a.checked_rem(b).expect("division by zero"),
            |a, b| a.rem_trunc(b),
        )
    }

    /// Euclidean modulo: result in `[0, |other|)`. Panics if `other` is
    /// zero.
    pub fn rem_euclid(&self, other: &MachineInt) -> OverflowingResult {
        self.require_compatible(other);
        assert!(!other.is_zero(), "MachineInt division by zero");
        self.binary_checked(other, |a, b| a.rem_euclid(b), |a, b| a.rem_euclid(b))
    }

    /// Bitwise AND.
    pub fn bitand(&self, other: &MachineInt) -> MachineInt {
        self.binary_checked(other, |a, b| a & b, |a, b| a.bitand(b)).value
    }

    /// Bitwise OR.
    pub fn bitor(&self, other: &MachineInt) -> MachineInt {
        self.binary_checked(other, |a, b| a | b, |a, b| a.bitor(b)).value
    }

    /// Bitwise XOR.
    pub fn bitxor(&self, other: &MachineInt) -> MachineInt {
        self.binary_checked(other, |a, b| a ^ b, |a, b| a.bitxor(b)).value
    }

    /// Logical left shift (zero-filling), wrapping into this value's width.
    pub fn shl(&self, amount: u32) -> MachineInt {
        assert!(
            (amount as u64) < self.bit_width as u64,
            "shift amount out of range"
        );
        match &self.payload {
            Payload::Small(v) => MachineInt::new(v << amount, self.bit_width, self.signedness),
            Payload::Big(b) => {
                MachineInt::from_big_int(b.shl(amount), self.bit_width, self.signedness)
            }
        }
    }

    /// Logical right shift (zero-filling from the top, ignoring sign).
    pub fn lshr(&self, amount: u32) -> MachineInt {
        assert!(
            (amount as u64) < self.bit_width as u64,
            "shift amount out of range"
        );
        let unsigned_self = self.sign_cast(Signedness::Unsigned);
        match &unsigned_self.payload {
            Payload::Small(v) => {
                MachineInt::new(v >> amount, self.bit_width, Signedness::Unsigned)
                    .sign_cast_if_needed(self.signedness)
            }
            Payload::Big(b) => {
                MachineInt::from_big_int(b.shr(amount), self.bit_width, Signedness::Unsigned)
                    .sign_cast_if_needed(self.signedness)
            }
        }
    }

    fn sign_cast_if_needed(self, target: Signedness) -> MachineInt {
        if self.signedness == target {
            self
        } else {
            self.sign_cast(target)
        }
    }

    /// Arithmetic right shift (sign-extending).
    pub fn ashr(&self, amount: u32) -> MachineInt {
        assert!(
            (amount as u64) < self.bit_width as u64,
            "shift amount out of range"
        );
        match &self.payload {
            Payload::Small(v) => MachineInt::new(v >> amount, self.bit_width, self.signedness),
            Payload::Big(b) => {
                MachineInt::from_big_int(b.shr(amount), self.bit_width, self.signedness)
            }
        }
    }

    /// `true` iff this value is zero.
    pub fn is_zero(&self) -> bool {
        match &self.payload {
            Payload::Small(v) => *v == 0,
            Payload::Big(b) => b.is_zero(),
        }
    }

    /// Greatest common divisor of the absolute values, at this width.
    pub fn gcd(&self, other: &MachineInt) -> MachineInt {
        let g = self.to_big_int().gcd(&other.to_big_int());
        MachineInt::from_big_int(g, self.bit_width, self.signedness)
    }

    /// Truncates to a narrower bit width (`bit_width < self.bit_width`),
    /// re-interpreting the low bits.
    pub fn trunc_to_bit_width(&self, bit_width: u32) -> MachineInt {
        assert!(bit_width < self.bit_width, "trunc requires a narrower width");
        MachineInt::from_big_int(self.to_big_int(), bit_width, self.signedness)
    }

    /// Extends (sign- or zero-, depending on signedness) to a wider bit
    /// width (`bit_width > self.bit_width`).
    pub fn ext_to_bit_width(&self, bit_width: u32) -> MachineInt {
        assert!(bit_width > self.bit_width, "ext requires a wider width");
        MachineInt::from_big_int(self.to_big_int(), bit_width, self.signedness)
    }

    /// Reinterprets this value's bit pattern under the other signedness, at
    /// the same width.
    pub fn sign_cast(&self, signedness: Signedness) -> MachineInt {
        if signedness == self.signedness {
            return self.clone();
        }
        match &self.payload {
            Payload::Small(v) => {
                // Reinterpret the same bit pattern, not the same value.
                let modulus: i128 = if self.bit_width >= 128 {
                    i128::MAX
                } else {
                    1i128 << self.bit_width
                };
                let unsigned_bits = v.rem_euclid(modulus);
                MachineInt::new(unsigned_bits, self.bit_width, signedness)
            }
            Payload::Big(b) => {
                let modulus = BigInt::one().shl(self.bit_width);
                let unsigned_bits = b.rem_euclid(&modulus);
                MachineInt::from_big_int(unsigned_bits, self.bit_width, signedness)
            }
        }
    }

    /// Truncates/extends and/or re-signs in one step.
    pub fn cast(&self, bit_width: u32, signedness: Signedness) -> MachineInt {
        let resigned = if signedness == self.signedness {
            self.clone()
        } else {
            self.sign_cast(signedness)
        };
        match bit_width.cmp(&resigned.bit_width) {
            std::cmp::Ordering::Less => resigned.trunc_to_bit_width(bit_width),
            std::cmp::Ordering::Greater => resigned.ext_to_bit_width(bit_width),
            std::cmp::Ordering::Equal => resigned,
        }
    }
}

impl PartialEq for MachineInt {
    fn eq(&self, other: &Self) -> bool {
        self.bit_width == other.bit_width
            && self.signedness == other.signedness
            && self.to_big_int() == other.to_big_int()
    }
}
impl Eq for MachineInt {}

impl std::hash::Hash for MachineInt {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bit_width.hash(state);
        self.signedness.hash(state);
        self.to_big_int().hash(state);
    }
}

impl PartialOrd for MachineInt {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.bit_width != other.bit_width || self.signedness != other.signedness {
            return None;
        }
        self.to_big_int().partial_cmp(&other.to_big_int())
    }
}

impl fmt::Display for MachineInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_big_int())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_wraps_into_range() {
        let v = MachineInt::new(260, 8, Signedness::Unsigned);
        assert_eq!(v.to_big_int(), BigInt::from(4i64));
    }

    #[test]
    fn signed_wraps_into_symmetric_range() {
        let v = MachineInt::new(200, 8, Signedness::Signed);
        // 200 mod 256 = 200, which is >= 128, so it's 200 - 256 = -56
        assert_eq!(v.to_big_int(), BigInt::from(-56i64));
    }

    #[test]
    fn add_reports_overflow_flag() {
        let a = MachineInt::new(250, 8, Signedness::Unsigned);
        let b = MachineInt::new(10, 8, Signedness::Unsigned);
        let r = a.add(&b);
        assert!(r.overflow);
        assert_eq!(r.value.to_big_int(), BigInt::from(4i64));
    }

    #[test]
    fn no_overflow_reported_when_in_range() {
        let a = MachineInt::new(5, 8, Signedness::Unsigned);
        let b = MachineInt::new(10, 8, Signedness::Unsigned);
        let r = a.add(&b);
        assert!(!r.overflow);
        assert_eq!(r.value.to_big_int(), BigInt::from(15i64));
    }

    #[test]
    #[should_panic]
    fn binary_op_requires_equal_width() {
        let a = MachineInt::new(1, 8, Signedness::Unsigned);
        let b = MachineInt::new(1, 16, Signedness::Unsigned);
        let _ = a.add(&b);
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn division_by_zero_panics() {
        let a = MachineInt::new(10, 32, Signedness::Signed);
        let z = MachineInt::new(0, 32, Signedness::Signed);
        let _ = a.div(&z);
    }

    #[test]
    fn sign_extend_and_truncate_round_trip() {
        let v = MachineInt::new(-5, 8, Signedness::Signed);
        let wide = v.ext_to_bit_width(32);
        assert_eq!(wide.to_big_int(), BigInt::from(-5i64));
        let back = wide.trunc_to_bit_width(8);
        assert_eq!(back.to_big_int(), BigInt::from(-5i64));
    }

    #[test]
    fn cast_narrows_with_modulo_semantics() {
        // int8 y = (int8) x; for x == 200 (out of int8 range).
        let x = MachineInt::new(200, 32, Signedness::Signed);
        let y = x.cast(8, Signedness::Signed);
        assert_eq!(y.to_big_int(), BigInt::from(-56i64));
    }

    #[test]
    fn large_width_uses_bigint_payload_and_normalizes() {
        let v = MachineInt::new(1, 128, Signedness::Unsigned);
        let shifted = v.shl(127);
        let doubled = shifted.add(&shifted);
        assert!(doubled.overflow);
        assert!(doubled.value.is_zero());
    }
}
