//! Sign-magnitude arbitrary-precision integers.
//!
//! `BigInt` backs both [`crate::MachineInt`] (for widths above 64 bits) and
//! the linear-arithmetic machinery in `knight-engine`. Magnitudes are stored
//! as little-endian base-2^32 limbs with no leading zero limb; zero is the
//! empty limb vector regardless of sign.

use std::cmp::Ordering;
use std::fmt;

/// The sign of a [`BigInt`]. Zero is always [`Sign::Zero`], never `Plus`/`Minus`
/// with an empty magnitude of the other sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Sign {
    Minus,
    Zero,
    Plus,
}

/// An arbitrary-precision, sign-magnitude integer.
///
/// All operations are total on finite inputs except division/remainder by
/// zero, which is a programmer precondition violation and panics (see the
/// engine's error-handling design: this is a kind-1 error, not a recoverable
/// one).
#[derive(Clone, Debug, Eq)]
pub struct BigInt {
    sign: Sign,
    /// Little-endian base-2^32 limbs, no trailing (most-significant) zero
    /// limb. Empty iff `sign == Sign::Zero`.
    mag: Vec<u32>,
}

impl BigInt {
    /// The additive identity.
    pub fn zero() -> Self {
        BigInt {
            sign: Sign::Zero,
            mag: Vec::new(),
        }
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        BigInt::from(1i64)
    }

    /// `true` iff `self == 0`.
    pub fn is_zero(&self) -> bool {
        matches!(self.sign, Sign::Zero)
    }

    /// `true` iff `self < 0`.
    pub fn is_negative(&self) -> bool {
        matches!(self.sign, Sign::Minus)
    }

    /// `true` iff `self > 0`.
    pub fn is_positive(&self) -> bool {
        matches!(self.sign, Sign::Plus)
    }

    fn normalize(sign: Sign, mut mag: Vec<u32>) -> Self {
        while mag.last() == Some(&0) {
            mag.pop();
        }
        if mag.is_empty() {
            BigInt {
                sign: Sign::Zero,
                mag,
            }
        } else {
            BigInt { sign, mag }
        }
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        BigInt {
            sign: if self.is_zero() { Sign::Zero } else { Sign::Plus },
            mag: self.mag.clone(),
        }
    }

    /// Negation.
    pub fn neg(&self) -> Self {
        let sign = match self.sign {
            Sign::Minus => Sign::Plus,
            Sign::Zero => Sign::Zero,
            Sign::Plus => Sign::Minus,
        };
        BigInt {
            sign,
            mag: self.mag.clone(),
        }
    }

    fn cmp_mag(a: &[u32], b: &[u32]) -> Ordering {
        if a.len() != b.len() {
            return a.len().cmp(&b.len());
        }
        for (x, y) in a.iter().rev().zip(b.iter().rev()) {
            if x != y {
                return x.cmp(y);
            }
        }
        Ordering::Equal
    }

    fn add_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
        let mut carry: u64 = 0;
        for i in 0..a.len().max(b.len()) {
            let x = *a.get(i).unwrap_or(&0) as u64;
            let y = *b.get(i).unwrap_or(&0) as u64;
            let s = x + y + carry;
            out.push(s as u32);
            carry = s >> 32;
        }
        if carry > 0 {
            out.push(carry as u32);
        }
        out
    }

    /// Requires `a >= b` (by magnitude).
    fn sub_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(a.len());
        let mut borrow: i64 = 0;
        for i in 0..a.len() {
            let x = a[i] as i64;
            let y = *b.get(i).unwrap_or(&0) as i64;
            let mut d = x - y - borrow;
            if d < 0 {
                d += 1 << 32;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out.push(d as u32);
        }
        debug_assert_eq!(borrow, 0, "sub_mag called with a < b");
        out
    }

    fn mul_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
        if a.is_empty() || b.is_empty() {
            return Vec::new();
        }
        let mut out = vec![0u32; a.len() + b.len()];
        for (i, &x) in a.iter().enumerate() {
            let mut carry: u64 = 0;
            for (j, &y) in b.iter().enumerate() {
                let idx = i + j;
                let prod = x as u64 * y as u64 + out[idx] as u64 + carry;
                out[idx] = prod as u32;
                carry = prod >> 32;
            }
            let mut k = i + b.len();
            while carry > 0 {
                let s = out[k] as u64 + carry;
                out[k] = s as u32;
                carry = s >> 32;
                k += 1;
            }
        }
        out
    }

    /// Magnitude division. Returns `(quotient, remainder)`; panics if `b` is
    /// zero. Implemented as bitwise shift-subtract — simple, not fast.
    fn div_rem_mag(a: &[u32], b: &[u32]) -> (Vec<u32>, Vec<u32>) {
        assert!(!b.is_empty(), "division by zero");
        if Self::cmp_mag(a, b) == Ordering::Less {
            return (Vec::new(), a.to_vec());
        }
        let bits = a.len() * 32;
        let mut quotient = vec![0u32; a.len()];
        let mut rem: Vec<u32> = Vec::new();
        for bit in (0..bits).rev() {
            // rem = (rem << 1) | bit(a, bit)
            Self::shl_mag_one(&mut rem);
            let limb = bit / 32;
            let off = bit % 32;
            if limb < a.len() && (a[limb] >> off) & 1 == 1 {
                if rem.is_empty() {
                    rem.push(1);
                } else {
                    rem[0] |= 1;
                }
            }
            Self::trim(&mut rem);
            if Self::cmp_mag(&rem, b) != Ordering::Less {
                rem = Self::sub_mag(&rem, b);
                Self::trim(&mut rem);
                let qlimb = bit / 32;
                let qoff = bit % 32;
                quotient[qlimb] |= 1 << qoff;
            }
        }
        Self::trim(&mut quotient);
        (quotient, rem)
    }

    fn shl_mag_one(mag: &mut Vec<u32>) {
        let mut carry = 0u32;
        for limb in mag.iter_mut() {
            let new_carry = *limb >> 31;
            *limb = (*limb << 1) | carry;
            carry = new_carry;
        }
        if carry > 0 {
            mag.push(carry);
        }
    }

    fn trim(mag: &mut Vec<u32>) {
        while mag.last() == Some(&0) {
            mag.pop();
        }
    }

    /// Truncated (toward zero) division. Panics if `other` is zero.
    pub fn div_trunc(&self, other: &BigInt) -> BigInt {
        assert!(!other.is_zero(), "BigInt division by zero");
        let (q, _) = Self::div_rem_mag(&self.mag, &other.mag);
        let sign = if q.is_empty() {
            Sign::Zero
        } else if self.sign == other.sign {
            Sign::Plus
        } else {
            Sign::Minus
        };
        Self::normalize(sign, q)
    }

    /// Truncated (toward zero) remainder: `a - (a / b) * b` with C/Rust
    /// truncating division. Panics if `other` is zero.
    pub fn rem_trunc(&self, other: &BigInt) -> BigInt {
        assert!(!other.is_zero(), "BigInt division by zero");
        let (_, r) = Self::div_rem_mag(&self.mag, &other.mag);
        Self::normalize(self.sign, r)
    }

    /// Euclidean modulo: result always lies in `[0, |other|)`.
    pub fn rem_euclid(&self, other: &BigInt) -> BigInt {
        assert!(!other.is_zero(), "BigInt division by zero");
        let r = self.rem_trunc(other);
        if r.is_negative() {
            &r + &other.abs()
        } else {
            r
        }
    }

    /// Greatest common divisor (always non-negative).
    pub fn gcd(&self, other: &BigInt) -> BigInt {
        let mut a = self.abs();
        let mut b = other.abs();
        while !b.is_zero() {
            let r = a.rem_trunc(&b);
            a = b;
            b = r;
        }
        a
    }

    /// Least common multiple (always non-negative).
    pub fn lcm(&self, other: &BigInt) -> BigInt {
        if self.is_zero() || other.is_zero() {
            return BigInt::zero();
        }
        let g = self.gcd(other);
        (self.div_trunc(&g) * other).abs()
    }

    /// Extended Euclidean algorithm: returns `(g, x, y)` such that
    /// `self * x + other * y == g == gcd(self, other)`.
    pub fn extended_gcd(&self, other: &BigInt) -> (BigInt, BigInt, BigInt) {
        let (mut old_r, mut r) = (self.clone(), other.clone());
        let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
        let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());
        while !r.is_zero() {
            let q = old_r.div_trunc(&r);
            let new_r = &old_r - &(&q * &r);
            old_r = r;
            r = new_r;
            let new_s = &old_s - &(&q * &s);
            old_s = s;
            s = new_s;
            let new_t = &old_t - &(&q * &t);
            old_t = t;
            t = new_t;
        }
        if old_r.is_negative() {
            (old_r.neg(), old_s.neg(), old_t.neg())
        } else {
            (old_r, old_s, old_t)
        }
    }

    fn to_two_complement_limbs(&self, width_limbs: usize) -> Vec<u32> {
        let mut limbs = vec![0u32; width_limbs];
        limbs[..self.mag.len()].copy_from_slice(&self.mag);
        if self.is_negative() {
            let mut carry = 1u64;
            for limb in limbs.iter_mut() {
                let inv = (!*limb) as u64 + carry;
                *limb = inv as u32;
                carry = inv >> 32;
            }
        }
        limbs
    }

    fn from_two_complement_limbs(limbs: &[u32], negative: bool) -> BigInt {
        if !negative {
            return Self::normalize(Sign::Plus, limbs.to_vec());
        }
        let mut mag = limbs.to_vec();
        let mut carry = 1u64;
        for limb in mag.iter_mut() {
            let inv = (!*limb) as u64 + carry;
            *limb = inv as u32;
            carry = inv >> 32;
        }
        Self::normalize(Sign::Minus, mag)
    }

    fn bitwise(&self, other: &BigInt, f: impl Fn(u32, u32) -> u32, result_neg: bool) -> BigInt {
        let width = self.mag.len().max(other.mag.len()) + 1;
        let a = self.to_two_complement_limbs(width);
        let b = other.to_two_complement_limbs(width);
        let out: Vec<u32> = a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect();
        Self::from_two_complement_limbs(&out, result_neg)
    }

    /// Bitwise AND, interpreting both operands in two's complement.
    pub fn bitand(&self, other: &BigInt) -> BigInt {
        let neg = self.is_negative() && other.is_negative();
        self.bitwise(other, |a, b| a & b, neg)
    }

    /// Bitwise OR, interpreting both operands in two's complement.
    pub fn bitor(&self, other: &BigInt) -> BigInt {
        let neg = self.is_negative() || other.is_negative();
        self.bitwise(other, |a, b| a | b, neg)
    }

    /// Bitwise XOR, interpreting both operands in two's complement.
    pub fn bitxor(&self, other: &BigInt) -> BigInt {
        let neg = self.is_negative() != other.is_negative();
        self.bitwise(other, |a, b| a ^ b, neg)
    }

    /// Arithmetic-style left shift: `self * 2^n`.
    pub fn shl(&self, n: u32) -> BigInt {
        if self.is_zero() || n == 0 {
            return self.clone();
        }
        let limb_shift = (n / 32) as usize;
        let bit_shift = n % 32;
        let mut mag = vec![0u32; limb_shift];
        mag.extend_from_slice(&self.mag);
        if bit_shift > 0 {
            let mut carry = 0u32;
            for limb in mag.iter_mut().skip(limb_shift) {
                let new_carry = *limb >> (32 - bit_shift);
                *limb = (*limb << bit_shift) | carry;
                carry = new_carry;
            }
            if carry > 0 {
                mag.push(carry);
            }
        }
        Self::normalize(self.sign, mag)
    }

    /// Arithmetic right shift (floor division by `2^n`, sign-preserving).
    pub fn shr(&self, n: u32) -> BigInt {
        if n == 0 {
            return self.clone();
        }
        let divisor = BigInt::one().shl(n);
        if !self.is_negative() {
            self.div_trunc(&divisor)
        } else {
            // floor division for negative numbers
            let q = self.div_trunc(&divisor);
            let r = self.rem_trunc(&divisor);
            if r.is_zero() {
                q
            } else {
                &q - &BigInt::one()
            }
        }
    }

    /// Parses a `BigInt` from a string in the given `radix` (2..=36), with an
    /// optional leading `-`.
    pub fn parse(s: &str, radix: u32) -> Result<BigInt, ParseBigIntError> {
        assert!((2..=36).contains(&radix), "radix out of range");
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if digits.is_empty() {
            return Err(ParseBigIntError::Empty);
        }
        let mut acc = BigInt::zero();
        let radix_big = BigInt::from(radix as i64);
        for c in digits.chars() {
            let d = c
                .to_digit(radix)
                .ok_or(ParseBigIntError::InvalidDigit(c))?;
            acc = &(&acc * &radix_big) + &BigInt::from(d as i64);
        }
        Ok(if negative { acc.neg() } else { acc })
    }

    /// Formats this integer in the given `radix` (2..=36).
    pub fn to_str_radix(&self, radix: u32) -> String {
        assert!((2..=36).contains(&radix), "radix out of range");
        if self.is_zero() {
            return "0".to_string();
        }
        let mut n = self.abs();
        let radix_big = BigInt::from(radix as i64);
        let mut digits = Vec::new();
        while !n.is_zero() {
            let r = n.rem_trunc(&radix_big);
            let d = r.mag.first().copied().unwrap_or(0);
            digits.push(std::char::from_digit(d, radix).unwrap());
            n = n.div_trunc(&radix_big);
        }
        if self.is_negative() {
            digits.push('-');
        }
        digits.iter().rev().collect()
    }

    /// This value clamped into `i64::MIN..=i64::MAX`, saturating rather than
    /// wrapping when it doesn't fit. Used at the boundary where an unbounded
    /// value (a `MachineInt` bound, say) needs to become a native-width
    /// interval endpoint.
    pub fn to_i64_saturating(&self) -> i64 {
        let mut magnitude: u128 = 0;
        for &limb in self.mag.iter().rev() {
            magnitude = (magnitude << 32) | limb as u128;
            if magnitude > i64::MAX as u128 + 1 {
                return if self.is_negative() { i64::MIN } else { i64::MAX };
            }
        }
        match self.sign {
            Sign::Zero => 0,
            Sign::Plus => magnitude.min(i64::MAX as u128) as i64,
            Sign::Minus => {
                if magnitude > i64::MAX as u128 + 1 {
                    i64::MIN
                } else {
                    (-(magnitude as i128)).max(i64::MIN as i128) as i64
                }
            }
        }
    }
}

/// Error returned by [`BigInt::parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseBigIntError {
    /// The input had no digits.
    #[error("empty integer literal")]
    Empty,
    /// A character was not a valid digit for the requested radix.
    #[error("invalid digit {0:?} for this radix")]
    InvalidDigit(char),
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        if v == 0 {
            return BigInt::zero();
        }
        let sign = if v < 0 { Sign::Minus } else { Sign::Plus };
        let mag_val = v.unsigned_abs();
        let mut mag = vec![mag_val as u32];
        if mag_val > u32::MAX as u64 {
            mag.push((mag_val >> 32) as u32);
        }
        BigInt::normalize(sign, mag)
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        if v == 0 {
            return BigInt::zero();
        }
        let mut mag = vec![v as u32];
        if v > u32::MAX as u64 {
            mag.push((v >> 32) as u32);
        }
        BigInt::normalize(Sign::Plus, mag)
    }
}

impl std::ops::Add for &BigInt {
    type Output = BigInt;
    fn add(self, other: &BigInt) -> BigInt {
        match (self.sign, other.sign) {
            (Sign::Zero, _) => other.clone(),
            (_, Sign::Zero) => self.clone(),
            (a, b) if a == b => BigInt::normalize(a, BigInt::add_mag(&self.mag, &other.mag)),
            _ => match BigInt::cmp_mag(&self.mag, &other.mag) {
                Ordering::Equal => BigInt::zero(),
                Ordering::Greater => {
                    BigInt::normalize(self.sign, BigInt::sub_mag(&self.mag, &other.mag))
                }
                Ordering::Less => {
                    BigInt::normalize(other.sign, BigInt::sub_mag(&other.mag, &self.mag))
                }
            },
        }
    }
}

impl std::ops::Sub for &BigInt {
    type Output = BigInt;
    fn sub(self, other: &BigInt) -> BigInt {
        self + &other.neg()
    }
}

impl std::ops::Mul for &BigInt {
    type Output = BigInt;
    fn mul(self, other: &BigInt) -> BigInt {
        if self.is_zero() || other.is_zero() {
            return BigInt::zero();
        }
        let sign = if self.sign == other.sign {
            Sign::Plus
        } else {
            Sign::Minus
        };
        BigInt::normalize(sign, BigInt::mul_mag(&self.mag, &other.mag))
    }
}

impl PartialEq for BigInt {
    fn eq(&self, other: &Self) -> bool {
        self.sign == other.sign && self.mag == other.mag
    }
}

impl std::hash::Hash for BigInt {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sign.hash(state);
        self.mag.hash(state);
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.sign, other.sign) {
            (Sign::Zero, Sign::Zero) => Ordering::Equal,
            (Sign::Zero, Sign::Plus) | (Sign::Minus, Sign::Zero) | (Sign::Minus, Sign::Plus) => {
                Ordering::Less
            }
            (Sign::Zero, Sign::Minus) | (Sign::Plus, Sign::Zero) | (Sign::Plus, Sign::Minus) => {
                Ordering::Greater
            }
            (Sign::Plus, Sign::Plus) => BigInt::cmp_mag(&self.mag, &other.mag),
            (Sign::Minus, Sign::Minus) => BigInt::cmp_mag(&other.mag, &self.mag),
        }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str_radix(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn euclidean_mod_is_always_nonnegative_and_in_range() {
        let cases: &[(i64, i64)] = &[
            (7, 3),
            (-7, 3),
            (7, -3),
            (-7, -3),
            (0, 5),
            (100, 7),
            (-100, 7),
        ];
        for &(n, d) in cases {
            let n = BigInt::from(n);
            let d = BigInt::from(d);
            let r = n.rem_euclid(&d);
            assert!(!r.is_negative());
            assert!(r < d.abs());
        }
    }

    #[test]
    fn truncated_division_identity() {
        for &(n, d) in &[(7i64, 3i64), (-7, 3), (7, -3), (-7, -3)] {
            let n = BigInt::from(n);
            let d = BigInt::from(d);
            let q = n.div_trunc(&d);
            let r = n.rem_trunc(&d);
            assert_eq!(&(&q * &d) + &r, n);
        }
    }

    #[test]
    fn gcd_lcm_basic() {
        let a = BigInt::from(54i64);
        let b = BigInt::from(24i64);
        assert_eq!(a.gcd(&b), BigInt::from(6i64));
        assert_eq!(a.lcm(&b), BigInt::from(216i64));
    }

    #[test]
    fn extended_gcd_bezout_identity() {
        let a = BigInt::from(240i64);
        let b = BigInt::from(46i64);
        let (g, x, y) = a.extended_gcd(&b);
        assert_eq!(g, a.gcd(&b));
        assert_eq!(&(&a * &x) + &(&b * &y), g);
    }

    #[test]
    fn base_round_trip() {
        for radix in [2u32, 8, 10, 16, 36] {
            for v in [-12345i64, 0, 1, 987654321] {
                let n = BigInt::from(v);
                let s = n.to_str_radix(radix);
                let back = BigInt::parse(&s, radix).unwrap();
                assert_eq!(n, back, "radix {radix} value {v}");
            }
        }
    }

    #[test]
    fn bitwise_ops_agree_with_native_i64_for_small_values() {
        for &(a, b) in &[(5i64, 3i64), (-5, 3), (5, -3), (-5, -3), (0, -1)] {
            let ba = BigInt::from(a);
            let bb = BigInt::from(b);
            assert_eq!(
                ba.bitand(&bb),
                BigInt::from(a & b),
                "and({a},{b})"
            );
            assert_eq!(ba.bitor(&bb), BigInt::from(a | b), "or({a},{b})");
            assert_eq!(ba.bitxor(&bb), BigInt::from(a ^ b), "xor({a},{b})");
        }
    }

    #[test]
    fn shift_matches_native_for_small_values() {
        let n = BigInt::from(-100i64);
        assert_eq!(n.shl(3), BigInt::from(-800i64));
        assert_eq!(n.shr(2), BigInt::from(-25i64));
        let p = BigInt::from(100i64);
        assert_eq!(p.shl(3), BigInt::from(800i64));
        assert_eq!(p.shr(2), BigInt::from(25i64));
    }

    #[quickcheck]
    fn addition_is_commutative(a: i64, b: i64) -> bool {
        let (a, b) = (BigInt::from(a), BigInt::from(b));
        &a + &b == &b + &a
    }

    #[quickcheck]
    fn multiplication_distributes_over_addition(a: i32, b: i32, c: i32) -> bool {
        let (a, b, c) = (
            BigInt::from(a as i64),
            BigInt::from(b as i64),
            BigInt::from(c as i64),
        );
        &a * &(&b + &c) == &(&a * &b) + &(&a * &c)
    }
}
