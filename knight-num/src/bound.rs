//! Extended-integer bounds: a finite value or ±∞.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// A numeric type usable as a [`Bound`] payload.
///
/// Kept minimal and blanket-implemented for the integer types this crate
/// cares about, rather than pulling in `num-traits` for a handful of
/// concrete types.
pub trait BoundNum:
    Copy + Clone + fmt::Debug + PartialEq + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Neg<Output = Self>
{
    /// The value `0`.
    fn zero() -> Self;
    /// The value `1`.
    fn one() -> Self;
    /// `true` iff `self` is strictly negative.
    fn is_negative(&self) -> bool;
}

macro_rules! impl_bound_num {
    ($($t:ty),*) => {
        $(impl BoundNum for $t {
            fn zero() -> Self { 0 as $t }
            fn one() -> Self { 1 as $t }
            fn is_negative(&self) -> bool { *self < (0 as $t) }
        })*
    };
}

impl_bound_num!(i64, i128);

/// `Bound<N>` is either a finite `N` or `±∞`, the latter stored as an
/// infinity flag plus a sign carrier normalized to `±1` (or `±1.0`) on
/// construction, mirroring the reference implementation's
/// `Bound<Num>` exactly.
#[derive(Clone, Copy, Debug)]
pub struct Bound<N: BoundNum> {
    is_inf: bool,
    val: N,
}

impl<N: BoundNum> Bound<N> {
    /// A finite bound.
    pub fn finite(val: N) -> Self {
        Bound { is_inf: false, val }
    }

    /// `+∞`.
    pub fn pinf() -> Self {
        Bound {
            is_inf: true,
            val: N::one(),
        }
    }

    /// `-∞`.
    pub fn ninf() -> Self {
        Bound {
            is_inf: true,
            val: N::zero() - N::one(),
        }
    }

    /// `true` iff this bound is `±∞`.
    pub fn is_inf(&self) -> bool {
        self.is_inf
    }

    /// `true` iff this bound is finite.
    pub fn is_finite(&self) -> bool {
        !self.is_inf
    }

    /// `true` iff this bound is `+∞`.
    pub fn is_pinf(&self) -> bool {
        self.is_inf && !self.val.is_negative()
    }

    /// `true` iff this bound is `-∞`.
    pub fn is_ninf(&self) -> bool {
        self.is_inf && self.val.is_negative()
    }

    /// Returns the finite value, or `None` if this bound is infinite.
    pub fn finite_value(&self) -> Option<N> {
        if self.is_inf {
            None
        } else {
            Some(self.val)
        }
    }

    /// Returns the finite value. Panics if this bound is infinite.
    pub fn unwrap_finite(&self) -> N {
        self.finite_value().expect("Bound is infinite")
    }
}

impl<N: BoundNum> Neg for Bound<N> {
    type Output = Bound<N>;
    fn neg(self) -> Self::Output {
        Bound {
            is_inf: self.is_inf,
            val: -self.val,
        }
    }
}

impl<N: BoundNum> Add for Bound<N> {
    type Output = Bound<N>;
    fn add(self, other: Bound<N>) -> Bound<N> {
        match (self.is_inf, other.is_inf) {
            (false, false) => Bound::finite(self.val + other.val),
            (true, false) => self,
            (false, true) => other,
            (true, true) => {
                assert!(
                    self.is_pinf() == other.is_pinf(),
                    "undefined bound arithmetic: +inf + -inf"
                );
                self
            }
        }
    }
}

impl<N: BoundNum> Sub for Bound<N> {
    type Output = Bound<N>;
    fn sub(self, other: Bound<N>) -> Bound<N> {
        match (self.is_inf, other.is_inf) {
            (false, false) => Bound::finite(self.val - other.val),
            (true, false) => self,
            (false, true) => -other,
            (true, true) => {
                assert!(
                    self.is_pinf() != other.is_pinf(),
                    "undefined bound arithmetic: inf - inf"
                );
                self
            }
        }
    }
}

/// Multiplies two bounds, with the convention `0 * ∞ == 0`.
pub fn bound_mul<N: BoundNum + std::ops::Mul<Output = N>>(a: Bound<N>, b: Bound<N>) -> Bound<N> {
    match (a.finite_value(), b.finite_value()) {
        (Some(x), _) if x == N::zero() => Bound::finite(N::zero()),
        (_, Some(y)) if y == N::zero() => Bound::finite(N::zero()),
        (Some(x), Some(y)) => Bound::finite(x * y),
        _ => {
            let neg = a.is_negative_bound() != b.is_negative_bound();
            if neg {
                Bound::ninf()
            } else {
                Bound::pinf()
            }
        }
    }
}

impl<N: BoundNum> Bound<N> {
    fn is_negative_bound(&self) -> bool {
        if self.is_inf {
            self.is_ninf()
        } else {
            self.val.is_negative()
        }
    }
}

impl<N: BoundNum> PartialEq for Bound<N> {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_inf, other.is_inf) {
            (false, false) => self.val == other.val,
            (true, true) => self.is_pinf() == other.is_pinf(),
            _ => false,
        }
    }
}

impl<N: BoundNum> PartialOrd for Bound<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_inf, other.is_inf) {
            (false, false) => self.val.partial_cmp(&other.val),
            (true, true) => {
                if self.is_pinf() == other.is_pinf() {
                    Some(Ordering::Equal)
                } else if self.is_ninf() {
                    Some(Ordering::Less)
                } else {
                    Some(Ordering::Greater)
                }
            }
            (true, false) => Some(if self.is_pinf() {
                Ordering::Greater
            } else {
                Ordering::Less
            }),
            (false, true) => Some(if other.is_pinf() {
                Ordering::Less
            } else {
                Ordering::Greater
            }),
        }
    }
}

impl<N: BoundNum> Eq for Bound<N> {}

impl<N: BoundNum + std::hash::Hash> std::hash::Hash for Bound<N> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Canonical tags so that any representation of +inf/-inf hashes
        // identically, matching the `PartialEq` equivalence classes above.
        if self.is_pinf() {
            0u8.hash(state);
        } else if self.is_ninf() {
            1u8.hash(state);
        } else {
            2u8.hash(state);
            self.val.hash(state);
        }
    }
}

impl<N: BoundNum + fmt::Display> fmt::Display for Bound<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pinf() {
            write!(f, "+oo")
        } else if self.is_ninf() {
            write!(f, "-oo")
        } else {
            write!(f, "{}", self.val)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinf_plus_finite_is_pinf() {
        let a: Bound<i64> = Bound::pinf();
        let b: Bound<i64> = Bound::finite(42);
        assert_eq!(a + b, Bound::pinf());
        assert_eq!(b + a, Bound::pinf());
    }

    #[test]
    #[should_panic(expected = "undefined bound arithmetic")]
    fn pinf_plus_ninf_panics() {
        let a: Bound<i64> = Bound::pinf();
        let b: Bound<i64> = Bound::ninf();
        let _ = a + b;
    }

    #[test]
    #[should_panic(expected = "undefined bound arithmetic")]
    fn inf_minus_inf_same_sign_panics() {
        let a: Bound<i64> = Bound::pinf();
        let b: Bound<i64> = Bound::pinf();
        let _ = a - b;
    }

    #[test]
    fn zero_times_infinity_is_zero() {
        let zero: Bound<i64> = Bound::finite(0);
        let inf: Bound<i64> = Bound::pinf();
        assert_eq!(bound_mul(zero, inf), Bound::finite(0));
        assert_eq!(bound_mul(inf, zero), Bound::finite(0));
    }

    #[test]
    fn ordering_places_ninf_below_everything_and_pinf_above() {
        let ninf: Bound<i64> = Bound::ninf();
        let pinf: Bound<i64> = Bound::pinf();
        let mid: Bound<i64> = Bound::finite(0);
        assert!(ninf < mid);
        assert!(mid < pinf);
        assert!(ninf < pinf);
    }
}
