//! Arbitrary-precision and fixed-width integer arithmetic for the knight
//! analysis engine.
//!
//! This crate has no dependency on the rest of the workspace: it is the
//! foundational layer that `knight-region` and `knight-engine` build on.

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod big_int;
mod bound;
mod interval;
mod machine_int;

pub use big_int::BigInt;
pub use bound::{Bound, BoundNum};
pub use interval::{Interval, IntervalNum};
pub use machine_int::{MachineInt, OverflowingResult, Signedness};
