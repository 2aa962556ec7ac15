//! Minimal stand-ins for the front-end identities a region refers to.
//!
//! The real front-end (an AST/CFG producer) is out of scope for this crate;
//! these opaque handles play the role `clang::ValueDecl*`, `clang::Expr*`
//! and `const StackFrame*` play in the reference implementation, without
//! pulling in an AST dependency.

use knight_num::Signedness;

/// Opaque identifier for a declaration (a variable, parameter, or field)
/// owned by the front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// Opaque identifier for a source expression owned by the front-end (used
/// by temporaries, string literals, and call-site argument expressions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// Opaque identifier for a stack frame (one per function activation in the
/// call-graph the front-end walks).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackFrameId(pub u32);

/// A minimal description of "the language type stored at a location",
/// sufficient for the numerical domains to size and sign a symbol derived
/// from the region: its bit width, its signedness, and whether it is a
/// pointer (pointers are unsigned and sized to the target's pointer width
/// by convention, but are tracked separately so `PointerInfoDomain` can
/// recognize them without inspecting width).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueType {
    bit_width: u32,
    signedness: Signedness,
    is_pointer: bool,
}

impl ValueType {
    /// A scalar integer type of the given width and signedness.
    pub fn integer(bit_width: u32, signedness: Signedness) -> Self {
        assert!(bit_width >= 1, "bit width must be at least 1");
        ValueType {
            bit_width,
            signedness,
            is_pointer: false,
        }
    }

    /// A pointer type at the given address width.
    pub fn pointer(address_width: u32) -> Self {
        ValueType {
            bit_width: address_width,
            signedness: Signedness::Unsigned,
            is_pointer: true,
        }
    }

    /// This type's bit width.
    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// This type's signedness.
    pub fn signedness(&self) -> Signedness {
        self.signedness
    }

    /// `true` iff this type is a pointer.
    pub fn is_pointer(&self) -> bool {
        self.is_pointer
    }
}
