//! Minimal stand-ins for the front-end's typed-expression surface.
//!
//! The real C/C++ front-end is out of scope; these plain enums and structs
//! are just enough shape for [`crate::resolver::SymbolResolver`] and the
//! fixpoint engine to be exercised standalone, the way a thin shim isolates
//! an engine from a real Clang AST.

use knight_num::BigInt;
use knight_region::{RegionId, ValueType};

/// A binary operator, covering arithmetic, bitwise, shift, comparison,
/// assignment, and compound-assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
    /// `*=`
    MulAssign,
    /// `/=`
    DivAssign,
    /// `%=`
    RemAssign,
    /// `<<=`
    ShlAssign,
    /// `>>=`
    ShrAssign,
    /// `&=`
    AndAssign,
    /// `|=`
    OrAssign,
    /// `^=`
    XorAssign,
}

impl BinOp {
    /// `true` iff this operator is a plain or compound assignment.
    pub fn is_assignment(&self) -> bool {
        !matches!(
            self,
            BinOp::Add
                | BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::Rem
                | BinOp::Shl
                | BinOp::Shr
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor
                | BinOp::Eq
                | BinOp::Ne
                | BinOp::Lt
                | BinOp::Gt
                | BinOp::Le
                | BinOp::Ge
        )
    }

    /// `true` iff this operator is a comparison.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    /// For a compound assignment (`+=`, `&=`, …), the underlying binary
    /// operator it applies before storing (`+`, `&`, …). `None` for plain
    /// `=` and for non-assignment operators.
    pub fn compound_base(&self) -> Option<BinOp> {
        Some(match self {
            BinOp::AddAssign => BinOp::Add,
            BinOp::SubAssign => BinOp::Sub,
            BinOp::MulAssign => BinOp::Mul,
            BinOp::DivAssign => BinOp::Div,
            BinOp::RemAssign => BinOp::Rem,
            BinOp::ShlAssign => BinOp::Shl,
            BinOp::ShrAssign => BinOp::Shr,
            BinOp::AndAssign => BinOp::BitAnd,
            BinOp::OrAssign => BinOp::BitOr,
            BinOp::XorAssign => BinOp::BitXor,
            _ => return None,
        })
    }
}

/// A unary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical not.
    Not,
    /// Bitwise complement.
    BitNot,
}

/// The kind of a cast expression — just enough to distinguish
/// integer-to-integer width/sign changes (the only kind the numerical
/// domains care about) from everything else, which is treated
/// conservatively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// An integer-to-integer cast, possibly changing width or signedness.
    Integral,
    /// Any other cast (pointer reinterpretation, no-op qualification
    /// changes, …), handled conservatively by the resolver.
    Opaque,
}

/// A typed expression handed to [`crate::resolver::SymbolResolver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// An integer literal.
    IntLiteral {
        /// The literal's value.
        value: BigInt,
        /// The literal's type.
        ty: ValueType,
    },
    /// A reference to a declared variable/argument/field/etc.
    DeclRef {
        /// The region the declaration resolves to.
        region: RegionId,
    },
    /// A cast expression.
    Cast {
        /// The operand being cast.
        operand: Box<Expr>,
        /// The cast's kind.
        kind: CastKind,
        /// The operand's static type.
        src: ValueType,
        /// The cast's target type.
        dst: ValueType,
    },
    /// A unary expression.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary expression (including assignment and compound assignment).
    Binary {
        /// The left-hand operand.
        lhs: Box<Expr>,
        /// The right-hand operand.
        rhs: Box<Expr>,
        /// The operator.
        op: BinOp,
        /// The expression's result type.
        ty: ValueType,
    },
}

impl Expr {
    /// The static type of this expression, when it carries one directly
    /// (binary and literal expressions always do; casts report their
    /// destination type; unary expressions inherit their operand's type).
    pub fn ty(&self) -> Option<ValueType> {
        match self {
            Expr::IntLiteral { ty, .. } => Some(*ty),
            Expr::DeclRef { .. } => None,
            Expr::Cast { dst, .. } => Some(*dst),
            Expr::Unary { operand, .. } => operand.ty(),
            Expr::Binary { ty, .. } => Some(*ty),
        }
    }
}

/// A statement in a basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// A bare expression statement (includes assignments).
    Expr(Expr),
    /// A variable declaration with an optional initializer.
    Decl {
        /// The region introduced by this declaration.
        region: RegionId,
        /// The initializing expression, if any.
        init: Option<Expr>,
    },
}
