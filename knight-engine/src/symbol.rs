//! The interned symbolic-expression DAG.

use std::cell::OnceCell;

use hashbrown::HashMap;
use knight_num::BigInt;
use knight_region::{RegionId, ValueType};

use crate::ast::BinOp;
use crate::cfg::{BlockId, StmtId};
use knight_region::StackFrameId;

/// An interned handle to an [`SExprKind`] held by a [`SymbolManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SExprId(pub(crate) u32);

/// A location in a function: the frame it executes in plus the
/// block/statement it names, used as the key for minting fresh region
/// definitions at merges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocationContext {
    /// The stack frame this location belongs to.
    pub frame: StackFrameId,
    /// The block containing the location.
    pub block: BlockId,
    /// The statement within the block.
    pub stmt: StmtId,
}

/// The variant-specific content of a symbolic expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SExprKind {
    /// An integer literal.
    IntLiteral {
        /// The literal's value.
        value: BigInt,
        /// The literal's type.
        ty: ValueType,
    },
    /// A region's address (e.g. `&x`).
    RegionAddr {
        /// The region being addressed.
        region: RegionId,
    },
    /// The abstract value held by a region at a location context.
    RegionSymVal {
        /// The region this value was read from.
        region: RegionId,
        /// Where the read occurred.
        loc: LocationContext,
        /// `true` iff this value was already live when the current
        /// analysis scope began (inherited from a caller, say), rather
        /// than produced within it.
        external: bool,
    },
    /// The symbolic size of a region, used for bounds reasoning.
    RegionExtent {
        /// The region whose extent this is.
        region: RegionId,
    },
    /// A fresh symbol with no better representation, tagged by its origin.
    Conjured {
        /// The statement that produced the need for a fresh symbol.
        stmt: StmtId,
        /// The symbol's type.
        ty: ValueType,
        /// The frame it was conjured in.
        frame: StackFrameId,
        /// An optional disambiguating tag (for statements that conjure
        /// more than one symbol).
        tag: Option<u32>,
    },
    /// A cast of `operand` from `src` to `dst`.
    Cast {
        /// The expression being cast.
        operand: SExprId,
        /// The operand's type.
        src: ValueType,
        /// The cast's destination type.
        dst: ValueType,
    },
    /// A binary expression.
    Binary {
        /// The left-hand operand.
        lhs: SExprId,
        /// The right-hand operand.
        rhs: SExprId,
        /// The operator.
        op: BinOp,
        /// The expression's result type.
        ty: ValueType,
    },
}

struct SExprNode {
    kind: SExprKind,
    /// Memoized worst-case complexity, computed lazily on first query and
    /// cached. Interior mutability is safe here because nodes are
    /// otherwise immutable once interned.
    complexity: OnceCell<u32>,
}

/// Owns the interning pool for every S-expr variant and issues monotonic
/// [`SExprId`]s. Plays the role a per-variant `FoldingSet` would in a
/// C++ implementation, collapsed into one pool keyed by the (already
/// `Eq`+`Hash`) [`SExprKind`] rather than a folding-set node ID.
#[derive(Default)]
pub struct SymbolManager {
    nodes: Vec<SExprNode>,
    index: HashMap<SExprKind, SExprId>,
}

impl SymbolManager {
    /// Creates an empty symbol manager.
    pub fn new() -> Self {
        SymbolManager::default()
    }

    fn intern(&mut self, kind: SExprKind) -> SExprId {
        if let Some(&id) = self.index.get(&kind) {
            return id;
        }
        let id = SExprId(self.nodes.len() as u32);
        self.index.insert(kind.clone(), id);
        self.nodes.push(SExprNode {
            kind,
            complexity: OnceCell::new(),
        });
        id
    }

    /// The kind behind an interned handle.
    pub fn kind(&self, id: SExprId) -> &SExprKind {
        &self.nodes[id.0 as usize].kind
    }

    /// Interns an integer literal.
    pub fn scalar_int(&mut self, value: BigInt, ty: ValueType) -> SExprId {
        self.intern(SExprKind::IntLiteral { value, ty })
    }

    /// Interns a region address.
    pub fn region_addr(&mut self, region: RegionId) -> SExprId {
        self.intern(SExprKind::RegionAddr { region })
    }

    /// Interns the abstract value held by `region` at `loc`.
    pub fn region_sym_val(
        &mut self,
        region: RegionId,
        loc: LocationContext,
        external: bool,
    ) -> SExprId {
        self.intern(SExprKind::RegionSymVal {
            region,
            loc,
            external,
        })
    }

    /// Interns a region's symbolic extent.
    pub fn region_extent(&mut self, region: RegionId) -> SExprId {
        self.intern(SExprKind::RegionExtent { region })
    }

    /// Interns a fresh conjured symbol.
    pub fn conjured(
        &mut self,
        stmt: StmtId,
        ty: ValueType,
        frame: StackFrameId,
        tag: Option<u32>,
    ) -> SExprId {
        self.intern(SExprKind::Conjured {
            stmt,
            ty,
            frame,
            tag,
        })
    }

    /// Interns a cast expression.
    pub fn cast(&mut self, operand: SExprId, src: ValueType, dst: ValueType) -> SExprId {
        self.intern(SExprKind::Cast { operand, src, dst })
    }

    /// Interns a binary expression.
    pub fn binary(&mut self, lhs: SExprId, rhs: SExprId, op: BinOp, ty: ValueType) -> SExprId {
        self.intern(SExprKind::Binary { lhs, rhs, op, ty })
    }

    /// The worst-case complexity of an expression: leaves are 1; a binary
    /// node combines its children multiplicatively for multiplicative/
    /// bitwise operators and additively for additive ones. Memoized per
    /// node.
    pub fn complexity(&self, id: SExprId) -> u32 {
        if let Some(&c) = self.nodes[id.0 as usize].complexity.get() {
            return c;
        }
        let c = match &self.nodes[id.0 as usize].kind {
            SExprKind::IntLiteral { .. }
            | SExprKind::RegionAddr { .. }
            | SExprKind::RegionSymVal { .. }
            | SExprKind::RegionExtent { .. }
            | SExprKind::Conjured { .. } => 1,
            SExprKind::Cast { operand, .. } => self.complexity(*operand),
            SExprKind::Binary { lhs, rhs, op, .. } => {
                let (lc, rc) = (self.complexity(*lhs), self.complexity(*rhs));
                match op {
                    BinOp::Mul
                    | BinOp::Div
                    | BinOp::Rem
                    | BinOp::BitAnd
                    | BinOp::BitOr
                    | BinOp::BitXor
                    | BinOp::Shl
                    | BinOp::Shr => lc.saturating_mul(rc),
                    _ => lc.saturating_add(rc),
                }
            }
        };
        // Best-effort memoization: if another call already raced us to set
        // it (not possible under `&self` without concurrent access to this
        // manager, but cheap to tolerate), keep the existing value.
        let _ = self.nodes[id.0 as usize].complexity.set(c);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knight_num::Signedness;

    fn int_ty() -> ValueType {
        ValueType::integer(32, Signedness::Signed)
    }

    #[test]
    fn equal_literals_intern_to_the_same_id() {
        let mut mgr = SymbolManager::new();
        let a = mgr.scalar_int(BigInt::from(5i64), int_ty());
        let b = mgr.scalar_int(BigInt::from(5i64), int_ty());
        assert_eq!(a, b);
    }

    #[test]
    fn different_literals_get_different_ids() {
        let mut mgr = SymbolManager::new();
        let a = mgr.scalar_int(BigInt::from(5i64), int_ty());
        let b = mgr.scalar_int(BigInt::from(6i64), int_ty());
        assert_ne!(a, b);
    }

    #[test]
    fn binary_complexity_is_multiplicative_for_mul_and_additive_for_add() {
        let mut mgr = SymbolManager::new();
        let a = mgr.scalar_int(BigInt::from(1i64), int_ty());
        let b = mgr.scalar_int(BigInt::from(2i64), int_ty());
        let add = mgr.binary(a, b, BinOp::Add, int_ty());
        let mul = mgr.binary(a, b, BinOp::Mul, int_ty());
        assert_eq!(mgr.complexity(add), 2);
        assert_eq!(mgr.complexity(mul), 1);
        let nested = mgr.binary(mul, mul, BinOp::Mul, int_ty());
        assert_eq!(mgr.complexity(nested), 1);
        let nested_add = mgr.binary(add, add, BinOp::Add, int_ty());
        assert_eq!(mgr.complexity(nested_add), 4);
    }

    #[test]
    fn cast_of_equal_operand_and_types_is_interned_once() {
        let mut mgr = SymbolManager::new();
        let operand = mgr.scalar_int(BigInt::from(1i64), int_ty());
        let small = ValueType::integer(8, Signedness::Signed);
        let a = mgr.cast(operand, int_ty(), small);
        let b = mgr.cast(operand, int_ty(), small);
        assert_eq!(a, b);
    }
}
