//! Regions: typed storage locations.

use crate::frontend::{DeclId, ExprId, ValueType};
use crate::space::MemSpaceId;

/// An interned handle to a [`Region`] held by a [`crate::RegionManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub(crate) u32);

/// The variant-specific payload of a region.
///
/// The reference implementation models this as a class hierarchy
/// (`MemRegion` → `TypedRegion`/`DeclRegion` → `VarRegion`/`FieldRegion`/…)
/// dispatched through `classof`/RTTI; a closed, data-carrying enum captures
/// the same fixed set of variants without the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// A local or global variable.
    Var {
        /// The variable's declaration.
        decl: DeclId,
    },
    /// A function argument's storage.
    Argument {
        /// The corresponding parameter declaration, absent for a variadic
        /// argument with no matching parameter.
        param: Option<DeclId>,
        /// The call-site expression bound to this argument, absent for a
        /// synthetic top-level-stack argument.
        arg_expr: Option<ExprId>,
        /// The argument's zero-based index.
        index: u32,
    },
    /// The implicit `this` pointer of a member function.
    This,
    /// A non-static data member.
    Field {
        /// The field's declaration.
        decl: DeclId,
    },
    /// An array/container element reached through a base region.
    Element,
    /// A base-class subobject.
    BaseObj {
        /// The base class's declaration.
        base_decl: DeclId,
        /// `true` iff this is a virtual base.
        is_virtual: bool,
    },
    /// A C++ temporary object.
    TempObj {
        /// The expression the temporary was materialized from.
        src_expr: ExprId,
    },
    /// A string literal.
    StringLit {
        /// The literal expression.
        literal: ExprId,
    },
    /// A placeholder region with no concrete program location, used to
    /// stand in for values reached only through an unresolved pointer.
    Symbolic,
}

/// A typed storage location, uniquely interned by a
/// [`crate::RegionManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    kind: RegionKind,
    space: MemSpaceId,
    parent: Option<RegionId>,
    value_type: ValueType,
}

impl Region {
    pub(crate) fn new(
        kind: RegionKind,
        space: MemSpaceId,
        parent: Option<RegionId>,
        value_type: ValueType,
    ) -> Self {
        Region {
            kind,
            space,
            parent,
            value_type,
        }
    }

    /// This region's variant-specific payload.
    pub fn kind(&self) -> &RegionKind {
        &self.kind
    }

    /// The memory space this region lives in.
    pub fn memory_space(&self) -> MemSpaceId {
        self.space
    }

    /// The enclosing region, for fields/elements/base and temporary
    /// objects. `None` for top-level variables, arguments, `this`, string
    /// literals, and symbolic regions.
    pub fn parent(&self) -> Option<RegionId> {
        self.parent
    }

    /// The language type of the value stored at this location.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// `true` iff this region's storage lives on the stack (a `Var` whose
    /// space is stack-local, or an `Argument`/`This` whose space is
    /// stack-arg — callers resolve the space's kind via
    /// [`crate::RegionManager::space`]).
    pub fn is_decl_like(&self) -> bool {
        matches!(
            self.kind,
            RegionKind::Var { .. } | RegionKind::Argument { .. } | RegionKind::Field { .. }
        )
    }
}
