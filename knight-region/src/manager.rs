//! The region/space interning pool.

use hashbrown::HashMap;

use crate::frontend::{DeclId, ExprId, StackFrameId, ValueType};
use crate::region::{Region, RegionId, RegionKind};
use crate::space::{MemSpaceId, MemorySpace, SpaceKind};

/// Interns [`MemorySpace`]s and [`Region`]s so that two requests describing
/// the same location always yield the same [`RegionId`] — the Rust analog
/// of the reference implementation's `llvm::FoldingSet<MemRegion>`, built
/// on a plain hash map keyed by the (small, `Eq`+`Hash`) value rather than a
/// folding-set node ID, since regions here have no heap-allocated tail data
/// to fold incrementally.
#[derive(Debug, Default)]
pub struct RegionManager {
    spaces: Vec<MemorySpace>,
    space_index: HashMap<MemorySpace, MemSpaceId>,
    regions: Vec<Region>,
    region_index: HashMap<Region, RegionId>,
}

impl RegionManager {
    /// Creates an empty region manager.
    pub fn new() -> Self {
        RegionManager::default()
    }

    fn intern_space(&mut self, space: MemorySpace) -> MemSpaceId {
        if let Some(&id) = self.space_index.get(&space) {
            return id;
        }
        let id = MemSpaceId(self.spaces.len() as u32);
        self.spaces.push(space);
        self.space_index.insert(space, id);
        id
    }

    fn intern_region(&mut self, region: Region) -> RegionId {
        if let Some(&id) = self.region_index.get(&region) {
            return id;
        }
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(region);
        self.region_index.insert(region, id);
        id
    }

    /// The memory space behind an interned handle.
    pub fn space(&self, id: MemSpaceId) -> &MemorySpace {
        &self.spaces[id.0 as usize]
    }

    /// The region behind an interned handle.
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0 as usize]
    }

    /// The stack-local space of the given frame.
    pub fn stack_local_space(&mut self, frame: StackFrameId) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::StackLocal, Some(frame)))
    }

    /// The stack-argument space of the given frame.
    pub fn stack_arg_space(&mut self, frame: StackFrameId) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::StackArg, Some(frame)))
    }

    /// The single code space.
    pub fn code_space(&mut self) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::Code, None))
    }

    /// The single heap space.
    pub fn heap_space(&mut self) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::Heap, None))
    }

    /// The single translation-unit-internal global space.
    pub fn global_internal_space(&mut self) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::GlobalInternal, None))
    }

    /// The single externally visible global space.
    pub fn global_external_space(&mut self) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::GlobalExternal, None))
    }

    /// The single unknown/unclassified space.
    pub fn unknown_space(&mut self) -> MemSpaceId {
        self.intern_space(MemorySpace::new(SpaceKind::Unknown, None))
    }

    /// A region for a variable declaration, in the given space.
    pub fn var_region(
        &mut self,
        decl: DeclId,
        space: MemSpaceId,
        value_type: ValueType,
    ) -> RegionId {
        self.intern_region(Region::new(
            RegionKind::Var { decl },
            space,
            None,
            value_type,
        ))
    }

    /// A region for a function argument within the given frame's argument
    /// space.
    #[allow(clippy::too_many_arguments)]
    pub fn argument_region(
        &mut self,
        frame: StackFrameId,
        param: Option<DeclId>,
        arg_expr: Option<ExprId>,
        index: u32,
        value_type: ValueType,
    ) -> RegionId {
        let space = self.stack_arg_space(frame);
        assert!(
            param.is_some() || arg_expr.is_some(),
            "argument region requires a parameter declaration or an argument expression"
        );
        self.intern_region(Region::new(
            RegionKind::Argument {
                param,
                arg_expr,
                index,
            },
            space,
            None,
            value_type,
        ))
    }

    /// The `this` region of a member function activation.
    pub fn this_region(&mut self, frame: StackFrameId, value_type: ValueType) -> RegionId {
        let space = self.stack_arg_space(frame);
        self.intern_region(Region::new(RegionKind::This, space, None, value_type))
    }

    /// A region for a non-static data member reached through `base`.
    pub fn field_region(
        &mut self,
        decl: DeclId,
        base: RegionId,
        value_type: ValueType,
    ) -> RegionId {
        let space = self.region(base).memory_space();
        self.intern_region(Region::new(
            RegionKind::Field { decl },
            space,
            Some(base),
            value_type,
        ))
    }

    /// A region for an array/container element reached through `base`.
    pub fn element_region(&mut self, base: RegionId, element_type: ValueType) -> RegionId {
        let space = self.region(base).memory_space();
        self.intern_region(Region::new(
            RegionKind::Element,
            space,
            Some(base),
            element_type,
        ))
    }

    /// A region for a base-class subobject of `derived`.
    pub fn base_obj_region(
        &mut self,
        base_decl: DeclId,
        is_virtual: bool,
        derived: RegionId,
        value_type: ValueType,
    ) -> RegionId {
        let space = self.region(derived).memory_space();
        self.intern_region(Region::new(
            RegionKind::BaseObj {
                base_decl,
                is_virtual,
            },
            space,
            Some(derived),
            value_type,
        ))
    }

    /// A region for a temporary object materialized from `src_expr`, within
    /// the given frame.
    pub fn temp_obj_region(
        &mut self,
        frame: StackFrameId,
        src_expr: ExprId,
        value_type: ValueType,
    ) -> RegionId {
        let space = self.stack_local_space(frame);
        self.intern_region(Region::new(
            RegionKind::TempObj { src_expr },
            space,
            None,
            value_type,
        ))
    }

    /// A region for a string literal (always global-internal, never
    /// frame-bound).
    pub fn string_lit_region(&mut self, literal: ExprId, value_type: ValueType) -> RegionId {
        let space = self.global_internal_space();
        self.intern_region(Region::new(
            RegionKind::StringLit { literal },
            space,
            None,
            value_type,
        ))
    }

    /// A fresh symbolic placeholder region in the unknown space.
    pub fn symbolic_region(&mut self, value_type: ValueType) -> RegionId {
        let space = self.unknown_space();
        self.intern_region(Region::new(RegionKind::Symbolic, space, None, value_type))
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
    fn same_decl_and_space_interns_to_the_same_region() {
        let mut mgr = RegionManager::new();
        let frame = StackFrameId(0);
        let space = mgr.stack_local_space(frame);
        let a = mgr.var_region(DeclId(7), space, int_ty());
        let b = mgr.var_region(DeclId(7), space, int_ty());
        assert_eq!(a, b);
    }

    #[test]
    fn different_decls_get_different_regions() {
        let mut mgr = RegionManager::new();
        let frame = StackFrameId(0);
        let space = mgr.stack_local_space(frame);
        let a = mgr.var_region(DeclId(1), space, int_ty());
        let b = mgr.var_region(DeclId(2), space, int_ty());
        assert_ne!(a, b);
    }

    #[test]
    fn same_decl_in_different_frames_gets_different_regions() {
        let mut mgr = RegionManager::new();
        let frame1 = StackFrameId(0);
        let frame2 = StackFrameId(1);
        let s1 = mgr.stack_local_space(frame1);
        let s2 = mgr.stack_local_space(frame2);
        let a = mgr.var_region(DeclId(3), s1, int_ty());
        let b = mgr.var_region(DeclId(3), s2, int_ty());
        assert_ne!(a, b);
    }

    #[test]
    fn global_spaces_are_singletons() {
        let mut mgr = RegionManager::new();
        assert_eq!(mgr.heap_space(), mgr.heap_space());
        assert_eq!(mgr.code_space(), mgr.code_space());
        assert_ne!(mgr.heap_space(), mgr.code_space());
    }

    #[test]
    fn field_region_inherits_base_memory_space() {
        let mut mgr = RegionManager::new();
        let frame = StackFrameId(0);
        let space = mgr.stack_local_space(frame);
        let base = mgr.var_region(DeclId(1), space, int_ty());
        let field = mgr.field_region(DeclId(2), base, int_ty());
        assert_eq!(mgr.region(field).memory_space(), space);
        assert_eq!(mgr.region(field).parent(), Some(base));
    }

    #[test]
    #[should_panic(expected = "argument expression")]
    fn argument_region_requires_param_or_expr() {
        let mut mgr = RegionManager::new();
        let frame = StackFrameId(0);
        mgr.argument_region(frame, None, None, 0, int_ty());
    }

    #[test]
    fn symbolic_regions_are_not_deduplicated_across_types_but_are_for_same_type() {
        let mut mgr = RegionManager::new();
        let a = mgr.symbolic_region(int_ty());
        let b = mgr.symbolic_region(int_ty());
        // Both placeholders with the same type are structurally equal and
        // therefore the same interned symbolic region, matching the
        // interning contract for every other region kind.
        assert_eq!(a, b);
    }
}
