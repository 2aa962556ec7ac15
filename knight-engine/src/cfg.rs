//! Minimal stand-in for the front-end's per-function control-flow graph.

use crate::ast::Stmt;

/// Opaque identifier for a statement within a function, unique within its
/// [`ControlFlowGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

/// Opaque identifier for a basic block within a [`ControlFlowGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// A basic block: a straight-line sequence of statements, an optional
/// terminator condition (for conditional successors), and its successors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    id: BlockId,
    stmts: Vec<(StmtId, Stmt)>,
    /// `(condition, then_block, else_block)` for a conditional terminator;
    /// `None` for an unconditional fallthrough/return.
    terminator: Option<(StmtId, BlockId, BlockId)>,
    /// Plain successor list, used when there is no conditional terminator
    /// (a block can still have multiple successors, e.g. a `switch`,
    /// collapsed here to unconditional edges since predicate filtering
    /// only applies to the two-way `if` case).
    successors: Vec<BlockId>,
}

impl BasicBlock {
    /// Creates a block with no statements and no successors yet.
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            stmts: Vec::new(),
            terminator: None,
            successors: Vec::new(),
        }
    }

    /// This block's identifier.
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Appends a statement to this block.
    pub fn push_stmt(&mut self, id: StmtId, stmt: Stmt) {
        self.stmts.push((id, stmt));
    }

    /// This block's statements, in order.
    pub fn stmts(&self) -> &[(StmtId, Stmt)] {
        &self.stmts
    }

    /// Sets a two-way conditional terminator.
    pub fn set_conditional_terminator(
        &mut self,
        condition: StmtId,
        then_block: BlockId,
        else_block: BlockId,
    ) {
        self.terminator = Some((condition, then_block, else_block));
        self.successors = vec![then_block, else_block];
    }

    /// Adds an unconditional successor edge.
    pub fn add_successor(&mut self, to: BlockId) {
        self.successors.push(to);
    }

    /// This block's successor blocks.
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// The two-way conditional terminator, if any.
    pub fn conditional_terminator(&self) -> Option<(StmtId, BlockId, BlockId)> {
        self.terminator
    }
}

/// A per-function control-flow graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlFlowGraph {
    entry: BlockId,
    exit: BlockId,
    blocks: Vec<BasicBlock>,
}

impl ControlFlowGraph {
    /// Creates a graph with the given entry/exit block identifiers and no
    /// blocks yet; callers add blocks with [`Self::add_block`].
    pub fn new(entry: BlockId, exit: BlockId) -> Self {
        ControlFlowGraph {
            entry,
            exit,
            blocks: Vec::new(),
        }
    }

    /// The entry block.
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// The exit block.
    pub fn exit(&self) -> BlockId {
        self.exit
    }

    /// Adds a block to the graph.
    pub fn add_block(&mut self, block: BasicBlock) {
        self.blocks.push(block);
    }

    /// All blocks, in insertion order.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Looks up a block by identifier.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .expect("unknown block id")
    }
}
