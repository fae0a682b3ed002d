mod eq;

use rand::Rng;
use tracing::debug;

use crate::error::ModelError;
use crate::ident::Ident;
use crate::statement::{Intrinsic, Statement, StmtKind};

/// Upper bound on identifier draws before [`Module::generate_ident`] gives up.
pub const MAX_IDENT_ATTEMPTS: usize = 1024;

/// Deepest `if`/`repeat` nesting a module may hold.
pub const MAX_NESTING: usize = 64;

/// Handle of a procedure inside a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(usize);

/// Handle of a block inside a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

/// Handle of a statement inside a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(usize);

/// A named, callable unit. Owns its body block.
#[derive(Debug, Clone)]
pub struct Procedure {
    ident: Ident,
    body: BlockId,
    attached: bool,
}

impl Procedure {
    pub fn ident(&self) -> Ident {
        self.ident
    }

    pub fn body(&self) -> BlockId {
        self.body
    }

    /// Whether the procedure has been appended to the module's list.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// The container that owns a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOwner {
    Procedure(ProcId),
    Statement(StmtId),
}

/// Ordered statement sequence; order is execution order.
#[derive(Debug, Clone)]
pub struct Block {
    stmts: Vec<StmtId>,
    owner: Option<BlockOwner>,
}

impl Block {
    pub fn statements(&self) -> &[StmtId] {
        &self.stmts
    }

    /// `None` while the block is detached.
    pub fn owner(&self) -> Option<BlockOwner> {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// The top-level program container.
///
/// All procedures, blocks and statements live in arenas owned by the module
/// and are addressed by handle. Back-references (statement to block, block
/// to owner) are stored as handles too, so dropping the module drops the
/// whole program.
///
/// Entities may be created detached and attached later; a detached entity
/// is still owned by the module's arenas but is not reachable from the
/// procedure list.
///
/// Arena slots are never reused: destroying an entity leaves an empty slot
/// behind, so a stale handle can never alias a newer entity. The arenas
/// therefore only grow over the life of a module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Attached procedures in insertion order.
    order: Vec<ProcId>,
    procs: Vec<Option<Procedure>>,
    blocks: Vec<Option<Block>>,
    stmts: Vec<Option<Statement>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached procedures.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn procedure(&self, id: ProcId) -> Option<&Procedure> {
        self.procs.get(id.0)?.as_ref()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)?.as_ref()
    }

    pub fn statement(&self, id: StmtId) -> Option<&Statement> {
        self.stmts.get(id.0)?.as_ref()
    }

    fn procedure_mut(&mut self, id: ProcId) -> Result<&mut Procedure, ModelError> {
        self.procs
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModelError::UnknownProcedure)
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, ModelError> {
        self.blocks
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModelError::UnknownBlock)
    }

    fn statement_mut(&mut self, id: StmtId) -> Result<&mut Statement, ModelError> {
        self.stmts
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModelError::UnknownStatement)
    }

    // -----------------------------------------------------------------------
    // Procedures
    // -----------------------------------------------------------------------

    /// Create a detached procedure with an empty body.
    ///
    /// Fails if any live procedure of this module, attached or not, already
    /// uses `ident`.
    pub fn create_procedure(&mut self, ident: Ident) -> Result<ProcId, ModelError> {
        if self.live_procedure_by_ident(ident).is_some() {
            return Err(ModelError::DuplicateIdent(ident));
        }
        let id = ProcId(self.procs.len());
        let body = self.alloc_block(Some(BlockOwner::Procedure(id)));
        self.procs.push(Some(Procedure {
            ident,
            body,
            attached: false,
        }));
        Ok(id)
    }

    /// Append a detached procedure at the end of the procedure list.
    pub fn append_procedure(&mut self, id: ProcId) -> Result<(), ModelError> {
        let proc = self.procedure_mut(id)?;
        if proc.attached {
            return Err(ModelError::AlreadyAttached(proc.ident));
        }
        proc.attached = true;
        self.order.push(id);
        Ok(())
    }

    /// Destroy a procedure together with its body.
    ///
    /// Destroying an already destroyed procedure is a no-op. A procedure
    /// that is still called from outside its own body cannot be destroyed.
    pub fn destroy_procedure(&mut self, id: ProcId) -> Result<(), ModelError> {
        let Some(proc) = self.procedure(id) else {
            return Ok(());
        };
        let (ident, body) = (proc.ident, proc.body);

        let mut own = Vec::new();
        self.collect_preorder(body, &mut own);
        let referenced = self.stmts.iter().enumerate().any(|(i, slot)| {
            slot.as_ref()
                .is_some_and(|stmt| stmt.kind == StmtKind::Call(id) && !own.contains(&StmtId(i)))
        });
        if referenced {
            return Err(ModelError::ProcedureInUse(ident));
        }

        self.order.retain(|&p| p != id);
        self.procs[id.0] = None;
        self.free_block(body);
        Ok(())
    }

    /// Find an attached procedure by identifier. Linear in module size.
    pub fn procedure_by_ident(&self, ident: Ident) -> Option<ProcId> {
        self.order
            .iter()
            .copied()
            .find(|&id| self.procedure(id).is_some_and(|p| p.ident == ident))
    }

    /// Find any live procedure, attached or not, by identifier.
    pub(crate) fn live_procedure_by_ident(&self, ident: Ident) -> Option<ProcId> {
        self.procs.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref()
                .filter(|p| p.ident == ident)
                .map(|_| ProcId(i))
        })
    }

    /// Draw random identifiers until one is unused in this module.
    pub fn generate_ident(&self) -> Result<Ident, ModelError> {
        self.generate_ident_with(&mut rand::thread_rng())
    }

    /// Like [`generate_ident`](Self::generate_ident) with an explicit source
    /// of randomness.
    pub fn generate_ident_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Ident, ModelError> {
        for attempt in 0..MAX_IDENT_ATTEMPTS {
            let ident = Ident::random(rng);
            if self.live_procedure_by_ident(ident).is_none() {
                return Ok(ident);
            }
            debug!(%ident, attempt, "identifier collision, drawing again");
        }
        Err(ModelError::IdentSpaceExhausted {
            attempts: MAX_IDENT_ATTEMPTS,
        })
    }

    pub fn procedures(&self) -> impl Iterator<Item = ProcId> + '_ {
        self.order.iter().copied()
    }

    pub fn first_procedure(&self) -> Option<ProcId> {
        self.order.first().copied()
    }

    pub fn last_procedure(&self) -> Option<ProcId> {
        self.order.last().copied()
    }

    pub fn next_procedure(&self, cur: ProcId) -> Option<ProcId> {
        let pos = self.order.iter().position(|&p| p == cur)?;
        self.order.get(pos + 1).copied()
    }

    pub fn prev_procedure(&self, cur: ProcId) -> Option<ProcId> {
        let pos = self.order.iter().position(|&p| p == cur)?;
        self.order.get(pos.checked_sub(1)?).copied()
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// Create a detached, empty block (for `if` branches and loop bodies).
    pub fn create_block(&mut self) -> BlockId {
        self.alloc_block(None)
    }

    fn alloc_block(&mut self, owner: Option<BlockOwner>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Some(Block {
            stmts: Vec::new(),
            owner,
        }));
        id
    }

    /// Destroy a detached block and everything in it. No-op if already gone.
    pub fn destroy_block(&mut self, id: BlockId) -> Result<(), ModelError> {
        match self.block(id) {
            None => Ok(()),
            Some(block) if block.owner.is_some() => Err(ModelError::BlockAttached),
            Some(_) => {
                self.free_block(id);
                Ok(())
            }
        }
    }

    /// Append a detached statement at the end of `block`.
    pub fn append_statement(&mut self, block: BlockId, stmt: StmtId) -> Result<(), ModelError> {
        self.block(block).ok_or(ModelError::UnknownBlock)?;
        let statement = self.statement(stmt).ok_or(ModelError::UnknownStatement)?;
        if statement.block.is_some() {
            return Err(ModelError::StatementAttached);
        }
        if self.encloses(stmt, block) {
            return Err(ModelError::Cycle);
        }
        if self.block_depth(block) + self.stmt_height(stmt) > MAX_NESTING {
            return Err(ModelError::NestingTooDeep { limit: MAX_NESTING });
        }
        self.block_mut(block)?.stmts.push(stmt);
        self.statement_mut(stmt)?.block = Some(block);
        Ok(())
    }

    /// Whether `block` is nested somewhere inside `stmt`.
    fn encloses(&self, stmt: StmtId, mut block: BlockId) -> bool {
        loop {
            let Some(BlockOwner::Statement(owner)) = self.block(block).and_then(|b| b.owner) else {
                return false;
            };
            if owner == stmt {
                return true;
            }
            match self.statement(owner).and_then(|s| s.block) {
                Some(parent) => block = parent,
                None => return false,
            }
        }
    }

    /// Number of `if`/`repeat` statements enclosing `block`.
    fn block_depth(&self, mut block: BlockId) -> usize {
        let mut depth = 0;
        while let Some(BlockOwner::Statement(owner)) = self.block(block).and_then(|b| b.owner) {
            depth += 1;
            match self.statement(owner).and_then(|s| s.block) {
                Some(parent) => block = parent,
                None => break,
            }
        }
        depth
    }

    /// Nesting levels a statement adds: zero for simple statements, one
    /// plus the deepest child for `if`/`repeat`.
    fn stmt_height(&self, stmt: StmtId) -> usize {
        self.statement(stmt)
            .map_or(0, |s| self.kind_height(&s.kind))
    }

    fn kind_height(&self, kind: &StmtKind) -> usize {
        let mut children = kind.child_blocks().peekable();
        if children.peek().is_none() {
            return 0;
        }
        1 + children.map(|b| self.block_height(b)).max().unwrap_or(0)
    }

    fn block_height(&self, block: BlockId) -> usize {
        self.block(block).map_or(0, |b| {
            b.stmts
                .iter()
                .map(|&s| self.stmt_height(s))
                .max()
                .unwrap_or(0)
        })
    }

    pub fn first_statement(&self, block: BlockId) -> Option<StmtId> {
        self.block(block)?.stmts.first().copied()
    }

    pub fn last_statement(&self, block: BlockId) -> Option<StmtId> {
        self.block(block)?.stmts.last().copied()
    }

    pub fn next_statement(&self, cur: StmtId) -> Option<StmtId> {
        let (stmts, pos) = self.locate(cur)?;
        stmts.get(pos + 1).copied()
    }

    pub fn prev_statement(&self, cur: StmtId) -> Option<StmtId> {
        let (stmts, pos) = self.locate(cur)?;
        stmts.get(pos.checked_sub(1)?).copied()
    }

    fn locate(&self, stmt: StmtId) -> Option<(&[StmtId], usize)> {
        let block = self.block(self.statement(stmt)?.block?)?;
        let pos = block.stmts.iter().position(|&s| s == stmt)?;
        Some((&block.stmts, pos))
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    pub fn create_intrinsic(&mut self, intrinsic: Intrinsic) -> StmtId {
        self.alloc_statement(StmtKind::Intrinsic(intrinsic))
    }

    pub fn create_call(&mut self, target: ProcId) -> Result<StmtId, ModelError> {
        self.create_statement(StmtKind::Call(target))
    }

    pub fn create_recurse(&mut self) -> StmtId {
        self.alloc_statement(StmtKind::Recurse)
    }

    /// Create a detached statement of any kind.
    ///
    /// Blocks named by an `if` or `repeat` payload must be detached; they are
    /// adopted by the new statement. Call targets must be attached procedures.
    pub fn create_statement(&mut self, kind: StmtKind) -> Result<StmtId, ModelError> {
        if let StmtKind::Call(target) = kind {
            let proc = self.procedure(target).ok_or(ModelError::UnknownProcedure)?;
            if !proc.attached {
                return Err(ModelError::DetachedTarget(proc.ident));
            }
        }
        self.create_adopting(kind)
    }

    /// Create a statement without checking that a call target is attached.
    /// The loader relies on this for forward references.
    pub(crate) fn create_adopting(&mut self, kind: StmtKind) -> Result<StmtId, ModelError> {
        let children: Vec<BlockId> = kind.child_blocks().collect();
        for (i, &child) in children.iter().enumerate() {
            let block = self.block(child).ok_or(ModelError::UnknownBlock)?;
            if block.owner.is_some() || children[..i].contains(&child) {
                return Err(ModelError::BlockAttached);
            }
        }
        if self.kind_height(&kind) > MAX_NESTING {
            return Err(ModelError::NestingTooDeep { limit: MAX_NESTING });
        }
        let id = self.alloc_statement(kind);
        for child in children {
            self.block_mut(child)?.owner = Some(BlockOwner::Statement(id));
        }
        Ok(id)
    }

    fn alloc_statement(&mut self, kind: StmtKind) -> StmtId {
        let id = StmtId(self.stmts.len());
        self.stmts.push(Some(Statement { kind, block: None }));
        id
    }

    /// Destroy a detached statement and its nested blocks. No-op if already gone.
    pub fn destroy_statement(&mut self, id: StmtId) -> Result<(), ModelError> {
        match self.statement(id) {
            None => Ok(()),
            Some(stmt) if stmt.block.is_some() => Err(ModelError::StatementAttached),
            Some(_) => {
                self.free_statement(id);
                Ok(())
            }
        }
    }

    fn free_block(&mut self, id: BlockId) {
        let Some(block) = self.blocks.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for stmt in block.stmts {
            self.free_statement(stmt);
        }
    }

    fn free_statement(&mut self, id: StmtId) {
        let Some(stmt) = self.stmts.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        for child in stmt.kind.child_blocks() {
            self.free_block(child);
        }
    }

    // -----------------------------------------------------------------------
    // Linear statement addressing
    // -----------------------------------------------------------------------

    /// All statements of a procedure in pre-order: each statement comes
    /// before the statements of the blocks it owns.
    pub fn linear_statements(&self, proc: ProcId) -> Option<Vec<StmtId>> {
        let body = self.procedure(proc)?.body;
        let mut out = Vec::new();
        self.collect_preorder(body, &mut out);
        Some(out)
    }

    /// Position of `stmt` in [`linear_statements`](Self::linear_statements).
    pub fn stmt_index(&self, proc: ProcId, stmt: StmtId) -> Option<usize> {
        self.linear_statements(proc)?
            .iter()
            .position(|&s| s == stmt)
    }

    /// Inverse of [`stmt_index`](Self::stmt_index).
    pub fn stmt_by_index(&self, proc: ProcId, index: usize) -> Option<StmtId> {
        self.linear_statements(proc)?.get(index).copied()
    }

    fn collect_preorder(&self, block: BlockId, out: &mut Vec<StmtId>) {
        let Some(block) = self.block(block) else {
            return;
        };
        for &id in &block.stmts {
            out.push(id);
            if let Some(stmt) = self.statement(id) {
                for child in stmt.kind.child_blocks() {
                    self.collect_preorder(child, out);
                }
            }
        }
    }
}
