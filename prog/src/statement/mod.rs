pub mod condition;

use std::fmt;
use std::num::NonZeroU32;

use crate::module::{BlockId, ProcId};
use crate::statement::condition::Condition;

/// One of the six built-in robot actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    TurnLeft,
    Move,
    PutWhite,
    PutGrey,
    PutBlack,
    PickUp,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 6] = [
        Intrinsic::TurnLeft,
        Intrinsic::Move,
        Intrinsic::PutWhite,
        Intrinsic::PutGrey,
        Intrinsic::PutBlack,
        Intrinsic::PickUp,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(code).ok()?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::TurnLeft => "turn-left",
            Intrinsic::Move => "move",
            Intrinsic::PutWhite => "put-white",
            Intrinsic::PutGrey => "put-grey",
            Intrinsic::PutBlack => "put-black",
            Intrinsic::PickUp => "pick-up",
        }
    }
}

/// Discriminant of [`StmtKind`], also its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtType {
    Intrinsic,
    Call,
    If,
    Repeat,
    Recurse,
}

impl StmtType {
    pub const ALL: [StmtType; 5] = [
        StmtType::Intrinsic,
        StmtType::Call,
        StmtType::If,
        StmtType::Repeat,
        StmtType::Recurse,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(code).ok()?).copied()
    }
}

impl fmt::Display for StmtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StmtType::Intrinsic => "intrinsic",
            StmtType::Call => "call",
            StmtType::If => "if",
            StmtType::Repeat => "repeat",
            StmtType::Recurse => "recurse",
        };
        f.write_str(name)
    }
}

/// Conditional: `on_false` is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfStmt {
    pub cond: Condition,
    pub on_true: BlockId,
    pub on_false: Option<BlockId>,
}

/// Loop over `body`.
///
/// With a `count` the body runs that many times; without one the optional
/// start and end conditions govern entry and exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatStmt {
    pub count: Option<NonZeroU32>,
    pub start: Option<Condition>,
    pub body: BlockId,
    pub end: Option<Condition>,
}

/// Statement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmtKind {
    Intrinsic(Intrinsic),
    /// Call a procedure of the same module. Referenced, not owned.
    Call(ProcId),
    If(IfStmt),
    Repeat(RepeatStmt),
    /// Re-enter the enclosing procedure.
    Recurse,
}

impl StmtKind {
    pub fn stmt_type(&self) -> StmtType {
        match self {
            StmtKind::Intrinsic(_) => StmtType::Intrinsic,
            StmtKind::Call(_) => StmtType::Call,
            StmtKind::If(_) => StmtType::If,
            StmtKind::Repeat(_) => StmtType::Repeat,
            StmtKind::Recurse => StmtType::Recurse,
        }
    }

    /// Blocks owned by this statement, in pre-order.
    pub fn child_blocks(&self) -> impl Iterator<Item = BlockId> {
        let (first, second) = match self {
            StmtKind::If(s) => (Some(s.on_true), s.on_false),
            StmtKind::Repeat(r) => (Some(r.body), None),
            _ => (None, None),
        };
        first.into_iter().chain(second)
    }
}

/// A statement stored in a module's arena.
#[derive(Debug, Clone)]
pub struct Statement {
    pub(crate) kind: StmtKind,
    /// Containing block, `None` while detached.
    pub(crate) block: Option<BlockId>,
}

impl Statement {
    pub fn kind(&self) -> &StmtKind {
        &self.kind
    }

    pub fn stmt_type(&self) -> StmtType {
        self.kind.stmt_type()
    }

    pub fn block(&self) -> Option<BlockId> {
        self.block
    }
}
