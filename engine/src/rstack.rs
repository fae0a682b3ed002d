use std::io::{self, Write};

use prog::parser::{Cursor, LoadError};
use prog::writer::write_ident;
use prog::{Ident, Module, ProcId, StmtId};

use crate::error::EngineError;

/// A resume point recorded by a non-tail call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub proc: ProcId,
    pub stmt: StmtId,
}

/// Return addresses of a robot's in-flight calls, newest last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationStack {
    entries: Vec<Continuation>,
}

impl ContinuationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, proc: ProcId, stmt: StmtId) {
        self.entries.push(Continuation { proc, stmt });
    }

    pub fn pop(&mut self) -> Result<Continuation, EngineError> {
        self.entries.pop().ok_or(EngineError::EmptyStack)
    }

    pub fn peek(&self) -> Option<&Continuation> {
        self.entries.last()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Continuation> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Write the stack oldest first. Each entry is stored as the
    /// procedure identifier and the statement's linear index, since
    /// handles do not survive a reload. Entries whose statement no longer
    /// exists are left out; stepping would skip them anyway.
    pub fn write(&self, module: &Module, out: &mut dyn Write) -> io::Result<()> {
        let live: Vec<(Ident, usize)> = self
            .entries
            .iter()
            .filter_map(|c| resume_point(module, c.proc, c.stmt))
            .collect();
        writeln!(out, "{}", live.len())?;
        for (ident, index) in live {
            write_ident(ident, out)?;
            writeln!(out, "{}", index)?;
        }
        Ok(())
    }

    /// Read a stack record, resolving entries against `module`.
    pub fn read(cursor: &mut Cursor<'_>, module: &Module) -> Result<Self, LoadError> {
        let count = cursor.read_count("continuation count")?;
        let mut stack = ContinuationStack::new();
        for _ in 0..count {
            let (proc, stmt) = read_resume_point(cursor, module)?;
            stack.push(proc, stmt);
        }
        Ok(stack)
    }
}

/// The persisted form of a (procedure, statement) pair, if both are still
/// part of the module.
pub(crate) fn resume_point(module: &Module, proc: ProcId, stmt: StmtId) -> Option<(Ident, usize)> {
    let ident = module.procedure(proc)?.ident();
    let index = module.stmt_index(proc, stmt)?;
    Some((ident, index))
}

pub(crate) fn read_resume_point(
    cursor: &mut Cursor<'_>,
    module: &Module,
) -> Result<(ProcId, StmtId), LoadError> {
    let (ident, ident_span) = cursor.read_ident()?;
    let proc = module.procedure_by_ident(ident).ok_or_else(|| {
        cursor.error(
            format!("resume point names unknown procedure {}", ident),
            ident_span,
        )
    })?;
    let (index, span) = cursor.read_uint("statement index")?;
    let stmt = usize::try_from(index)
        .ok()
        .and_then(|i| module.stmt_by_index(proc, i))
        .ok_or_else(|| {
            cursor.error(
                format!("procedure {} has no statement {}", ident, index),
                span,
            )
        })?;
    Ok((proc, stmt))
}
