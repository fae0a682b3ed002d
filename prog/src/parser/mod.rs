pub mod cursor;
pub mod error;

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::ops::Range;

pub use cursor::Cursor;
pub use error::LoadError;

use crate::error::ModelError;
use crate::ident::Ident;
use crate::module::{BlockId, Module, ProcId, StmtId};
use crate::statement::condition::{CondKind, Condition};
use crate::statement::{IfStmt, Intrinsic, RepeatStmt, StmtKind, StmtType};

pub use crate::module::MAX_NESTING;

/// Parser entry point for a stand-alone module file.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source into a Module. Anything after the module record is
    /// an error.
    pub fn parse(&self) -> Result<Module, LoadError> {
        let mut cursor = Cursor::new(&self.source, self.file_id);
        let module = read_module(&mut cursor)?;
        cursor.expect_end()?;
        Ok(module)
    }
}

/// Read one module record at the cursor.
///
/// Call statements may name a procedure whose record appears later in the
/// same module; a call target that never gets a record fails the load.
pub fn read_module(cursor: &mut Cursor<'_>) -> Result<Module, LoadError> {
    ModuleLoader {
        cursor,
        module: Module::new(),
        forward: HashMap::new(),
    }
    .load()
}

struct ModuleLoader<'c, 'a> {
    cursor: &'c mut Cursor<'a>,
    module: Module,
    /// Call targets seen before their own procedure record.
    forward: HashMap<Ident, (ProcId, Range<usize>)>,
}

impl ModuleLoader<'_, '_> {
    fn load(mut self) -> Result<Module, LoadError> {
        let count = self.cursor.read_count("procedure count")?;
        for _ in 0..count {
            self.load_procedure()?;
        }

        if let Some((ident, (_, span))) = self.forward.iter().min_by_key(|(_, (_, span))| span.start)
        {
            return Err(self
                .cursor
                .error(format!("call to undefined procedure {}", ident), span.clone())
                .with_note("every call target needs its own procedure record in the module"));
        }
        Ok(self.module)
    }

    fn model_error(&self, error: ModelError, span: Range<usize>) -> LoadError {
        self.cursor.error(error.to_string(), span)
    }

    fn load_procedure(&mut self) -> Result<(), LoadError> {
        let (ident, span) = self.cursor.read_ident()?;
        let proc = match self.forward.remove(&ident) {
            Some((proc, _)) => proc,
            None => self
                .module
                .create_procedure(ident)
                .map_err(|e| self.model_error(e, span.clone()))?,
        };
        let body = self
            .module
            .procedure(proc)
            .map(|p| p.body())
            .ok_or_else(|| self.model_error(ModelError::UnknownProcedure, span.clone()))?;

        self.load_block_contents(body, 0)?;
        self.module
            .append_procedure(proc)
            .map_err(|e| self.model_error(e, span))
    }

    fn load_block(&mut self, depth: usize) -> Result<BlockId, LoadError> {
        let block = self.module.create_block();
        self.load_block_contents(block, depth)?;
        Ok(block)
    }

    fn load_block_contents(&mut self, block: BlockId, depth: usize) -> Result<(), LoadError> {
        let count = self.cursor.read_count("statement count")?;
        for _ in 0..count {
            let (stmt, span) = self.load_statement(depth)?;
            self.module
                .append_statement(block, stmt)
                .map_err(|e| self.model_error(e, span))?;
        }
        Ok(())
    }

    fn load_statement(&mut self, depth: usize) -> Result<(StmtId, Range<usize>), LoadError> {
        self.cursor.skip_whitespace();
        let start = self.cursor.position();

        let (code, code_span) = self.cursor.read_uint("statement type")?;
        let stype = StmtType::from_code(code).ok_or_else(|| {
            self.cursor.error(
                format!("statement type {} out of range (expected 0-4)", code),
                code_span,
            )
        })?;

        let kind = match stype {
            StmtType::Intrinsic => {
                let (code, span) = self.cursor.read_uint("intrinsic type")?;
                let intrinsic = Intrinsic::from_code(code).ok_or_else(|| {
                    self.cursor.error(
                        format!("intrinsic type {} out of range (expected 0-5)", code),
                        span,
                    )
                })?;
                StmtKind::Intrinsic(intrinsic)
            }
            StmtType::Call => StmtKind::Call(self.resolve_call_target()?),
            StmtType::If => {
                let depth = self.nest(depth, start)?;
                let cond = self.load_condition()?;
                let on_true = self.load_block(depth)?;
                let on_false = if self.cursor.read_flag("false-branch flag")? {
                    Some(self.load_block(depth)?)
                } else {
                    None
                };
                StmtKind::If(IfStmt {
                    cond,
                    on_true,
                    on_false,
                })
            }
            StmtType::Repeat => {
                let depth = self.nest(depth, start)?;
                let (raw, span) = self.cursor.read_uint("repeat count")?;
                let count = u32::try_from(raw).map_err(|_| {
                    self.cursor
                        .error(format!("repeat count {} is too large", raw), span)
                })?;
                let start_cond = if self.cursor.read_flag("start-condition flag")? {
                    Some(self.load_condition()?)
                } else {
                    None
                };
                let body = self.load_block(depth)?;
                let end_cond = if self.cursor.read_flag("end-condition flag")? {
                    Some(self.load_condition()?)
                } else {
                    None
                };
                StmtKind::Repeat(RepeatStmt {
                    count: NonZeroU32::new(count),
                    start: start_cond,
                    body,
                    end: end_cond,
                })
            }
            StmtType::Recurse => {
                self.cursor.expect_literal("R", "recurse marker")?;
                StmtKind::Recurse
            }
        };

        let span = start..self.cursor.position();
        let id = self
            .module
            .create_adopting(kind)
            .map_err(|e| self.model_error(e, span.clone()))?;
        Ok((id, span))
    }

    fn nest(&self, depth: usize, at: usize) -> Result<usize, LoadError> {
        if depth >= MAX_NESTING {
            return Err(self.cursor.error(
                format!("statements nested deeper than {} levels", MAX_NESTING),
                at..at + 1,
            ));
        }
        Ok(depth + 1)
    }

    fn load_condition(&mut self) -> Result<Condition, LoadError> {
        let negated = self.cursor.read_flag("condition negation flag")?;
        let (code, span) = self.cursor.read_uint("condition type")?;
        let kind = CondKind::from_code(code).ok_or_else(|| {
            self.cursor.error(
                format!("condition type {} out of range (expected 0-8)", code),
                span,
            )
        })?;
        Ok(Condition { negated, kind })
    }

    fn resolve_call_target(&mut self) -> Result<ProcId, LoadError> {
        let (ident, span) = self.cursor.read_ident()?;
        if let Some(proc) = self.module.live_procedure_by_ident(ident) {
            return Ok(proc);
        }
        let proc = self
            .module
            .create_procedure(ident)
            .map_err(|e| self.model_error(e, span.clone()))?;
        self.forward.insert(ident, (proc, span));
        Ok(proc)
    }
}
