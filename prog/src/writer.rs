use std::io::{self, Write};
use std::num::NonZeroU32;

use crate::ident::Ident;
use crate::module::{BlockId, Module, ProcId, StmtId};
use crate::statement::StmtKind;
use crate::statement::condition::Condition;

/// Write a module record: procedure count, then each procedure in order.
pub fn write_module(module: &Module, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", module.len())?;
    for proc in module.procedures() {
        write_procedure(module, proc, out)?;
    }
    Ok(())
}

/// Write an identifier line.
pub fn write_ident(ident: Ident, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", ident)
}

fn write_procedure(module: &Module, id: ProcId, out: &mut dyn Write) -> io::Result<()> {
    let proc = module.procedure(id).ok_or_else(|| dangling("procedure"))?;
    write_ident(proc.ident(), out)?;
    write_block(module, proc.body(), out)
}

fn write_block(module: &Module, id: BlockId, out: &mut dyn Write) -> io::Result<()> {
    let block = module.block(id).ok_or_else(|| dangling("block"))?;
    writeln!(out, "{}", block.len())?;
    for &stmt in block.statements() {
        write_statement(module, stmt, out)?;
    }
    Ok(())
}

fn write_statement(module: &Module, id: StmtId, out: &mut dyn Write) -> io::Result<()> {
    let stmt = module.statement(id).ok_or_else(|| dangling("statement"))?;
    write!(out, "{} ", stmt.stmt_type().code())?;

    match stmt.kind() {
        StmtKind::Intrinsic(intrinsic) => writeln!(out, "{}", intrinsic.code()),
        StmtKind::Call(target) => {
            let proc = module.procedure(*target).ok_or_else(|| dangling("call target"))?;
            write_ident(proc.ident(), out)
        }
        StmtKind::If(s) => {
            write_condition(&s.cond, out)?;
            write_block(module, s.on_true, out)?;
            writeln!(out, "{}", u8::from(s.on_false.is_some()))?;
            if let Some(on_false) = s.on_false {
                write_block(module, on_false, out)?;
            }
            Ok(())
        }
        StmtKind::Repeat(r) => {
            writeln!(out, "{}", r.count.map_or(0, NonZeroU32::get))?;
            writeln!(out, "{}", u8::from(r.start.is_some()))?;
            if let Some(cond) = &r.start {
                write_condition(cond, out)?;
            }
            write_block(module, r.body, out)?;
            writeln!(out, "{}", u8::from(r.end.is_some()))?;
            if let Some(cond) = &r.end {
                write_condition(cond, out)?;
            }
            Ok(())
        }
        StmtKind::Recurse => writeln!(out, "R"),
    }
}

fn write_condition(cond: &Condition, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{} {}", u8::from(cond.negated), cond.kind.code())
}

// Handles reachable from the procedure list are always live; this only
// fires if a caller bypassed the model API.
fn dangling(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("dangling {} handle", what))
}
