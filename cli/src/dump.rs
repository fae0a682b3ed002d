use std::io::{self, Write};

use engine::{Grid, Session, Tile};
use prog::{BlockId, Module, ProcId, StmtId, StmtKind};

pub fn dump_session(session: &Session, out: &mut dyn Write) -> io::Result<()> {
    dump_map(session, out)?;
    writeln!(out)?;
    dump_module(&session.module, out)?;
    writeln!(out)?;
    for robot in session.robots.iter() {
        writeln!(out, "{}", crate::robot_report(robot))?;
        if let (Some(proc), Some(stmt)) = (robot.current_procedure(), robot.current_statement()) {
            write_resume_point(&session.module, "at", proc, stmt, out)?;
        }
        for entry in robot.stack().iter().rev() {
            write_resume_point(&session.module, "returns to", entry.proc, entry.stmt, out)?;
        }
    }
    Ok(())
}

fn write_resume_point(
    module: &Module,
    label: &str,
    proc: ProcId,
    stmt: StmtId,
    out: &mut dyn Write,
) -> io::Result<()> {
    if let (Some(procedure), Some(index)) = (module.procedure(proc), module.stmt_index(proc, stmt)) {
        writeln!(out, "  {} {} statement {}", label, procedure.ident(), index)?;
    }
    Ok(())
}

/// One character per tile; robots are drawn as `R`.
fn dump_map(session: &Session, out: &mut dyn Write) -> io::Result<()> {
    let map = &session.map;
    for y in 0..map.height() as i32 {
        let row: String = (0..map.width() as i32)
            .map(|x| {
                if session.robots.get(x, y).is_some() {
                    return 'R';
                }
                match map.tile(x, y) {
                    Tile::Empty => '.',
                    Tile::Wall => '#',
                    Tile::WhiteTag => 'w',
                    Tile::GreyTag => 'g',
                    Tile::BlackTag => 'b',
                }
            })
            .collect();
        writeln!(out, "{}", row)?;
    }
    Ok(())
}

fn dump_module(module: &Module, out: &mut dyn Write) -> io::Result<()> {
    for proc in module.procedures() {
        let Some(procedure) = module.procedure(proc) else {
            continue;
        };
        writeln!(out, "procedure {}", procedure.ident())?;
        dump_block(module, procedure.body(), 1, out)?;
    }
    Ok(())
}

fn dump_block(module: &Module, block: BlockId, depth: usize, out: &mut dyn Write) -> io::Result<()> {
    let Some(block) = module.block(block) else {
        return Ok(());
    };
    let pad = "  ".repeat(depth);
    for &id in block.statements() {
        let Some(stmt) = module.statement(id) else {
            continue;
        };
        match stmt.kind() {
            StmtKind::Intrinsic(i) => writeln!(out, "{}{}", pad, i.name())?,
            StmtKind::Call(target) => {
                let name = module
                    .procedure(*target)
                    .map_or_else(|| "?".to_string(), |p| p.ident().to_string());
                writeln!(out, "{}call {}", pad, name)?;
            }
            StmtKind::If(s) => {
                writeln!(out, "{}if {}", pad, s.cond)?;
                dump_block(module, s.on_true, depth + 1, out)?;
                if let Some(on_false) = s.on_false {
                    writeln!(out, "{}else", pad)?;
                    dump_block(module, on_false, depth + 1, out)?;
                }
            }
            StmtKind::Repeat(r) => {
                let mut header = format!("{}repeat", pad);
                if let Some(count) = r.count {
                    header.push_str(&format!(" {} times", count));
                }
                if let Some(cond) = &r.start {
                    header.push_str(&format!(" while {}", cond));
                }
                writeln!(out, "{}", header)?;
                dump_block(module, r.body, depth + 1, out)?;
                if let Some(cond) = &r.end {
                    writeln!(out, "{}until {}", pad, cond)?;
                }
            }
            StmtKind::Recurse => writeln!(out, "{}recurse", pad)?,
        }
    }
    Ok(())
}
