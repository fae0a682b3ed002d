use std::io::{self, Write};

use prog::parser::{Cursor, LoadError};
use prog::writer::write_ident;
use prog::{Intrinsic, ModelError, Module, ProcId, StmtId, StmtKind};
use thiserror::Error;
use tracing::{debug, trace};

use crate::direction::Direction;
use crate::error::EngineError;
use crate::grid::{Grid, Tile};
use crate::rstack::{ContinuationStack, read_resume_point, resume_point};

/// A grid precondition violated by an intrinsic. The robot keeps it until
/// it is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RobotFault {
    #[error("robot hit a wall")]
    HitWall,
    #[error("tile already holds a tag")]
    AlreadyTag,
    #[error("no tag to pick up")]
    NoTag,
}

impl RobotFault {
    /// Persisted code. `0` is reserved for a healthy robot.
    pub fn code(self) -> u64 {
        match self {
            RobotFault::HitWall => 1,
            RobotFault::AlreadyTag => 2,
            RobotFault::NoTag => 3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(RobotFault::HitWall),
            2 => Some(RobotFault::AlreadyTag),
            3 => Some(RobotFault::NoTag),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RobotFault::HitWall => "hit-wall",
            RobotFault::AlreadyTag => "already-tag",
            RobotFault::NoTag => "no-tag",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [RobotFault::HitWall, RobotFault::AlreadyTag, RobotFault::NoTag]
            .into_iter()
            .find(|f| f.name() == name)
    }
}

/// What a single [`Robot::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Moved on to the next statement of the same block.
    Advanced,
    /// Entered a procedure. `tail` calls recorded no continuation.
    Called { tail: bool },
    /// Finished a block and resumed at a popped continuation.
    Returned,
    /// Finished the outermost block; the robot is idle.
    Finished,
    /// The intrinsic failed; the robot did not advance.
    Faulted(RobotFault),
}

/// Why [`Robot::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Idle,
    Faulted(RobotFault),
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub halt: Halt,
    pub steps: usize,
}

/// A robot and its execution state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Robot {
    x: i32,
    y: i32,
    dir: Direction,
    stack: ContinuationStack,
    cur_proc: Option<ProcId>,
    cur_stmt: Option<StmtId>,
    fault: Option<RobotFault>,
}

impl Robot {
    pub fn new(x: i32, y: i32, dir: Direction) -> Self {
        Robot {
            x,
            y,
            dir,
            stack: ContinuationStack::new(),
            cur_proc: None,
            cur_stmt: None,
            fault: None,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn direction(&self) -> Direction {
        self.dir
    }

    pub fn stack(&self) -> &ContinuationStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut ContinuationStack {
        &mut self.stack
    }

    pub fn current_procedure(&self) -> Option<ProcId> {
        self.cur_proc
    }

    /// The statement the next `step` executes, or the one that faulted.
    pub fn current_statement(&self) -> Option<StmtId> {
        self.cur_stmt
    }

    pub fn error(&self) -> Option<RobotFault> {
        self.fault
    }

    pub fn is_busy(&self) -> bool {
        self.cur_stmt.is_some()
    }

    /// Start executing `proc` from its first statement.
    ///
    /// The continuation stack is left as it is. An empty body leaves the
    /// robot idle.
    pub fn run_procedure(&mut self, module: &Module, proc: ProcId) -> Result<(), EngineError> {
        if self.is_busy() || self.fault.is_some() {
            return Err(EngineError::Busy);
        }
        let entry = entry_point(module, proc)?;
        debug!(
            x = self.x,
            y = self.y,
            proc = %module_ident(module, proc),
            "run procedure"
        );
        self.enter(proc, entry);
        Ok(())
    }

    /// Execute the current statement.
    pub fn step(&mut self, module: &Module, grid: &mut dyn Grid) -> Result<StepOutcome, EngineError> {
        if self.fault.is_some() {
            return Err(EngineError::NotRunning);
        }
        let (Some(proc), Some(cur)) = (self.cur_proc, self.cur_stmt) else {
            return Err(EngineError::NotRunning);
        };
        let stmt = module
            .statement(cur)
            .ok_or(EngineError::Model(ModelError::UnknownStatement))?;
        trace!(x = self.x, y = self.y, stmt = %stmt.stmt_type(), "step");

        match *stmt.kind() {
            StmtKind::Intrinsic(intrinsic) => {
                if let Err(fault) = self.perform(intrinsic, grid) {
                    debug!(
                        x = self.x,
                        y = self.y,
                        action = intrinsic.name(),
                        fault = fault.name(),
                        "robot faulted"
                    );
                    self.fault = Some(fault);
                    return Ok(StepOutcome::Faulted(fault));
                }
                match module.next_statement(cur) {
                    Some(next) => {
                        self.cur_stmt = Some(next);
                        Ok(StepOutcome::Advanced)
                    }
                    None => self.leave_block(module),
                }
            }
            StmtKind::Call(target) => {
                let entry = entry_point(module, target)?;
                let tail = match module.next_statement(cur) {
                    Some(next) => {
                        self.stack.push(proc, next);
                        false
                    }
                    None => true,
                };
                debug!(
                    callee = %module_ident(module, target),
                    tail,
                    depth = self.stack.len(),
                    "call"
                );
                self.enter(target, entry);
                if !self.is_busy() {
                    // Empty callee: its body is already finished.
                    return self.leave_block(module);
                }
                Ok(StepOutcome::Called { tail })
            }
            other => Err(EngineError::Unsupported(other.stmt_type())),
        }
    }

    /// Drop the fault and the instruction pointer. The continuation stack
    /// is kept.
    pub fn reset(&mut self) {
        self.fault = None;
        self.cur_stmt = None;
        self.cur_proc = None;
    }

    /// Drop only the fault. A robot that was mid-run retries the statement
    /// that faulted on its next step.
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// Step until the robot goes idle, faults, or `limit` steps have run.
    pub fn run(
        &mut self,
        module: &Module,
        grid: &mut dyn Grid,
        limit: usize,
    ) -> Result<RunOutcome, EngineError> {
        let mut steps = 0;
        loop {
            if let Some(fault) = self.fault {
                return Ok(RunOutcome {
                    halt: Halt::Faulted(fault),
                    steps,
                });
            }
            if !self.is_busy() {
                return Ok(RunOutcome {
                    halt: Halt::Idle,
                    steps,
                });
            }
            if steps == limit {
                return Ok(RunOutcome {
                    halt: Halt::StepLimit,
                    steps,
                });
            }
            self.step(module, grid)?;
            steps += 1;
        }
    }

    fn enter(&mut self, proc: ProcId, entry: Option<StmtId>) {
        self.cur_proc = entry.map(|_| proc);
        self.cur_stmt = entry;
    }

    fn leave_block(&mut self, module: &Module) -> Result<StepOutcome, EngineError> {
        loop {
            if self.stack.is_empty() {
                debug!(x = self.x, y = self.y, "procedure finished");
                self.cur_proc = None;
                self.cur_stmt = None;
                return Ok(StepOutcome::Finished);
            }
            let resume = self.stack.pop()?;
            trace!(
                proc = %module_ident(module, resume.proc),
                depth = self.stack.len(),
                "return"
            );
            if resume_point(module, resume.proc, resume.stmt).is_some() {
                self.cur_proc = Some(resume.proc);
                self.cur_stmt = Some(resume.stmt);
                return Ok(StepOutcome::Returned);
            }
        }
    }

    fn perform(&mut self, intrinsic: Intrinsic, grid: &mut dyn Grid) -> Result<(), RobotFault> {
        match intrinsic {
            Intrinsic::TurnLeft => self.dir = self.dir.next_ccw(),
            Intrinsic::Move => {
                let (dx, dy) = self.dir.offset();
                // No coordinate exists past the i32 range, so that is a wall too.
                let (Some(nx), Some(ny)) = (self.x.checked_add(dx), self.y.checked_add(dy)) else {
                    return Err(RobotFault::HitWall);
                };
                if !grid.tile(nx, ny).is_walkable() {
                    return Err(RobotFault::HitWall);
                }
                self.x = nx;
                self.y = ny;
            }
            Intrinsic::PutWhite => self.put_tag(grid, Tile::WhiteTag)?,
            Intrinsic::PutGrey => self.put_tag(grid, Tile::GreyTag)?,
            Intrinsic::PutBlack => self.put_tag(grid, Tile::BlackTag)?,
            Intrinsic::PickUp => {
                if !grid.tile(self.x, self.y).has_tag() {
                    return Err(RobotFault::NoTag);
                }
                grid.set_tile(self.x, self.y, Tile::Empty);
            }
        }
        Ok(())
    }

    fn put_tag(&self, grid: &mut dyn Grid, tag: Tile) -> Result<(), RobotFault> {
        if grid.tile(self.x, self.y) != Tile::Empty {
            return Err(RobotFault::AlreadyTag);
        }
        grid.set_tile(self.x, self.y, tag);
        Ok(())
    }

    /// Write the robot record: position, facing and fault, the current
    /// resume point if mid-run, then the continuation stack.
    pub fn write(&self, module: &Module, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{} {} {} {}",
            self.x,
            self.y,
            self.dir.code(),
            self.fault.map_or(0, RobotFault::code)
        )?;
        // A current statement that was destroyed under the robot saves as
        // idle.
        let current = self
            .cur_proc
            .zip(self.cur_stmt)
            .and_then(|(proc, stmt)| resume_point(module, proc, stmt));
        match current {
            Some((ident, index)) => {
                writeln!(out, "1")?;
                write_ident(ident, out)?;
                writeln!(out, "{}", index)?;
            }
            None => writeln!(out, "0")?,
        }
        self.stack.write(module, out)
    }

    pub fn read(cursor: &mut Cursor<'_>, module: &Module) -> Result<Self, LoadError> {
        let x = read_coord(cursor, "robot x")?;
        let y = read_coord(cursor, "robot y")?;
        let (code, span) = cursor.read_uint("robot direction")?;
        let dir = Direction::from_code(code).ok_or_else(|| {
            cursor.error(
                format!("direction {} out of range (expected 0-3)", code),
                span,
            )
        })?;
        let (code, span) = cursor.read_uint("robot fault")?;
        let fault = match code {
            0 => None,
            code => Some(RobotFault::from_code(code).ok_or_else(|| {
                cursor.error(format!("fault {} out of range (expected 0-3)", code), span)
            })?),
        };

        let mut robot = Robot::new(x, y, dir);
        robot.fault = fault;
        if cursor.read_flag("current-statement flag")? {
            let (proc, stmt) = read_resume_point(cursor, module)?;
            robot.cur_proc = Some(proc);
            robot.cur_stmt = Some(stmt);
        }
        robot.stack = ContinuationStack::read(cursor, module)?;
        Ok(robot)
    }
}

fn read_coord(cursor: &mut Cursor<'_>, what: &str) -> Result<i32, LoadError> {
    let (value, span) = cursor.read_int(what)?;
    i32::try_from(value).map_err(|_| cursor.error(format!("{} {} is out of range", what, value), span))
}

fn entry_point(module: &Module, proc: ProcId) -> Result<Option<StmtId>, EngineError> {
    let body = module
        .procedure(proc)
        .ok_or(ModelError::UnknownProcedure)?
        .body();
    Ok(module.first_statement(body))
}

fn module_ident(module: &Module, proc: ProcId) -> String {
    module
        .procedure(proc)
        .map_or_else(|| "?".to_string(), |p| p.ident().to_string())
}
