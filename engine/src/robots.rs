use std::io::{self, Write};

use prog::parser::{Cursor, LoadError};
use prog::{Module, ProcId};
use tracing::debug;

use crate::direction::Direction;
use crate::error::EngineError;
use crate::grid::{Grid, TileMap};
use crate::robot::{Robot, StepOutcome};

/// All robots sharing one grid, in insertion order.
///
/// [`Robots::add`] refuses an occupied tile, but moving robots do not block
/// each other, so two robots can end a round on the same tile. Such a state
/// still saves and loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Robots {
    robots: Vec<Robot>,
}

impl Robots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Robot> {
        self.robots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Robot> {
        self.robots.iter_mut()
    }

    /// Place a new robot on a free tile.
    pub fn add(&mut self, x: i32, y: i32, dir: Direction) -> Result<&mut Robot, EngineError> {
        if self.get(x, y).is_some() {
            return Err(EngineError::OccupiedTile { x, y });
        }
        self.robots.push(Robot::new(x, y, dir));
        let last = self.robots.len() - 1;
        Ok(&mut self.robots[last])
    }

    /// Remove the first robot at `(x, y)`, if any.
    pub fn remove(&mut self, x: i32, y: i32) -> Option<Robot> {
        let index = self.robots.iter().position(|r| r.position() == (x, y))?;
        Some(self.robots.remove(index))
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Robot> {
        self.robots.iter().find(|r| r.position() == (x, y))
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> Result<&mut Robot, EngineError> {
        self.robots
            .iter_mut()
            .find(|r| r.position() == (x, y))
            .ok_or(EngineError::NoSuchRobot { x, y })
    }

    /// Start `proc` on every idle, healthy robot. Returns how many started.
    pub fn run_procedure_all(&mut self, module: &Module, proc: ProcId) -> Result<usize, EngineError> {
        let mut started = 0;
        for robot in self.robots.iter_mut() {
            if robot.is_busy() || robot.error().is_some() {
                continue;
            }
            robot.run_procedure(module, proc)?;
            if robot.is_busy() {
                started += 1;
            }
        }
        Ok(started)
    }

    /// One round: step every busy, healthy robot once, in insertion order.
    /// Each robot sees the grid as left by the robots before it.
    ///
    /// A robot whose step fails does not stop the round; its error is
    /// reported in its slot and the remaining robots still step.
    pub fn step_all(
        &mut self,
        module: &Module,
        grid: &mut dyn Grid,
    ) -> Vec<Result<StepOutcome, EngineError>> {
        let mut outcomes = Vec::new();
        for robot in self.robots.iter_mut() {
            if !robot.is_busy() || robot.error().is_some() {
                continue;
            }
            outcomes.push(robot.step(module, grid));
        }
        debug!(stepped = outcomes.len(), "round");
        outcomes
    }

    /// Whether any robot can still step.
    pub fn is_busy(&self) -> bool {
        self.robots
            .iter()
            .any(|r| r.is_busy() && r.error().is_none())
    }

    pub fn write(&self, module: &Module, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.robots.len())?;
        for robot in &self.robots {
            robot.write(module, out)?;
        }
        Ok(())
    }

    /// Read a robots record. Every robot must stand on `map`.
    pub fn read(cursor: &mut Cursor<'_>, module: &Module, map: &TileMap) -> Result<Self, LoadError> {
        let count = cursor.read_count("robot count")?;
        let mut robots = Robots::new();
        for _ in 0..count {
            cursor.skip_whitespace();
            let start = cursor.position();
            let robot = Robot::read(cursor, module)?;
            let (x, y) = robot.position();
            if !map.in_bounds(x, y) {
                return Err(cursor.error(
                    format!(
                        "robot at ({}, {}) is outside the {}x{} map",
                        x,
                        y,
                        map.width(),
                        map.height()
                    ),
                    start..cursor.position(),
                ));
            }
            robots.robots.push(robot);
        }
        Ok(robots)
    }
}
