use prog::{ModelError, StmtType};
use thiserror::Error;

/// Invalid operations on the engine.
///
/// A robot hitting a wall or finding the wrong tile is not an `EngineError`;
/// that is recorded on the robot as a [`RobotFault`](crate::RobotFault).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("robot is not running")]
    NotRunning,
    #[error("robot is busy or halted on an error")]
    Busy,
    #[error("{0} statements cannot be executed")]
    Unsupported(StmtType),
    #[error("continuation stack is empty")]
    EmptyStack,
    #[error("tile ({x}, {y}) is already occupied by a robot")]
    OccupiedTile { x: i32, y: i32 },
    #[error("no robot at ({x}, {y})")]
    NoSuchRobot { x: i32, y: i32 },
    #[error(transparent)]
    Model(#[from] ModelError),
}
