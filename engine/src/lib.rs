pub mod direction;
pub mod error;
pub mod grid;
pub mod robot;
pub mod robots;
pub mod rstack;
pub mod session;

pub use direction::Direction;
pub use error::EngineError;
pub use grid::{Grid, Tile, TileMap};
pub use robot::{Halt, Robot, RobotFault, RunOutcome, StepOutcome};
pub use robots::Robots;
pub use rstack::{Continuation, ContinuationStack};
pub use session::{RoundsRun, Session};
