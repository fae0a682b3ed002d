use std::io::{self, Write};

use prog::parser::{Cursor, LoadError, read_module};
use prog::writer::write_module;
use prog::{Module, ProcId};
use tracing::debug;

use crate::error::EngineError;
use crate::grid::TileMap;
use crate::robots::Robots;

/// A whole saved world: the map, the program and the robots on it.
///
/// The module record precedes the robots so that their resume points can
/// be resolved on load.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub map: TileMap,
    pub module: Module,
    pub robots: Robots,
}

/// How [`Session::run_until_idle`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundsRun {
    pub rounds: usize,
    /// Robots were still busy when the round limit was reached.
    pub limit_hit: bool,
}

impl Session {
    pub fn new(map: TileMap) -> Self {
        Session {
            map,
            module: Module::new(),
            robots: Robots::new(),
        }
    }

    pub fn parse(source: &str, file_id: usize) -> Result<Self, LoadError> {
        let mut cursor = Cursor::new(source, file_id);
        let map = TileMap::read(&mut cursor)?;
        let module = read_module(&mut cursor)?;
        let robots = Robots::read(&mut cursor, &module, &map)?;
        cursor.expect_end()?;
        Ok(Session {
            map,
            module,
            robots,
        })
    }

    pub fn save(&self, out: &mut dyn Write) -> io::Result<()> {
        self.map.write(out)?;
        write_module(&self.module, out)?;
        self.robots.write(&self.module, out)
    }

    /// Start `proc` on every idle robot.
    pub fn start(&mut self, proc: ProcId) -> Result<usize, EngineError> {
        self.robots.run_procedure_all(&self.module, proc)
    }

    /// Run rounds until no robot can step or `max_rounds` have run.
    ///
    /// A step error ends the run after the round it happened in.
    pub fn run_until_idle(&mut self, max_rounds: usize) -> Result<RoundsRun, EngineError> {
        let mut rounds = 0;
        while self.robots.is_busy() {
            if rounds == max_rounds {
                debug!(rounds, "round limit reached");
                return Ok(RoundsRun {
                    rounds,
                    limit_hit: true,
                });
            }
            let outcomes = self.robots.step_all(&self.module, &mut self.map);
            rounds += 1;
            // The round is complete; report the first robot that failed.
            if let Some(error) = outcomes.into_iter().find_map(Result::err) {
                return Err(error);
            }
        }
        Ok(RoundsRun {
            rounds,
            limit_hit: false,
        })
    }
}
