use std::io::{self, Write};

use prog::parser::{Cursor, LoadError};

/// Largest map side accepted on load.
pub const MAX_MAP_SIDE: usize = 4096;

/// Contents of one map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tile {
    #[default]
    Empty,
    Wall,
    WhiteTag,
    GreyTag,
    BlackTag,
}

impl Tile {
    pub const ALL: [Tile; 5] = [
        Tile::Empty,
        Tile::Wall,
        Tile::WhiteTag,
        Tile::GreyTag,
        Tile::BlackTag,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> Option<Self> {
        usize::try_from(code).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn is_walkable(self) -> bool {
        self != Tile::Wall
    }

    pub fn has_tag(self) -> bool {
        matches!(self, Tile::WhiteTag | Tile::GreyTag | Tile::BlackTag)
    }

    pub fn name(self) -> &'static str {
        match self {
            Tile::Empty => "empty",
            Tile::Wall => "wall",
            Tile::WhiteTag => "white",
            Tile::GreyTag => "grey",
            Tile::BlackTag => "black",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// The world robots act on.
///
/// Coordinates outside the grid read as [`Tile::Wall`], and writes there
/// are dropped (`set_tile` returns `false`).
pub trait Grid {
    fn tile(&self, x: i32, y: i32) -> Tile;
    fn set_tile(&mut self, x: i32, y: i32, tile: Tile) -> bool;
}

/// A rectangular grid stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// An all-empty map.
    pub fn new(width: usize, height: usize) -> Self {
        TileMap {
            width,
            height,
            tiles: vec![Tile::Empty; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// Read a map record: `<w> <h>` followed by `h` rows of tile codes.
    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self, LoadError> {
        let (width, wspan) = cursor.read_uint("map width")?;
        let (height, hspan) = cursor.read_uint("map height")?;
        let side = MAX_MAP_SIDE as u64;
        if width > side || height > side {
            return Err(cursor
                .error(
                    format!("map size {}x{} is too large", width, height),
                    wspan.start..hspan.end,
                )
                .with_note(format!("each side must be at most {}", MAX_MAP_SIDE)));
        }

        let mut map = TileMap::new(width as usize, height as usize);
        for tile in map.tiles.iter_mut() {
            let (code, span) = cursor.read_uint("tile code")?;
            *tile = Tile::from_code(code).ok_or_else(|| {
                cursor.error(
                    format!("tile code {} out of range (expected 0-4)", code),
                    span,
                )
            })?;
        }
        Ok(map)
    }

    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{} {}", self.width, self.height)?;
        writeln!(out)?;
        if self.width == 0 {
            return Ok(());
        }
        for row in self.tiles.chunks(self.width) {
            let codes: Vec<String> = row.iter().map(|t| t.code().to_string()).collect();
            writeln!(out, "{}", codes.join(" "))?;
        }
        Ok(())
    }
}

impl Grid for TileMap {
    fn tile(&self, x: i32, y: i32) -> Tile {
        self.index(x, y).map_or(Tile::Wall, |i| self.tiles[i])
    }

    fn set_tile(&mut self, x: i32, y: i32, tile: Tile) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }
}
