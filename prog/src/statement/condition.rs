use std::fmt;

/// What a condition tests. Wire codes follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondKind {
    /// The tile in front of the robot is a wall.
    Wall,
    WhiteTag,
    GreyTag,
    BlackTag,
    /// The tile under the robot holds a tag of any color.
    AnyTag,
    FacingEast,
    FacingNorth,
    FacingWest,
    FacingSouth,
}

impl CondKind {
    pub const ALL: [CondKind; 9] = [
        CondKind::Wall,
        CondKind::WhiteTag,
        CondKind::GreyTag,
        CondKind::BlackTag,
        CondKind::AnyTag,
        CondKind::FacingEast,
        CondKind::FacingNorth,
        CondKind::FacingWest,
        CondKind::FacingSouth,
    ];

    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(code).ok()?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            CondKind::Wall => "wall",
            CondKind::WhiteTag => "white-tag",
            CondKind::GreyTag => "grey-tag",
            CondKind::BlackTag => "black-tag",
            CondKind::AnyTag => "tag",
            CondKind::FacingEast => "east",
            CondKind::FacingNorth => "north",
            CondKind::FacingWest => "west",
            CondKind::FacingSouth => "south",
        }
    }
}

/// A possibly negated test used by `if` and `repeat` statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    pub negated: bool,
    pub kind: CondKind,
}

impl Condition {
    pub fn new(kind: CondKind) -> Self {
        Condition {
            negated: false,
            kind,
        }
    }

    pub fn not(kind: CondKind) -> Self {
        Condition {
            negated: true,
            kind,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "not ")?;
        }
        write!(f, "{}", self.kind.name())
    }
}
