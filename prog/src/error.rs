use thiserror::Error;

use crate::ident::Ident;

/// Misuse of the program model's structural API.
///
/// These never describe malformed input text (see
/// [`LoadError`](crate::parser::LoadError)); they report a caller handing the
/// model a handle or entity that is in the wrong state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("unknown procedure handle")]
    UnknownProcedure,
    #[error("unknown block handle")]
    UnknownBlock,
    #[error("unknown statement handle")]
    UnknownStatement,
    #[error("invalid procedure identifier '{0}': expected 8 letters A-Z")]
    InvalidIdent(String),
    #[error("procedure identifier {0} is already in use")]
    DuplicateIdent(Ident),
    #[error("procedure {0} is already part of the module")]
    AlreadyAttached(Ident),
    #[error("call target {0} is not part of the module")]
    DetachedTarget(Ident),
    #[error("procedure {0} is still the target of a call")]
    ProcedureInUse(Ident),
    #[error("block already belongs to a procedure or statement")]
    BlockAttached,
    #[error("statement already belongs to a block")]
    StatementAttached,
    #[error("statement cannot be placed inside its own body")]
    Cycle,
    #[error("statements nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
    #[error("no unused procedure identifier found after {attempts} attempts")]
    IdentSpaceExhausted { attempts: usize },
}
