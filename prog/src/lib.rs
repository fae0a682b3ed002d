pub mod error;
pub mod ident;
pub mod module;
pub mod parser;
pub mod statement;
pub mod writer;

pub use error::ModelError;
pub use ident::Ident;
pub use module::{Block, BlockId, BlockOwner, Module, ProcId, Procedure, StmtId};
pub use statement::condition::{CondKind, Condition};
pub use statement::{IfStmt, Intrinsic, RepeatStmt, Statement, StmtKind, StmtType};
