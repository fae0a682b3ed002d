use crate::module::{BlockId, Module, StmtId};
use crate::statement::StmtKind;

/// Structural equality: same procedures in the same order with the same
/// identifiers and statement trees. Handles are arena positions and are not
/// compared; call targets are compared by identifier.
impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.order.len() == other.order.len()
            && self
                .procedures()
                .zip(other.procedures())
                .all(|(a, b)| match (self.procedure(a), other.procedure(b)) {
                    (Some(pa), Some(pb)) => {
                        pa.ident == pb.ident && self.block_eq(pa.body, other, pb.body)
                    }
                    _ => false,
                })
    }
}

impl Module {
    fn block_eq(&self, a: BlockId, other: &Module, b: BlockId) -> bool {
        match (self.block(a), other.block(b)) {
            (Some(ba), Some(bb)) => {
                ba.stmts.len() == bb.stmts.len()
                    && ba
                        .stmts
                        .iter()
                        .zip(&bb.stmts)
                        .all(|(&sa, &sb)| self.stmt_eq(sa, other, sb))
            }
            _ => false,
        }
    }

    fn stmt_eq(&self, a: StmtId, other: &Module, b: StmtId) -> bool {
        let (Some(sa), Some(sb)) = (self.statement(a), other.statement(b)) else {
            return false;
        };
        match (&sa.kind, &sb.kind) {
            (StmtKind::Intrinsic(x), StmtKind::Intrinsic(y)) => x == y,
            (StmtKind::Call(x), StmtKind::Call(y)) => {
                match (self.procedure(*x), other.procedure(*y)) {
                    (Some(px), Some(py)) => px.ident == py.ident,
                    _ => false,
                }
            }
            (StmtKind::If(x), StmtKind::If(y)) => {
                x.cond == y.cond
                    && self.block_eq(x.on_true, other, y.on_true)
                    && match (x.on_false, y.on_false) {
                        (None, None) => true,
                        (Some(fx), Some(fy)) => self.block_eq(fx, other, fy),
                        _ => false,
                    }
            }
            (StmtKind::Repeat(x), StmtKind::Repeat(y)) => {
                x.count == y.count
                    && x.start == y.start
                    && x.end == y.end
                    && self.block_eq(x.body, other, y.body)
            }
            (StmtKind::Recurse, StmtKind::Recurse) => true,
            _ => false,
        }
    }
}
