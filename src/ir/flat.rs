//! Flatness predicates
//!
//! Flat IR has at most one operation per statement: every operand is an
//! atom (`RdTmp` or `Const`). The engine's optimizer leaves blocks flat, and
//! hosts use this to decide whether a block still needs flattening.

use super::arena::{BlockId, ExprId, IrArena, StmtId};
use super::node::{Expr, Stmt};

/// Returns true for `RdTmp` and `Const`
pub fn is_atom(arena: &IrArena, id: ExprId) -> bool {
    matches!(arena.expr(id), Expr::RdTmp(_) | Expr::Const(_))
}

fn atoms(arena: &IrArena, ids: &[ExprId]) -> bool {
    ids.iter().all(|&id| is_atom(arena, id))
}

fn opt_atom(arena: &IrArena, id: Option<ExprId>) -> bool {
    id.map_or(true, |id| is_atom(arena, id))
}

/// Returns true if the expression applies at most one operation to atoms
pub fn is_flat_expr(arena: &IrArena, id: ExprId) -> bool {
    match arena.expr(id) {
        Expr::Binder(_) | Expr::Get { .. } | Expr::RdTmp(_) | Expr::Const(_) => true,
        Expr::GetI { ix, .. } => is_atom(arena, *ix),
        Expr::Qop { args, .. } => atoms(arena, args),
        Expr::Triop { args, .. } => atoms(arena, args),
        Expr::Binop { args, .. } => atoms(arena, args),
        Expr::Unop { arg, .. } => is_atom(arena, *arg),
        Expr::Load { addr, .. } => is_atom(arena, *addr),
        Expr::Mux0X {
            cond,
            expr0,
            expr_x,
        } => atoms(arena, &[*cond, *expr0, *expr_x]),
        Expr::CCall { args, .. } => atoms(arena, args),
    }
}

/// Returns true if the statement is in flat form
pub fn is_flat_stmt(arena: &IrArena, id: StmtId) -> bool {
    match arena.stmt(id) {
        Stmt::NoOp | Stmt::IMark { .. } | Stmt::Mbe(_) => true,
        Stmt::AbiHint { base, nia, .. } => atoms(arena, &[*base, *nia]),
        Stmt::Put { data, .. } => is_atom(arena, *data),
        Stmt::PutI(details) => atoms(arena, &[details.ix, details.data]),
        Stmt::WrTmp { data, .. } => is_flat_expr(arena, *data),
        Stmt::Store { addr, data, .. } => atoms(arena, &[*addr, *data]),
        Stmt::Cas(cas) => {
            atoms(arena, &[cas.addr, cas.expd_lo, cas.data_lo])
                && opt_atom(arena, cas.expd_hi)
                && opt_atom(arena, cas.data_hi)
        }
        Stmt::Llsc {
            addr, storedata, ..
        } => is_atom(arena, *addr) && opt_atom(arena, *storedata),
        Stmt::Dirty(d) => {
            is_atom(arena, d.guard) && atoms(arena, &d.args) && opt_atom(arena, d.m_addr)
        }
        Stmt::Exit { guard, .. } => is_atom(arena, *guard),
    }
}

/// Returns true if every statement is flat and `next` is an atom
pub fn is_flat_block(arena: &IrArena, id: BlockId) -> bool {
    let block = arena.block(id);
    block.stmts.iter().all(|&s| is_flat_stmt(arena, s)) && is_atom(arena, block.next)
}
