//! Engine-style text rendering
//!
//! Output follows the engine's own printer closely enough that dumps can be
//! diffed against engine logs:
//!
//! ```text
//! IRSB {
//!    t0:I64   t1:I1
//!
//!    ------ IMark(0x400000, 4, 0) ------
//!    t0 = LDle:I64(GET:I64(48))
//!    if (t1) { PUT(184) = 0x400010:I64; exit-Boring }
//!    PUT(184) = 0x400004:I64; exit-Boring
//! }
//! ```

use super::arena::{BlockId, ExprId, IrArena, StmtId};
use super::node::{Callee, Const, Dirty, Expr, RegArray, Stmt, TypeEnv};
use super::types::{Effect, Endness, MBusEvent};
use std::fmt::{self, Display, Formatter};

/// Display adapter for a node that needs its arena to print
pub struct Pp<'a, I> {
    arena: &'a IrArena,
    id: I,
}

impl<'a, I> Pp<'a, I> {
    pub fn new(arena: &'a IrArena, id: I) -> Self {
        Self { arena, id }
    }
}

/// Renders a block
pub fn pp_block(arena: &IrArena, id: BlockId) -> String {
    Pp::new(arena, id).to_string()
}

/// Renders a statement
pub fn pp_stmt(arena: &IrArena, id: StmtId) -> String {
    Pp::new(arena, id).to_string()
}

/// Renders an expression
pub fn pp_expr(arena: &IrArena, id: ExprId) -> String {
    Pp::new(arena, id).to_string()
}

impl Display for Const {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Const::U1(b) => write!(f, "{}:I1", b as u8),
            Const::U8(v) => write!(f, "{:#x}:I8", v),
            Const::U16(v) => write!(f, "{:#x}:I16", v),
            Const::U32(v) => write!(f, "{:#x}:I32", v),
            Const::U64(v) => write!(f, "{:#x}:I64", v),
            Const::F32(v) => write!(f, "F32{{{:#x}}}", v),
            Const::F32i(v) => write!(f, "F32i{{{:#x}}}", v),
            Const::F64(v) => write!(f, "F64{{{:#x}}}", v),
            Const::F64i(v) => write!(f, "F64i{{{:#x}}}", v),
            Const::V128(v) => write!(f, "V128{{0x{:04x}}}", v),
            Const::V256(v) => write!(f, "V256{{0x{:08x}}}", v),
        }
    }
}

impl Display for Callee {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.regparms > 0 {
            write!(f, "[rp={}]", self.regparms)?;
        }
        if self.mcx_mask != 0 {
            write!(f, "[mcx={:#x}]", self.mcx_mask)?;
        }
        write!(f, "{{{:#x}}}", self.addr)
    }
}

impl Display for RegArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{}x{})",
            self.base,
            self.n_elems,
            self.elem_ty.short_name()
        )
    }
}

impl Display for TypeEnv {
    /// Eight bindings per line, three-space separated
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, ty) in self.types.iter().enumerate() {
            if i % 8 == 0 {
                f.write_str("   ")?;
            }
            write!(f, "t{}:{}", i, ty.short_name())?;
            if i % 8 == 7 {
                f.write_str("\n")?;
            } else {
                f.write_str("   ")?;
            }
        }
        if self.types.len() % 8 != 0 {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

fn end_suffix(end: Endness) -> &'static str {
    match end {
        Endness::Le => "le",
        Endness::Be => "be",
    }
}

fn effect(fx: Effect) -> &'static str {
    match fx {
        Effect::None => "noFX",
        Effect::Read => "RdFX",
        Effect::Write => "WrFX",
        Effect::Modify => "MoFX",
    }
}

fn op_name(op: super::types::Op) -> String {
    let name = op.name();
    match name.strip_prefix("Iop_") {
        Some(short) => short.to_string(),
        None => name,
    }
}

fn expr_list(f: &mut Formatter<'_>, arena: &IrArena, ids: &[ExprId]) -> fmt::Result {
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        expr(f, arena, *id)?;
    }
    Ok(())
}

/// Pending output of an expression walk
enum Piece {
    Expr(ExprId),
    Text(&'static str),
    Owned(String),
}

/// Writes an expression tree
///
/// Nesting is bounded only by the arena, so the walk keeps its pending
/// pieces on the heap.
fn expr(f: &mut Formatter<'_>, arena: &IrArena, root: ExprId) -> fmt::Result {
    let mut work = vec![Piece::Expr(root)];
    while let Some(piece) = work.pop() {
        let id = match piece {
            Piece::Expr(id) => id,
            Piece::Text(text) => {
                f.write_str(text)?;
                continue;
            }
            Piece::Owned(text) => {
                f.write_str(&text)?;
                continue;
            }
        };
        let node = arena.expr(id);
        let close = match node {
            Expr::Binder(b) => {
                write!(f, "BIND-{}", b)?;
                continue;
            }
            Expr::Get { offset, ty } => {
                write!(f, "GET:{}({})", ty.short_name(), offset)?;
                continue;
            }
            Expr::RdTmp(t) => {
                write!(f, "{}", t)?;
                continue;
            }
            Expr::Const(con) => {
                write!(f, "{}", arena.constant(*con))?;
                continue;
            }
            Expr::GetI { descr, bias, .. } => {
                write!(f, "GETI{}[", arena.reg_array(*descr))?;
                Piece::Owned(format!(",{}]", bias))
            }
            Expr::Qop { op, .. }
            | Expr::Triop { op, .. }
            | Expr::Binop { op, .. }
            | Expr::Unop { op, .. } => {
                write!(f, "{}(", op_name(*op))?;
                Piece::Text(")")
            }
            Expr::Load { end, ty, .. } => {
                write!(f, "LD{}:{}(", end_suffix(*end), ty.short_name())?;
                Piece::Text(")")
            }
            Expr::Mux0X { .. } => {
                f.write_str("Mux0X(")?;
                Piece::Text(")")
            }
            Expr::CCall { cee, ret_ty, .. } => {
                write!(f, "{}(", arena.callee(*cee))?;
                Piece::Owned(format!("):{}", ret_ty.short_name()))
            }
        };
        work.push(close);
        for (i, child) in node.children().into_iter().enumerate().rev() {
            work.push(Piece::Expr(child));
            if i > 0 {
                work.push(Piece::Text(","));
            }
        }
    }
    Ok(())
}

fn dirty(f: &mut Formatter<'_>, arena: &IrArena, d: &Dirty) -> fmt::Result {
    if d.tmp.is_valid() {
        write!(f, "{} = ", d.tmp)?;
    }
    f.write_str("DIRTY ")?;
    expr(f, arena, d.guard)?;
    if d.needs_bbp {
        f.write_str(" NeedsBBP")?;
    }
    if d.m_fx != Effect::None {
        write!(f, " {}-mem(", effect(d.m_fx))?;
        if let Some(addr) = d.m_addr {
            expr(f, arena, addr)?;
        }
        write!(f, ",{})", d.m_size)?;
    }
    for fx in &d.fx_state {
        write!(f, " {}-gst({},{}", effect(fx.fx), fx.offset, fx.size)?;
        if fx.n_repeats > 0 {
            write!(f, ",reps{},step{}", fx.n_repeats, fx.repeat_len)?;
        }
        f.write_str(")")?;
    }
    write!(f, " ::: {}(", arena.callee(d.cee))?;
    expr_list(f, arena, &d.args)?;
    f.write_str(")")
}

fn stmt(f: &mut Formatter<'_>, arena: &IrArena, id: StmtId) -> fmt::Result {
    match arena.stmt(id) {
        Stmt::NoOp => f.write_str("IR-NoOp"),
        Stmt::IMark { addr, len, delta } => {
            write!(f, "------ IMark({:#x}, {}, {}) ------", addr, len, delta)
        }
        Stmt::AbiHint { base, len, nia } => {
            f.write_str("====== AbiHint(")?;
            expr(f, arena, *base)?;
            write!(f, ", {}, ", len)?;
            expr(f, arena, *nia)?;
            f.write_str(") ======")
        }
        Stmt::Put { offset, data } => {
            write!(f, "PUT({}) = ", offset)?;
            expr(f, arena, *data)
        }
        Stmt::PutI(details) => {
            write!(f, "PUTI{}[", arena.reg_array(details.descr))?;
            expr(f, arena, details.ix)?;
            write!(f, ",{}] = ", details.bias)?;
            expr(f, arena, details.data)
        }
        Stmt::WrTmp { tmp, data } => {
            write!(f, "{} = ", tmp)?;
            expr(f, arena, *data)
        }
        Stmt::Store { end, addr, data } => {
            write!(f, "ST{}(", end_suffix(*end))?;
            expr(f, arena, *addr)?;
            f.write_str(") = ")?;
            expr(f, arena, *data)
        }
        Stmt::Cas(cas) => {
            if cas.old_hi.is_valid() {
                write!(f, "{},", cas.old_hi)?;
            }
            write!(f, "{} = CAS{}(", cas.old_lo, end_suffix(cas.end))?;
            expr(f, arena, cas.addr)?;
            f.write_str("::")?;
            if let Some(hi) = cas.expd_hi {
                expr(f, arena, hi)?;
                f.write_str(",")?;
            }
            expr(f, arena, cas.expd_lo)?;
            f.write_str("->")?;
            if let Some(hi) = cas.data_hi {
                expr(f, arena, hi)?;
                f.write_str(",")?;
            }
            expr(f, arena, cas.data_lo)?;
            f.write_str(")")
        }
        Stmt::Llsc {
            end,
            result,
            addr,
            storedata,
        } => match storedata {
            None => {
                write!(f, "{} = LD{}-Linked(", result, end_suffix(*end))?;
                expr(f, arena, *addr)?;
                f.write_str(")")
            }
            Some(data) => {
                write!(f, "{} = ( ST{}-Cond(", result, end_suffix(*end))?;
                expr(f, arena, *addr)?;
                f.write_str(") = ")?;
                expr(f, arena, *data)?;
                f.write_str(" )")
            }
        },
        Stmt::Dirty(d) => dirty(f, arena, d),
        Stmt::Mbe(event) => match event {
            MBusEvent::Fence => f.write_str("IR-MBusEvent-Fence"),
            MBusEvent::CancelReservation => f.write_str("IR-MBusEvent-CancelReservation"),
        },
        Stmt::Exit {
            guard,
            jk,
            dst,
            offs_ip,
        } => {
            f.write_str("if (")?;
            expr(f, arena, *guard)?;
            write!(
                f,
                ") {{ PUT({}) = {}; exit-{} }}",
                offs_ip,
                arena.constant(*dst),
                jk.short_name()
            )
        }
    }
}

impl Display for Pp<'_, ExprId> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        expr(f, self.arena, self.id)
    }
}

impl Display for Pp<'_, StmtId> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        stmt(f, self.arena, self.id)
    }
}

impl Display for Pp<'_, BlockId> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let block = self.arena.block(self.id);
        f.write_str("IRSB {\n")?;
        write!(f, "{}", self.arena.type_env(block.tyenv))?;
        f.write_str("\n")?;
        for &s in &block.stmts {
            f.write_str("   ")?;
            stmt(f, self.arena, s)?;
            f.write_str("\n")?;
        }
        write!(f, "   PUT({}) = ", block.offs_ip)?;
        expr(f, self.arena, block.next)?;
        write!(f, "; exit-{}\n}}\n", block.jumpkind.short_name())
    }
}
