//! Writes owned IR back into engine layout
//!
//! The inverse of the deep copy: a host that built or edited IR hands it
//! back to the engine as an image. Shared nodes are written once and
//! referenced by address from every user, so re-copying the image gives the
//! same aliasing.

use super::writer::{CasFields, DirtyFields, FxFields, ImageWriter};
use super::Addr;
use crate::error::{Error, NodeKind, Result};
use crate::ir::{
    BlockId, CalleeId, Expr, ExprId, IrArena, RegArrayId, Stmt, StmtId, TypeEnvId, MAX_FX_STATE,
};
use std::collections::HashMap;

/// Expression whose children are being written
struct Pending {
    id: ExprId,
    /// Callee or register array record, NULL for other expressions
    shared: Addr,
    children: Vec<ExprId>,
    written: Vec<Addr>,
}

struct Exporter<'a> {
    arena: &'a IrArena,
    writer: ImageWriter,
    callees: HashMap<CalleeId, Addr>,
    reg_arrays: HashMap<RegArrayId, Addr>,
    type_envs: HashMap<TypeEnvId, Addr>,
}

impl<'a> Exporter<'a> {
    fn new(arena: &'a IrArena) -> Self {
        Self {
            arena,
            writer: ImageWriter::new(),
            callees: HashMap::new(),
            reg_arrays: HashMap::new(),
            type_envs: HashMap::new(),
        }
    }

    fn callee(&mut self, id: CalleeId) -> Addr {
        if let Some(addr) = self.callees.get(&id) {
            return *addr;
        }
        let addr = self.writer.callee(self.arena.callee(id));
        self.callees.insert(id, addr);
        addr
    }

    fn reg_array(&mut self, id: RegArrayId) -> Addr {
        if let Some(addr) = self.reg_arrays.get(&id) {
            return *addr;
        }
        let addr = self.writer.reg_array(self.arena.reg_array(id));
        self.reg_arrays.insert(id, addr);
        addr
    }

    fn type_env(&mut self, id: TypeEnvId) -> Addr {
        if let Some(addr) = self.type_envs.get(&id) {
            return *addr;
        }
        let addr = self.writer.type_env(&self.arena.type_env(id).types);
        self.type_envs.insert(id, addr);
        addr
    }

    fn opt_expr(&mut self, id: Option<ExprId>) -> Addr {
        id.map_or(Addr::NULL, |id| self.expr(id))
    }

    fn expr_vec(&mut self, ids: &[ExprId]) -> Addr {
        let addrs: Vec<Addr> = ids.iter().map(|&id| self.expr(id)).collect();
        self.writer.expr_vec(&addrs)
    }

    /// Writes an expression tree, children before their parent
    fn expr(&mut self, root: ExprId) -> Addr {
        let mut stack: Vec<Pending> = Vec::new();
        let mut next = root;
        loop {
            let frame = self.pending(next);
            stack.push(frame);
            while let Some(frame) = stack.pop() {
                if let Some(&child) = frame.children.get(frame.written.len()) {
                    next = child;
                    stack.push(frame);
                    break;
                }
                let addr = self.write_expr(&frame);
                match stack.last_mut() {
                    Some(parent) => parent.written.push(addr),
                    None => return addr,
                }
            }
        }
    }

    /// Starts an expression, writing the shared node it references
    fn pending(&mut self, id: ExprId) -> Pending {
        let arena = self.arena;
        let node = arena.expr(id);
        let shared = match node {
            Expr::GetI { descr, .. } => self.reg_array(*descr),
            Expr::CCall { cee, .. } => self.callee(*cee),
            _ => Addr::NULL,
        };
        let children = node.children();
        Pending {
            id,
            shared,
            written: Vec::with_capacity(children.len()),
            children,
        }
    }

    fn write_expr(&mut self, frame: &Pending) -> Addr {
        let arena = self.arena;
        let kids = &frame.written;
        match arena.expr(frame.id) {
            Expr::Binder(b) => self.writer.binder(*b),
            Expr::Get { offset, ty } => self.writer.get(*offset, *ty),
            Expr::GetI { bias, .. } => self.writer.get_i(frame.shared, kids[0], *bias),
            Expr::RdTmp(t) => self.writer.rd_tmp(*t),
            Expr::Qop { op, .. } => self
                .writer
                .qop(*op, [kids[0], kids[1], kids[2], kids[3]]),
            Expr::Triop { op, .. } => self.writer.triop(*op, [kids[0], kids[1], kids[2]]),
            Expr::Binop { op, .. } => self.writer.binop(*op, kids[0], kids[1]),
            Expr::Unop { op, .. } => self.writer.unop(*op, kids[0]),
            Expr::Load { end, ty, .. } => self.writer.load(*end, *ty, kids[0]),
            Expr::Const(con) => {
                let con = self.writer.constant(arena.constant(*con));
                self.writer.const_expr(con)
            }
            Expr::Mux0X { .. } => self.writer.mux0x(kids[0], kids[1], kids[2]),
            Expr::CCall { ret_ty, .. } => {
                let args = self.writer.expr_vec(kids);
                self.writer.ccall(frame.shared, *ret_ty, args)
            }
        }
    }

    fn stmt(&mut self, id: StmtId) -> Result<Addr> {
        let arena = self.arena;
        let addr = match arena.stmt(id) {
            Stmt::NoOp => self.writer.no_op(),
            Stmt::IMark { addr, len, delta } => self.writer.imark(*addr, *len, *delta),
            Stmt::AbiHint { base, len, nia } => {
                let base = self.expr(*base);
                let nia = self.expr(*nia);
                self.writer.abi_hint(base, *len, nia)
            }
            Stmt::Put { offset, data } => {
                let data = self.expr(*data);
                self.writer.put(*offset, data)
            }
            Stmt::PutI(details) => {
                let descr = self.reg_array(details.descr);
                let ix = self.expr(details.ix);
                let data = self.expr(details.data);
                self.writer.put_i(descr, ix, details.bias, data)
            }
            Stmt::WrTmp { tmp, data } => {
                let data = self.expr(*data);
                self.writer.wr_tmp(*tmp, data)
            }
            Stmt::Store { end, addr, data } => {
                let addr = self.expr(*addr);
                let data = self.expr(*data);
                self.writer.store(*end, addr, data)
            }
            Stmt::Cas(cas) => {
                let fields = CasFields {
                    old_hi: cas.old_hi,
                    old_lo: cas.old_lo,
                    end: cas.end,
                    addr: self.expr(cas.addr),
                    expd_hi: self.opt_expr(cas.expd_hi),
                    expd_lo: self.expr(cas.expd_lo),
                    data_hi: self.opt_expr(cas.data_hi),
                    data_lo: self.expr(cas.data_lo),
                };
                self.writer.cas(fields)
            }
            Stmt::Llsc {
                end,
                result,
                addr,
                storedata,
            } => {
                let addr = self.expr(*addr);
                let storedata = self.opt_expr(*storedata);
                self.writer.llsc(*end, *result, addr, storedata)
            }
            Stmt::Dirty(d) => {
                if d.fx_state.len() > MAX_FX_STATE {
                    return Err(Error::invariant(
                        NodeKind::Stmt,
                        Addr::NULL,
                        format!(
                            "{} has {} guest-state effects, at most {} fit",
                            id,
                            d.fx_state.len(),
                            MAX_FX_STATE
                        ),
                    ));
                }
                let fields = DirtyFields {
                    cee: self.callee(d.cee),
                    guard: self.expr(d.guard),
                    args: self.expr_vec(&d.args),
                    tmp: d.tmp,
                    m_fx: d.m_fx,
                    m_addr: self.opt_expr(d.m_addr),
                    m_size: d.m_size,
                    needs_bbp: d.needs_bbp,
                    fx_state: d
                        .fx_state
                        .iter()
                        .map(|fx| FxFields {
                            fx: fx.fx,
                            offset: fx.offset,
                            size: fx.size,
                            n_repeats: fx.n_repeats,
                            repeat_len: fx.repeat_len,
                        })
                        .collect(),
                };
                self.writer.dirty(&fields)
            }
            Stmt::Mbe(event) => self.writer.mbe(*event),
            Stmt::Exit {
                guard,
                jk,
                dst,
                offs_ip,
            } => {
                let guard = self.expr(*guard);
                let dst = self.writer.constant(arena.constant(*dst));
                self.writer.exit(guard, *jk, dst, *offs_ip)
            }
        };
        Ok(addr)
    }

    fn block(&mut self, id: BlockId) -> Result<Addr> {
        let arena = self.arena;
        let block = arena.block(id);
        let tyenv = self.type_env(block.tyenv);
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for &s in &block.stmts {
            stmts.push(self.stmt(s)?);
        }
        let next = self.expr(block.next);
        Ok(self
            .writer
            .block(tyenv, &stmts, next, block.jumpkind, block.offs_ip, block.arch))
    }

    fn finish(self, root: Addr) -> Result<(Vec<u8>, Addr)> {
        Ok((self.writer.finish()?, root))
    }
}

/// Writes a block and everything it references into a fresh image
///
/// Returns the image and the address of the block record.
pub fn export_block(arena: &IrArena, id: BlockId) -> Result<(Vec<u8>, Addr)> {
    let mut exporter = Exporter::new(arena);
    let root = exporter.block(id)?;
    exporter.finish(root)
}

/// Writes one statement into a fresh image
pub fn export_stmt(arena: &IrArena, id: StmtId) -> Result<(Vec<u8>, Addr)> {
    let mut exporter = Exporter::new(arena);
    let root = exporter.stmt(id)?;
    exporter.finish(root)
}

/// Writes one expression tree into a fresh image
pub fn export_expr(arena: &IrArena, id: ExprId) -> Result<(Vec<u8>, Addr)> {
    let mut exporter = Exporter::new(arena);
    let root = exporter.expr(id);
    exporter.finish(root)
}
