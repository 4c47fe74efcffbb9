//! Structural comparison of IR living in two different arenas
//!
//! Ids are arena-local, so `==` on nodes only means something inside one
//! arena. These functions walk two graphs in lockstep and compare tags,
//! scalars, child counts and order. Shared nodes (callees, register arrays,
//! type environments) must alias the same way on both sides: two positions
//! that point at one node on the left must point at one node on the right,
//! and vice versa.

use super::arena::{BlockId, CalleeId, ConstId, ExprId, IrArena, RegArrayId, StmtId, TypeEnvId};
use super::node::{Expr, Stmt};
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use thiserror::Error;

/// First difference found between two graphs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mismatch at {path}: {left} != {right}")]
pub struct Mismatch {
    /// Field path from the root, e.g. `stmts[2].Exit.guard.RdTmp.tmp`
    pub path: String,
    pub left: String,
    pub right: String,
}

type Outcome = std::result::Result<(), Mismatch>;

fn mismatch(path: &str, left: impl Debug, right: impl Debug) -> Mismatch {
    Mismatch {
        path: path.to_string(),
        left: format!("{:?}", left),
        right: format!("{:?}", right),
    }
}

fn scalar<T: PartialEq + Debug>(path: &str, field: &str, left: T, right: T) -> Outcome {
    if left == right {
        Ok(())
    } else {
        Err(mismatch(&format!("{}.{}", path, field), left, right))
    }
}

/// Records `left <-> right` and reports whether this is the first visit
fn alias<I: Copy + Eq + Hash + Display>(
    forward: &mut HashMap<I, I>,
    backward: &mut HashMap<I, I>,
    path: &str,
    left: I,
    right: I,
) -> std::result::Result<bool, Mismatch> {
    match (forward.get(&left), backward.get(&right)) {
        (None, None) => {
            forward.insert(left, right);
            backward.insert(right, left);
            Ok(true)
        }
        (Some(seen), _) if *seen == right => Ok(false),
        (Some(seen), _) => Err(Mismatch {
            path: path.to_string(),
            left: format!("{} (aliased with right {})", left, seen),
            right: right.to_string(),
        }),
        (None, Some(seen)) => Err(Mismatch {
            path: path.to_string(),
            left: left.to_string(),
            right: format!("{} (aliased with left {})", right, seen),
        }),
    }
}

struct Comparer<'a> {
    left: &'a IrArena,
    right: &'a IrArena,
    callees: (HashMap<CalleeId, CalleeId>, HashMap<CalleeId, CalleeId>),
    reg_arrays: (HashMap<RegArrayId, RegArrayId>, HashMap<RegArrayId, RegArrayId>),
    type_envs: (HashMap<TypeEnvId, TypeEnvId>, HashMap<TypeEnvId, TypeEnvId>),
}

impl<'a> Comparer<'a> {
    fn new(left: &'a IrArena, right: &'a IrArena) -> Self {
        Self {
            left,
            right,
            callees: Default::default(),
            reg_arrays: Default::default(),
            type_envs: Default::default(),
        }
    }

    fn block(&mut self, path: &str, l: BlockId, r: BlockId) -> Outcome {
        let (lb, rb) = (self.left.block(l), self.right.block(r));
        self.type_env(&join(path, "tyenv"), lb.tyenv, rb.tyenv)?;
        scalar(path, "stmts.len", lb.stmts.len(), rb.stmts.len())?;
        for (i, (ls, rs)) in lb.stmts.iter().zip(&rb.stmts).enumerate() {
            self.stmt(&join(path, &format!("stmts[{}]", i)), *ls, *rs)?;
        }
        self.expr(&join(path, "next"), lb.next, rb.next)?;
        scalar(path, "jumpkind", lb.jumpkind, rb.jumpkind)?;
        scalar(path, "offs_ip", lb.offs_ip, rb.offs_ip)?;
        scalar(path, "arch", lb.arch, rb.arch)
    }

    fn type_env(&mut self, path: &str, l: TypeEnvId, r: TypeEnvId) -> Outcome {
        let (fwd, back) = &mut self.type_envs;
        if alias(fwd, back, path, l, r)? {
            scalar(
                path,
                "types",
                &self.left.type_env(l).types,
                &self.right.type_env(r).types,
            )?;
        }
        Ok(())
    }

    fn callee(&mut self, path: &str, l: CalleeId, r: CalleeId) -> Outcome {
        let (fwd, back) = &mut self.callees;
        if alias(fwd, back, path, l, r)? {
            scalar(path, "callee", self.left.callee(l), self.right.callee(r))?;
        }
        Ok(())
    }

    fn reg_array(&mut self, path: &str, l: RegArrayId, r: RegArrayId) -> Outcome {
        let (fwd, back) = &mut self.reg_arrays;
        if alias(fwd, back, path, l, r)? {
            scalar(
                path,
                "descr",
                self.left.reg_array(l),
                self.right.reg_array(r),
            )?;
        }
        Ok(())
    }

    fn constant(&self, path: &str, l: ConstId, r: ConstId) -> Outcome {
        let (lc, rc) = (self.left.constant(l), self.right.constant(r));
        if lc == rc {
            Ok(())
        } else {
            Err(mismatch(path, lc, rc))
        }
    }

    fn opt_expr(&mut self, path: &str, l: Option<ExprId>, r: Option<ExprId>) -> Outcome {
        match (l, r) {
            (None, None) => Ok(()),
            (Some(l), Some(r)) => self.expr(path, l, r),
            (l, r) => Err(mismatch(path, l.is_some(), r.is_some())),
        }
    }

    fn expr_list(&mut self, path: &str, l: &[ExprId], r: &[ExprId]) -> Outcome {
        for (path, le, re) in pairs(path, l, r)? {
            self.expr(&path, le, re)?;
        }
        Ok(())
    }

    fn stmt(&mut self, path: &str, l: StmtId, r: StmtId) -> Outcome {
        let (ls, rs) = (self.left.stmt(l), self.right.stmt(r));
        if ls.tag() != rs.tag() {
            return Err(mismatch(path, ls.tag(), rs.tag()));
        }
        let path = &join(path, ls.tag().short_name());
        match (ls, rs) {
            (Stmt::NoOp, Stmt::NoOp) => Ok(()),
            (
                Stmt::IMark { addr, len, delta },
                Stmt::IMark {
                    addr: addr2,
                    len: len2,
                    delta: delta2,
                },
            ) => {
                scalar(path, "addr", addr, addr2)?;
                scalar(path, "len", len, len2)?;
                scalar(path, "delta", delta, delta2)
            }
            (
                Stmt::AbiHint { base, len, nia },
                Stmt::AbiHint {
                    base: base2,
                    len: len2,
                    nia: nia2,
                },
            ) => {
                self.expr(&join(path, "base"), *base, *base2)?;
                scalar(path, "len", len, len2)?;
                self.expr(&join(path, "nia"), *nia, *nia2)
            }
            (
                Stmt::Put { offset, data },
                Stmt::Put {
                    offset: offset2,
                    data: data2,
                },
            ) => {
                scalar(path, "offset", offset, offset2)?;
                self.expr(&join(path, "data"), *data, *data2)
            }
            (Stmt::PutI(a), Stmt::PutI(b)) => {
                self.reg_array(&join(path, "descr"), a.descr, b.descr)?;
                self.expr(&join(path, "ix"), a.ix, b.ix)?;
                scalar(path, "bias", a.bias, b.bias)?;
                self.expr(&join(path, "data"), a.data, b.data)
            }
            (
                Stmt::WrTmp { tmp, data },
                Stmt::WrTmp {
                    tmp: tmp2,
                    data: data2,
                },
            ) => {
                scalar(path, "tmp", tmp, tmp2)?;
                self.expr(&join(path, "data"), *data, *data2)
            }
            (
                Stmt::Store { end, addr, data },
                Stmt::Store {
                    end: end2,
                    addr: addr2,
                    data: data2,
                },
            ) => {
                scalar(path, "end", end, end2)?;
                self.expr(&join(path, "addr"), *addr, *addr2)?;
                self.expr(&join(path, "data"), *data, *data2)
            }
            (Stmt::Cas(a), Stmt::Cas(b)) => {
                scalar(path, "old_hi", a.old_hi, b.old_hi)?;
                scalar(path, "old_lo", a.old_lo, b.old_lo)?;
                scalar(path, "end", a.end, b.end)?;
                self.expr(&join(path, "addr"), a.addr, b.addr)?;
                self.opt_expr(&join(path, "expd_hi"), a.expd_hi, b.expd_hi)?;
                self.expr(&join(path, "expd_lo"), a.expd_lo, b.expd_lo)?;
                self.opt_expr(&join(path, "data_hi"), a.data_hi, b.data_hi)?;
                self.expr(&join(path, "data_lo"), a.data_lo, b.data_lo)
            }
            (
                Stmt::Llsc {
                    end,
                    result,
                    addr,
                    storedata,
                },
                Stmt::Llsc {
                    end: end2,
                    result: result2,
                    addr: addr2,
                    storedata: storedata2,
                },
            ) => {
                scalar(path, "end", end, end2)?;
                scalar(path, "result", result, result2)?;
                self.expr(&join(path, "addr"), *addr, *addr2)?;
                self.opt_expr(&join(path, "storedata"), *storedata, *storedata2)
            }
            (Stmt::Dirty(a), Stmt::Dirty(b)) => {
                self.callee(&join(path, "cee"), a.cee, b.cee)?;
                self.expr(&join(path, "guard"), a.guard, b.guard)?;
                self.expr_list(&join(path, "args"), &a.args, &b.args)?;
                scalar(path, "tmp", a.tmp, b.tmp)?;
                scalar(path, "m_fx", a.m_fx, b.m_fx)?;
                self.opt_expr(&join(path, "m_addr"), a.m_addr, b.m_addr)?;
                scalar(path, "m_size", a.m_size, b.m_size)?;
                scalar(path, "needs_bbp", a.needs_bbp, b.needs_bbp)?;
                scalar(path, "fx_state", &a.fx_state, &b.fx_state)
            }
            (Stmt::Mbe(a), Stmt::Mbe(b)) => scalar(path, "event", a, b),
            (
                Stmt::Exit {
                    guard,
                    jk,
                    dst,
                    offs_ip,
                },
                Stmt::Exit {
                    guard: guard2,
                    jk: jk2,
                    dst: dst2,
                    offs_ip: offs_ip2,
                },
            ) => {
                self.expr(&join(path, "guard"), *guard, *guard2)?;
                scalar(path, "jk", jk, jk2)?;
                self.constant(&join(path, "dst"), *dst, *dst2)?;
                scalar(path, "offs_ip", offs_ip, offs_ip2)
            }
            (ls, rs) => Err(mismatch(path, ls, rs)),
        }
    }

    /// Walks two expression trees in preorder
    fn expr(&mut self, path: &str, l: ExprId, r: ExprId) -> Outcome {
        let mut work = vec![(path.to_string(), l, r)];
        while let Some((path, l, r)) = work.pop() {
            let children = self.expr_node(&path, l, r)?;
            work.extend(children.into_iter().rev());
        }
        Ok(())
    }

    /// Compares the scalars of one expression pair and returns the child
    /// pairs left to compare, in field order
    fn expr_node(
        &mut self,
        path: &str,
        l: ExprId,
        r: ExprId,
    ) -> std::result::Result<Vec<ExprPair>, Mismatch> {
        let (le, re) = (self.left.expr(l), self.right.expr(r));
        if le.tag() != re.tag() {
            return Err(mismatch(path, le.tag(), re.tag()));
        }
        let path = &join(path, le.tag().short_name());
        let child = |field: &str, l: ExprId, r: ExprId| vec![(join(path, field), l, r)];
        match (le, re) {
            (Expr::Binder(a), Expr::Binder(b)) => scalar(path, "binder", a, b).map(|_| vec![]),
            (
                Expr::Get { offset, ty },
                Expr::Get {
                    offset: offset2,
                    ty: ty2,
                },
            ) => {
                scalar(path, "offset", offset, offset2)?;
                scalar(path, "ty", ty, ty2)?;
                Ok(vec![])
            }
            (
                Expr::GetI { descr, ix, bias },
                Expr::GetI {
                    descr: descr2,
                    ix: ix2,
                    bias: bias2,
                },
            ) => {
                self.reg_array(&join(path, "descr"), *descr, *descr2)?;
                scalar(path, "bias", bias, bias2)?;
                Ok(child("ix", *ix, *ix2))
            }
            (Expr::RdTmp(a), Expr::RdTmp(b)) => scalar(path, "tmp", a, b).map(|_| vec![]),
            (Expr::Qop { op, args }, Expr::Qop { op: op2, args: args2 }) => {
                scalar(path, "op", op, op2)?;
                pairs(&join(path, "args"), args, args2)
            }
            (Expr::Triop { op, args }, Expr::Triop { op: op2, args: args2 }) => {
                scalar(path, "op", op, op2)?;
                pairs(&join(path, "args"), args, args2)
            }
            (Expr::Binop { op, args }, Expr::Binop { op: op2, args: args2 }) => {
                scalar(path, "op", op, op2)?;
                pairs(&join(path, "args"), args, args2)
            }
            (Expr::Unop { op, arg }, Expr::Unop { op: op2, arg: arg2 }) => {
                scalar(path, "op", op, op2)?;
                Ok(child("arg", *arg, *arg2))
            }
            (
                Expr::Load { end, ty, addr },
                Expr::Load {
                    end: end2,
                    ty: ty2,
                    addr: addr2,
                },
            ) => {
                scalar(path, "end", end, end2)?;
                scalar(path, "ty", ty, ty2)?;
                Ok(child("addr", *addr, *addr2))
            }
            (Expr::Const(a), Expr::Const(b)) => {
                self.constant(&join(path, "con"), *a, *b)?;
                Ok(vec![])
            }
            (
                Expr::Mux0X {
                    cond,
                    expr0,
                    expr_x,
                },
                Expr::Mux0X {
                    cond: cond2,
                    expr0: expr02,
                    expr_x: expr_x2,
                },
            ) => Ok(vec![
                (join(path, "cond"), *cond, *cond2),
                (join(path, "expr0"), *expr0, *expr02),
                (join(path, "exprX"), *expr_x, *expr_x2),
            ]),
            (
                Expr::CCall { cee, ret_ty, args },
                Expr::CCall {
                    cee: cee2,
                    ret_ty: ret_ty2,
                    args: args2,
                },
            ) => {
                self.callee(&join(path, "cee"), *cee, *cee2)?;
                scalar(path, "ret_ty", ret_ty, ret_ty2)?;
                pairs(&join(path, "args"), args, args2)
            }
            (le, re) => Err(mismatch(path, le, re)),
        }
    }
}

/// Expression pair still to be compared, with its path
type ExprPair = (String, ExprId, ExprId);

fn pairs(path: &str, l: &[ExprId], r: &[ExprId]) -> std::result::Result<Vec<ExprPair>, Mismatch> {
    scalar(path, "len", l.len(), r.len())?;
    Ok(l.iter()
        .zip(r)
        .enumerate()
        .map(|(i, (le, re))| (format!("{}[{}]", path, i), *le, *re))
        .collect())
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

/// Compares two blocks, including their type environments
pub fn compare_blocks(left: &IrArena, l: BlockId, right: &IrArena, r: BlockId) -> Outcome {
    Comparer::new(left, right).block("", l, r)
}

/// Compares two statements
pub fn compare_stmts(left: &IrArena, l: StmtId, right: &IrArena, r: StmtId) -> Outcome {
    Comparer::new(left, right).stmt("stmt", l, r)
}

/// Compares two expressions
pub fn compare_exprs(left: &IrArena, l: ExprId, right: &IrArena, r: ExprId) -> Outcome {
    Comparer::new(left, right).expr("expr", l, r)
}

/// Compares two constants
pub fn compare_consts(left: &IrArena, l: ConstId, right: &IrArena, r: ConstId) -> Outcome {
    Comparer::new(left, right).constant("const", l, r)
}
