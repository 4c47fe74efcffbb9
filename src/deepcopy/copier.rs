//! Tag-dispatched copier
//!
//! One `Copier` serves one top-level call (or one session). It reads the
//! source through a [`SourceView`], allocates into its own [`IrArena`], and
//! remembers every shared node it has copied by source address so that
//! aliasing survives the copy.

use crate::config::CopyConfig;
use crate::error::{Error, NodeKind, Result};
use crate::image::layout::{block, callee, cas, constant, dirty, node, put_i, reg_array, type_env};
use crate::image::{Addr, SourceView};
use crate::ir::{
    Arch, Block, Callee, CalleeId, Cas, Const, ConstId, ConstTag, Dirty, Effect, Endness, Expr,
    ExprId, ExprTag, FxState, IrArena, IrType, JumpKind, MBusEvent, Op, PutI, RegArray,
    RegArrayId, Stmt, StmtId, StmtTag, Temp, TypeEnv, TypeEnvId, BlockId, MAX_FX_STATE,
};
use std::collections::HashMap;

const fn field(n: u32) -> u32 {
    node::field(n)
}

/// How a temp field treats `IRTemp_INVALID`
#[derive(Clone, Copy, PartialEq, Eq)]
enum TempUse {
    Required,
    Optional,
}

/// An expression whose scalars and shared nodes are copied but whose
/// children are not
enum Shell {
    Leaf(Expr),
    GetI { descr: RegArrayId, bias: i32 },
    Qop(Op),
    Triop(Op),
    Binop(Op),
    Unop(Op),
    Load { end: Endness, ty: IrType },
    Mux0X,
    CCall { cee: CalleeId, ret_ty: IrType },
}

impl Shell {
    fn build(self, addr: Addr, kids: Vec<ExprId>) -> Result<Expr> {
        Ok(match self {
            Shell::Leaf(expr) => expr,
            Shell::GetI { descr, bias } => {
                let [ix] = fixed(addr, kids)?;
                Expr::GetI { descr, ix, bias }
            }
            Shell::Qop(op) => Expr::Qop {
                op,
                args: fixed(addr, kids)?,
            },
            Shell::Triop(op) => Expr::Triop {
                op,
                args: fixed(addr, kids)?,
            },
            Shell::Binop(op) => Expr::Binop {
                op,
                args: fixed(addr, kids)?,
            },
            Shell::Unop(op) => {
                let [arg] = fixed(addr, kids)?;
                Expr::Unop { op, arg }
            }
            Shell::Load { end, ty } => {
                let [target] = fixed(addr, kids)?;
                Expr::Load {
                    end,
                    ty,
                    addr: target,
                }
            }
            Shell::Mux0X => {
                let [cond, expr0, expr_x] = fixed(addr, kids)?;
                Expr::Mux0X {
                    cond,
                    expr0,
                    expr_x,
                }
            }
            Shell::CCall { cee, ret_ty } => Expr::CCall {
                cee,
                ret_ty,
                args: kids,
            },
        })
    }
}

fn fixed<const N: usize>(addr: Addr, kids: Vec<ExprId>) -> Result<[ExprId; N]> {
    let found = kids.len();
    kids.try_into().map_err(|_| {
        Error::invariant(
            NodeKind::Expr,
            addr,
            format!("expected {} children, copied {}", N, found),
        )
    })
}

/// One level of an expression descent
struct Frame {
    addr: Addr,
    shell: Shell,
    children: Vec<Addr>,
    copied: Vec<ExprId>,
}

pub(crate) struct Copier<'a, 'c> {
    view: SourceView<'a>,
    config: &'c CopyConfig,
    arena: IrArena,
    type_envs: HashMap<Addr, TypeEnvId>,
    callees: HashMap<Addr, CalleeId>,
    reg_arrays: HashMap<Addr, RegArrayId>,
    /// Type environment temps are checked against
    scope: Option<TypeEnvId>,
}

impl<'a, 'c> Copier<'a, 'c> {
    pub(crate) fn new(view: SourceView<'a>, config: &'c CopyConfig) -> Self {
        Self {
            view,
            config,
            arena: IrArena::from_config(config),
            type_envs: HashMap::new(),
            callees: HashMap::new(),
            reg_arrays: HashMap::new(),
            scope: None,
        }
    }

    pub(crate) fn arena(&self) -> &IrArena {
        &self.arena
    }

    pub(crate) fn into_arena(self) -> IrArena {
        self.arena
    }

    pub(crate) fn view(&self) -> SourceView<'a> {
        self.view
    }

    pub(crate) fn set_scope(&mut self, scope: Option<TypeEnvId>) {
        self.scope = scope;
    }

    pub(crate) fn block(&mut self, addr: Addr) -> Result<BlockId> {
        let view = self.view;
        view.check_record(NodeKind::Block, addr, block::WORDS)?;

        let tyenv = self.type_env(view.required(NodeKind::Block, addr, block::TYENV, "tyenv")?)?;
        let outer = self.scope.replace(tyenv);

        let used = view.word_i32(NodeKind::Block, addr, block::STMTS_USED)?;
        if used < 0 {
            return Err(Error::invariant(
                NodeKind::Block,
                addr,
                format!("negative stmts_used {}", used),
            ));
        }
        let used = used as u32;
        let mut stmts = Vec::new();
        if used > 0 {
            let array = view.required(NodeKind::Block, addr, block::STMTS, "stmts")?;
            view.check_record(NodeKind::Block, array, used)?;
            stmts = self.arena.sequence(used as usize, NodeKind::Stmt)?;
            for i in 0..used {
                let stmt = view.ptr(NodeKind::Block, array, i)?;
                if stmt.is_null() {
                    return Err(Error::invariant(
                        NodeKind::Block,
                        addr,
                        format!("stmts[{}] is NULL", i),
                    ));
                }
                stmts.push(self.stmt(stmt)?);
            }
        }

        let next = self.expr(view.required(NodeKind::Block, addr, block::NEXT, "next")?)?;
        let jumpkind = JumpKind::decode(view.word(NodeKind::Block, addr, block::JUMPKIND)?, addr)?;
        let offs_ip = view.word_i32(NodeKind::Block, addr, block::OFFS_IP)?;
        let arch = Arch::decode(view.word(NodeKind::Block, addr, block::ARCH)?, addr)?;
        self.scope = outer;

        self.arena.alloc_block(Block {
            tyenv,
            stmts,
            next,
            jumpkind,
            offs_ip,
            arch,
        })
    }

    pub(crate) fn type_env(&mut self, addr: Addr) -> Result<TypeEnvId> {
        if let Some(id) = self.shared(&self.type_envs, addr) {
            tracing::trace!("reusing type env {} for {}", id, addr);
            return Ok(id);
        }
        let view = self.view;
        let used = view.word(NodeKind::TypeEnv, addr, type_env::USED)?;
        view.check_record(
            NodeKind::TypeEnv,
            addr,
            type_env::TYPES.saturating_add(used),
        )?;
        let mut types = self.arena.sequence(used as usize, NodeKind::TypeEnv)?;
        for i in 0..used {
            let raw = view.word(NodeKind::TypeEnv, addr, type_env::TYPES + i)?;
            types.push(IrType::decode(raw, addr)?);
        }
        let id = self.arena.alloc_type_env(TypeEnv::new(types))?;
        if self.config.dedup_shared {
            self.type_envs.insert(addr, id);
        }
        Ok(id)
    }

    pub(crate) fn callee(&mut self, addr: Addr) -> Result<CalleeId> {
        if let Some(id) = self.shared(&self.callees, addr) {
            tracing::trace!("reusing callee {} for {}", id, addr);
            return Ok(id);
        }
        let view = self.view;
        view.check_record(NodeKind::Callee, addr, callee::WORDS)?;
        let regparms = view.word_i32(NodeKind::Callee, addr, callee::REGPARMS)?;
        if !(0..=3).contains(&regparms) {
            return Err(Error::invariant(
                NodeKind::Callee,
                addr,
                format!("regparms {} outside 0..=3", regparms),
            ));
        }
        let name = view.string(view.required(NodeKind::Callee, addr, callee::NAME, "name")?)?;
        let id = self.arena.alloc_callee(Callee {
            regparms,
            name: name.to_string(),
            addr: view.dword(NodeKind::Callee, addr, callee::ADDR)?,
            mcx_mask: view.word(NodeKind::Callee, addr, callee::MCX_MASK)?,
        })?;
        if self.config.dedup_shared {
            self.callees.insert(addr, id);
        }
        Ok(id)
    }

    pub(crate) fn reg_array(&mut self, addr: Addr) -> Result<RegArrayId> {
        if let Some(id) = self.shared(&self.reg_arrays, addr) {
            tracing::trace!("reusing reg array {} for {}", id, addr);
            return Ok(id);
        }
        let view = self.view;
        view.check_record(NodeKind::RegArray, addr, reg_array::WORDS)?;
        let base = view.word_i32(NodeKind::RegArray, addr, reg_array::BASE)?;
        let elem_ty = IrType::decode(view.word(NodeKind::RegArray, addr, reg_array::ELEM_TY)?, addr)?;
        let n_elems = view.word_i32(NodeKind::RegArray, addr, reg_array::N_ELEMS)?;
        if n_elems <= 0 {
            return Err(Error::invariant(
                NodeKind::RegArray,
                addr,
                format!("n_elems {} must be positive", n_elems),
            ));
        }
        let id = self.arena.alloc_reg_array(RegArray {
            base,
            elem_ty,
            n_elems,
        })?;
        if self.config.dedup_shared {
            self.reg_arrays.insert(addr, id);
        }
        Ok(id)
    }

    fn shared<I: Copy>(&self, memo: &HashMap<Addr, I>, addr: Addr) -> Option<I> {
        if self.config.dedup_shared {
            memo.get(&addr).copied()
        } else {
            None
        }
    }

    pub(crate) fn constant(&mut self, addr: Addr) -> Result<ConstId> {
        let view = self.view;
        let tag = ConstTag::decode(view.word(NodeKind::Const, addr, constant::TAG)?, addr)?;
        let narrow = |limit: u32| -> Result<u32> {
            let value = view.word(NodeKind::Const, addr, constant::VALUE)?;
            if value > limit {
                return Err(Error::invariant(
                    NodeKind::Const,
                    addr,
                    format!("{} payload {:#x} exceeds {:#x}", tag.name(), value, limit),
                ));
            }
            Ok(value)
        };
        let wide = || view.dword(NodeKind::Const, addr, constant::VALUE);
        let value = match tag {
            ConstTag::U1 => Const::U1(narrow(1)? == 1),
            ConstTag::U8 => Const::U8(narrow(u8::MAX as u32)? as u8),
            ConstTag::U16 => Const::U16(narrow(u16::MAX as u32)? as u16),
            ConstTag::U32 => Const::U32(narrow(u32::MAX)?),
            ConstTag::U64 => Const::U64(wide()?),
            ConstTag::F32 => Const::F32(narrow(u32::MAX)?),
            ConstTag::F32i => Const::F32i(narrow(u32::MAX)?),
            ConstTag::F64 => Const::F64(wide()?),
            ConstTag::F64i => Const::F64i(wide()?),
            ConstTag::V128 => Const::V128(narrow(u16::MAX as u32)? as u16),
            ConstTag::V256 => Const::V256(narrow(u32::MAX)?),
        };
        self.arena.alloc_const(value)
    }

    /// Checks a temp field against the enclosing type environment
    fn temp(&self, kind: NodeKind, addr: Addr, raw: u32, usage: TempUse) -> Result<Temp> {
        let temp = Temp(raw);
        if !self.config.check_temps {
            return Ok(temp);
        }
        if !temp.is_valid() {
            return match usage {
                TempUse::Optional => Ok(temp),
                TempUse::Required => Err(Error::invariant(kind, addr, "IRTemp_INVALID used as a temp")),
            };
        }
        if let Some(env) = self.scope {
            let env = self.arena.type_env(env);
            if !env.is_bound(temp) {
                return Err(Error::invariant(
                    kind,
                    addr,
                    format!("{} is not bound in a type environment of {} temps", temp, env.len()),
                ));
            }
        }
        Ok(temp)
    }

    /// Reads a NULL-terminated expression vector
    fn vec_addrs(&self, kind: NodeKind, vector: Addr) -> Result<Vec<Addr>> {
        let mut addrs = Vec::new();
        loop {
            let entry = self.view.ptr(kind, vector, addrs.len() as u32)?;
            if entry.is_null() {
                return Ok(addrs);
            }
            addrs.push(entry);
        }
    }

    /// Copies a NULL-terminated expression vector, preserving order
    fn expr_vec(&mut self, kind: NodeKind, vector: Addr) -> Result<Vec<ExprId>> {
        let addrs = self.vec_addrs(kind, vector)?;
        let mut out = self.arena.sequence(addrs.len(), NodeKind::Expr)?;
        for entry in addrs {
            out.push(self.expr(entry)?);
        }
        Ok(out)
    }

    fn child(&mut self, kind: NodeKind, addr: Addr, index: u32, name: &str) -> Result<ExprId> {
        let target = self.view.required(kind, addr, index, name)?;
        self.expr(target)
    }

    fn opt_child(&mut self, kind: NodeKind, addr: Addr, index: u32) -> Result<Option<ExprId>> {
        match self.view.optional(kind, addr, index)? {
            Some(target) => self.expr(target).map(Some),
            None => Ok(None),
        }
    }

    /// Copies an expression tree
    ///
    /// The descent keeps its own stack of half-built nodes on the heap, so
    /// `max_depth` bounds memory rather than the thread stack. A path of
    /// exactly `max_depth` nested expressions is accepted.
    pub(crate) fn expr(&mut self, root: Addr) -> Result<ExprId> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut next = root;
        loop {
            if stack.len() >= self.config.max_depth {
                return Err(Error::invariant(
                    NodeKind::Expr,
                    next,
                    format!(
                        "expression nesting exceeds {} (cyclic graph?)",
                        self.config.max_depth
                    ),
                ));
            }
            stack.push(self.expr_frame(next)?);

            while let Some(frame) = stack.pop() {
                if let Some(&child) = frame.children.get(frame.copied.len()) {
                    next = child;
                    stack.push(frame);
                    break;
                }
                let id = self
                    .arena
                    .alloc_expr(frame.shell.build(frame.addr, frame.copied)?)?;
                match stack.last_mut() {
                    Some(parent) => parent.copied.push(id),
                    None => return Ok(id),
                }
            }
        }
    }

    /// Decodes one expression record, copying everything but its children
    fn expr_frame(&mut self, addr: Addr) -> Result<Frame> {
        const K: NodeKind = NodeKind::Expr;
        let view = self.view;
        let child = |index: u32, name: &str| view.required(K, addr, index, name);
        let args = |n: u32| -> Result<Vec<Addr>> {
            (0..n).map(|i| child(field(1 + i), "arg")).collect()
        };
        let tag = ExprTag::decode(view.word(K, addr, node::TAG)?, addr)?;
        let (shell, children) = match tag {
            ExprTag::Binder => (
                Shell::Leaf(Expr::Binder(view.word_i32(K, addr, field(0))?)),
                Vec::new(),
            ),
            ExprTag::Get => (
                Shell::Leaf(Expr::Get {
                    offset: view.word_i32(K, addr, field(0))?,
                    ty: IrType::decode(view.word(K, addr, field(1))?, addr)?,
                }),
                Vec::new(),
            ),
            ExprTag::GetI => {
                let descr = self.reg_array(child(field(0), "descr")?)?;
                let ix = child(field(1), "ix")?;
                let bias = view.word_i32(K, addr, field(2))?;
                (Shell::GetI { descr, bias }, vec![ix])
            }
            ExprTag::RdTmp => {
                let raw = view.word(K, addr, field(0))?;
                let tmp = self.temp(K, addr, raw, TempUse::Required)?;
                (Shell::Leaf(Expr::RdTmp(tmp)), Vec::new())
            }
            ExprTag::Qop => (Shell::Qop(Op(view.word(K, addr, field(0))?)), args(4)?),
            ExprTag::Triop => (Shell::Triop(Op(view.word(K, addr, field(0))?)), args(3)?),
            ExprTag::Binop => {
                let op = Op(view.word(K, addr, field(0))?);
                let lhs = child(field(1), "arg1")?;
                let rhs = child(field(2), "arg2")?;
                (Shell::Binop(op), vec![lhs, rhs])
            }
            ExprTag::Unop => (
                Shell::Unop(Op(view.word(K, addr, field(0))?)),
                vec![child(field(1), "arg")?],
            ),
            ExprTag::Load => (
                Shell::Load {
                    end: Endness::decode(view.word(K, addr, field(0))?, addr)?,
                    ty: IrType::decode(view.word(K, addr, field(1))?, addr)?,
                },
                vec![child(field(2), "addr")?],
            ),
            ExprTag::Const => {
                let con = self.constant(child(field(0), "con")?)?;
                (Shell::Leaf(Expr::Const(con)), Vec::new())
            }
            ExprTag::Mux0X => (
                Shell::Mux0X,
                vec![
                    child(field(0), "cond")?,
                    child(field(1), "expr0")?,
                    child(field(2), "exprX")?,
                ],
            ),
            ExprTag::CCall => {
                let cee = self.callee(child(field(0), "cee")?)?;
                let ret_ty = IrType::decode(view.word(K, addr, field(1))?, addr)?;
                let args = self.vec_addrs(K, child(field(2), "args")?)?;
                (Shell::CCall { cee, ret_ty }, args)
            }
        };
        let copied = self.arena.sequence(children.len(), NodeKind::Expr)?;
        Ok(Frame {
            addr,
            shell,
            children,
            copied,
        })
    }

    pub(crate) fn stmt(&mut self, addr: Addr) -> Result<StmtId> {
        const K: NodeKind = NodeKind::Stmt;
        let view = self.view;
        let tag = StmtTag::decode(view.word(K, addr, node::TAG)?, addr)?;
        let stmt = match tag {
            StmtTag::NoOp => Stmt::NoOp,
            StmtTag::IMark => {
                let at = view.dword(K, addr, field(0))?;
                let len = view.word_i32(K, addr, field(2))?;
                let delta = view.word(K, addr, field(3))?;
                let delta = u8::try_from(delta).map_err(|_| {
                    Error::invariant(K, addr, format!("IMark delta {} exceeds 255", delta))
                })?;
                Stmt::IMark {
                    addr: at,
                    len,
                    delta,
                }
            }
            StmtTag::AbiHint => Stmt::AbiHint {
                base: self.child(K, addr, field(0), "base")?,
                len: view.word_i32(K, addr, field(1))?,
                nia: self.child(K, addr, field(2), "nia")?,
            },
            StmtTag::Put => Stmt::Put {
                offset: view.word_i32(K, addr, field(0))?,
                data: self.child(K, addr, field(1), "data")?,
            },
            StmtTag::PutI => {
                let details = view.required(K, addr, field(0), "details")?;
                view.check_record(K, details, put_i::WORDS)?;
                Stmt::PutI(Box::new(PutI {
                    descr: self.reg_array(view.required(K, details, put_i::DESCR, "descr")?)?,
                    ix: self.child(K, details, put_i::IX, "ix")?,
                    bias: view.word_i32(K, details, put_i::BIAS)?,
                    data: self.child(K, details, put_i::DATA, "data")?,
                }))
            }
            StmtTag::WrTmp => {
                let raw = view.word(K, addr, field(0))?;
                Stmt::WrTmp {
                    tmp: self.temp(K, addr, raw, TempUse::Required)?,
                    data: self.child(K, addr, field(1), "data")?,
                }
            }
            StmtTag::Store => Stmt::Store {
                end: Endness::decode(view.word(K, addr, field(0))?, addr)?,
                addr: self.child(K, addr, field(1), "addr")?,
                data: self.child(K, addr, field(2), "data")?,
            },
            StmtTag::Cas => Stmt::Cas(Box::new(self.cas(addr)?)),
            StmtTag::Llsc => {
                let end = Endness::decode(view.word(K, addr, field(0))?, addr)?;
                let raw = view.word(K, addr, field(1))?;
                Stmt::Llsc {
                    end,
                    result: self.temp(K, addr, raw, TempUse::Required)?,
                    addr: self.child(K, addr, field(2), "addr")?,
                    storedata: self.opt_child(K, addr, field(3))?,
                }
            }
            StmtTag::Dirty => Stmt::Dirty(Box::new(self.dirty(addr)?)),
            StmtTag::Mbe => Stmt::Mbe(MBusEvent::decode(view.word(K, addr, field(0))?, addr)?),
            StmtTag::Exit => Stmt::Exit {
                guard: self.child(K, addr, field(0), "guard")?,
                jk: JumpKind::decode(view.word(K, addr, field(1))?, addr)?,
                dst: self.constant(view.required(K, addr, field(2), "dst")?)?,
                offs_ip: view.word_i32(K, addr, field(3))?,
            },
        };
        self.arena.alloc_stmt(stmt)
    }

    fn cas(&mut self, addr: Addr) -> Result<Cas> {
        const K: NodeKind = NodeKind::Stmt;
        let view = self.view;
        let details = view.required(K, addr, field(0), "details")?;
        view.check_record(K, details, cas::WORDS)?;
        let old_hi = self.temp(K, details, view.word(K, details, cas::OLD_HI)?, TempUse::Optional)?;
        let old_lo = self.temp(K, details, view.word(K, details, cas::OLD_LO)?, TempUse::Required)?;
        let end = Endness::decode(view.word(K, details, cas::END)?, details)?;
        let target = self.child(K, details, cas::ADDR, "addr")?;
        let expd_hi = self.opt_child(K, details, cas::EXPD_HI)?;
        let expd_lo = self.child(K, details, cas::EXPD_LO, "expdLo")?;
        let data_hi = self.opt_child(K, details, cas::DATA_HI)?;
        let data_lo = self.child(K, details, cas::DATA_LO, "dataLo")?;
        if expd_hi.is_some() != data_hi.is_some() {
            return Err(Error::invariant(
                K,
                details,
                "expdHi and dataHi must be both present or both NULL",
            ));
        }
        Ok(Cas {
            old_hi,
            old_lo,
            end,
            addr: target,
            expd_hi,
            expd_lo,
            data_hi,
            data_lo,
        })
    }

    fn dirty(&mut self, addr: Addr) -> Result<Dirty> {
        const K: NodeKind = NodeKind::Stmt;
        let view = self.view;
        let details = view.required(K, addr, field(0), "details")?;
        view.check_record(K, details, dirty::WORDS)?;

        let cee = self.callee(view.required(K, details, dirty::CEE, "cee")?)?;
        let guard = self.child(K, details, dirty::GUARD, "guard")?;
        let args = self.expr_vec(K, view.required(K, details, dirty::ARGS, "args")?)?;
        let tmp = self.temp(K, details, view.word(K, details, dirty::TMP)?, TempUse::Optional)?;
        let m_fx = Effect::decode(view.word(K, details, dirty::M_FX)?, details)?;
        let m_addr = self.opt_child(K, details, dirty::M_ADDR)?;
        let m_size = view.word_i32(K, details, dirty::M_SIZE)?;
        match (m_fx, m_addr) {
            (Effect::None, Some(_)) => {
                return Err(Error::invariant(K, details, "mAddr set without a memory effect"))
            }
            (Effect::None, None) if m_size != 0 => {
                return Err(Error::invariant(K, details, "mSize set without a memory effect"))
            }
            (fx, None) if fx != Effect::None => {
                return Err(Error::invariant(
                    K,
                    details,
                    format!("memory effect {} without mAddr", fx.name()),
                ))
            }
            _ => {}
        }
        let needs_bbp = view.word(K, details, dirty::NEEDS_BBP)? != 0;

        let n_fx = view.word_i32(K, details, dirty::N_FX_STATE)?;
        if !(0..=MAX_FX_STATE as i32).contains(&n_fx) {
            return Err(Error::invariant(
                K,
                details,
                format!("nFxState {} outside 0..={}", n_fx, MAX_FX_STATE),
            ));
        }
        let mut fx_state = self.arena.sequence(n_fx as usize, NodeKind::Stmt)?;
        for i in 0..n_fx as u32 {
            let base = dirty::FX_STATE + dirty::FX_WORDS * i;
            let range = |word: u32, max: u32, name: &str| -> Result<u32> {
                let value = view.word(K, details, base + word)?;
                if value > max {
                    return Err(Error::invariant(
                        K,
                        details,
                        format!("fxState[{}].{} {} exceeds {}", i, name, value, max),
                    ));
                }
                Ok(value)
            };
            fx_state.push(FxState {
                fx: Effect::decode(view.word(K, details, base)?, details)?,
                offset: range(1, u16::MAX as u32, "offset")? as u16,
                size: range(2, u16::MAX as u32, "size")? as u16,
                n_repeats: range(3, u8::MAX as u32, "nRepeats")? as u8,
                repeat_len: range(4, u8::MAX as u32, "repeatLen")? as u8,
            });
        }

        Ok(Dirty {
            cee,
            guard,
            args,
            tmp,
            m_fx,
            m_addr,
            m_size,
            needs_bbp,
            fx_state,
        })
    }
}
