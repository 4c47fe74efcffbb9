//! Owned IR node definitions
//!
//! One Rust variant per engine tag. Children are arena ids; shared
//! substructures (callees, register arrays, type environments) are referenced
//! by id, so aliasing in the source survives the copy as id equality.

use super::arena::{CalleeId, ConstId, ExprId, RegArrayId, StmtId, TypeEnvId};
use super::types::{
    Arch, ConstTag, Effect, Endness, ExprTag, IrType, JumpKind, MBusEvent, Op, StmtTag, Temp,
};
use serde::{Deserialize, Serialize};

/// Literal constant
///
/// Float kinds hold their IEEE bit patterns so equality is bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Const {
    U1(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// 32-bit float (bits)
    F32(u32),
    /// 32-bit float given as an integer bit pattern
    F32i(u32),
    /// 64-bit float (bits)
    F64(u64),
    /// 64-bit float given as an integer bit pattern
    F64i(u64),
    /// 128-bit vector, one bit per byte lane
    V128(u16),
    /// 256-bit vector, one bit per byte lane
    V256(u32),
}

impl Const {
    /// Engine tag of this constant
    pub fn tag(&self) -> ConstTag {
        match self {
            Const::U1(_) => ConstTag::U1,
            Const::U8(_) => ConstTag::U8,
            Const::U16(_) => ConstTag::U16,
            Const::U32(_) => ConstTag::U32,
            Const::U64(_) => ConstTag::U64,
            Const::F32(_) => ConstTag::F32,
            Const::F32i(_) => ConstTag::F32i,
            Const::F64(_) => ConstTag::F64,
            Const::F64i(_) => ConstTag::F64i,
            Const::V128(_) => ConstTag::V128,
            Const::V256(_) => ConstTag::V256,
        }
    }

    /// Type of the value this constant denotes
    pub fn ty(&self) -> IrType {
        match self {
            Const::U1(_) => IrType::I1,
            Const::U8(_) => IrType::I8,
            Const::U16(_) => IrType::I16,
            Const::U32(_) => IrType::I32,
            Const::U64(_) => IrType::I64,
            Const::F32(_) | Const::F32i(_) => IrType::F32,
            Const::F64(_) | Const::F64i(_) => IrType::F64,
            Const::V128(_) => IrType::V128,
            Const::V256(_) => IrType::V256,
        }
    }

    /// Payload widened to 64 bits
    pub fn bits(&self) -> u64 {
        match *self {
            Const::U1(b) => b as u64,
            Const::U8(v) => v as u64,
            Const::U16(v) | Const::V128(v) => v as u64,
            Const::U32(v) | Const::F32(v) | Const::F32i(v) | Const::V256(v) => v as u64,
            Const::U64(v) | Const::F64(v) | Const::F64i(v) => v,
        }
    }

    /// True if the payload occupies two words in the engine layout
    pub fn is_wide(&self) -> bool {
        matches!(self, Const::U64(_) | Const::F64(_) | Const::F64i(_))
    }
}

/// Helper function descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Callee {
    /// Number of arguments passed in registers (0..=3)
    pub regparms: i32,
    /// Helper name, for printing
    pub name: String,
    /// Host address of the helper
    pub addr: u64,
    /// Arguments excluded from definedness checking, one bit each
    pub mcx_mask: u32,
}

/// Slice of the guest register file addressed by GetI/PutI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegArray {
    /// Guest state offset of element 0
    pub base: i32,
    /// Element type
    pub elem_ty: IrType,
    /// Number of elements (> 0)
    pub n_elems: i32,
}

/// Types of every temp in a block, indexed by temp number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEnv {
    pub types: Vec<IrType>,
}

impl TypeEnv {
    /// Creates an environment from a list of temp types
    pub fn new(types: Vec<IrType>) -> Self {
        Self { types }
    }

    /// Binds a new temp of the given type
    pub fn new_temp(&mut self, ty: IrType) -> Temp {
        self.types.push(ty);
        Temp((self.types.len() - 1) as u32)
    }

    /// Type of a bound temp
    pub fn type_of(&self, temp: Temp) -> Option<IrType> {
        self.types.get(temp.index()).copied()
    }

    /// Returns true if `temp` is bound here
    pub fn is_bound(&self, temp: Temp) -> bool {
        temp.is_valid() && temp.index() < self.types.len()
    }

    /// Number of bound temps
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no temp is bound
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Pattern-matching binder (only meaningful inside engine rewrites)
    Binder(i32),
    /// Read a guest register at a fixed offset
    Get { offset: i32, ty: IrType },
    /// Read a guest register at a computed offset
    GetI {
        descr: RegArrayId,
        ix: ExprId,
        bias: i32,
    },
    /// Read a temp
    RdTmp(Temp),
    /// Quaternary operation
    Qop { op: Op, args: [ExprId; 4] },
    /// Ternary operation
    Triop { op: Op, args: [ExprId; 3] },
    /// Binary operation
    Binop { op: Op, args: [ExprId; 2] },
    /// Unary operation
    Unop { op: Op, arg: ExprId },
    /// Memory load
    Load {
        end: Endness,
        ty: IrType,
        addr: ExprId,
    },
    /// Constant
    Const(ConstId),
    /// `cond == 0 ? expr0 : expr_x`
    Mux0X {
        cond: ExprId,
        expr0: ExprId,
        expr_x: ExprId,
    },
    /// Call to a pure helper
    CCall {
        cee: CalleeId,
        ret_ty: IrType,
        args: Vec<ExprId>,
    },
}

impl Expr {
    /// Engine tag of this expression
    pub fn tag(&self) -> ExprTag {
        match self {
            Expr::Binder(_) => ExprTag::Binder,
            Expr::Get { .. } => ExprTag::Get,
            Expr::GetI { .. } => ExprTag::GetI,
            Expr::RdTmp(_) => ExprTag::RdTmp,
            Expr::Qop { .. } => ExprTag::Qop,
            Expr::Triop { .. } => ExprTag::Triop,
            Expr::Binop { .. } => ExprTag::Binop,
            Expr::Unop { .. } => ExprTag::Unop,
            Expr::Load { .. } => ExprTag::Load,
            Expr::Const(_) => ExprTag::Const,
            Expr::Mux0X { .. } => ExprTag::Mux0X,
            Expr::CCall { .. } => ExprTag::CCall,
        }
    }

    /// Child expressions in field order
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Binder(_) | Expr::Get { .. } | Expr::RdTmp(_) | Expr::Const(_) => Vec::new(),
            Expr::GetI { ix, .. } => vec![*ix],
            Expr::Qop { args, .. } => args.to_vec(),
            Expr::Triop { args, .. } => args.to_vec(),
            Expr::Binop { args, .. } => args.to_vec(),
            Expr::Unop { arg, .. } => vec![*arg],
            Expr::Load { addr, .. } => vec![*addr],
            Expr::Mux0X {
                cond,
                expr0,
                expr_x,
            } => vec![*cond, *expr0, *expr_x],
            Expr::CCall { args, .. } => args.clone(),
        }
    }
}

/// Details of an indexed register write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutI {
    pub descr: RegArrayId,
    pub ix: ExprId,
    pub bias: i32,
    pub data: ExprId,
}

/// Details of an atomic compare-and-swap
///
/// Single-element CAS leaves `old_hi` invalid and the `*_hi` expressions empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cas {
    pub old_hi: Temp,
    pub old_lo: Temp,
    pub end: Endness,
    pub addr: ExprId,
    pub expd_hi: Option<ExprId>,
    pub expd_lo: ExprId,
    pub data_hi: Option<ExprId>,
    pub data_lo: ExprId,
}

impl Cas {
    /// True for a double-element CAS
    pub fn is_double(&self) -> bool {
        self.old_hi.is_valid()
    }
}

/// One guest-state range touched by a dirty call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxState {
    pub fx: Effect,
    pub offset: u16,
    pub size: u16,
    pub n_repeats: u8,
    pub repeat_len: u8,
}

/// Details of a call to a helper with side effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirty {
    pub cee: CalleeId,
    pub guard: ExprId,
    pub args: Vec<ExprId>,
    /// Result temp, or `Temp::INVALID` when the result is discarded
    pub tmp: Temp,
    pub m_fx: Effect,
    pub m_addr: Option<ExprId>,
    pub m_size: i32,
    pub needs_bbp: bool,
    pub fx_state: Vec<FxState>,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    NoOp,
    /// Start of a guest instruction
    IMark { addr: u64, len: i32, delta: u8 },
    /// ABI hint: `[base, base + len)` became undefined, next insn at `nia`
    AbiHint { base: ExprId, len: i32, nia: ExprId },
    /// Write a guest register at a fixed offset
    Put { offset: i32, data: ExprId },
    /// Write a guest register at a computed offset
    PutI(Box<PutI>),
    /// Assign a temp
    WrTmp { tmp: Temp, data: ExprId },
    /// Memory store
    Store {
        end: Endness,
        addr: ExprId,
        data: ExprId,
    },
    Cas(Box<Cas>),
    /// Load-linked (`storedata` empty) or store-conditional
    Llsc {
        end: Endness,
        result: Temp,
        addr: ExprId,
        storedata: Option<ExprId>,
    },
    Dirty(Box<Dirty>),
    /// Memory bus event
    Mbe(MBusEvent),
    /// Conditional side exit
    Exit {
        guard: ExprId,
        jk: JumpKind,
        dst: ConstId,
        offs_ip: i32,
    },
}

impl Stmt {
    /// Engine tag of this statement
    pub fn tag(&self) -> StmtTag {
        match self {
            Stmt::NoOp => StmtTag::NoOp,
            Stmt::IMark { .. } => StmtTag::IMark,
            Stmt::AbiHint { .. } => StmtTag::AbiHint,
            Stmt::Put { .. } => StmtTag::Put,
            Stmt::PutI(_) => StmtTag::PutI,
            Stmt::WrTmp { .. } => StmtTag::WrTmp,
            Stmt::Store { .. } => StmtTag::Store,
            Stmt::Cas(_) => StmtTag::Cas,
            Stmt::Llsc { .. } => StmtTag::Llsc,
            Stmt::Dirty(_) => StmtTag::Dirty,
            Stmt::Mbe(_) => StmtTag::Mbe,
            Stmt::Exit { .. } => StmtTag::Exit,
        }
    }

    /// Top-level expressions of this statement in field order
    pub fn exprs(&self) -> Vec<ExprId> {
        match self {
            Stmt::NoOp | Stmt::IMark { .. } | Stmt::Mbe(_) => Vec::new(),
            Stmt::AbiHint { base, nia, .. } => vec![*base, *nia],
            Stmt::Put { data, .. } | Stmt::WrTmp { data, .. } => vec![*data],
            Stmt::PutI(details) => vec![details.ix, details.data],
            Stmt::Store { addr, data, .. } => vec![*addr, *data],
            Stmt::Cas(cas) => {
                let mut out = vec![cas.addr];
                out.extend(cas.expd_hi);
                out.push(cas.expd_lo);
                out.extend(cas.data_hi);
                out.push(cas.data_lo);
                out
            }
            Stmt::Llsc {
                addr, storedata, ..
            } => {
                let mut out = vec![*addr];
                out.extend(*storedata);
                out
            }
            Stmt::Dirty(d) => {
                let mut out = vec![d.guard];
                out.extend(d.args.iter().copied());
                out.extend(d.m_addr);
                out
            }
            Stmt::Exit { guard, .. } => vec![*guard],
        }
    }

    /// Temps written by this statement
    pub fn defined_temps(&self) -> Vec<Temp> {
        match self {
            Stmt::WrTmp { tmp, .. } => vec![*tmp],
            Stmt::Llsc { result, .. } => vec![*result],
            Stmt::Cas(cas) => [cas.old_hi, cas.old_lo]
                .into_iter()
                .filter(|t| t.is_valid())
                .collect(),
            Stmt::Dirty(d) if d.tmp.is_valid() => vec![d.tmp],
            _ => Vec::new(),
        }
    }
}

/// Superblock: one straight-line region with side exits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub tyenv: TypeEnvId,
    pub stmts: Vec<StmtId>,
    /// Address of the fall-through successor
    pub next: ExprId,
    pub jumpkind: JumpKind,
    /// Guest state offset of the instruction pointer
    pub offs_ip: i32,
    pub arch: Arch,
}
