//! Engine tag tables
//!
//! Every tagged enumeration of the IR engine is declared once through
//! [`vex_enum!`]. The table gives each variant its raw engine value
//! (`base + position`), its engine spelling, and the reverse lookup used when
//! hosts pass enum names as strings.

use crate::error::{Error, NodeKind, Result};
use crate::image::Addr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

macro_rules! vex_enum {
    (
        $(#[$meta:meta])*
        $name:ident: kind = $kind:expr, base = $base:expr, prefix = $prefix:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $spelling:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Raw value of the first variant
            pub const BASE: u32 = $base;

            /// Node kind reported when decoding fails
            pub const KIND: NodeKind = $kind;

            /// All variants in engine order
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Raw engine value
            pub fn raw(self) -> u32 {
                Self::BASE + self as u32
            }

            /// Looks up a raw engine value
            pub fn from_raw(raw: u32) -> Option<Self> {
                let index = raw.checked_sub(Self::BASE)? as usize;
                Self::ALL.get(index).copied()
            }

            /// Decodes a raw value read at `addr`, failing on unknown tags
            pub fn decode(raw: u32, addr: Addr) -> Result<Self> {
                Self::from_raw(raw).ok_or_else(|| Error::unknown_tag(Self::KIND, raw, addr))
            }

            /// Engine spelling, e.g. `Ity_I32`
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => concat!($prefix, $spelling) ),+
                }
            }

            /// Spelling without the engine prefix, e.g. `I32`
            pub fn short_name(self) -> &'static str {
                match self {
                    $( $name::$variant => $spelling ),+
                }
            }

            /// Parses either spelling
            pub fn parse(s: &str) -> Option<Self> {
                match lookup_name(s) {
                    Some((kind, raw)) if kind == Self::KIND => Self::from_raw(raw),
                    _ => Self::ALL.iter().copied().find(|v| v.short_name() == s),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

vex_enum! {
    /// Type of a temp, register slice, load or call result
    IrType: kind = NodeKind::Type, base = 0x1100, prefix = "Ity_" {
        Invalid => "INVALID",
        I1 => "I1",
        I8 => "I8",
        I16 => "I16",
        I32 => "I32",
        I64 => "I64",
        I128 => "I128",
        F32 => "F32",
        F64 => "F64",
        D32 => "D32",
        D64 => "D64",
        D128 => "D128",
        F128 => "F128",
        V128 => "V128",
        V256 => "V256",
    }
}

vex_enum! {
    /// Byte order of a memory access
    Endness: kind = NodeKind::Endness, base = 0x1200, prefix = "Iend_" {
        Le => "LE",
        Be => "BE",
    }
}

vex_enum! {
    /// Constant kinds
    ConstTag: kind = NodeKind::Const, base = 0x1300, prefix = "Ico_" {
        U1 => "U1",
        U8 => "U8",
        U16 => "U16",
        U32 => "U32",
        U64 => "U64",
        F32 => "F32",
        F32i => "F32i",
        F64 => "F64",
        F64i => "F64i",
        V128 => "V128",
        V256 => "V256",
    }
}

vex_enum! {
    /// Expression kinds
    ExprTag: kind = NodeKind::Expr, base = 0x1900, prefix = "Iex_" {
        Binder => "Binder",
        Get => "Get",
        GetI => "GetI",
        RdTmp => "RdTmp",
        Qop => "Qop",
        Triop => "Triop",
        Binop => "Binop",
        Unop => "Unop",
        Load => "Load",
        Const => "Const",
        Mux0X => "Mux0X",
        CCall => "CCall",
    }
}

vex_enum! {
    /// Block and side-exit jump kinds
    JumpKind: kind = NodeKind::JumpKind, base = 0x1A00, prefix = "Ijk_" {
        Invalid => "INVALID",
        Boring => "Boring",
        Call => "Call",
        Ret => "Ret",
        ClientReq => "ClientReq",
        Yield => "Yield",
        EmWarn => "EmWarn",
        EmFail => "EmFail",
        NoDecode => "NoDecode",
        MapFail => "MapFail",
        TInval => "TInval",
        NoRedir => "NoRedir",
        SigTrap => "SigTRAP",
        SigSegv => "SigSEGV",
        SigBus => "SigBUS",
        SysSyscall => "Sys_syscall",
        SysInt32 => "Sys_int32",
        SysInt128 => "Sys_int128",
        SysInt129 => "Sys_int129",
        SysInt130 => "Sys_int130",
        SysSysenter => "Sys_sysenter",
    }
}

vex_enum! {
    /// Memory or guest-state effect of a dirty helper call
    Effect: kind = NodeKind::Effect, base = 0x1B00, prefix = "Ifx_" {
        None => "None",
        Read => "Read",
        Write => "Write",
        Modify => "Modify",
    }
}

vex_enum! {
    /// Memory bus events
    MBusEvent: kind = NodeKind::MBusEvent, base = 0x1C00, prefix = "Imbe_" {
        Fence => "Fence",
        CancelReservation => "CancelReservation",
    }
}

vex_enum! {
    /// Statement kinds
    StmtTag: kind = NodeKind::Stmt, base = 0x1E00, prefix = "Ist_" {
        NoOp => "NoOp",
        IMark => "IMark",
        AbiHint => "AbiHint",
        Put => "Put",
        PutI => "PutI",
        WrTmp => "WrTmp",
        Store => "Store",
        Cas => "CAS",
        Llsc => "LLSC",
        Dirty => "Dirty",
        Mbe => "MBE",
        Exit => "Exit",
    }
}

vex_enum! {
    /// Guest architecture a block was lifted from
    Arch: kind = NodeKind::Arch, base = 0x0400, prefix = "VexArch" {
        Invalid => "INVALID",
        X86 => "X86",
        Amd64 => "AMD64",
        Arm => "ARM",
        Ppc32 => "PPC32",
        Ppc64 => "PPC64",
        S390x => "S390X",
        Mips32 => "MIPS32",
    }
}

lazy_static::lazy_static! {
    /// Engine spelling -> (kind, raw value), across every tag table
    static ref NAME_TABLE: HashMap<&'static str, (NodeKind, u32)> = {
        let mut table = HashMap::new();
        macro_rules! register {
            ($($ty:ty),+) => {
                $(
                    for v in <$ty>::ALL {
                        table.insert(v.name(), (<$ty>::KIND, v.raw()));
                    }
                )+
            };
        }
        register!(IrType, Endness, ConstTag, ExprTag, JumpKind, Effect, MBusEvent, StmtTag, Arch);
        for raw in Op::BASE..=Op::LAST_NAMED {
            if let Some(name) = Op(raw).known_name() {
                table.insert(name, (NodeKind::Op, raw));
            }
        }
        table
    };
}

/// Resolves an engine spelling (`Ity_I64`, `Ijk_Call`, `Iop_Add32`, ...)
/// to its node kind and raw value
pub fn lookup_name(name: &str) -> Option<(NodeKind, u32)> {
    NAME_TABLE.get(name).copied()
}

impl IrType {
    /// Width in bits (`0` for `Ity_INVALID`)
    pub fn bits(self) -> u32 {
        match self {
            IrType::Invalid => 0,
            IrType::I1 => 1,
            IrType::I8 => 8,
            IrType::I16 => 16,
            IrType::I32 | IrType::F32 | IrType::D32 => 32,
            IrType::I64 | IrType::F64 | IrType::D64 => 64,
            IrType::I128 | IrType::D128 | IrType::F128 | IrType::V128 => 128,
            IrType::V256 => 256,
        }
    }

    /// Integer type of the given width, if there is one
    pub fn int_of_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(IrType::I1),
            8 => Some(IrType::I8),
            16 => Some(IrType::I16),
            32 => Some(IrType::I32),
            64 => Some(IrType::I64),
            128 => Some(IrType::I128),
            _ => None,
        }
    }
}

/// Number of guest-state effect slots in a dirty call
pub const MAX_FX_STATE: usize = 7;

/// SSA temporary, indexing the block's type environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Temp(pub u32);

impl Temp {
    /// "No temp" marker (`IRTemp_INVALID`)
    pub const INVALID: Temp = Temp(u32::MAX);

    /// Creates a temp with the given index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns false for `IRTemp_INVALID`
    pub fn is_valid(self) -> bool {
        self != Temp::INVALID
    }

    /// Index into the type environment
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "t{}", self.0)
        } else {
            f.write_str("IRTemp_INVALID")
        }
    }
}

/// Named integer operations: `Iop_INVALID`, then each family in widths
/// 8, 16, 32 and 64
#[rustfmt::skip]
const OP_NAMES: [&str; 49] = [
    "Iop_INVALID",
    "Iop_Add8", "Iop_Add16", "Iop_Add32", "Iop_Add64",
    "Iop_Sub8", "Iop_Sub16", "Iop_Sub32", "Iop_Sub64",
    "Iop_Mul8", "Iop_Mul16", "Iop_Mul32", "Iop_Mul64",
    "Iop_Or8", "Iop_Or16", "Iop_Or32", "Iop_Or64",
    "Iop_And8", "Iop_And16", "Iop_And32", "Iop_And64",
    "Iop_Xor8", "Iop_Xor16", "Iop_Xor32", "Iop_Xor64",
    "Iop_Shl8", "Iop_Shl16", "Iop_Shl32", "Iop_Shl64",
    "Iop_Shr8", "Iop_Shr16", "Iop_Shr32", "Iop_Shr64",
    "Iop_Sar8", "Iop_Sar16", "Iop_Sar32", "Iop_Sar64",
    "Iop_CmpEQ8", "Iop_CmpEQ16", "Iop_CmpEQ32", "Iop_CmpEQ64",
    "Iop_CmpNE8", "Iop_CmpNE16", "Iop_CmpNE32", "Iop_CmpNE64",
    "Iop_Not8", "Iop_Not16", "Iop_Not32", "Iop_Not64",
];

/// Primitive operation of a Unop/Binop/Triop/Qop
///
/// The engine defines several hundred operations. They are copied by value
/// without validation; only the integer prefix of the table has names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Op(pub u32);

impl Op {
    /// Raw value of `Iop_INVALID`
    pub const BASE: u32 = 0x1400;
    /// Last raw value with a known name (`Iop_Not64`)
    pub const LAST_NAMED: u32 = Self::BASE + (OP_NAMES.len() - 1) as u32;

    pub const INVALID: Op = Op(Self::BASE);
    pub const ADD8: Op = Op::family(0, 0);
    pub const ADD32: Op = Op::family(0, 2);
    pub const ADD64: Op = Op::family(0, 3);
    pub const SUB32: Op = Op::family(1, 2);
    pub const SUB64: Op = Op::family(1, 3);
    pub const AND64: Op = Op::family(4, 3);
    pub const XOR32: Op = Op::family(5, 2);
    pub const SHL64: Op = Op::family(6, 3);
    pub const CMPEQ32: Op = Op::family(9, 2);
    pub const CMPEQ64: Op = Op::family(9, 3);
    pub const CMPNE64: Op = Op::family(10, 3);
    pub const NOT64: Op = Op::family(11, 3);

    const fn family(family: u32, width: u32) -> Op {
        Op(Self::BASE + 1 + family * 4 + width)
    }

    fn known_name(self) -> Option<&'static str> {
        let index = usize::try_from(self.0.checked_sub(Self::BASE)?).ok()?;
        OP_NAMES.get(index).copied()
    }

    /// Engine spelling, or `Iop_<hex>` for operations without a name here
    pub fn name(self) -> String {
        match self.known_name() {
            Some(name) => name.to_string(),
            None => format!("Iop_{:#x}", self.0),
        }
    }

    /// Parses `Iop_Add64` style names and `Iop_0x...` fallbacks
    pub fn parse(s: &str) -> Option<Self> {
        if let Some((NodeKind::Op, raw)) = lookup_name(s) {
            return Some(Op(raw));
        }
        let hex = s.strip_prefix("Iop_0x")?;
        u32::from_str_radix(hex, 16).ok().map(Op)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
