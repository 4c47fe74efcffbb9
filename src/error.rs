//! Error types for the VEX IR deep-copy engine

use crate::image::Addr;
use std::fmt;
use thiserror::Error;

/// Kind of IR node an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    /// IRSB (superblock)
    Block,
    /// IRStmt
    Stmt,
    /// IRExpr
    Expr,
    /// IRConst
    Const,
    /// IRCallee
    Callee,
    /// IRRegArray
    RegArray,
    /// IRTypeEnv
    TypeEnv,
    /// IRType tag inside another node
    Type,
    /// IREndness tag inside another node
    Endness,
    /// IRJumpKind tag inside another node
    JumpKind,
    /// IREffect tag inside a dirty call
    Effect,
    /// IRMBusEvent tag inside an MBE statement
    MBusEvent,
    /// VexArch tag in a block header
    Arch,
    /// IROp value (names only, never decoded)
    Op,
    /// Byte string (callee names)
    String,
}

impl NodeKind {
    /// Engine-side name of the node kind
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Block => "IRSB",
            NodeKind::Stmt => "IRStmt",
            NodeKind::Expr => "IRExpr",
            NodeKind::Const => "IRConst",
            NodeKind::Callee => "IRCallee",
            NodeKind::RegArray => "IRRegArray",
            NodeKind::TypeEnv => "IRTypeEnv",
            NodeKind::Type => "IRType",
            NodeKind::Endness => "IREndness",
            NodeKind::JumpKind => "IRJumpKind",
            NodeKind::Effect => "IREffect",
            NodeKind::MBusEvent => "IRMBusEvent",
            NodeKind::Arch => "VexArch",
            NodeKind::Op => "IROp",
            NodeKind::String => "HChar*",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deep-copy errors
///
/// Every variant aborts the whole top-level copy. Nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Tag value not covered by the copy dispatch tables
    ///
    /// **Triggered by:** a node written by a newer (or corrupted) engine
    /// **Example:** an `IRStmt` with tag `0x1E0C` (one past `Ist_Exit`)
    /// **Meaning:** version skew between this crate and the IR engine
    #[error("Unknown {kind} tag {tag:#x} at {addr}")]
    UnknownTag {
        /// Node kind whose tag was not recognized
        kind: NodeKind,
        /// Raw tag value
        tag: u32,
        /// Address of the offending record
        addr: Addr,
    },

    /// The destination arena could not satisfy an allocation
    ///
    /// **Triggered by:** a configured node limit, or the allocator refusing a
    /// sequence buffer
    /// **Guarantee:** every allocation made by the failed call was released
    #[error("Allocation failure while copying {kind} ({live} nodes live, limit {limit:?})")]
    AllocationFailure {
        /// Node kind being allocated when the failure happened
        kind: NodeKind,
        /// Nodes held by the destination arena at the time of failure
        live: usize,
        /// Configured node limit, if any
        limit: Option<usize>,
    },

    /// The source graph breaks an IR contract
    ///
    /// **Triggered by:** unbound temps, NULL required children, dangling or
    /// misaligned pointers, out-of-range scalars, cycles
    /// **Policy:** never repaired, always surfaced
    #[error("Invariant violation in {kind} at {addr}: {detail}")]
    InvariantViolation {
        /// Node kind holding the violation
        kind: NodeKind,
        /// Address of the offending record
        addr: Addr,
        /// What was wrong
        detail: String,
    },

    /// The image header is missing or malformed
    #[error("Image error: {0}")]
    ImageError(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// Recoverable error that may be retried
    Recoverable,
}

impl Error {
    /// Create an invariant violation
    pub fn invariant(kind: NodeKind, addr: Addr, detail: impl Into<String>) -> Self {
        Error::InvariantViolation {
            kind,
            addr,
            detail: detail.into(),
        }
    }

    /// Create an unknown-tag error
    pub fn unknown_tag(kind: NodeKind, tag: u32, addr: Addr) -> Self {
        Error::UnknownTag { kind, tag, addr }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::UnknownTag { .. } => ErrorSeverity::Fatal,
            Error::InvariantViolation { .. } => ErrorSeverity::Fatal,
            Error::ImageError(_) => ErrorSeverity::Fatal,
            Error::AllocationFailure { .. } => ErrorSeverity::Recoverable,
        }
    }

    /// Node kind the error refers to, if any
    pub fn node_kind(&self) -> Option<NodeKind> {
        match self {
            Error::UnknownTag { kind, .. }
            | Error::AllocationFailure { kind, .. }
            | Error::InvariantViolation { kind, .. } => Some(*kind),
            Error::ImageError(_) => None,
        }
    }

    /// Raw tag value for unknown-tag errors
    pub fn tag(&self) -> Option<u32> {
        match self {
            Error::UnknownTag { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    /// Source address the error refers to, if any
    pub fn addr(&self) -> Option<Addr> {
        match self {
            Error::UnknownTag { addr, .. } | Error::InvariantViolation { addr, .. } => Some(*addr),
            _ => None,
        }
    }
}

/// Result type for deep-copy operations
pub type Result<T> = std::result::Result<T, Error>;
