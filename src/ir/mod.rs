//! # Owned VEX IR
//!
//! Rust-side model of a lifted superblock, owned by an [`IrArena`] and
//! independent of the engine arena it was copied from.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs      # This file - module definition and re-exports
//! ├── types.rs    # Tag tables (IRType, IRStmtTag, ...), Temp, Op
//! ├── node.rs     # Const, Callee, RegArray, TypeEnv, Expr, Stmt, Block
//! ├── arena.rs    # IrArena, typed ids, AllocTracker
//! ├── builder.rs  # Native constructors on IrArena
//! ├── compare.rs  # Cross-arena structural comparison
//! ├── flat.rs     # Flatness predicates
//! └── pretty.rs   # Engine-style text rendering
//! ```
//!
//! ## Key Types
//!
//! - [`Block`] - superblock: type environment, statements, `next`, jump kind
//! - [`Stmt`] / [`Expr`] - one variant per engine tag
//! - [`IrArena`] - owns every node of one copied graph; ids index into it
//! - [`AllocTracker`] - live/peak node accounting shared across arenas

mod arena;
mod builder;
pub mod compare;
pub mod flat;
mod node;
pub mod pretty;
mod types;

pub use arena::{
    AllocTracker, BlockId, CalleeId, ConstId, ExprId, IrArena, RegArrayId, StmtId, TypeEnvId,
};
pub use compare::{compare_blocks, compare_consts, compare_exprs, compare_stmts, Mismatch};
pub use flat::{is_atom, is_flat_block, is_flat_expr, is_flat_stmt};
pub use node::{Block, Callee, Cas, Const, Dirty, Expr, FxState, PutI, RegArray, Stmt, TypeEnv};
pub use pretty::{pp_block, pp_expr, pp_stmt};
pub use types::{
    lookup_name, Arch, ConstTag, Effect, Endness, ExprTag, IrType, JumpKind, MBusEvent, Op,
    StmtTag, Temp, MAX_FX_STATE,
};
