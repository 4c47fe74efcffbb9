//! # vexcopy - Deep copies of VEX IR superblocks
//!
//! The VEX engine lifts machine code into an IRSB that lives in a transient
//! arena, recycled on the next lift. A host binding that wants to keep the
//! IR has to copy it out first. This crate is that copy layer:
//!
//! - **Borrowed input** - the engine arena is read through a bounds-checked
//!   [`SourceView`]; nothing in it is ever written
//! - **Owned output** - the copy lives in an [`IrArena`] that shares no
//!   memory with the source
//! - **Shared nodes stay shared** - callees, register arrays and type
//!   environments referenced from several places are copied once
//! - **Fail fast** - unknown tags and broken invariants abort the copy
//! - **All or nothing** - on any failure, everything the call allocated is
//!   released before the error is returned
//!
//! ## Quick Start
//!
//! ```rust
//! use vexcopy::{copy_block, CopyConfig, ImageWriter, SourceView};
//! use vexcopy::ir::{Arch, Const, IrType, JumpKind, Temp};
//!
//! # fn main() -> vexcopy::Result<()> {
//! // Build an engine image (normally the engine hands you one)
//! let mut w = ImageWriter::new();
//! let env = w.type_env(&[IrType::I64]);
//! let get = w.get(16, IrType::I64);
//! let wr = w.wr_tmp(Temp(0), get);
//! let dst = w.constant(&Const::U64(0x400004));
//! let next = w.const_expr(dst);
//! let irsb = w.block(env, &[wr], next, JumpKind::Boring, 184, Arch::Amd64);
//! let image = w.finish()?;
//!
//! // Copy it out
//! let view = SourceView::new(&image)?;
//! let copied = copy_block(view, irsb, &CopyConfig::default())?;
//! drop(image); // the copy does not borrow the image
//!
//! let block = copied.arena().block(copied.root());
//! assert_eq!(block.stmts.len(), 1);
//! assert_eq!(block.jumpkind, JumpKind::Boring);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`image`] - engine arena images: reader, writer, copy-out
//! - [`ir`] - owned IR model, arena, comparison, flatness, pretty-printing
//! - [`deepcopy`] - the copy engine and multi-root sessions
//! - [`handle`] - long-lived handles for host bindings
//! - [`config`] - per-call configuration
//! - [`error`] - error types
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T>`], which is `std::result::Result<T, Error>`:
//!
//! ```rust
//! use vexcopy::{copy_stmt, CopyConfig, Error, ImageWriter, SourceView};
//!
//! let mut w = ImageWriter::new();
//! let stmt = w.raw(&[0x1E0C]); // one past Ist_Exit
//! let image = w.finish().unwrap();
//! let view = SourceView::new(&image).unwrap();
//!
//! match copy_stmt(view, stmt, &CopyConfig::default()) {
//!     Err(Error::UnknownTag { tag, .. }) => assert_eq!(tag, 0x1E0C),
//!     other => panic!("expected UnknownTag, got {:?}", other),
//! }
//! ```

pub mod config;
pub mod deepcopy;
pub mod error;
pub mod handle;
pub mod image;
pub mod ir;

pub use config::CopyConfig;
pub use deepcopy::{
    copy_block, copy_callee, copy_const, copy_expr, copy_reg_array, copy_stmt, copy_type_env,
    Copied, CopySession,
};
pub use error::{Error, ErrorSeverity, NodeKind, Result};
pub use handle::{ExprHandle, HostError, IrsbHandle, StmtHandle};
pub use image::{export_block, export_expr, export_stmt, Addr, ImageWriter, SourceView};
pub use ir::{AllocTracker, IrArena};
