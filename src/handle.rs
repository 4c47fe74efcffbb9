//! Host-facing handles
//!
//! A host binding keeps a copied block alive long after the engine arena is
//! gone. The handles here own the copied arena through an `Arc`, so handing
//! out statement or expression handles never copies the graph again, and
//! every handle stays valid as long as any of them is alive.

use crate::config::CopyConfig;
use crate::deepcopy::{copy_block, Copied};
use crate::error::Error;
use crate::image::{export_block, Addr, SourceView};
use crate::ir::{
    is_flat_block, is_flat_expr, is_flat_stmt, pp_block, pp_expr, pp_stmt, BlockId, Callee,
    Const, Expr, ExprId, FxState, IrArena, Stmt, StmtId, Temp,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Exception value raised to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ThisError)]
#[error("{kind}: {message}")]
pub struct HostError {
    /// Error class: `UnknownTag`, `AllocationFailure`, `InvariantViolation` or `ImageError`
    pub kind: String,
    /// Engine name of the node kind involved, e.g. `IRStmt`
    pub node_kind: Option<String>,
    /// Raw tag for unknown-tag errors
    pub tag: Option<u32>,
    pub message: String,
}

impl From<Error> for HostError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::UnknownTag { .. } => "UnknownTag",
            Error::AllocationFailure { .. } => "AllocationFailure",
            Error::InvariantViolation { .. } => "InvariantViolation",
            Error::ImageError(_) => "ImageError",
        };
        HostError {
            kind: kind.to_string(),
            node_kind: err.node_kind().map(|k| k.name().to_string()),
            tag: err.tag(),
            message: err.to_string(),
        }
    }
}

/// Owned superblock
#[derive(Debug, Clone)]
pub struct IrsbHandle {
    arena: Arc<IrArena>,
    block: BlockId,
}

impl IrsbHandle {
    /// Copies the block at `addr` out of an engine image
    pub fn lift_copy(
        view: SourceView<'_>,
        addr: Addr,
        config: &CopyConfig,
    ) -> std::result::Result<Self, HostError> {
        Ok(Self::from_copied(copy_block(view, addr, config)?))
    }

    /// Wraps an already copied block
    pub fn from_copied(copied: Copied<BlockId>) -> Self {
        let (arena, block) = copied.into_parts();
        Self {
            arena: Arc::new(arena),
            block,
        }
    }

    pub fn arena(&self) -> &Arc<IrArena> {
        &self.arena
    }

    pub fn id(&self) -> BlockId {
        self.block
    }

    pub fn statements(&self) -> Vec<StmtHandle> {
        self.arena
            .block(self.block)
            .stmts
            .iter()
            .map(|&id| StmtHandle {
                arena: Arc::clone(&self.arena),
                id,
            })
            .collect()
    }

    /// Engine type names of every temp, indexed by temp number
    pub fn tyenv(&self) -> Vec<&'static str> {
        let env = self.arena.type_env(self.arena.block(self.block).tyenv);
        env.types.iter().map(|ty| ty.name()).collect()
    }

    pub fn next(&self) -> ExprHandle {
        ExprHandle {
            arena: Arc::clone(&self.arena),
            id: self.arena.block(self.block).next,
        }
    }

    pub fn jumpkind(&self) -> &'static str {
        self.arena.block(self.block).jumpkind.name()
    }

    pub fn offs_ip(&self) -> i32 {
        self.arena.block(self.block).offs_ip
    }

    pub fn arch(&self) -> &'static str {
        self.arena.block(self.block).arch.name()
    }

    pub fn flat(&self) -> bool {
        is_flat_block(&self.arena, self.block)
    }

    pub fn pp(&self) -> String {
        pp_block(&self.arena, self.block)
    }

    /// Writes the block back into engine layout
    pub fn export(&self) -> std::result::Result<(Vec<u8>, Addr), HostError> {
        Ok(export_block(&self.arena, self.block)?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let block = self.arena.block(self.block);
        json!({
            "arch": self.arch(),
            "jumpkind": self.jumpkind(),
            "offsIP": block.offs_ip,
            "tyenv": self.tyenv(),
            "stmts": self.statements().iter().map(|s| s.to_json()).collect::<Vec<_>>(),
            "next": self.next().pp(),
        })
    }
}

/// Statement inside a copied block
#[derive(Debug, Clone)]
pub struct StmtHandle {
    arena: Arc<IrArena>,
    id: StmtId,
}

impl StmtHandle {
    fn stmt(&self) -> &Stmt {
        self.arena.stmt(self.id)
    }

    fn wrap(&self, id: ExprId) -> ExprHandle {
        ExprHandle {
            arena: Arc::clone(&self.arena),
            id,
        }
    }

    pub fn id(&self) -> StmtId {
        self.id
    }

    /// Engine tag name, e.g. `Ist_WrTmp`
    pub fn tag(&self) -> &'static str {
        self.stmt().tag().name()
    }

    pub fn flat(&self) -> bool {
        is_flat_stmt(&self.arena, self.id)
    }

    pub fn pp(&self) -> String {
        pp_stmt(&self.arena, self.id)
    }

    /// Top-level expressions in field order
    pub fn expressions(&self) -> Vec<ExprHandle> {
        self.stmt().exprs().into_iter().map(|id| self.wrap(id)).collect()
    }

    /// Value written by Put, PutI, WrTmp or Store
    pub fn data(&self) -> Option<ExprHandle> {
        match self.stmt() {
            Stmt::Put { data, .. } | Stmt::WrTmp { data, .. } | Stmt::Store { data, .. } => {
                Some(self.wrap(*data))
            }
            Stmt::PutI(details) => Some(self.wrap(details.data)),
            _ => None,
        }
    }

    /// Guard of an Exit or Dirty statement
    pub fn guard(&self) -> Option<ExprHandle> {
        match self.stmt() {
            Stmt::Exit { guard, .. } => Some(self.wrap(*guard)),
            Stmt::Dirty(d) => Some(self.wrap(d.guard)),
            _ => None,
        }
    }

    /// Arguments of a Dirty call
    pub fn args(&self) -> Vec<ExprHandle> {
        match self.stmt() {
            Stmt::Dirty(d) => d.args.iter().map(|&id| self.wrap(id)).collect(),
            _ => Vec::new(),
        }
    }

    /// Guest-state effects of a Dirty call
    pub fn fx_state(&self) -> Vec<FxState> {
        match self.stmt() {
            Stmt::Dirty(d) => d.fx_state.clone(),
            _ => Vec::new(),
        }
    }

    /// Temp written by WrTmp, LLSC, CAS (low half) or Dirty
    pub fn tmp(&self) -> Option<Temp> {
        match self.stmt() {
            Stmt::Cas(cas) => Some(cas.old_lo),
            other => other.defined_temps().first().copied(),
        }
    }

    /// Destination of an Exit
    pub fn dst(&self) -> Option<Const> {
        match self.stmt() {
            Stmt::Exit { dst, .. } => Some(*self.arena.constant(*dst)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "tag": self.tag(),
            "flat": self.flat(),
            "pp": self.pp(),
        })
    }
}

/// Expression inside a copied graph
#[derive(Debug, Clone)]
pub struct ExprHandle {
    arena: Arc<IrArena>,
    id: ExprId,
}

impl ExprHandle {
    fn expr(&self) -> &Expr {
        self.arena.expr(self.id)
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    /// Engine tag name, e.g. `Iex_Binop`
    pub fn tag(&self) -> &'static str {
        self.expr().tag().name()
    }

    pub fn flat(&self) -> bool {
        is_flat_expr(&self.arena, self.id)
    }

    pub fn pp(&self) -> String {
        pp_expr(&self.arena, self.id)
    }

    /// Child expressions in field order
    pub fn args(&self) -> Vec<ExprHandle> {
        self.expr()
            .children()
            .into_iter()
            .map(|id| ExprHandle {
                arena: Arc::clone(&self.arena),
                id,
            })
            .collect()
    }

    /// Operation name of a Unop/Binop/Triop/Qop
    pub fn op(&self) -> Option<String> {
        match self.expr() {
            Expr::Unop { op, .. }
            | Expr::Binop { op, .. }
            | Expr::Triop { op, .. }
            | Expr::Qop { op, .. } => Some(op.name()),
            _ => None,
        }
    }

    pub fn tmp(&self) -> Option<Temp> {
        match self.expr() {
            Expr::RdTmp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn constant(&self) -> Option<Const> {
        match self.expr() {
            Expr::Const(con) => Some(*self.arena.constant(*con)),
            _ => None,
        }
    }

    pub fn callee(&self) -> Option<&Callee> {
        match self.expr() {
            Expr::CCall { cee, .. } => Some(self.arena.callee(*cee)),
            _ => None,
        }
    }
}
