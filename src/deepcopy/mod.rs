//! # Deep-copy engine
//!
//! Copies an IR graph out of an engine arena image into an owned
//! [`IrArena`]. Every entry point borrows the source for the duration of the
//! call and either returns a complete, independent graph or an error with
//! nothing allocated.
//!
//! ```text
//! SourceView ──► Copier ──► IrArena
//!   (borrowed)     │          (owned, returned in Copied)
//!                  └── memo: source Addr -> id for TypeEnv / Callee / RegArray
//! ```
//!
//! Dispatch is a `match` over the decoded tag of each node, so adding a
//! variant to a tag table is a compile error until every copier handles it.
//! Raw tags outside the tables are reported as [`Error::UnknownTag`].
//!
//! [`Error::UnknownTag`]: crate::Error::UnknownTag

mod copier;

use crate::config::CopyConfig;
use crate::error::{Error, NodeKind, Result};
use crate::image::{Addr, SourceView};
use crate::ir::{BlockId, CalleeId, ConstId, ExprId, IrArena, RegArrayId, StmtId, TypeEnvId};
use copier::Copier;

/// An owned copy together with its root
///
/// The root always names a node of the arena it travels with, so the pair
/// is only handed out whole.
#[derive(Debug)]
pub struct Copied<I> {
    arena: IrArena,
    root: I,
}

impl<I: Copy> Copied<I> {
    /// Id of the copied root
    pub fn root(&self) -> I {
        self.root
    }

    /// Arena owning the copy
    pub fn arena(&self) -> &IrArena {
        &self.arena
    }

    /// Splits into arena and root
    pub fn into_parts(self) -> (IrArena, I) {
        (self.arena, self.root)
    }
}

fn log_abort(view: SourceView<'_>, kind: NodeKind, root: Addr, err: &Error) {
    let at = err.addr().unwrap_or(root);
    tracing::warn!(
        "aborting copy of {} at {}: {} (record {} = {})",
        kind,
        root,
        err,
        at,
        view.hexdump(at, 8)
    );
}

fn run<'a, 'c, I: Copy>(
    view: SourceView<'a>,
    root: Addr,
    config: &'c CopyConfig,
    kind: NodeKind,
    copy: impl FnOnce(&mut Copier<'a, 'c>, Addr) -> Result<I>,
) -> Result<Copied<I>> {
    tracing::debug!("copying {} at {}", kind, root);
    let mut copier = Copier::new(view, config);
    match copy(&mut copier, root) {
        Ok(id) => {
            let arena = copier.into_arena();
            tracing::debug!(
                "copied {} at {} into {} nodes",
                kind,
                root,
                arena.node_count()
            );
            Ok(Copied { arena, root: id })
        }
        Err(err) => {
            log_abort(view, kind, root, &err);
            // Dropping the copier releases everything this call allocated.
            drop(copier);
            Err(err)
        }
    }
}

/// Deep-copies a superblock and everything it references
pub fn copy_block(view: SourceView<'_>, addr: Addr, config: &CopyConfig) -> Result<Copied<BlockId>> {
    run(view, addr, config, NodeKind::Block, |c, a| c.block(a))
}

/// Deep-copies one statement
///
/// Temps are only checked for `IRTemp_INVALID`; use a [`CopySession`] with a
/// type environment to check bindings.
pub fn copy_stmt(view: SourceView<'_>, addr: Addr, config: &CopyConfig) -> Result<Copied<StmtId>> {
    run(view, addr, config, NodeKind::Stmt, |c, a| c.stmt(a))
}

/// Deep-copies one expression tree
pub fn copy_expr(view: SourceView<'_>, addr: Addr, config: &CopyConfig) -> Result<Copied<ExprId>> {
    run(view, addr, config, NodeKind::Expr, |c, a| c.expr(a))
}

/// Copies one constant
pub fn copy_const(view: SourceView<'_>, addr: Addr, config: &CopyConfig) -> Result<Copied<ConstId>> {
    run(view, addr, config, NodeKind::Const, |c, a| c.constant(a))
}

/// Copies one callee descriptor
pub fn copy_callee(
    view: SourceView<'_>,
    addr: Addr,
    config: &CopyConfig,
) -> Result<Copied<CalleeId>> {
    run(view, addr, config, NodeKind::Callee, |c, a| c.callee(a))
}

/// Copies one register array descriptor
pub fn copy_reg_array(
    view: SourceView<'_>,
    addr: Addr,
    config: &CopyConfig,
) -> Result<Copied<RegArrayId>> {
    run(view, addr, config, NodeKind::RegArray, |c, a| c.reg_array(a))
}

/// Copies one type environment
pub fn copy_type_env(
    view: SourceView<'_>,
    addr: Addr,
    config: &CopyConfig,
) -> Result<Copied<TypeEnvId>> {
    run(view, addr, config, NodeKind::TypeEnv, |c, a| c.type_env(a))
}

/// Several copies from one image into one arena
///
/// All roots copied through a session share one dedup scope, so two blocks
/// pointing at the same type environment end up sharing one copied
/// environment. The first failure poisons the session: its arena is dropped
/// at once and every later call (including [`finish`](Self::finish)) returns
/// that error again.
pub struct CopySession<'a, 'c> {
    state: std::result::Result<Copier<'a, 'c>, Error>,
}

impl<'a, 'c> CopySession<'a, 'c> {
    /// Starts a session over `view`
    pub fn new(view: SourceView<'a>, config: &'c CopyConfig) -> Self {
        Self {
            state: Ok(Copier::new(view, config)),
        }
    }

    fn step<I>(
        &mut self,
        kind: NodeKind,
        addr: Addr,
        copy: impl FnOnce(&mut Copier<'a, 'c>, Addr) -> Result<I>,
    ) -> Result<I> {
        let copier = match &mut self.state {
            Ok(copier) => copier,
            Err(err) => return Err(err.clone()),
        };
        match copy(copier, addr) {
            Ok(id) => Ok(id),
            Err(err) => {
                log_abort(copier.view(), kind, addr, &err);
                self.state = Err(err.clone());
                Err(err)
            }
        }
    }

    /// Copies a type environment and checks later statement and expression
    /// temps against it
    pub fn with_type_env(&mut self, addr: Addr) -> Result<TypeEnvId> {
        self.step(NodeKind::TypeEnv, addr, |c, a| {
            let env = c.type_env(a)?;
            c.set_scope(Some(env));
            Ok(env)
        })
    }

    /// Copies a block; its own type environment scopes its temps
    pub fn block(&mut self, addr: Addr) -> Result<BlockId> {
        self.step(NodeKind::Block, addr, |c, a| c.block(a))
    }

    /// Copies a statement, checking temps against the session environment
    pub fn stmt(&mut self, addr: Addr) -> Result<StmtId> {
        self.step(NodeKind::Stmt, addr, |c, a| c.stmt(a))
    }

    /// Copies an expression tree
    pub fn expr(&mut self, addr: Addr) -> Result<ExprId> {
        self.step(NodeKind::Expr, addr, |c, a| c.expr(a))
    }

    /// Copies a constant
    pub fn constant(&mut self, addr: Addr) -> Result<ConstId> {
        self.step(NodeKind::Const, addr, |c, a| c.constant(a))
    }

    /// Copies a callee, reusing one already copied from the same address
    pub fn callee(&mut self, addr: Addr) -> Result<CalleeId> {
        self.step(NodeKind::Callee, addr, |c, a| c.callee(a))
    }

    /// Copies a register array, reusing one already copied from the same address
    pub fn reg_array(&mut self, addr: Addr) -> Result<RegArrayId> {
        self.step(NodeKind::RegArray, addr, |c, a| c.reg_array(a))
    }

    /// Copies a type environment without making it the temp scope
    pub fn type_env(&mut self, addr: Addr) -> Result<TypeEnvId> {
        self.step(NodeKind::TypeEnv, addr, |c, a| c.type_env(a))
    }

    /// Arena built so far, or `None` once poisoned
    pub fn arena(&self) -> Option<&IrArena> {
        self.state.as_ref().ok().map(|c| c.arena())
    }

    /// Returns true once a call has failed
    pub fn is_poisoned(&self) -> bool {
        self.state.is_err()
    }

    /// Ends the session, handing over the arena
    pub fn finish(self) -> Result<IrArena> {
        let arena = self.state?.into_arena();
        tracing::debug!("copy session finished with {} nodes", arena.node_count());
        Ok(arena)
    }
}
