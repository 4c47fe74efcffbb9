//! Owning arena for copied IR graphs
//!
//! Every node of one copied graph lives in one [`IrArena`]. Dropping the
//! arena releases the whole graph at once, which is what makes a failed copy
//! all-or-nothing: the copier simply drops its half-built arena.

use super::node::{Block, Callee, Const, Expr, RegArray, Stmt, TypeEnv};
use crate::config::CopyConfig;
use crate::error::{Error, NodeKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            /// Position in the owning arena
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Constant id
    ConstId,
    "c"
);
arena_id!(
    /// Expression id
    ExprId,
    "e"
);
arena_id!(
    /// Statement id
    StmtId,
    "s"
);
arena_id!(
    /// Callee id
    CalleeId,
    "cee"
);
arena_id!(
    /// Register array id
    RegArrayId,
    "ra"
);
arena_id!(
    /// Type environment id
    TypeEnvId,
    "env"
);
arena_id!(
    /// Block id
    BlockId,
    "bb"
);

#[derive(Debug, Default)]
struct TrackerState {
    live: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
    failures: AtomicUsize,
}

/// Shared allocation accounting across arenas
///
/// Counts nodes, not bytes. An arena attached to a tracker adds one per
/// allocated node and subtracts its whole node count when dropped, so
/// `live()` returning to its old value proves a failed copy leaked nothing.
#[derive(Debug, Clone, Default)]
pub struct AllocTracker {
    inner: Arc<TrackerState>,
}

impl AllocTracker {
    /// Creates a tracker with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes currently owned by attached arenas
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Highest `live()` ever observed
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Nodes ever allocated
    pub fn total(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }

    /// Allocation requests refused
    pub fn failures(&self) -> usize {
        self.inner.failures.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        self.inner.peak.fetch_max(live, Ordering::SeqCst);
    }

    fn release(&self, nodes: usize) {
        self.inner.live.fetch_sub(nodes, Ordering::SeqCst);
    }

    fn refuse(&self) {
        self.inner.failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// Arena owning one copied IR graph
///
/// Ids handed out by one arena are only meaningful for that arena; the
/// accessors panic when given an id from elsewhere.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IrArena {
    consts: Vec<Const>,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    callees: Vec<Callee>,
    reg_arrays: Vec<RegArray>,
    type_envs: Vec<TypeEnv>,
    blocks: Vec<Block>,
    #[serde(skip)]
    limit: Option<usize>,
    #[serde(skip)]
    tracker: Option<AllocTracker>,
}

macro_rules! alloc_fn {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $node:ty, $id:ident, $kind:expr) => {
        $(#[$meta])*
        pub fn $fn_name(&mut self, node: $node) -> Result<$id> {
            self.admit($kind)?;
            let live = self.node_count();
            if self.$field.try_reserve(1).is_err() {
                return Err(self.refuse($kind, live));
            }
            let id = $id(self.$field.len() as u32);
            self.$field.push(node);
            if let Some(tracker) = &self.tracker {
                tracker.acquire();
            }
            Ok(id)
        }
    };
}

macro_rules! getters {
    ($($(#[$meta:meta])* $get:ident, $try_get:ident, $get_mut:ident, $field:ident, $node:ty, $id:ty;)+) => {
        $(
            $(#[$meta])*
            ///
            /// Panics on an id this arena never handed out.
            pub fn $get(&self, id: $id) -> &$node {
                &self.$field[id.index()]
            }

            #[doc = concat!("Like [`", stringify!($get), "`](Self::", stringify!($get), "), but `None` for an id this arena never handed out")]
            pub fn $try_get(&self, id: $id) -> Option<&$node> {
                self.$field.get(id.index())
            }

            $(#[$meta])*
            pub fn $get_mut(&mut self, id: $id) -> &mut $node {
                &mut self.$field[id.index()]
            }
        )+
    };
}

impl IrArena {
    /// Creates an unlimited, untracked arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena honoring the config's node limit and tracker
    pub fn from_config(config: &CopyConfig) -> Self {
        let mut arena = Self::default();
        arena.limit = config.node_limit;
        arena.tracker = config.tracker.clone();
        arena
    }

    /// Caps the number of nodes this arena may hold
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Attaches allocation accounting; nodes already held are counted at once
    pub fn with_tracker(mut self, tracker: AllocTracker) -> Self {
        if let Some(old) = self.tracker.take() {
            old.release(self.node_count());
        }
        for _ in 0..self.node_count() {
            tracker.acquire();
        }
        self.tracker = Some(tracker);
        self
    }

    /// Total nodes held
    pub fn node_count(&self) -> usize {
        self.consts.len()
            + self.exprs.len()
            + self.stmts.len()
            + self.callees.len()
            + self.reg_arrays.len()
            + self.type_envs.len()
            + self.blocks.len()
    }

    /// Configured node limit
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn admit(&self, kind: NodeKind) -> Result<()> {
        match self.limit {
            Some(limit) if self.node_count() >= limit => Err(self.refuse(kind, self.node_count())),
            _ => Ok(()),
        }
    }

    fn refuse(&self, kind: NodeKind, live: usize) -> Error {
        if let Some(tracker) = &self.tracker {
            tracker.refuse();
        }
        Error::AllocationFailure {
            kind,
            live,
            limit: self.limit,
        }
    }

    /// Allocates an exactly-sized, empty buffer for a variable-length field
    ///
    /// Allocator refusal is reported as [`Error::AllocationFailure`] instead
    /// of aborting the process.
    pub fn sequence<T>(&self, len: usize, kind: NodeKind) -> Result<Vec<T>> {
        let mut out = Vec::new();
        if out.try_reserve_exact(len).is_err() {
            return Err(self.refuse(kind, self.node_count()));
        }
        Ok(out)
    }

    alloc_fn!(
        /// Allocates a constant
        alloc_const, consts, Const, ConstId, NodeKind::Const
    );
    alloc_fn!(
        /// Allocates an expression
        alloc_expr, exprs, Expr, ExprId, NodeKind::Expr
    );
    alloc_fn!(
        /// Allocates a statement
        alloc_stmt, stmts, Stmt, StmtId, NodeKind::Stmt
    );
    alloc_fn!(
        /// Allocates a callee
        alloc_callee, callees, Callee, CalleeId, NodeKind::Callee
    );
    alloc_fn!(
        /// Allocates a register array descriptor
        alloc_reg_array, reg_arrays, RegArray, RegArrayId, NodeKind::RegArray
    );
    alloc_fn!(
        /// Allocates a type environment
        alloc_type_env, type_envs, TypeEnv, TypeEnvId, NodeKind::TypeEnv
    );
    alloc_fn!(
        /// Allocates a block
        alloc_block, blocks, Block, BlockId, NodeKind::Block
    );

    getters! {
        /// Constant by id
        constant, get_constant, constant_mut, consts, Const, ConstId;
        /// Expression by id
        expr, get_expr, expr_mut, exprs, Expr, ExprId;
        /// Statement by id
        stmt, get_stmt, stmt_mut, stmts, Stmt, StmtId;
        /// Callee by id
        callee, get_callee, callee_mut, callees, Callee, CalleeId;
        /// Register array by id
        reg_array, get_reg_array, reg_array_mut, reg_arrays, RegArray, RegArrayId;
        /// Type environment by id
        type_env, get_type_env, type_env_mut, type_envs, TypeEnv, TypeEnvId;
        /// Block by id
        block, get_block, block_mut, blocks, Block, BlockId;
    }

    /// Ids of every block, in allocation order
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Number of callees held
    pub fn callee_count(&self) -> usize {
        self.callees.len()
    }

    /// Number of register array descriptors held
    pub fn reg_array_count(&self) -> usize {
        self.reg_arrays.len()
    }

    /// Number of type environments held
    pub fn type_env_count(&self) -> usize {
        self.type_envs.len()
    }
}

impl Drop for IrArena {
    fn drop(&mut self) {
        if let Some(tracker) = &self.tracker {
            tracker.release(self.node_count());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{IrType, Temp};

    #[test]
    fn test_alloc_returns_dense_ids() {
        let mut arena = IrArena::new();
        let a = arena.alloc_expr(Expr::RdTmp(Temp(0))).unwrap();
        let b = arena.alloc_expr(Expr::RdTmp(Temp(1))).unwrap();
        assert_eq!((a, b), (ExprId(0), ExprId(1)));
        assert_eq!(arena.expr(b), &Expr::RdTmp(Temp(1)));
        assert_eq!(arena.node_count(), 2);
    }

    #[test]
    fn test_limit_refuses_and_counts_failure() {
        let tracker = AllocTracker::new();
        let mut arena = IrArena::new().with_limit(1).with_tracker(tracker.clone());
        arena.alloc_const(Const::U8(1)).unwrap();
        let err = arena.alloc_const(Const::U8(2)).unwrap_err();
        assert!(matches!(
            err,
            Error::AllocationFailure {
                kind: NodeKind::Const,
                live: 1,
                limit: Some(1)
            }
        ));
        assert_eq!(tracker.failures(), 1);
        assert_eq!(tracker.live(), 1);
    }

    #[test]
    fn test_drop_releases_everything() {
        let tracker = AllocTracker::new();
        {
            let mut arena = IrArena::new().with_tracker(tracker.clone());
            arena
                .alloc_type_env(TypeEnv::new(vec![IrType::I64]))
                .unwrap();
            arena.alloc_const(Const::U64(5)).unwrap();
            assert_eq!(tracker.live(), 2);
        }
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.peak(), 2);
        assert_eq!(tracker.total(), 2);
    }

    #[test]
    fn test_attaching_tracker_late_counts_existing_nodes() {
        let mut arena = IrArena::new();
        arena.alloc_const(Const::U1(true)).unwrap();
        let tracker = AllocTracker::new();
        let arena = arena.with_tracker(tracker.clone());
        assert_eq!(tracker.live(), 1);
        drop(arena);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(ExprId(3).to_string(), "e3");
        assert_eq!(CalleeId(0).to_string(), "cee0");
    }

    #[test]
    fn test_checked_getters_on_foreign_ids() {
        let mut arena = IrArena::new();
        let t0 = arena.alloc_expr(Expr::RdTmp(Temp(0))).unwrap();
        let json = serde_json::to_string(&arena).unwrap();
        let restored: IrArena = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.get_expr(t0), Some(&Expr::RdTmp(Temp(0))));
        assert_eq!(restored.get_expr(ExprId(7)), None);
        assert!(restored.get_block(BlockId(0)).is_none());
        assert!(restored.get_callee(CalleeId(0)).is_none());
    }
}
