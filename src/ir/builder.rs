//! Constructors for building IR natively
//!
//! Hosts that construct IR themselves (instead of copying it out of the
//! engine) use these; they go through the same fallible allocation path as
//! the copier.

use super::arena::{BlockId, CalleeId, ConstId, ExprId, IrArena, RegArrayId, StmtId, TypeEnvId};
use super::node::{Block, Callee, Const, Expr, RegArray, Stmt, TypeEnv};
use super::types::{Arch, Endness, IrType, JumpKind, Op, Temp};
use crate::error::Result;

impl IrArena {
    /// New type environment
    pub fn type_env_of(&mut self, types: Vec<IrType>) -> Result<TypeEnvId> {
        self.alloc_type_env(TypeEnv::new(types))
    }

    /// New constant node
    pub fn konst(&mut self, value: Const) -> Result<ConstId> {
        self.alloc_const(value)
    }

    /// `Const` expression
    pub fn const_expr(&mut self, value: Const) -> Result<ExprId> {
        let con = self.alloc_const(value)?;
        self.alloc_expr(Expr::Const(con))
    }

    /// `RdTmp` expression
    pub fn rd_tmp(&mut self, tmp: Temp) -> Result<ExprId> {
        self.alloc_expr(Expr::RdTmp(tmp))
    }

    /// `Get` expression
    pub fn get(&mut self, offset: i32, ty: IrType) -> Result<ExprId> {
        self.alloc_expr(Expr::Get { offset, ty })
    }

    /// `Unop` expression
    pub fn unop(&mut self, op: Op, arg: ExprId) -> Result<ExprId> {
        self.alloc_expr(Expr::Unop { op, arg })
    }

    /// `Binop` expression
    pub fn binop(&mut self, op: Op, lhs: ExprId, rhs: ExprId) -> Result<ExprId> {
        self.alloc_expr(Expr::Binop {
            op,
            args: [lhs, rhs],
        })
    }

    /// `Load` expression
    pub fn load(&mut self, end: Endness, ty: IrType, addr: ExprId) -> Result<ExprId> {
        self.alloc_expr(Expr::Load { end, ty, addr })
    }

    /// `CCall` expression
    pub fn ccall(&mut self, cee: CalleeId, ret_ty: IrType, args: Vec<ExprId>) -> Result<ExprId> {
        self.alloc_expr(Expr::CCall { cee, ret_ty, args })
    }

    /// New callee descriptor
    pub fn callee_of(&mut self, name: &str, addr: u64, regparms: i32) -> Result<CalleeId> {
        self.alloc_callee(Callee {
            regparms,
            name: name.to_string(),
            addr,
            mcx_mask: 0,
        })
    }

    /// New register array descriptor
    pub fn reg_array_of(&mut self, base: i32, elem_ty: IrType, n_elems: i32) -> Result<RegArrayId> {
        self.alloc_reg_array(RegArray {
            base,
            elem_ty,
            n_elems,
        })
    }

    /// `IMark` statement
    pub fn imark(&mut self, addr: u64, len: i32, delta: u8) -> Result<StmtId> {
        self.alloc_stmt(Stmt::IMark { addr, len, delta })
    }

    /// `WrTmp` statement
    pub fn wr_tmp(&mut self, tmp: Temp, data: ExprId) -> Result<StmtId> {
        self.alloc_stmt(Stmt::WrTmp { tmp, data })
    }

    /// `Put` statement
    pub fn put(&mut self, offset: i32, data: ExprId) -> Result<StmtId> {
        self.alloc_stmt(Stmt::Put { offset, data })
    }

    /// `Store` statement
    pub fn store(&mut self, end: Endness, addr: ExprId, data: ExprId) -> Result<StmtId> {
        self.alloc_stmt(Stmt::Store { end, addr, data })
    }

    /// `Exit` statement
    pub fn exit(&mut self, guard: ExprId, jk: JumpKind, dst: Const, offs_ip: i32) -> Result<StmtId> {
        let dst = self.alloc_const(dst)?;
        self.alloc_stmt(Stmt::Exit {
            guard,
            jk,
            dst,
            offs_ip,
        })
    }

    /// New block
    pub fn block_of(
        &mut self,
        tyenv: TypeEnvId,
        stmts: Vec<StmtId>,
        next: ExprId,
        jumpkind: JumpKind,
        offs_ip: i32,
        arch: Arch,
    ) -> Result<BlockId> {
        self.alloc_block(Block {
            tyenv,
            stmts,
            next,
            jumpkind,
            offs_ip,
            arch,
        })
    }
}
