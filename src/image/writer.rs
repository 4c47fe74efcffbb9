//! Appends engine-layout records to a fresh image

use super::layout::{block, cas, dirty, node, put_i};
use super::{Addr, HEADER_LEN, MAGIC, VERSION, WORD};
use crate::error::{Error, Result};
use crate::ir::{
    Arch, Callee, Const, Effect, Endness, ExprTag, IrType, JumpKind, MBusEvent, Op, RegArray,
    StmtTag, Temp, MAX_FX_STATE,
};

/// Out-of-line fields of a CAS statement
#[derive(Debug, Clone, Copy)]
pub struct CasFields {
    pub old_hi: Temp,
    pub old_lo: Temp,
    pub end: Endness,
    pub addr: Addr,
    /// NULL for a single-element CAS
    pub expd_hi: Addr,
    pub expd_lo: Addr,
    /// NULL for a single-element CAS
    pub data_hi: Addr,
    pub data_lo: Addr,
}

/// One guest-state effect entry of a dirty call
#[derive(Debug, Clone, Copy)]
pub struct FxFields {
    pub fx: Effect,
    pub offset: u16,
    pub size: u16,
    pub n_repeats: u8,
    pub repeat_len: u8,
}

/// Out-of-line fields of a dirty call
#[derive(Debug, Clone)]
pub struct DirtyFields {
    pub cee: Addr,
    pub guard: Addr,
    /// Expression vector, see [`ImageWriter::expr_vec`]
    pub args: Addr,
    pub tmp: Temp,
    pub m_fx: Effect,
    pub m_addr: Addr,
    pub m_size: i32,
    pub needs_bbp: bool,
    /// Written as the entry count; only the first seven entries have slots
    pub fx_state: Vec<FxFields>,
}

/// Builds an image record by record
///
/// Every method appends one record (plus any out-of-line parts it owns) and
/// returns its address. Children must be written before their parents, so
/// addresses are always known when a parent is written.
#[derive(Debug, Clone)]
pub struct ImageWriter {
    bytes: Vec<u8>,
    overflow: bool,
}

impl Default for ImageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter {
    /// Creates an image holding only the header
    pub fn new() -> Self {
        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        debug_assert_eq!(bytes.len(), HEADER_LEN as usize);
        Self {
            bytes,
            overflow: false,
        }
    }

    /// Current image size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing but the header was written
    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= HEADER_LEN as usize
    }

    /// Appends raw words and returns the address of the first
    pub fn raw(&mut self, words: &[u32]) -> Addr {
        let addr = self.next_addr();
        for word in words {
            self.bytes.extend_from_slice(&word.to_le_bytes());
        }
        addr
    }

    fn next_addr(&mut self) -> Addr {
        match u32::try_from(self.bytes.len()) {
            Ok(offset) => Addr(offset),
            Err(_) => {
                self.overflow = true;
                Addr::NULL
            }
        }
    }

    /// Overwrites word `index` of an already written record
    ///
    /// Used to build back references (cycles) and corrupted fixtures.
    pub fn patch_word(&mut self, addr: Addr, index: u32, value: u32) -> Result<()> {
        let start = addr.offset() + (index as usize) * WORD as usize;
        match self.bytes.get_mut(start..start + WORD as usize) {
            Some(slot) if !addr.is_null() => {
                slot.copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            _ => Err(Error::ImageError(format!(
                "cannot patch word {} of record at {}",
                index, addr
            ))),
        }
    }

    /// Length-prefixed string, zero padded to a word boundary
    pub fn string(&mut self, s: &str) -> Addr {
        let addr = self.raw(&[s.len() as u32]);
        self.bytes.extend_from_slice(s.as_bytes());
        while self.bytes.len() % WORD as usize != 0 {
            self.bytes.push(0);
        }
        addr
    }

    /// IRConst
    pub fn constant(&mut self, value: &Const) -> Addr {
        let tag = value.tag().raw();
        let bits = value.bits();
        if value.is_wide() {
            self.raw(&[tag, bits as u32, (bits >> 32) as u32])
        } else {
            self.raw(&[tag, bits as u32])
        }
    }

    /// IRCallee; the name string is written first
    pub fn callee(&mut self, callee: &Callee) -> Addr {
        let name = self.string(&callee.name);
        self.raw(&[
            callee.regparms as u32,
            name.0,
            callee.addr as u32,
            (callee.addr >> 32) as u32,
            callee.mcx_mask,
        ])
    }

    /// IRRegArray
    pub fn reg_array(&mut self, descr: &RegArray) -> Addr {
        self.raw(&[
            descr.base as u32,
            descr.elem_ty.raw(),
            descr.n_elems as u32,
        ])
    }

    /// IRTypeEnv
    pub fn type_env(&mut self, types: &[IrType]) -> Addr {
        let addr = self.raw(&[types.len() as u32]);
        for ty in types {
            self.raw(&[ty.raw()]);
        }
        addr
    }

    /// NULL-terminated expression vector
    pub fn expr_vec(&mut self, exprs: &[Addr]) -> Addr {
        let addr = self.next_addr();
        for expr in exprs {
            self.raw(&[expr.0]);
        }
        self.raw(&[Addr::NULL.0]);
        addr
    }

    fn expr_node(&mut self, tag: ExprTag, fields: &[u32]) -> Addr {
        let addr = self.raw(&[tag.raw()]);
        self.raw(fields);
        addr
    }

    fn stmt_node(&mut self, tag: StmtTag, fields: &[u32]) -> Addr {
        let addr = self.raw(&[tag.raw()]);
        self.raw(fields);
        addr
    }

    pub fn binder(&mut self, binder: i32) -> Addr {
        self.expr_node(ExprTag::Binder, &[binder as u32])
    }

    pub fn get(&mut self, offset: i32, ty: IrType) -> Addr {
        self.expr_node(ExprTag::Get, &[offset as u32, ty.raw()])
    }

    pub fn get_i(&mut self, descr: Addr, ix: Addr, bias: i32) -> Addr {
        self.expr_node(ExprTag::GetI, &[descr.0, ix.0, bias as u32])
    }

    pub fn rd_tmp(&mut self, tmp: Temp) -> Addr {
        self.expr_node(ExprTag::RdTmp, &[tmp.0])
    }

    pub fn qop(&mut self, op: Op, args: [Addr; 4]) -> Addr {
        self.expr_node(
            ExprTag::Qop,
            &[op.0, args[0].0, args[1].0, args[2].0, args[3].0],
        )
    }

    pub fn triop(&mut self, op: Op, args: [Addr; 3]) -> Addr {
        self.expr_node(ExprTag::Triop, &[op.0, args[0].0, args[1].0, args[2].0])
    }

    pub fn binop(&mut self, op: Op, lhs: Addr, rhs: Addr) -> Addr {
        self.expr_node(ExprTag::Binop, &[op.0, lhs.0, rhs.0])
    }

    pub fn unop(&mut self, op: Op, arg: Addr) -> Addr {
        self.expr_node(ExprTag::Unop, &[op.0, arg.0])
    }

    pub fn load(&mut self, end: Endness, ty: IrType, addr: Addr) -> Addr {
        self.expr_node(ExprTag::Load, &[end.raw(), ty.raw(), addr.0])
    }

    /// `Const` expression over an already written IRConst
    pub fn const_expr(&mut self, con: Addr) -> Addr {
        self.expr_node(ExprTag::Const, &[con.0])
    }

    pub fn mux0x(&mut self, cond: Addr, expr0: Addr, expr_x: Addr) -> Addr {
        self.expr_node(ExprTag::Mux0X, &[cond.0, expr0.0, expr_x.0])
    }

    /// `CCall`; `args` is an expression vector
    pub fn ccall(&mut self, cee: Addr, ret_ty: IrType, args: Addr) -> Addr {
        self.expr_node(ExprTag::CCall, &[cee.0, ret_ty.raw(), args.0])
    }

    pub fn no_op(&mut self) -> Addr {
        self.stmt_node(StmtTag::NoOp, &[])
    }

    pub fn imark(&mut self, addr: u64, len: i32, delta: u8) -> Addr {
        self.stmt_node(
            StmtTag::IMark,
            &[addr as u32, (addr >> 32) as u32, len as u32, delta as u32],
        )
    }

    pub fn abi_hint(&mut self, base: Addr, len: i32, nia: Addr) -> Addr {
        self.stmt_node(StmtTag::AbiHint, &[base.0, len as u32, nia.0])
    }

    pub fn put(&mut self, offset: i32, data: Addr) -> Addr {
        self.stmt_node(StmtTag::Put, &[offset as u32, data.0])
    }

    pub fn put_i(&mut self, descr: Addr, ix: Addr, bias: i32, data: Addr) -> Addr {
        let mut details = [0u32; put_i::WORDS as usize];
        details[put_i::DESCR as usize] = descr.0;
        details[put_i::IX as usize] = ix.0;
        details[put_i::BIAS as usize] = bias as u32;
        details[put_i::DATA as usize] = data.0;
        let details = self.raw(&details);
        self.stmt_node(StmtTag::PutI, &[details.0])
    }

    pub fn wr_tmp(&mut self, tmp: Temp, data: Addr) -> Addr {
        self.stmt_node(StmtTag::WrTmp, &[tmp.0, data.0])
    }

    pub fn store(&mut self, end: Endness, addr: Addr, data: Addr) -> Addr {
        self.stmt_node(StmtTag::Store, &[end.raw(), addr.0, data.0])
    }

    pub fn cas(&mut self, fields: CasFields) -> Addr {
        let mut details = [0u32; cas::WORDS as usize];
        details[cas::OLD_HI as usize] = fields.old_hi.0;
        details[cas::OLD_LO as usize] = fields.old_lo.0;
        details[cas::END as usize] = fields.end.raw();
        details[cas::ADDR as usize] = fields.addr.0;
        details[cas::EXPD_HI as usize] = fields.expd_hi.0;
        details[cas::EXPD_LO as usize] = fields.expd_lo.0;
        details[cas::DATA_HI as usize] = fields.data_hi.0;
        details[cas::DATA_LO as usize] = fields.data_lo.0;
        let details = self.raw(&details);
        self.stmt_node(StmtTag::Cas, &[details.0])
    }

    /// `LLSC`; a NULL `storedata` makes it a load-linked
    pub fn llsc(&mut self, end: Endness, result: Temp, addr: Addr, storedata: Addr) -> Addr {
        self.stmt_node(StmtTag::Llsc, &[end.raw(), result.0, addr.0, storedata.0])
    }

    pub fn dirty(&mut self, fields: &DirtyFields) -> Addr {
        let mut details = vec![0u32; dirty::WORDS as usize];
        details[dirty::CEE as usize] = fields.cee.0;
        details[dirty::GUARD as usize] = fields.guard.0;
        details[dirty::ARGS as usize] = fields.args.0;
        details[dirty::TMP as usize] = fields.tmp.0;
        details[dirty::M_FX as usize] = fields.m_fx.raw();
        details[dirty::M_ADDR as usize] = fields.m_addr.0;
        details[dirty::M_SIZE as usize] = fields.m_size as u32;
        details[dirty::NEEDS_BBP as usize] = fields.needs_bbp as u32;
        details[dirty::N_FX_STATE as usize] = fields.fx_state.len() as u32;
        for (i, fx) in fields.fx_state.iter().take(MAX_FX_STATE).enumerate() {
            let base = (dirty::FX_STATE + dirty::FX_WORDS * i as u32) as usize;
            details[base] = fx.fx.raw();
            details[base + 1] = fx.offset as u32;
            details[base + 2] = fx.size as u32;
            details[base + 3] = fx.n_repeats as u32;
            details[base + 4] = fx.repeat_len as u32;
        }
        let details = self.raw(&details);
        self.stmt_node(StmtTag::Dirty, &[details.0])
    }

    pub fn mbe(&mut self, event: MBusEvent) -> Addr {
        self.stmt_node(StmtTag::Mbe, &[event.raw()])
    }

    /// `Exit`; `dst` is an IRConst
    pub fn exit(&mut self, guard: Addr, jk: JumpKind, dst: Addr, offs_ip: i32) -> Addr {
        self.stmt_node(StmtTag::Exit, &[guard.0, jk.raw(), dst.0, offs_ip as u32])
    }

    /// IRSB; the statement array is written first (NULL when empty)
    pub fn block(
        &mut self,
        tyenv: Addr,
        stmts: &[Addr],
        next: Addr,
        jumpkind: JumpKind,
        offs_ip: i32,
        arch: Arch,
    ) -> Addr {
        let array = if stmts.is_empty() {
            Addr::NULL
        } else {
            let words: Vec<u32> = stmts.iter().map(|s| s.0).collect();
            self.raw(&words)
        };
        let mut record = [0u32; block::WORDS as usize];
        record[block::TYENV as usize] = tyenv.0;
        record[block::STMTS_USED as usize] = stmts.len() as u32;
        record[block::STMTS as usize] = array.0;
        record[block::NEXT as usize] = next.0;
        record[block::JUMPKIND as usize] = jumpkind.raw();
        record[block::OFFS_IP as usize] = offs_ip as u32;
        record[block::ARCH as usize] = arch.raw();
        self.raw(&record)
    }

    /// Word index of field `n` of a tagged record, for patching
    pub fn field(n: u32) -> u32 {
        node::field(n)
    }

    /// Returns the finished image
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.overflow || self.bytes.len() > u32::MAX as usize {
            return Err(Error::ImageError(format!(
                "image of {} bytes exceeds the 32-bit address space",
                self.bytes.len()
            )));
        }
        Ok(self.bytes)
    }
}
