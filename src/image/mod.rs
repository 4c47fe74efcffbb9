//! # Engine arena images
//!
//! The IR engine allocates a lifted superblock inside a transient arena. This
//! module models that arena as a byte image addressed by 32-bit offsets:
//!
//! - [`SourceView`] - borrowed, read-only, bounds-checked reader (copy input)
//! - [`ImageWriter`] - appends records in engine layout (copy-out, fixtures)
//! - [`export_block`] - writes an owned block back into engine layout
//!
//! ## Layout
//!
//! ```text
//! 0x0  magic  u32   0x4952_5342
//! 0x4  version u32  1
//! 0x8  records...   4-byte aligned, little-endian, pointers are u32 offsets
//! ```
//!
//! Offset `0` is NULL; no record can start inside the header. Field positions
//! are expressed in words in [`layout`].

mod export;
mod view;
mod writer;

pub use export::{export_block, export_expr, export_stmt};
pub use view::SourceView;
pub use writer::{CasFields, DirtyFields, FxFields, ImageWriter};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image magic (`"BSRI"` little-endian)
pub const MAGIC: u32 = 0x4952_5342;
/// Layout version understood by this crate
pub const VERSION: u32 = 1;
/// Header size in bytes
pub const HEADER_LEN: u32 = 8;
/// Word size in bytes
pub const WORD: u32 = 4;

/// Address of a record inside an image (byte offset, `0` is NULL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Addr(pub u32);

impl Addr {
    /// The NULL pointer
    pub const NULL: Addr = Addr(0);

    /// Returns true for NULL
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset of this address
    pub fn offset(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Word indices of every record field
pub mod layout {
    /// IRConst: tag, then a u32 or u64 payload
    pub mod constant {
        pub const TAG: u32 = 0;
        pub const VALUE: u32 = 1;
    }

    /// IRCallee
    pub mod callee {
        pub const REGPARMS: u32 = 0;
        pub const NAME: u32 = 1;
        pub const ADDR: u32 = 2;
        pub const MCX_MASK: u32 = 4;
        pub const WORDS: u32 = 5;
    }

    /// Length-prefixed byte string
    pub mod string {
        pub const LEN: u32 = 0;
        pub const BYTES: u32 = 1;
    }

    /// IRRegArray
    pub mod reg_array {
        pub const BASE: u32 = 0;
        pub const ELEM_TY: u32 = 1;
        pub const N_ELEMS: u32 = 2;
        pub const WORDS: u32 = 3;
    }

    /// IRTypeEnv: count followed by that many IRType words
    pub mod type_env {
        pub const USED: u32 = 0;
        pub const TYPES: u32 = 1;
    }

    /// Tagged expression and statement records: tag at word 0, fields after
    pub mod node {
        pub const TAG: u32 = 0;

        /// Word index of the `n`th field after the tag
        pub const fn field(n: u32) -> u32 {
            1 + n
        }
    }

    /// Out-of-line PutI details
    pub mod put_i {
        pub const DESCR: u32 = 0;
        pub const IX: u32 = 1;
        pub const BIAS: u32 = 2;
        pub const DATA: u32 = 3;
        pub const WORDS: u32 = 4;
    }

    /// Out-of-line CAS details
    pub mod cas {
        pub const OLD_HI: u32 = 0;
        pub const OLD_LO: u32 = 1;
        pub const END: u32 = 2;
        pub const ADDR: u32 = 3;
        pub const EXPD_HI: u32 = 4;
        pub const EXPD_LO: u32 = 5;
        pub const DATA_HI: u32 = 6;
        pub const DATA_LO: u32 = 7;
        pub const WORDS: u32 = 8;
    }

    /// Out-of-line dirty call details
    pub mod dirty {
        pub const CEE: u32 = 0;
        pub const GUARD: u32 = 1;
        pub const ARGS: u32 = 2;
        pub const TMP: u32 = 3;
        pub const M_FX: u32 = 4;
        pub const M_ADDR: u32 = 5;
        pub const M_SIZE: u32 = 6;
        pub const NEEDS_BBP: u32 = 7;
        pub const N_FX_STATE: u32 = 8;
        pub const FX_STATE: u32 = 9;
        /// Words per guest-state effect entry: fx, offset, size, nRepeats, repeatLen
        pub const FX_WORDS: u32 = 5;
        pub const WORDS: u32 = FX_STATE + FX_WORDS * crate::ir::MAX_FX_STATE as u32;
    }

    /// IRSB
    pub mod block {
        pub const TYENV: u32 = 0;
        pub const STMTS_USED: u32 = 1;
        pub const STMTS: u32 = 2;
        pub const NEXT: u32 = 3;
        pub const JUMPKIND: u32 = 4;
        pub const OFFS_IP: u32 = 5;
        pub const ARCH: u32 = 6;
        pub const WORDS: u32 = 7;
    }
}
