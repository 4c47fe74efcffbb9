//! Borrowed reader over an engine arena image

use super::{Addr, HEADER_LEN, MAGIC, VERSION, WORD};
use crate::error::{Error, NodeKind, Result};

/// Read-only view of an engine arena image
///
/// The view borrows the engine's buffer for the duration of one copy call
/// and never outlives it. Every read is bounds- and alignment-checked, so a
/// corrupted pointer surfaces as [`Error::InvariantViolation`] instead of a
/// panic.
#[derive(Debug, Clone, Copy)]
pub struct SourceView<'a> {
    bytes: &'a [u8],
}

impl<'a> SourceView<'a> {
    /// Wraps an image, validating its header
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN as usize {
            return Err(Error::ImageError(format!(
                "image of {} bytes is shorter than its header",
                bytes.len()
            )));
        }
        if bytes.len() > u32::MAX as usize {
            return Err(Error::ImageError(
                "image exceeds the 32-bit address space".to_string(),
            ));
        }
        let view = Self { bytes };
        let magic = view.read_u32(0);
        if magic != MAGIC {
            return Err(Error::ImageError(format!(
                "bad magic {:#010x}, expected {:#010x}",
                magic, MAGIC
            )));
        }
        let version = view.read_u32(4);
        if version != VERSION {
            return Err(Error::ImageError(format!(
                "unsupported layout version {} (expected {})",
                version, VERSION
            )));
        }
        Ok(view)
    }

    /// Image size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the image holds nothing but its header
    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= HEADER_LEN as usize
    }

    /// Raw bytes of the image
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[offset..offset + 4]);
        u32::from_le_bytes(word)
    }

    /// Checks that `words` words starting at `addr` form a readable record
    pub fn check_record(&self, kind: NodeKind, addr: Addr, words: u32) -> Result<()> {
        if addr.is_null() {
            return Err(Error::invariant(kind, addr, "NULL record"));
        }
        if addr.0 < HEADER_LEN {
            return Err(Error::invariant(kind, addr, "record overlaps image header"));
        }
        if addr.0 % WORD != 0 {
            return Err(Error::invariant(kind, addr, "misaligned record"));
        }
        let end = addr.offset() as u64 + words as u64 * WORD as u64;
        if end > self.bytes.len() as u64 {
            return Err(Error::invariant(
                kind,
                addr,
                format!(
                    "record of {} words runs past the end of a {}-byte image",
                    words,
                    self.bytes.len()
                ),
            ));
        }
        Ok(())
    }

    /// Reads word `index` of the record at `addr`
    pub fn word(&self, kind: NodeKind, addr: Addr, index: u32) -> Result<u32> {
        self.check_record(kind, addr, index.saturating_add(1))?;
        Ok(self.read_u32(addr.offset() + (index * WORD) as usize))
    }

    /// Reads word `index` as a signed value
    pub fn word_i32(&self, kind: NodeKind, addr: Addr, index: u32) -> Result<i32> {
        Ok(self.word(kind, addr, index)? as i32)
    }

    /// Reads the u64 stored in words `index` and `index + 1`
    pub fn dword(&self, kind: NodeKind, addr: Addr, index: u32) -> Result<u64> {
        self.check_record(kind, addr, index.saturating_add(2))?;
        let offset = addr.offset() + (index * WORD) as usize;
        let lo = self.read_u32(offset) as u64;
        let hi = self.read_u32(offset + WORD as usize) as u64;
        Ok(lo | (hi << 32))
    }

    /// Reads a nullable pointer field
    pub fn ptr(&self, kind: NodeKind, addr: Addr, index: u32) -> Result<Addr> {
        self.word(kind, addr, index).map(Addr)
    }

    /// Reads a pointer field that must not be NULL
    pub fn required(&self, kind: NodeKind, addr: Addr, index: u32, field: &str) -> Result<Addr> {
        let target = self.ptr(kind, addr, index)?;
        if target.is_null() {
            return Err(Error::invariant(
                kind,
                addr,
                format!("required field `{}` is NULL", field),
            ));
        }
        Ok(target)
    }

    /// Reads a nullable pointer field as an `Option`
    pub fn optional(&self, kind: NodeKind, addr: Addr, index: u32) -> Result<Option<Addr>> {
        let target = self.ptr(kind, addr, index)?;
        Ok(if target.is_null() { None } else { Some(target) })
    }

    /// Reads a length-prefixed UTF-8 string
    pub fn string(&self, addr: Addr) -> Result<&'a str> {
        let len = self.word(NodeKind::String, addr, 0)?;
        let words = len.div_ceil(WORD);
        self.check_record(NodeKind::String, addr, words.saturating_add(1))?;
        let start = addr.offset() + WORD as usize;
        let raw = &self.bytes[start..start + len as usize];
        std::str::from_utf8(raw)
            .map_err(|e| Error::invariant(NodeKind::String, addr, format!("invalid UTF-8: {}", e)))
    }

    /// Hex dump of up to `words` words at `addr`, for diagnostics
    pub fn hexdump(&self, addr: Addr, words: u32) -> String {
        let start = addr.offset().min(self.bytes.len());
        let end = (start + (words * WORD) as usize).min(self.bytes.len());
        hex::encode(&self.bytes[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageWriter;

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(
            SourceView::new(&[0u8; 4]),
            Err(Error::ImageError(_))
        ));
        let mut bytes = ImageWriter::new().finish().unwrap();
        bytes[0] ^= 0xff;
        assert!(matches!(SourceView::new(&bytes), Err(Error::ImageError(_))));
    }

    #[test]
    fn test_word_reads_and_bounds() {
        let mut writer = ImageWriter::new();
        let addr = writer.raw(&[7, 0xffff_fffe, 0x1234_5678, 0x9abc_def0]);
        let bytes = writer.finish().unwrap();
        let view = SourceView::new(&bytes).unwrap();

        assert_eq!(view.word(NodeKind::Expr, addr, 0).unwrap(), 7);
        assert_eq!(view.word_i32(NodeKind::Expr, addr, 1).unwrap(), -2);
        assert_eq!(
            view.dword(NodeKind::Expr, addr, 2).unwrap(),
            0x9abc_def0_1234_5678
        );
        assert!(view.word(NodeKind::Expr, addr, 4).is_err());
        assert!(view.word(NodeKind::Expr, Addr(addr.0 + 1), 0).is_err());
        assert!(view.word(NodeKind::Expr, Addr(4), 0).is_err());
        assert!(view.word(NodeKind::Expr, Addr::NULL, 0).is_err());
    }

    #[test]
    fn test_required_pointer() {
        let mut writer = ImageWriter::new();
        let addr = writer.raw(&[0, 8]);
        let bytes = writer.finish().unwrap();
        let view = SourceView::new(&bytes).unwrap();

        let err = view.required(NodeKind::Stmt, addr, 0, "data").unwrap_err();
        assert!(err.to_string().contains("`data` is NULL"));
        assert_eq!(view.optional(NodeKind::Stmt, addr, 0).unwrap(), None);
        assert_eq!(view.optional(NodeKind::Stmt, addr, 1).unwrap(), Some(Addr(8)));
    }

    #[test]
    fn test_string_roundtrip_and_utf8() {
        let mut writer = ImageWriter::new();
        let name = writer.string("amd64g_calculate_condition");
        let bad = writer.raw(&[2, 0x0000_ffff]);
        let bytes = writer.finish().unwrap();
        let view = SourceView::new(&bytes).unwrap();

        assert_eq!(view.string(name).unwrap(), "amd64g_calculate_condition");
        assert!(view.string(bad).is_err());
    }

    #[test]
    fn test_hexdump_clamps() {
        let mut writer = ImageWriter::new();
        let addr = writer.raw(&[0x1e00]);
        let bytes = writer.finish().unwrap();
        let view = SourceView::new(&bytes).unwrap();
        assert_eq!(view.hexdump(addr, 8), "001e0000");
    }
}
