// Licensed under the Apache-2.0 license

//! Minimal CBOR codec for manifest and storage structures.
//!
//! Decoding is cursor-based and bounds-checked: every read advances an offset
//! into a caller-supplied slice and fails with [`CborError`] instead of
//! reading past the end. Encoding always emits minimal-length heads, which is
//! what the on-flash formats require.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub const MAJOR_UINT: u8 = 0;
pub const MAJOR_NINT: u8 = 1;
pub const MAJOR_BSTR: u8 = 2;
pub const MAJOR_TSTR: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_SIMPLE: u8 = 7;

/// Stop byte for indefinite-length items.
pub const BREAK: u8 = 0xFF;

/// Nesting limit for [`Decoder::skip_any`].
const MAX_SKIP_DEPTH: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CborError {
    UnexpectedEnd,
    TypeMismatch,
    Malformed,
    DepthLimit,
    ValueOutOfRange,
    BufferTooSmall,
}

pub type CborResult<T> = Result<T, CborError>;

/// Parsed item head: major type plus its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    Value(u8, u64),
    Indefinite(u8),
}

pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn peek(&self) -> CborResult<u8> {
        self.buf.get(self.pos).copied().ok_or(CborError::UnexpectedEnd)
    }

    /// Major type of the next item without consuming it.
    pub fn peek_major(&self) -> CborResult<u8> {
        Ok(self.peek()? >> 5)
    }

    /// True if the next byte is the indefinite-length stop byte.
    pub fn peek_break(&self) -> CborResult<bool> {
        Ok(self.peek()? == BREAK)
    }

    fn take(&mut self, n: usize) -> CborResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CborError::UnexpectedEnd);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_head(&mut self) -> CborResult<Head> {
        let ib = self.take(1)?[0];
        let major = ib >> 5;
        let ai = ib & 0x1F;
        let arg = match ai {
            0..=23 => u64::from(ai),
            24 => u64::from(self.take(1)?[0]),
            25 => {
                let b = self.take(2)?;
                u64::from(u16::from_be_bytes([b[0], b[1]]))
            }
            26 => {
                let b = self.take(4)?;
                u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            27 => {
                let b = self.take(8)?;
                u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            28..=30 => return Err(CborError::Malformed),
            _ => return Ok(Head::Indefinite(major)),
        };
        Ok(Head::Value(major, arg))
    }

    fn expect_head(&mut self, major: u8) -> CborResult<u64> {
        let start = self.pos;
        match self.read_head()? {
            Head::Value(m, arg) if m == major => Ok(arg),
            _ => {
                self.pos = start;
                Err(CborError::TypeMismatch)
            }
        }
    }

    pub fn uint(&mut self) -> CborResult<u64> {
        self.expect_head(MAJOR_UINT)
    }

    /// Unsigned integer constrained to `usize`.
    pub fn size(&mut self) -> CborResult<usize> {
        usize::try_from(self.uint()?).map_err(|_| CborError::ValueOutOfRange)
    }

    pub fn int(&mut self) -> CborResult<i64> {
        let start = self.pos;
        match self.read_head()? {
            Head::Value(MAJOR_UINT, arg) => {
                i64::try_from(arg).map_err(|_| CborError::ValueOutOfRange)
            }
            Head::Value(MAJOR_NINT, arg) => i64::try_from(arg)
                .ok()
                .and_then(|v| (-1i64).checked_sub(v))
                .ok_or(CborError::ValueOutOfRange),
            _ => {
                self.pos = start;
                Err(CborError::TypeMismatch)
            }
        }
    }

    fn definite_string(&mut self, major: u8) -> CborResult<&'a [u8]> {
        let start = self.pos;
        let len = self.expect_head(major)?;
        let len = usize::try_from(len).map_err(|_| CborError::ValueOutOfRange)?;
        match self.take(len) {
            Ok(b) => Ok(b),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }

    pub fn bstr(&mut self) -> CborResult<&'a [u8]> {
        self.definite_string(MAJOR_BSTR)
    }

    pub fn tstr(&mut self) -> CborResult<&'a [u8]> {
        self.definite_string(MAJOR_TSTR)
    }

    /// Definite-length array head; returns the element count.
    pub fn array(&mut self) -> CborResult<u64> {
        self.expect_head(MAJOR_ARRAY)
    }

    /// Definite-length map head; returns the pair count.
    pub fn map(&mut self) -> CborResult<u64> {
        self.expect_head(MAJOR_MAP)
    }

    /// Map head of either kind; `None` means indefinite length.
    pub fn map_header(&mut self) -> CborResult<Option<u64>> {
        let start = self.pos;
        match self.read_head()? {
            Head::Value(MAJOR_MAP, n) => Ok(Some(n)),
            Head::Indefinite(MAJOR_MAP) => Ok(None),
            _ => {
                self.pos = start;
                Err(CborError::TypeMismatch)
            }
        }
    }

    pub fn tag(&mut self) -> CborResult<u64> {
        self.expect_head(MAJOR_TAG)
    }

    /// Consume the stop byte of an indefinite-length item.
    pub fn break_stop(&mut self) -> CborResult<()> {
        if self.peek()? == BREAK {
            self.pos += 1;
            Ok(())
        } else {
            Err(CborError::TypeMismatch)
        }
    }

    /// Skip one complete data item, including nested content.
    pub fn skip_any(&mut self) -> CborResult<()> {
        self.skip_item(0)
    }

    fn skip_item(&mut self, depth: u8) -> CborResult<()> {
        if depth >= MAX_SKIP_DEPTH {
            return Err(CborError::DepthLimit);
        }
        match self.read_head()? {
            Head::Value(MAJOR_UINT, _) | Head::Value(MAJOR_NINT, _) => Ok(()),
            Head::Value(MAJOR_BSTR, len) | Head::Value(MAJOR_TSTR, len) => {
                let len = usize::try_from(len).map_err(|_| CborError::ValueOutOfRange)?;
                self.take(len).map(|_| ())
            }
            Head::Value(MAJOR_ARRAY, n) => self.skip_n(n, depth),
            Head::Value(MAJOR_MAP, n) => {
                let pairs = n.checked_mul(2).ok_or(CborError::ValueOutOfRange)?;
                self.skip_n(pairs, depth)
            }
            Head::Value(MAJOR_TAG, _) => self.skip_item(depth + 1),
            // Simple values and floats carry no payload beyond the head.
            Head::Value(MAJOR_SIMPLE, _) => Ok(()),
            Head::Indefinite(major) if major == MAJOR_BSTR || major == MAJOR_TSTR => {
                while !self.peek_break()? {
                    // Chunks of an indefinite string must be definite strings
                    // of the same major type.
                    self.definite_string(major)?;
                }
                self.break_stop()
            }
            Head::Indefinite(MAJOR_ARRAY) => self.skip_until_break(depth, 1),
            Head::Indefinite(MAJOR_MAP) => self.skip_until_break(depth, 2),
            Head::Indefinite(_) => Err(CborError::Malformed),
            _ => Err(CborError::Malformed),
        }
    }

    fn skip_n(&mut self, n: u64, depth: u8) -> CborResult<()> {
        for _ in 0..n {
            self.skip_item(depth + 1)?;
        }
        Ok(())
    }

    fn skip_until_break(&mut self, depth: u8, per_entry: u8) -> CborResult<()> {
        while !self.peek_break()? {
            for _ in 0..per_entry {
                self.skip_item(depth + 1)?;
            }
        }
        self.break_stop()
    }
}

/// Length in bytes of a minimal head carrying `arg`.
pub fn head_len(arg: u64) -> usize {
    match arg {
        0..=23 => 1,
        24..=0xFF => 2,
        0x100..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Encoder { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn put(&mut self, bytes: &[u8]) -> CborResult<()> {
        if self.buf.len() - self.pos < bytes.len() {
            return Err(CborError::BufferTooSmall);
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    /// Minimal-length head for `major` with argument `arg`.
    pub fn head(&mut self, major: u8, arg: u64) -> CborResult<()> {
        let mt = major << 5;
        match arg {
            0..=23 => self.put(&[mt | arg as u8]),
            24..=0xFF => self.put(&[mt | 24, arg as u8]),
            0x100..=0xFFFF => {
                let b = (arg as u16).to_be_bytes();
                self.put(&[mt | 25, b[0], b[1]])
            }
            0x1_0000..=0xFFFF_FFFF => {
                let b = (arg as u32).to_be_bytes();
                self.put(&[mt | 26, b[0], b[1], b[2], b[3]])
            }
            _ => {
                let b = arg.to_be_bytes();
                self.put(&[mt | 27, b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
        }
    }

    pub fn uint(&mut self, v: u64) -> CborResult<()> {
        self.head(MAJOR_UINT, v)
    }

    pub fn bstr_header(&mut self, len: usize) -> CborResult<()> {
        self.head(MAJOR_BSTR, len as u64)
    }

    pub fn bstr(&mut self, b: &[u8]) -> CborResult<()> {
        self.bstr_header(b.len())?;
        self.put(b)
    }

    pub fn tstr(&mut self, s: &[u8]) -> CborResult<()> {
        self.head(MAJOR_TSTR, s.len() as u64)?;
        self.put(s)
    }

    pub fn array(&mut self, n: u64) -> CborResult<()> {
        self.head(MAJOR_ARRAY, n)
    }

    pub fn map(&mut self, pairs: u64) -> CborResult<()> {
        self.head(MAJOR_MAP, pairs)
    }

    pub fn map_indefinite(&mut self) -> CborResult<()> {
        self.put(&[(MAJOR_MAP << 5) | 0x1F])
    }

    pub fn break_stop(&mut self) -> CborResult<()> {
        self.put(&[BREAK])
    }

    pub fn tag(&mut self, t: u64) -> CborResult<()> {
        self.head(MAJOR_TAG, t)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> CborResult<()> {
        self.put(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_forms() {
        let mut dec = Decoder::new(&[0x17]);
        assert_eq!(dec.uint(), Ok(23));
        let mut dec = Decoder::new(&[0x18, 0x2A]);
        assert_eq!(dec.uint(), Ok(42));
        let mut dec = Decoder::new(&[0x19, 0x12, 0x34]);
        assert_eq!(dec.uint(), Ok(0x1234));
        let mut dec = Decoder::new(&[0x1A, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(dec.uint(), Ok(0x10000));
        let mut dec = Decoder::new(&[0x1B, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(dec.uint(), Ok(0x1_0000_0000));
    }

    #[test]
    fn test_int_negative() {
        let mut dec = Decoder::new(&[0x20]);
        assert_eq!(dec.int(), Ok(-1));
        let mut dec = Decoder::new(&[0x38, 0x63]);
        assert_eq!(dec.int(), Ok(-100));
        let mut dec = Decoder::new(&[0x05]);
        assert_eq!(dec.int(), Ok(5));
    }

    #[test]
    fn test_truncated_input() {
        let mut dec = Decoder::new(&[0x19, 0x12]);
        assert_eq!(dec.uint(), Err(CborError::UnexpectedEnd));
        let mut dec = Decoder::new(&[0x44, 0xAA, 0xBB]);
        assert_eq!(dec.bstr(), Err(CborError::UnexpectedEnd));
        // A failed read must not consume input.
        assert_eq!(dec.position(), 0);
    }

    #[test]
    fn test_type_mismatch_preserves_position() {
        let mut dec = Decoder::new(&[0x42, 0x01, 0x02]);
        assert_eq!(dec.uint(), Err(CborError::TypeMismatch));
        assert_eq!(dec.position(), 0);
        assert_eq!(dec.bstr(), Ok(&[0x01, 0x02][..]));
    }

    #[test]
    fn test_strings_and_nesting() {
        // bstr wrapping a tstr, the component-id field convention.
        let mut dec = Decoder::new(&[0x44, 0x63, b'M', b'E', b'M']);
        let inner = dec.bstr().unwrap();
        let mut nested = Decoder::new(inner);
        assert_eq!(nested.tstr(), Ok(&b"MEM"[..]));
        assert!(nested.is_at_end());
    }

    #[test]
    fn test_indefinite_map_scan() {
        // {_ "ab": h'0102'} with stop byte.
        let buf = [0xBF, 0x62, b'a', b'b', 0x42, 0x01, 0x02, 0xFF];
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.map_header(), Ok(None));
        assert!(!dec.peek_break().unwrap());
        assert_eq!(dec.tstr(), Ok(&b"ab"[..]));
        assert_eq!(dec.bstr(), Ok(&[0x01, 0x02][..]));
        assert!(dec.peek_break().unwrap());
        assert_eq!(dec.break_stop(), Ok(()));
        assert!(dec.is_at_end());
    }

    #[test]
    fn test_skip_any_structures() {
        // [1, {2: h'AA'}, "x"] followed by a trailing uint.
        let buf = [0x83, 0x01, 0xA1, 0x02, 0x41, 0xAA, 0x61, b'x', 0x07];
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.skip_any(), Ok(()));
        assert_eq!(dec.uint(), Ok(7));
    }

    #[test]
    fn test_skip_any_tag_and_indefinite() {
        // 107({_ 1: 2}) then a uint.
        let buf = [0xD8, 0x6B, 0xBF, 0x01, 0x02, 0xFF, 0x04];
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.skip_any(), Ok(()));
        assert_eq!(dec.uint(), Ok(4));
    }

    #[test]
    fn test_skip_any_depth_limit() {
        let buf = [0x81; 32];
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.skip_any(), Err(CborError::DepthLimit));
    }

    #[test]
    fn test_encoder_minimal_heads() {
        let mut buf = [0u8; 16];
        let mut enc = Encoder::new(&mut buf);
        enc.uint(23).unwrap();
        enc.uint(24).unwrap();
        enc.uint(0x1234).unwrap();
        assert_eq!(&buf[..6], &[0x17, 0x18, 0x18, 0x19, 0x12, 0x34]);
    }

    #[test]
    fn test_head_len_matches_encoder() {
        for arg in [0u64, 23, 24, 0xFF, 0x100, 0xFFFF, 0x10000, 0xFFFF_FFFF] {
            let mut buf = [0u8; 9];
            let mut enc = Encoder::new(&mut buf);
            enc.uint(arg).unwrap();
            assert_eq!(enc.position(), head_len(arg), "arg {arg:#x}");
        }
    }

    #[test]
    fn test_encode_decode_envelope_shape() {
        let mut buf = [0u8; 32];
        let mut enc = Encoder::new(&mut buf);
        enc.tag(107).unwrap();
        enc.map(2).unwrap();
        enc.uint(2).unwrap();
        enc.bstr(&[0xDE, 0xAD]).unwrap();
        enc.uint(3).unwrap();
        enc.bstr(&[0xBE, 0xEF, 0x01]).unwrap();
        let len = enc.position();

        let mut dec = Decoder::new(&buf[..len]);
        assert_eq!(dec.tag(), Ok(107));
        assert_eq!(dec.map(), Ok(2));
        assert_eq!(dec.uint(), Ok(2));
        assert_eq!(dec.bstr(), Ok(&[0xDE, 0xAD][..]));
        assert_eq!(dec.uint(), Ok(3));
        assert_eq!(dec.bstr(), Ok(&[0xBE, 0xEF, 0x01][..]));
        assert!(dec.is_at_end());
    }

    #[test]
    fn test_encoder_overflow() {
        let mut buf = [0u8; 2];
        let mut enc = Encoder::new(&mut buf);
        assert_eq!(enc.bstr(&[1, 2, 3]), Err(CborError::BufferTooSmall));
    }

    #[test]
    fn test_reserved_additional_info() {
        for ib in [0x1C, 0x1D, 0x1E] {
            let buf = [ib];
            let mut dec = Decoder::new(&buf);
            assert_eq!(dec.uint(), Err(CborError::Malformed));
        }
    }
}
