//! Cursor over a received datagram.
//!
//! Every accessor returns `None` once the buffer is exhausted, and a read that
//! runs past the end exhausts the cursor, so later fields never pick up bytes
//! belonging to a cut-off one. Mandatory fields are read with `.ok_or(..)?`
//! and optional trailing fields with `.unwrap_or_default()`.

pub(crate) struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Start reading at `pos`
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.saturating_add(N);
        match self.buf.get(self.pos..end) {
            Some(field) => {
                self.pos = end;
                field.try_into().ok()
            }
            None => {
                self.pos = self.buf.len();
                None
            }
        }
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.bytes::<1>().map(|[b]| b)
    }

    pub fn u16_le(&mut self) -> Option<u16> {
        self.bytes::<2>().map(u16::from_le_bytes)
    }

    pub fn u16_be(&mut self) -> Option<u16> {
        self.bytes::<2>().map(u16::from_be_bytes)
    }

    /// Hi/Lo pair: read little-endian, then byte-swapped
    pub fn u16_swapped(&mut self) -> Option<u16> {
        self.u16_le().map(u16::swap_bytes)
    }

    /// IPv4 address: read little-endian, then byte-swapped
    pub fn u32_swapped(&mut self) -> Option<u32> {
        self.bytes::<4>().map(u32::from_le_bytes).map(u32::swap_bytes)
    }

    pub fn skip(&mut self, n: usize) -> Option<()> {
        let end = self.pos.saturating_add(n);
        if end > self.buf.len() {
            self.pos = self.buf.len();
            return None;
        }
        self.pos = end;
        Some(())
    }

    /// Up to `max` bytes, fewer if the buffer ends first
    pub fn take_up_to(&mut self, max: usize) -> &'a [u8] {
        let end = self.pos.saturating_add(max).min(self.buf.len());
        let start = self.pos.min(end);
        self.pos = end;
        &self.buf[start..end]
    }
}

/// Decode a NUL-padded fixed-width string field
pub(crate) fn nul_padded_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Copy `text` into a fixed-width field, truncated so at least one NUL remains
pub(crate) fn write_nul_padded(field: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let copy_len = bytes.len().min(field.len().saturating_sub(1));
    field[..copy_len].copy_from_slice(&bytes[..copy_len]);
    field[copy_len..].fill(0);
}
