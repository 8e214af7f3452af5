//! Variable-width LZW compression as used by GIF image data.
//!
//! Codes start at `min_code_size + 1` bits and grow up to 12 bits. Once all
//! 4096 codes are taken the encoder emits a Clear code and starts over with a
//! fresh dictionary. Codes are packed LSB-first.

use std::collections::HashMap;

const MAX_CODES: u16 = 1 << MAX_CODE_WIDTH;
const MAX_CODE_WIDTH: u8 = 12;

/// LZW minimum code size for a color table with `table_size` entries.
///
/// This is `ceil(log2(table_size))`, but never less than 2 as GIF requires.
pub fn min_code_size(table_size: usize) -> u8 {
    let bits = table_size.max(1).next_power_of_two().trailing_zeros() as u8;
    bits.max(2)
}

/// Compress palette indices into a GIF LZW code stream.
///
/// Every index must be below `1 << min_code_size`. `min_code_size` is clamped
/// to the 2..=8 range GIF allows. The result is the raw code stream, not yet
/// split into sub-blocks.
pub fn encode(indices: &[u8], min_code_size: u8) -> Vec<u8> {
    let mut state = Dictionary::new(min_code_size.clamp(2, 8));
    let mut out = BitWriter::with_capacity(indices.len() / 2 + 4);

    out.write(state.clear_code, state.code_width);

    if let Some((&first, rest)) = indices.split_first() {
        debug_assert!((first as u16) < state.clear_code);
        let mut prefix = first as u16;
        for &symbol in rest {
            debug_assert!((symbol as u16) < state.clear_code);
            if let Some(code) = state.lookup(prefix, symbol) {
                prefix = code;
                continue;
            }
            out.write(prefix, state.code_width);
            if !state.insert(prefix, symbol) {
                out.write(state.clear_code, state.code_width);
                state.reset();
            }
            prefix = symbol as u16;
        }
        out.write(prefix, state.code_width);
    }

    out.write(state.end_code(), state.code_width);

    log::trace!(
        "lzw: {} indices -> {} bytes, {} dictionary resets",
        indices.len(),
        out.len(),
        state.resets
    );
    out.finish()
}

/// Strings longer than one symbol, keyed by (prefix code, next symbol).
/// Single symbols are implicitly their own codes.
struct Dictionary {
    entries: HashMap<(u16, u8), u16>,
    min_code_size: u8,
    clear_code: u16,
    next_code: u16,
    code_width: u8,
    resets: usize,
}

impl Dictionary {
    fn new(min_code_size: u8) -> Self {
        let clear_code = 1u16 << min_code_size;
        Self {
            entries: HashMap::new(),
            min_code_size,
            clear_code,
            next_code: clear_code + 2,
            code_width: min_code_size + 1,
            resets: 0,
        }
    }

    #[inline]
    fn end_code(&self) -> u16 {
        self.clear_code + 1
    }

    #[inline]
    fn lookup(&self, prefix: u16, symbol: u8) -> Option<u16> {
        self.entries.get(&(prefix, symbol)).copied()
    }

    /// Add `prefix + symbol` as the next code. Returns false when the code
    /// space is exhausted and the dictionary must be cleared instead.
    fn insert(&mut self, prefix: u16, symbol: u8) -> bool {
        if self.next_code >= MAX_CODES {
            return false;
        }
        self.entries.insert((prefix, symbol), self.next_code);
        self.next_code += 1;
        if self.next_code == 1 << self.code_width && self.code_width < MAX_CODE_WIDTH {
            self.code_width += 1;
        }
        true
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.next_code = self.clear_code + 2;
        self.code_width = self.min_code_size + 1;
        self.resets += 1;
    }
}

/// Little-endian bit packer.
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            acc: 0,
            bits: 0,
        }
    }

    #[inline]
    fn write(&mut self, code: u16, width: u8) {
        self.acc |= (code as u32) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn len(&self) -> usize {
        self.out.len() + usize::from(self.bits > 0)
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.out.push(self.acc as u8);
        }
        self.out
    }
}
