//! Streaming Brainfuck → AArch64 compiler
//!
//! Consumes one byte at a time, so a caller can feed it straight from a file reader without
//! buffering the whole program first (though [`compile`] below is handed a slice for
//! convenience, since the CLI front end already read the file into memory to size the JIT
//! mapping). Drives an [`Encoder`](crate::encoder::Encoder) and never inspects the source by
//! position — only through a 3-character sliding window, per the design notes in the
//! specification this crate implements.

use crate::encoder::Encoder;
use crate::error::ParseError;
use crate::register::{MEM_BASE, MEM_PTR, TMP1};

/// Sentinel used to drain the lookahead window at end of stream. Brainfuck source never contains
/// a real NUL that means anything, so it doubles as "no character" here.
const EOS: u8 = 0;

fn is_brainfuck_char(byte: u8) -> bool {
    matches!(byte, b'+' | b'-' | b'<' | b'>' | b'[' | b']' | b'.' | b',')
}

/// Streaming compiler state: pending arithmetic deltas, the unresolved-loop stack, the lookahead
/// window, and the peephole skip counter.
pub struct Compiler {
    jumps: Vec<usize>,
    cell_delta: i8,
    pointer_delta: i64,
    /// Filtered characters seen but not yet compiled (length 0..=2 between calls; briefly 3
    /// inside `feed`, where the oldest is immediately popped and compiled).
    window: Vec<u8>,
    /// Remaining filtered characters whose emission is suppressed because an earlier peephole
    /// rewrite already accounted for their effect.
    skip: u8,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Creates a compiler with empty pending state.
    pub fn new() -> Self {
        Self {
            jumps: Vec::new(),
            cell_delta: 0,
            pointer_delta: 0,
            window: Vec::with_capacity(3),
            skip: 0,
        }
    }

    /// Filters and buffers one source byte, compiling the oldest buffered character once both
    /// characters after it are known.
    pub fn feed(&mut self, byte: u8, encoder: &mut Encoder) -> Result<(), ParseError> {
        if byte != EOS && !is_brainfuck_char(byte) {
            // Brainfuck treats any other byte as a comment.
            return Ok(());
        }
        self.window.push(byte);
        if self.window.len() == 3 {
            let c = self.window.remove(0);
            let next1 = self.window[0];
            let next2 = self.window[1];
            self.compile_one(c, next1, next2, encoder)?;
        }
        Ok(())
    }

    /// Drains the lookahead window with two end-of-stream sentinels, flushes any residual
    /// arithmetic delta, and appends the encoder's postlude. Fails if any `[` was never closed.
    pub fn finish(&mut self, encoder: &mut Encoder) -> Result<(), ParseError> {
        self.feed(EOS, encoder)?;
        self.feed(EOS, encoder)?;
        self.flush_cell(encoder);
        self.flush_pointer(encoder);
        if !self.jumps.is_empty() {
            return Err(ParseError::ExpectedClose);
        }
        encoder.postlude();
        Ok(())
    }

    fn compile_one(
        &mut self,
        c: u8,
        next1: u8,
        next2: u8,
        encoder: &mut Encoder,
    ) -> Result<(), ParseError> {
        if self.skip > 0 {
            self.skip -= 1;
            return Ok(());
        }
        match c {
            b'+' => {
                self.flush_pointer(encoder);
                self.cell_delta = self.cell_delta.wrapping_add(1);
            }
            b'-' => {
                self.flush_pointer(encoder);
                self.cell_delta = self.cell_delta.wrapping_sub(1);
            }
            b'>' => {
                self.flush_cell(encoder);
                self.pointer_delta += 1;
            }
            b'<' => {
                self.flush_cell(encoder);
                self.pointer_delta -= 1;
            }
            b'[' => {
                self.flush_cell(encoder);
                self.flush_pointer(encoder);
                if next1 == b'-' && next2 == b']' {
                    // `[-]`: clear the current cell directly and skip past the `-` and `]`
                    // that would otherwise decrement-then-close an empty loop.
                    encoder.mov_zero(TMP1);
                    encoder.strb(TMP1, MEM_BASE, MEM_PTR);
                    self.skip = 2;
                } else {
                    encoder.ldrb(TMP1, MEM_BASE, MEM_PTR);
                    let index = encoder.cbz(TMP1);
                    self.jumps.push(index);
                }
            }
            b']' => {
                self.flush_cell(encoder);
                self.flush_pointer(encoder);
                encoder.ldrb(TMP1, MEM_BASE, MEM_PTR);
                let start = self.jumps.pop().ok_or(ParseError::ExpectedOpen)?;
                let end = encoder.cbnz(TMP1);
                encoder.patch_branch(start, (end as i32 - start as i32) + 1);
                encoder.patch_branch(end, (start as i32 - end as i32) + 1);
            }
            b'.' => {
                self.flush_cell(encoder);
                self.flush_pointer(encoder);
                encoder.syscall_out();
            }
            b',' => {
                self.flush_cell(encoder);
                self.flush_pointer(encoder);
                encoder.syscall_in();
            }
            EOS => {}
            _ => unreachable!("feed only buffers brainfuck characters or the EOS sentinel"),
        }
        Ok(())
    }

    /// If `cellDelta` is non-zero, emits `add tmp1, memBase, memPtr; mov tmp2, cellDelta;
    /// ldaddb tmp1, tmp2` and resets it to zero. The 16-bit immediate naturally carries the
    /// signed 8-bit delta as its unsigned bit pattern (wrapping is the intended 8-bit cell
    /// semantics, not a bug).
    fn flush_cell(&mut self, encoder: &mut Encoder) {
        if self.cell_delta == 0 {
            return;
        }
        use crate::register::TMP2;
        encoder.add(TMP1, MEM_BASE, MEM_PTR);
        encoder.mov_imm(TMP2, self.cell_delta as u16);
        encoder.ldaddb(TMP1, TMP2);
        self.cell_delta = 0;
    }

    /// If `pointerDelta` is non-zero, emits full `ADD_SUB_IMM_LIMIT`-sized chunks followed by one
    /// remainder operation (add for a positive delta, sub for negative) and resets it to zero.
    fn flush_pointer(&mut self, encoder: &mut Encoder) {
        if self.pointer_delta == 0 {
            return;
        }
        use crate::encoder::ADD_SUB_IMM_LIMIT;
        let limit = u64::from(ADD_SUB_IMM_LIMIT);
        let abs = self.pointer_delta.unsigned_abs();
        let chunks = abs / limit;
        let remainder = (abs % limit) as u16;
        let emit_one = |encoder: &mut Encoder, imm: u16| {
            if self.pointer_delta > 0 {
                encoder.add_imm(MEM_PTR, MEM_PTR, imm);
            } else {
                encoder.sub_imm(MEM_PTR, MEM_PTR, imm);
            }
        };
        for _ in 0..chunks {
            emit_one(encoder, ADD_SUB_IMM_LIMIT);
        }
        if remainder != 0 {
            emit_one(encoder, remainder);
        }
        self.pointer_delta = 0;
    }
}

/// Compiles a complete Brainfuck source buffer into an AArch64 instruction stream: emits the
/// prelude, feeds every byte through a fresh [`Compiler`], and finishes with the postlude.
pub fn compile(source: &[u8]) -> Result<Vec<u32>, ParseError> {
    let mut encoder = Encoder::new(source.len());
    encoder.prelude();
    let mut compiler = Compiler::new();
    for &byte in source {
        compiler.feed(byte, &mut encoder)?;
    }
    compiler.finish(&mut encoder)?;
    Ok(encoder.buffer().to_vec())
}
