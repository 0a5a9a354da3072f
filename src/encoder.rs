//! AArch64 instruction encoding
//!
//! One method per supported mnemonic, each appending exactly one 32-bit little-endian word to
//! the internal instruction buffer. Field layouts are packed with [`bitfield_struct::bitfield`],
//! the same crate this codebase otherwise uses to describe fixed-width hardware words, and then
//! OR-ed onto a fixed opcode base so the struct only ever needs to model the bits that vary.
//!
//! Everything here is a pure function of its arguments except [`Encoder::cbz`]/[`Encoder::cbnz`]
//! (which return the index they were written at) and [`Encoder::patch_branch`] (which rewrites an
//! earlier word by that index). See [`crate::compiler`] for the only caller.

use crate::register::Register;
use bitfield_struct::bitfield;

/// `MOVZ Xd, #0` / `MOVZ Xd, #imm16`.
const MOVZ_BASE: u32 = 0xD280_0000;
/// `MOVN Xd, #0` — used only to materialize the constant -1.
const MOVN_BASE: u32 = 0x9280_0000;
/// `ORR Xd, XZR, Xsrc`, i.e. a register-to-register move.
const ORR_MOVE_BASE: u32 = 0xAA00_03E0;
/// `LDRB Wt, [Xn, Xm]`.
const LDRB_BASE: u32 = 0x3860_6800;
/// `STRB Wt, [Xn, Xm]`.
const STRB_BASE: u32 = 0x3820_6800;
/// `ADD Xd, Xn, Xm` (shifted register, no shift).
const ADD_REG_BASE: u32 = 0x8B00_0000;
/// `ADD Xd, Xn, #imm12`.
const ADD_IMM_BASE: u32 = 0x9100_0000;
/// `SUB Xd, Xn, #imm12`.
const SUB_IMM_BASE: u32 = 0xD100_0000;
/// `LDADDB Ws, [Xn]` with destination `WZR` (the loaded-and-replaced value is discarded).
const LDADDB_BASE: u32 = 0x3820_001F;
/// `CBZ Xt, #0` (imm19 placeholder, patched later).
const CBZ_BASE: u32 = 0xB400_0000;
/// `CBNZ Xt, #0` (imm19 placeholder, patched later).
const CBNZ_BASE: u32 = 0xB500_0000;
/// `SVC #0x80`, the Darwin syscall trap.
const SVC_0X80: u32 = 0xD400_1001;
/// `RET`.
const RET: u32 = 0xD65F_03C0;

/// Largest immediate accepted by [`Encoder::add_imm`]/[`Encoder::sub_imm`].
pub const ADD_SUB_IMM_LIMIT: u16 = (1 << 12) - 1;

/// Smallest signed instruction-count displacement [`Encoder::patch_branch`] accepts.
const MIN_BRANCH_DISPLACEMENT: i32 = -(1 << 18);
/// Largest signed instruction-count displacement [`Encoder::patch_branch`] accepts.
const MAX_BRANCH_DISPLACEMENT: i32 = (1 << 18) - 1;

/// Three register fields packed into one word: `rd` (bits 0..5), `rn` (bits 5..10), and `rm`
/// (bits 16..21), with the 6 bits in between (shift/imm6, unused by anything this encoder emits)
/// and the top 11 bits (opcode, filled in by the caller's base word) left at zero.
#[bitfield(u32)]
struct RegTriple {
    #[bits(5)]
    rd: u8,
    #[bits(5)]
    rn: u8,
    #[bits(6)]
    __unused_shift: u8,
    #[bits(5)]
    rm: u8,
    #[bits(11)]
    __unused_opcode: u16,
}

/// A destination register plus a 16-bit immediate: `rd` (bits 0..5), `imm16` (bits 5..21).
#[bitfield(u32)]
struct RegImm16 {
    #[bits(5)]
    rd: u8,
    #[bits(16)]
    imm16: u16,
    #[bits(11)]
    __unused_opcode: u16,
}

/// A destination, a source register, and a 12-bit immediate: `rd` (bits 0..5), `rn` (bits
/// 5..10), `imm12` (bits 10..22).
#[bitfield(u32)]
struct RegImm12 {
    #[bits(5)]
    rd: u8,
    #[bits(5)]
    rn: u8,
    #[bits(12)]
    imm12: u16,
    #[bits(10)]
    __unused_opcode: u16,
}

/// A conditional branch: `rt` (bits 0..5), `imm19` (bits 5..24). Also used to decode/re-encode
/// an already-emitted CBZ/CBNZ word when patching, since `rt` and the opcode bits round-trip
/// unchanged through `from`/`into`.
#[bitfield(u32)]
struct CondBranch {
    #[bits(5)]
    rt: u8,
    #[bits(19)]
    imm19: u32,
    #[bits(8)]
    __unused_opcode: u8,
}

/// Appends 32-bit AArch64 instruction words to an append-only buffer, with index-based branch
/// patching for the two words the compiler can't fully resolve until it sees the matching
/// bracket.
pub struct Encoder {
    buffer: Vec<u32>,
}

impl Encoder {
    /// Creates an encoder with capacity reserved for roughly 16 instructions per source byte —
    /// 4 instructions per Brainfuck character in the worst case, plus headroom for setup and
    /// teardown. Growth beyond this is allowed but should be rare.
    pub fn new(source_len: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(16 * source_len),
        }
    }

    /// The instructions emitted so far, in buffer order.
    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// The current program counter: the number of instructions emitted so far.
    pub fn pc(&self) -> usize {
        self.buffer.len()
    }

    fn write(&mut self, instruction: u32) -> usize {
        let index = self.buffer.len();
        self.buffer.push(instruction);
        index
    }

    /// `MOVZ Xd, #0`.
    pub fn mov_zero(&mut self, dst: Register) {
        let fields = RegImm16::new().with_rd(dst.encode() as u8);
        self.write(MOVZ_BASE | u32::from(fields));
    }

    /// `ORR Xd, XZR, Xsrc` — a register-to-register move.
    pub fn mov_reg(&mut self, dst: Register, src: Register) {
        let fields = RegTriple::new()
            .with_rd(dst.encode() as u8)
            .with_rm(src.encode() as u8);
        self.write(ORR_MOVE_BASE | u32::from(fields));
    }

    /// `MOVZ Xd, #imm16`. The 16-bit immediate naturally represents a signed 8-bit cell delta as
    /// its unsigned bit pattern, so callers pass that bit pattern directly.
    pub fn mov_imm(&mut self, dst: Register, imm16: u16) {
        let fields = RegImm16::new().with_rd(dst.encode() as u8).with_imm16(imm16);
        self.write(MOVZ_BASE | u32::from(fields));
    }

    /// `MOVN Xd, #0`, i.e. `Xd = -1`. Not part of the public mnemonic set; used only by
    /// [`Encoder::prelude`] to materialize `constNegOne`.
    fn mov_not_zero(&mut self, dst: Register) {
        let fields = RegImm16::new().with_rd(dst.encode() as u8);
        self.write(MOVN_BASE | u32::from(fields));
    }

    /// `LDRB Wt, [Xbase, Xindex]`.
    pub fn ldrb(&mut self, dst: Register, base: Register, index: Register) {
        let fields = RegTriple::new()
            .with_rd(dst.encode() as u8)
            .with_rn(base.encode() as u8)
            .with_rm(index.encode() as u8);
        self.write(LDRB_BASE | u32::from(fields));
    }

    /// `STRB Wsrc, [Xbase, Xindex]`.
    pub fn strb(&mut self, src: Register, base: Register, index: Register) {
        let fields = RegTriple::new()
            .with_rd(src.encode() as u8)
            .with_rn(base.encode() as u8)
            .with_rm(index.encode() as u8);
        self.write(STRB_BASE | u32::from(fields));
    }

    /// `ADD Xd, Xleft, Xright`.
    pub fn add(&mut self, dst: Register, left: Register, right: Register) {
        let fields = RegTriple::new()
            .with_rd(dst.encode() as u8)
            .with_rn(left.encode() as u8)
            .with_rm(right.encode() as u8);
        self.write(ADD_REG_BASE | u32::from(fields));
    }

    /// `ADD Xd, Xsrc, #imm12`. Panics if `imm12` exceeds [`ADD_SUB_IMM_LIMIT`]: that can only
    /// happen if the compiler fails to chunk a pointer delta, which is an internal bug, not a
    /// malformed-program condition.
    pub fn add_imm(&mut self, dst: Register, src: Register, imm12: u16) {
        assert!(
            imm12 <= ADD_SUB_IMM_LIMIT,
            "add immediate {imm12} exceeds ADD_SUB_IMM_LIMIT"
        );
        let fields = RegImm12::new()
            .with_rd(dst.encode() as u8)
            .with_rn(src.encode() as u8)
            .with_imm12(imm12);
        self.write(ADD_IMM_BASE | u32::from(fields));
    }

    /// `SUB Xd, Xsrc, #imm12`. See [`Encoder::add_imm`] for the precondition.
    pub fn sub_imm(&mut self, dst: Register, src: Register, imm12: u16) {
        assert!(
            imm12 <= ADD_SUB_IMM_LIMIT,
            "sub immediate {imm12} exceeds ADD_SUB_IMM_LIMIT"
        );
        let fields = RegImm12::new()
            .with_rd(dst.encode() as u8)
            .with_rn(src.encode() as u8)
            .with_imm12(imm12);
        self.write(SUB_IMM_BASE | u32::from(fields));
    }

    /// `LDADDB Wamt, [Xaddr]`, atomically adding `amt` to the byte at `[addr]` and discarding the
    /// prior value.
    pub fn ldaddb(&mut self, addr: Register, amt: Register) {
        let fields = RegTriple::new()
            .with_rn(addr.encode() as u8)
            .with_rm(amt.encode() as u8);
        self.write(LDADDB_BASE | u32::from(fields));
    }

    /// `CBZ Xreg, #0` with a placeholder displacement. Returns the buffer index of the emitted
    /// word, to be passed to [`Encoder::patch_branch`] once the target is known.
    pub fn cbz(&mut self, reg: Register) -> usize {
        let fields = CondBranch::new().with_rt(reg.encode() as u8);
        self.write(CBZ_BASE | u32::from(fields))
    }

    /// `CBNZ Xreg, #0` with a placeholder displacement. See [`Encoder::cbz`].
    pub fn cbnz(&mut self, reg: Register) -> usize {
        let fields = CondBranch::new().with_rt(reg.encode() as u8);
        self.write(CBNZ_BASE | u32::from(fields))
    }

    /// Rewrites the imm19 field of the CBZ/CBNZ word at `index` to `delta`, a signed
    /// instruction-count displacement (not a byte offset — AArch64's imm19 is already scaled by
    /// 4, and the compiler resolves branches against buffer indices, so no shift is needed here).
    ///
    /// Panics if `delta` doesn't fit in a signed 19-bit field: that can only happen for a
    /// Brainfuck program with an absurdly large loop body, past anything this JIT is designed to
    /// handle, so it's treated as a precondition violation rather than a recoverable error.
    pub fn patch_branch(&mut self, index: usize, delta: i32) {
        assert!(
            (MIN_BRANCH_DISPLACEMENT..=MAX_BRANCH_DISPLACEMENT).contains(&delta),
            "branch displacement {delta} does not fit in a signed imm19"
        );
        let imm19 = (delta as u32) & 0x7_FFFF;
        let patched = CondBranch::from(self.buffer[index]).with_imm19(imm19);
        self.buffer[index] = u32::from(patched);
    }

    /// `SVC #0x80`, the Darwin syscall trap.
    fn syscall(&mut self) {
        self.write(SVC_0X80);
    }

    /// Writes one byte from the current cell to fd 1 via Darwin `write` (syscall 4): `x0 = 1`,
    /// `x1 = memBase + memPtr`, `x2 = 1`, `x16 = 4`, then `svc`.
    pub fn syscall_out(&mut self) {
        use crate::register::{MEM_BASE, MEM_PTR, SYS, X0, X1, X2};
        self.mov_imm(X0, 1);
        self.add(X1, MEM_BASE, MEM_PTR);
        self.mov_imm(X2, 1);
        self.mov_imm(SYS, 4);
        self.syscall();
    }

    /// Reads one byte into the current cell via Darwin `read` (syscall 3): `x0 = 0`,
    /// `x1 = memBase + memPtr`, `x2 = 1`, `x16 = 3`, then `svc`.
    pub fn syscall_in(&mut self) {
        use crate::register::{MEM_BASE, MEM_PTR, SYS, X0, X1, X2};
        self.mov_imm(X0, 0);
        self.add(X1, MEM_BASE, MEM_PTR);
        self.mov_imm(X2, 1);
        self.mov_imm(SYS, 3);
        self.syscall();
    }

    /// Emitted once at program start: moves the incoming tape-base argument (`x0`) into
    /// `memBase`, zeroes `memPtr`, and materializes the two arithmetic constants.
    pub fn prelude(&mut self) {
        use crate::register::{CONST_NEG_ONE, CONST_ONE, MEM_BASE, MEM_PTR, X0};
        self.mov_reg(MEM_BASE, X0);
        self.mov_zero(MEM_PTR);
        self.mov_imm(CONST_ONE, 1);
        self.mov_not_zero(CONST_NEG_ONE);
    }

    /// Emitted once at program end: zeroes the exit status (`x0`) and returns to the caller.
    pub fn postlude(&mut self) {
        self.mov_zero(crate::register::X0);
        self.write(RET);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{MEM_BASE, MEM_PTR, TMP1, TMP2, X0};

    #[test]
    fn mov_zero_encodes_movz_with_zero_immediate() {
        let mut enc = Encoder::new(1);
        enc.mov_zero(TMP1);
        assert_eq!(enc.buffer(), &[0xD280_0000 | 13]);
    }

    #[test]
    fn mov_imm_sets_both_destination_and_immediate_fields() {
        let mut enc = Encoder::new(1);
        enc.mov_imm(TMP2, 5);
        assert_eq!(enc.buffer(), &[0xD280_0000 | (5 << 5) | 14]);
    }

    #[test]
    fn mov_reg_preserves_xzr_source_and_sets_dst_and_src() {
        let mut enc = Encoder::new(1);
        enc.mov_reg(MEM_BASE, X0);
        assert_eq!(enc.buffer(), &[0xAA00_03E0 | 9]);
    }

    #[test]
    fn add_imm_rejects_oversized_immediate() {
        let mut enc = Encoder::new(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            enc.add_imm(MEM_PTR, MEM_PTR, ADD_SUB_IMM_LIMIT + 1);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn ldaddb_leaves_discard_bits_from_base_untouched() {
        let mut enc = Encoder::new(1);
        enc.ldaddb(TMP1, TMP2);
        let word = enc.buffer()[0];
        assert_eq!(word & 0x1F, 0x1F, "Rt discard bits must stay 11111");
        assert_eq!((word >> 5) & 0x1F, 13);
        assert_eq!((word >> 16) & 0x1F, 14);
    }

    #[test]
    fn cbz_returns_its_own_index_and_leaves_imm19_zero() {
        let mut enc = Encoder::new(1);
        enc.mov_zero(TMP1);
        let index = enc.cbz(TMP1);
        assert_eq!(index, 1);
        assert_eq!(enc.buffer()[index] & !0x1F, 0xB400_0000);
    }

    #[test]
    fn patch_branch_round_trips_forward_and_backward_displacement() {
        let mut enc = Encoder::new(1);
        enc.ldrb(TMP1, MEM_BASE, MEM_PTR);
        let start = enc.cbz(TMP1);
        enc.ldrb(TMP1, MEM_BASE, MEM_PTR);
        let end = enc.cbnz(TMP1);

        let delta_forward = (end as i32 - start as i32) + 1;
        let delta_backward = (start as i32 - end as i32) + 1;
        enc.patch_branch(start, delta_forward);
        enc.patch_branch(end, delta_backward);

        let decode_imm19 = |word: u32| -> i32 {
            let raw = (word >> 5) & 0x7_FFFF;
            // sign-extend 19 bits
            ((raw as i32) << 13) >> 13
        };
        assert_eq!(
            start as i32 + decode_imm19(enc.buffer()[start]),
            end as i32 + 1
        );
        assert_eq!(
            end as i32 + decode_imm19(enc.buffer()[end]),
            start as i32 + 1
        );
    }

    #[test]
    fn patch_branch_rejects_out_of_range_displacement() {
        let mut enc = Encoder::new(1);
        let index = enc.cbz(TMP1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            enc.patch_branch(index, 1 << 18);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn prelude_then_postlude_emit_six_instructions() {
        let mut enc = Encoder::new(1);
        enc.prelude();
        enc.postlude();
        assert_eq!(enc.buffer().len(), 6);
        assert_eq!(*enc.buffer().last().unwrap(), 0xD65F_03C0);
    }

    #[test]
    fn buffer_growth_heuristic_reserves_sixteen_words_per_byte() {
        let enc = Encoder::new(10);
        assert!(enc.buffer().capacity() >= 160);
    }
}
