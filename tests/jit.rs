//! End-to-end tests that actually install and execute compiled code.
//!
//! These only run on the platform this JIT targets: `MAP_JIT` and
//! `pthread_jit_write_protect_np` are Darwin/AArch64-specific, so there is nothing meaningful to
//! execute on any other target. `tests/compiler.rs` covers the encoding side on every platform.

#![cfg(all(target_arch = "aarch64", target_vendor = "apple"))]

use zero::compiler::compile;
use zero::jit::Jit;
use zero::tape::Tape;

fn run(source: &[u8]) -> i32 {
    let code = compile(source).expect("source should compile");
    let jit = Jit::install(&code).expect("jit region should install");
    let mut tape = Tape::new();
    unsafe { jit.call(tape.as_mut_ptr()) }
}

#[test]
fn empty_program_exits_zero() {
    assert_eq!(run(b""), 0);
}

#[test]
fn plain_arithmetic_exits_zero() {
    assert_eq!(run(b"+++++-----"), 0);
}

#[test]
fn balanced_loop_terminates_and_exits_zero() {
    // Clears a cell set to 5 via a counted loop, rather than the `[-]` peephole, exercising the
    // general cbz/cbnz branch path end to end.
    assert_eq!(run(b"+++++[-]"), 0);
}

#[test]
fn cell_clear_peephole_terminates_and_exits_zero() {
    assert_eq!(run(b"+++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++[-]"), 0);
}

#[test]
fn pointer_walks_past_a_single_add_sub_chunk() {
    // 5000 > characters exceeds ADD_SUB_IMM_LIMIT (4095), forcing flushPointer to chunk.
    let mut source = vec![b'>'; 5000];
    source.push(b'<');
    assert_eq!(run(&source), 0);
}

#[test]
fn echo_program_copies_one_byte_without_crashing() {
    // Can't easily capture the written byte without redirecting fd 1 in-process, but running it
    // to completion exercises the read/write syscall encodings end to end.
    assert_eq!(run(b",."), 0);
}
