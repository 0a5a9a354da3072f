//! A just-in-time compiler for Brainfuck, targeting AArch64 on Apple platforms.
//!
//! [`compiler`] turns source bytes into an AArch64 instruction stream, built on the mnemonic
//! encoders in [`encoder`]. [`jit`] installs that stream into executable memory and runs it
//! against the tape owned by [`tape`]. `main` (in `src/main.rs`) is a thin CLI wrapper tying the
//! three together; see [`error`] for the failure modes it reports.

pub mod compiler;
pub mod encoder;
pub mod error;
pub mod jit;
pub mod register;
pub mod tape;
