//! JIT memory management and entry trampoline
//!
//! Installs a compiled instruction stream into executable memory and calls into it, following
//! Darwin's W^X protocol for `MAP_JIT` pages: allocate RW, flip the calling thread's write
//! protection off, copy the code in, flip write protection back on, make the mapping executable,
//! flush the instruction cache, then call. Every one of those steps has to happen on the thread
//! that eventually runs the code, since `pthread_jit_write_protect_np` is a per-thread toggle.

use crate::error::Error;

unsafe extern "C" {
    fn pthread_jit_write_protect_np(enabled: libc::c_int);
    fn sys_icache_invalidate(start: *mut libc::c_void, size: usize);
}

/// A compiled Brainfuck program, installed into an executable `MAP_JIT` mapping.
///
/// The mapping is sized up to a whole number of pages and unmapped on drop.
pub struct Jit {
    ptr: *mut libc::c_void,
    len: usize,
}

impl Jit {
    /// Installs `code` into a fresh executable mapping.
    ///
    /// Returns [`Error::Resource`] if the mapping cannot be allocated — the one way this crate's
    /// JIT path can fail that isn't a malformed source program.
    pub fn install(code: &[u32]) -> Result<Self, Error> {
        let code_bytes = std::mem::size_of_val(code);
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        let len = (code_bytes + page_size - 1) & !(page_size - 1);

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_JIT,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Error::Resource);
        }

        unsafe {
            pthread_jit_write_protect_np(0);
            std::ptr::copy_nonoverlapping(code.as_ptr().cast::<u8>(), ptr.cast::<u8>(), code_bytes);
            pthread_jit_write_protect_np(1);

            if libc::mprotect(ptr, len, libc::PROT_READ | libc::PROT_EXEC) != 0 {
                libc::munmap(ptr, len);
                return Err(Error::Resource);
            }

            sys_icache_invalidate(ptr, len);
        }

        Ok(Self { ptr, len })
    }

    /// Calls into the installed code with `tape` as the sole argument (loaded into `x0` by the
    /// AAPCS64 calling convention), returning whatever the compiled program leaves in `x0`.
    ///
    /// # Safety
    ///
    /// The caller must ensure `tape` points to at least [`crate::tape::TAPE_SIZE`] writable bytes
    /// for the lifetime of the call: the JIT'd program indexes into it with no bounds checking of
    /// its own.
    pub unsafe fn call(&self, tape: *mut u8) -> i32 {
        let entry: extern "C" fn(*mut u8) -> i32 = unsafe { std::mem::transmute(self.ptr) };
        entry(tape)
    }
}

impl Drop for Jit {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}
