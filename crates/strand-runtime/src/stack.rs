//! Task stack allocation using mmap
//!
//! Each task gets a private stack mapped with a PROT_NONE guard page
//! below it, so overflow faults instead of corrupting a neighbour.

use strand_core::{EngineError, EngineResult};

/// Guard page size (one page on every supported platform)
pub const GUARD_SIZE: usize = 4096;

/// An mmap-backed task stack with a guard page at the low end
pub struct Stack {
    base: *mut u8,
    total: usize,
}

impl Stack {
    /// Map a stack of `size` usable bytes plus the guard page.
    pub fn allocate(size: usize) -> EngineResult<Self> {
        let total = size + GUARD_SIZE;

        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                total,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(EngineError::StackExhausted);
        }

        // Everything above the guard page becomes readable/writable
        let usable = unsafe { (base as *mut u8).add(GUARD_SIZE) };
        let ret = unsafe {
            libc::mprotect(
                usable as *mut libc::c_void,
                size,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if ret != 0 {
            unsafe {
                libc::munmap(base, total);
            }
            return Err(EngineError::StackExhausted);
        }

        Ok(Self {
            base: base as *mut u8,
            total,
        })
    }

    /// Highest address of the stack (stacks grow down)
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.total) }
    }

    /// Usable bytes, excluding the guard page
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.total - GUARD_SIZE
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_write() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        assert_eq!(stack.usable_size(), 64 * 1024);

        // The byte just below the top must be writable
        unsafe {
            let p = stack.top().sub(8);
            p.write(0xAB);
            assert_eq!(p.read(), 0xAB);
        }
    }

    #[test]
    fn test_top_is_aligned_region_end() {
        let stack = Stack::allocate(16 * 1024).unwrap();
        // mmap returns page-aligned regions, so the top is page-aligned too
        assert_eq!(stack.top() as usize % 4096, 0);
    }
}
