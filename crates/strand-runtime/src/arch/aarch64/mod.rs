//! aarch64 context switching implementation
//!
//! Callee-saved set per AAPCS64: x19-x28, fp, lr, sp, and the low
//! halves of v8-v15.

use std::arch::naked_asm;

/// Callee-saved register set per AAPCS64
///
/// Field order is load-bearing: the assembly below addresses fields by
/// fixed byte offsets.
#[repr(C)]
#[derive(Default)]
pub struct SavedRegs {
    pub sp: u64,  // 0x00
    pub pc: u64,  // 0x08
    pub x19: u64, // 0x10
    pub x20: u64, // 0x18
    pub x21: u64, // 0x20
    pub x22: u64, // 0x28
    pub x23: u64, // 0x30
    pub x24: u64, // 0x38
    pub x25: u64, // 0x40
    pub x26: u64, // 0x48
    pub x27: u64, // 0x50
    pub x28: u64, // 0x58
    pub x29: u64, // 0x60 (fp)
    pub x30: u64, // 0x68 (lr)
    pub d8: u64,  // 0x70
    pub d9: u64,  // 0x78
    pub d10: u64, // 0x80
    pub d11: u64, // 0x88
    pub d12: u64, // 0x90
    pub d13: u64, // 0x98
    pub d14: u64, // 0xA0
    pub d15: u64, // 0xA8
}

/// Initialize a new task's context
///
/// # Safety
///
/// `regs` must point to valid `SavedRegs` memory and `stack_top` must be
/// the top of a mapped stack region.
pub unsafe fn init_context(
    regs: *mut SavedRegs,
    stack_top: *mut u8,
    entry_fn: usize,
    entry_arg: usize,
) {
    // sp must stay 16-byte aligned at all times on aarch64
    let aligned_sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    *regs = SavedRegs::default();
    regs.sp = aligned_sp as u64;
    regs.pc = task_entry_trampoline as usize as u64;
    regs.x19 = entry_fn as u64;  // Entry function
    regs.x20 = entry_arg as u64; // Entry argument
}

/// Trampoline that calls the entry function with its argument
///
/// The entry function diverges, so control never reaches the trap.
#[unsafe(naked)]
pub unsafe extern "C" fn task_entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #1",
    );
}

/// Perform a voluntary context switch
///
/// Saves callee-saved registers to `old_regs` and loads from `new_regs`.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(
    _old_regs: *mut SavedRegs,
    _new_regs: *const SavedRegs,
) {
    naked_asm!(
        // Save callee-saved registers to old_regs (x0)
        "mov x9, sp",
        "str x9, [x0, 0x00]",
        "adr x9, 1f",
        "str x9, [x0, 0x08]",
        "stp x19, x20, [x0, 0x10]",
        "stp x21, x22, [x0, 0x20]",
        "stp x23, x24, [x0, 0x30]",
        "stp x25, x26, [x0, 0x40]",
        "stp x27, x28, [x0, 0x50]",
        "stp x29, x30, [x0, 0x60]",
        "stp d8, d9, [x0, 0x70]",
        "stp d10, d11, [x0, 0x80]",
        "stp d12, d13, [x0, 0x90]",
        "stp d14, d15, [x0, 0xA0]",
        // Load callee-saved registers from new_regs (x1)
        "ldr x9, [x1, 0x00]",
        "mov sp, x9",
        "ldp x19, x20, [x1, 0x10]",
        "ldp x21, x22, [x1, 0x20]",
        "ldp x23, x24, [x1, 0x30]",
        "ldp x25, x26, [x1, 0x40]",
        "ldp x27, x28, [x1, 0x50]",
        "ldp x29, x30, [x1, 0x60]",
        "ldp d8, d9, [x1, 0x70]",
        "ldp d10, d11, [x1, 0x80]",
        "ldp d12, d13, [x1, 0x90]",
        "ldp d14, d15, [x1, 0xA0]",
        // Jump to new PC
        "ldr x9, [x1, 0x08]",
        "br x9",
        // Return point for the saved context
        "1:",
        "ret",
    );
}
