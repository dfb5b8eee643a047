//! x86_64 context switching implementation
//!
//! Uses inline assembly for the switch. Stable in Rust 1.88+.

use std::arch::naked_asm;

/// Callee-saved register set per System V AMD64 ABI
///
/// Field order is load-bearing: the assembly below addresses fields by
/// fixed byte offsets.
#[repr(C)]
#[derive(Default)]
pub struct SavedRegs {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

/// Initialize a new task's context
///
/// Sets up the register state so that the first switch into it begins
/// execution at the trampoline, which calls `entry_fn(entry_arg)`.
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
    // 16-byte aligned at trampoline entry; the trampoline's `call`
    // pushes the return address, giving the entry function the
    // rsp % 16 == 8 alignment the ABI expects.
    let aligned_sp = (stack_top as usize) & !0xF;

    let regs = &mut *regs;
    regs.rsp = aligned_sp as u64;
    regs.rip = task_entry_trampoline as usize as u64;
    regs.rbx = 0;
    regs.rbp = 0;
    regs.r12 = entry_fn as u64;  // Entry function
    regs.r13 = entry_arg as u64; // Entry argument
    regs.r14 = 0;
    regs.r15 = 0;
}

/// Trampoline that calls the entry function with its argument
///
/// The entry function diverges (it switches back to the scheduler when
/// the task is done), so control never reaches the trap instruction.
#[unsafe(naked)]
pub unsafe extern "C" fn task_entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "ud2",
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
        // Save callee-saved registers to old_regs (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load callee-saved registers from new_regs (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        // Jump to new RIP
        "jmp rax",
        // Return point for the saved context
        "1:",
        "ret",
    );
}
