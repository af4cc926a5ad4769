// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Building blocks for a [`Platform`](crate::Platform) implementation on the
//! GAP8 fabric controller.

/// Clear `mstatus.MIE`.
#[inline(always)]
pub fn disable_interrupts() {
    // SAFETY: only masks machine interrupts.
    unsafe { core::arch::asm!("csrci mstatus, 0x8", options(nomem, nostack)) }
}

/// Synchronize instruction fetch with prior stores.
///
/// Emitted as a raw word so it assembles without the Zifencei extension.
#[inline(always)]
pub fn fence_i() {
    // SAFETY: a fence has no operands.
    unsafe { core::arch::asm!(".word 0x0000100f", options(nostack)) }
}

/// Raw memory view for [`Platform::memory`](crate::Platform::memory).
///
/// # Safety
///
/// `base..base + len` must be RAM that nothing else references for the
/// lifetime of the slice.
pub unsafe fn memory<'a>(base: u32, len: usize) -> &'a mut [u8] {
    core::slice::from_raw_parts_mut(base as usize as *mut u8, len)
}

/// Jump to `entry` with a null return address.
///
/// # Safety
///
/// `entry` must be the start of valid, loaded code and interrupts must be
/// disabled. The stack of the caller is abandoned.
pub unsafe fn jump(entry: u32) -> ! {
    // Clear ra so a return from the application faults instead of landing
    // back in the bootloader.
    core::arch::asm!(
        "mv ra, zero",
        "jr {entry}",
        entry = in(reg) entry,
        options(noreturn),
    )
}
