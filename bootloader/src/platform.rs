// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

/// Core and memory operations needed to hand control to the application.
pub trait Platform {
    /// Destination memory for `len` bytes at address `base`.
    ///
    /// On hardware this is the raw memory at `base`; the image header is
    /// trusted to name addresses that the bootloader itself does not occupy.
    fn memory(&mut self, base: u32, len: usize) -> &mut [u8];

    /// Mask all interrupts globally.
    fn disable_interrupts(&mut self);

    /// Stop the periodic system timer interrupt.
    fn disable_system_timer(&mut self);

    /// Make freshly written code visible to instruction fetch.
    fn flush_icache(&mut self);

    /// Transfer control to `entry`.
    ///
    /// # Safety
    ///
    /// `entry` must point to valid code loaded in memory. Nothing of the
    /// bootloader survives the call.
    unsafe fn jump(&mut self, entry: u32) -> !;
}
