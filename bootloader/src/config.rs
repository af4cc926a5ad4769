// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::{FIRMWARE_START_ADDRESS, MD5_CHUNK_SIZE, SCRATCH_SIZE};
use cpx_protocol::Target;

/// Runtime settings of the bootloader.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Endpoint this node answers as
    pub identity: Target,
    /// Flash offset of the firmware partition holding the image header
    pub firmware_offset: u32,
    /// Bytes fed to the digest per step, clamped to `1..=SCRATCH_SIZE`
    pub md5_chunk_size: usize,
}

impl Config {
    pub(crate) fn md5_chunk(&self) -> usize {
        self.md5_chunk_size.clamp(1, SCRATCH_SIZE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: Target::Gap8,
            firmware_offset: FIRMWARE_START_ADDRESS,
            md5_chunk_size: MD5_CHUNK_SIZE,
        }
    }
}
