// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Memory map and sizing constants shared by the GAP8 second stage bootloader
//! and the host side flashing tool.

#![no_std]

/// Version reported by the bootloader in reply to a version request.
pub const BOOTLOADER_VERSION: u8 = 1;

/// Flash offset of the application partition.
/// The firmware image header is stored at the very start of this partition and
/// every segment offset in that header is relative to it.
pub const FIRMWARE_START_ADDRESS: u32 = 0x40000;

/// Largest packet the link layer carries, routing header included.
pub const MTU: usize = 1022;

/// Size of the routing header (targets byte + function byte).
pub const ROUTING_HEADER_SIZE: usize = 2;

/// Largest payload a single transport packet can carry.
pub const PAYLOAD_MAX: usize = MTU - ROUTING_HEADER_SIZE;

/// Default number of flash bytes fed to the digest per step.
pub const MD5_CHUNK_SIZE: usize = 512;

/// Size of the flash scratch buffer.
/// Every chunked flash operation stages its data through this buffer, so it
/// must hold at least a full transport payload.
pub const SCRATCH_SIZE: usize = 1024;

const _: () = assert!(SCRATCH_SIZE >= PAYLOAD_MAX);
const _: () = assert!(SCRATCH_SIZE >= MD5_CHUNK_SIZE);

/// Start of the L2 memory window.
/// L2 is reachable by the flash controller, so segments targeting it are
/// transferred straight from flash without going through the scratch buffer.
pub const L2_START: u32 = 0x1C00_0000;

/// End (exclusive) of the L2 memory window.
pub const L2_END: u32 = 0x1D00_0000;

/// Start of the L1 (fabric controller tightly-coupled) memory window.
pub const L1_START: u32 = 0x1B00_0000;

/// End (exclusive) of the L1 memory window.
pub const L1_END: u32 = 0x1C00_0000;

/// Address of the live interrupt vector table.
pub const VECTOR_TABLE_ADDRESS: u32 = 0x1C00_0000;

/// Size of the interrupt vector table.
pub const VECTOR_TABLE_SIZE: usize = 0x100;

/// First L1 address used by the resident bootloader.
/// Application segments must end below this address or they overwrite the
/// bootloader while it is still copying.
pub const BOOTLOADER_L1_START: u32 = 0x1B00_2000;

/// First L2 address used by the resident bootloader.
pub const BOOTLOADER_L2_START: u32 = 0x1C06_0000;

/// Maximum number of segments described by a firmware image header.
pub const MAX_SEGMENTS: usize = 16;

/// Size of one segment descriptor (offset, base, size, block count).
pub const SEGMENT_DESCRIPTOR_SIZE: usize = 16;

/// Size of the image header on flash. The segment table is always
/// [`MAX_SEGMENTS`] entries long, whatever the actual segment count.
pub const IMAGE_HEADER_SIZE: usize = 16 + MAX_SEGMENTS * SEGMENT_DESCRIPTOR_SIZE;

/// Address of the deck when it runs as a Wi-Fi access point.
pub const DEFAULT_DECK_IP: &str = "192.168.4.1";

/// TCP port of the deck's packet bridge.
pub const DEFAULT_DECK_PORT: u16 = 5000;

/// Chunk size used by the host when streaming an image to the bootloader.
pub const HOST_WRITE_CHUNK: usize = 512;
