// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::Error;
use consts::{IMAGE_HEADER_SIZE, MAX_SEGMENTS, SEGMENT_DESCRIPTOR_SIZE};

/// One entry of the image segment table.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentDescriptor {
    /// Flash offset of the segment data, relative to the firmware partition
    pub offset: u32,
    /// Destination memory address
    pub base: u32,
    pub size: u32,
    /// Written by the image tool, not used for loading
    pub block_count: u32,
}

impl SegmentDescriptor {
    /// Drop the first `len` bytes of the segment.
    pub fn advance(&mut self, len: u32) {
        let len = len.min(self.size);
        self.offset = self.offset.wrapping_add(len);
        self.base = self.base.wrapping_add(len);
        self.size -= len;
    }

    fn parse(bytes: &[u8]) -> Self {
        Self {
            offset: word(bytes, 0),
            base: word(bytes, 1),
            size: word(bytes, 2),
            block_count: word(bytes, 3),
        }
    }

    fn serialize(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.offset.to_le_bytes());
        buf[4..8].copy_from_slice(&self.base.to_le_bytes());
        buf[8..12].copy_from_slice(&self.size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.block_count.to_le_bytes());
    }
}

/// Header at the start of the firmware partition.
///
/// The segment table always has room for [`MAX_SEGMENTS`] entries; only the
/// first `segment_count` are meaningful.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// Size of the image up to the partition table
    pub total_size: u32,
    pub segment_count: u32,
    /// Address execution starts at
    pub entry: u32,
    /// Not used for loading
    pub entry_base: u32,
    pub segments: [SegmentDescriptor; MAX_SEGMENTS],
}

impl ImageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = IMAGE_HEADER_SIZE;

    /// Read the header fields. The segment count is not checked here, see
    /// [`ImageHeader::validate`].
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::Truncated);
        }

        let mut segments = [SegmentDescriptor::default(); MAX_SEGMENTS];
        for (idx, segment) in segments.iter_mut().enumerate() {
            let start = 16 + idx * SEGMENT_DESCRIPTOR_SIZE;
            *segment = SegmentDescriptor::parse(&data[start..start + SEGMENT_DESCRIPTOR_SIZE]);
        }

        Ok(Self {
            total_size: word(data, 0),
            segment_count: word(data, 1),
            entry: word(data, 2),
            entry_base: word(data, 3),
            segments,
        })
    }

    /// Check that the segment count is within `1..=16`.
    pub fn validate(&self) -> Result<(), Error> {
        match self.segment_count {
            1..=16 => Ok(()),
            count => Err(Error::InvalidSegmentCount(count)),
        }
    }

    /// The used part of the segment table.
    pub fn segments(&self) -> &[SegmentDescriptor] {
        let count = (self.segment_count as usize).min(MAX_SEGMENTS);
        &self.segments[..count]
    }

    /// Serialize the header. Exactly [`Self::SIZE`] bytes are written.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall);
        }

        buf[0..4].copy_from_slice(&self.total_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.segment_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.entry.to_le_bytes());
        buf[12..16].copy_from_slice(&self.entry_base.to_le_bytes());
        for (idx, segment) in self.segments.iter().enumerate() {
            let start = 16 + idx * SEGMENT_DESCRIPTOR_SIZE;
            segment.serialize(&mut buf[start..start + SEGMENT_DESCRIPTOR_SIZE]);
        }

        Ok(())
    }
}

/// Little-endian `u32` at word index `idx`. The caller checks the length.
fn word(data: &[u8], idx: usize) -> u32 {
    let at = idx * 4;
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
