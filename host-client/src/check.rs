// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Offline check of a GAP8 flash image.
//!
//! The resident bootloader keeps running from L1 and L2 while it copies the
//! application, so a segment reaching into the memory it occupies overwrites
//! it mid-copy and the jump never happens. Such images have to move data into
//! the L2 heap, which the application may reuse once started.

use crate::error::Result;
use consts::{BOOTLOADER_L1_START, BOOTLOADER_L2_START, L1_END, L1_START, L2_END, L2_START};
use cpx_protocol::{ImageHeader, SegmentDescriptor};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    L1,
    L2,
}

impl Memory {
    fn of(base: u32) -> Option<Self> {
        if (L1_START..L1_END).contains(&base) {
            Some(Self::L1)
        } else if (L2_START..L2_END).contains(&base) {
            Some(Self::L2)
        } else {
            None
        }
    }

    /// First address owned by the resident bootloader.
    fn bootloader_start(self) -> u32 {
        match self {
            Self::L1 => BOOTLOADER_L1_START,
            Self::L2 => BOOTLOADER_L2_START,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub index: usize,
    pub segment: SegmentDescriptor,
    pub memory: Option<Memory>,
    pub overlaps_bootloader: bool,
}

impl fmt::Display for SegmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]\toffset={:#X}\tbase={:#X}\tsize={:#X}\tblocks={}",
            self.index,
            self.segment.offset,
            self.segment.base,
            self.segment.size,
            self.segment.block_count
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    pub file_size: usize,
    pub header: ImageHeader,
    pub segments: Vec<SegmentReport>,
    pub l1_total: u64,
    pub l2_total: u64,
}

impl ImageReport {
    /// Parse and validate the header of `image` and classify its segments.
    pub fn analyze(image: &[u8]) -> Result<Self> {
        let header = ImageHeader::parse(image)?;
        header.validate()?;

        let mut l1_total = 0;
        let mut l2_total = 0;
        let segments = header
            .segments()
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let memory = Memory::of(segment.base);
                match memory {
                    Some(Memory::L1) => l1_total += u64::from(segment.size),
                    Some(Memory::L2) => l2_total += u64::from(segment.size),
                    None => {}
                }
                let overlaps_bootloader = memory.is_some_and(|memory| {
                    u64::from(segment.base) + u64::from(segment.size)
                        >= u64::from(memory.bootloader_start())
                });
                SegmentReport {
                    index,
                    segment: *segment,
                    memory,
                    overlaps_bootloader,
                }
            })
            .collect();

        Ok(Self {
            file_size: image.len(),
            header,
            segments,
            l1_total,
            l2_total,
        })
    }

    pub fn overlapping(&self) -> impl Iterator<Item = &SegmentReport> {
        self.segments.iter().filter(|s| s.overlaps_bootloader)
    }

    pub fn is_loadable(&self) -> bool {
        self.overlapping().next().is_none()
    }
}

impl fmt::Display for ImageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Size on disk: {}", self.file_size)?;
        writeln!(f, "Size: {}", self.header.total_size)?;
        writeln!(f, "Segments: {}", self.header.segment_count)?;
        writeln!(f, "Entry point: {:#X}", self.header.entry)?;
        writeln!(f, "Entry base: {:#X}", self.header.entry_base)?;
        writeln!(f)?;
        for segment in &self.segments {
            writeln!(f, "{segment}")?;
        }
        writeln!(f)?;
        writeln!(f, "Total L1 size: {:#X} ({})", self.l1_total, self.l1_total)?;
        writeln!(f, "Total L2 size: {:#X} ({})", self.l2_total, self.l2_total)?;
        writeln!(f)?;

        if self.is_loadable() {
            write!(f, "No overlap with the bootloader")
        } else {
            writeln!(f, "Segments overlapping the bootloader:")?;
            for segment in self.overlapping() {
                writeln!(f, "{segment}")?;
            }
            Ok(())
        }
    }
}
