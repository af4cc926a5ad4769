// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Firmware image loader.
//!
//! The image header at the start of the firmware partition lists the segments
//! to copy into memory. Once every segment is in place, interrupts are turned
//! off, the interrupt vector table is installed and control moves to the
//! image entry point.
//!
//! The vector table is the one segment that cannot be copied in order: the
//! bootloader still runs with interrupts enabled while loading, and an
//! interrupt taken through a half written table would crash it. The table
//! prefix of its segment is held aside ([`VectorTable::Deferred`]) and only
//! written once interrupts are masked.

use crate::error::{self, Error};
use crate::{Bootloader, Platform, Transport};
use consts::{L2_END, L2_START, VECTOR_TABLE_ADDRESS, VECTOR_TABLE_SIZE};
use core::convert::Infallible;
use cpx_protocol::{ImageHeader, SegmentDescriptor};
use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;

/// Memory class of a segment destination.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// L2, which flash can fill directly
    Fast,
    /// Core tightly-coupled memory, filled through the scratch buffer
    Tcm,
}

impl Region {
    pub fn classify(base: u32) -> Self {
        if (L2_START..L2_END).contains(&base) {
            Self::Fast
        } else {
            Self::Tcm
        }
    }

    pub fn strategy(self) -> CopyStrategy {
        match self {
            Self::Fast => CopyStrategy::Direct,
            Self::Tcm => CopyStrategy::Staged,
        }
    }
}

/// How segment data travels from flash to its destination.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
    /// One flash read straight into destination memory
    Direct,
    /// Scratch buffer sized reads, each copied to the advancing destination
    Staged,
}

impl CopyStrategy {
    /// Copy `segment` from flash address `from` to `segment.base`.
    fn copy<F: NorFlash, P: Platform>(
        self,
        flash: &mut F,
        platform: &mut P,
        scratch: &mut [u8],
        from: u32,
        segment: &SegmentDescriptor,
    ) -> Result<(), Error> {
        let size = segment.size as usize;
        match self {
            Self::Direct => flash
                .read(from, platform.memory(segment.base, size))
                .map_err(error::flash),
            Self::Staged => {
                let mut src = from;
                let mut dst = segment.base;
                let mut remaining = size;
                while remaining > 0 {
                    let chunk = remaining.min(scratch.len());
                    flash.read(src, &mut scratch[..chunk]).map_err(error::flash)?;
                    platform.memory(dst, chunk).copy_from_slice(&scratch[..chunk]);

                    src = src.wrapping_add(chunk as u32);
                    dst = dst.wrapping_add(chunk as u32);
                    remaining -= chunk;
                }
                Ok(())
            }
        }
    }
}

/// Progress of the interrupt vector table through a load.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorTable {
    /// No segment targets the vector table
    NotEncountered,
    /// Table contents read from flash, waiting for interrupts to be off
    Deferred(Vec<u8, VECTOR_TABLE_SIZE>),
    /// Table written to its live address
    Applied,
}

impl VectorTable {
    /// Write a deferred table to its live address.
    /// Interrupts must already be disabled.
    fn apply<P: Platform>(&mut self, platform: &mut P) {
        match core::mem::replace(self, Self::NotEncountered) {
            Self::Deferred(table) => {
                platform
                    .memory(VECTOR_TABLE_ADDRESS, table.len())
                    .copy_from_slice(&table);
                *self = Self::Applied;
            }
            other => *self = other,
        }
    }
}

/// An image copied into memory but not started yet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub entry: u32,
    pub vector_table: VectorTable,
}

impl<F, T, P> Bootloader<F, T, P>
where
    F: NorFlash,
    T: Transport,
    P: Platform,
{
    /// Read the image header and copy every segment to memory, holding back
    /// the vector table.
    ///
    /// An out of range segment count aborts before anything is copied.
    pub fn load(&mut self) -> Result<Loaded, Error> {
        let raw = &mut self.scratch[..ImageHeader::SIZE];
        self.flash
            .read(self.config.firmware_offset, raw)
            .map_err(error::flash)?;
        let header = ImageHeader::parse(raw)?;
        if let Err(err) = header.validate() {
            error!("Not loading image: {:?}", err);
            return Err(err.into());
        }
        info!(
            "Loading {} segments, entry {:#x}",
            header.segment_count, header.entry
        );

        let mut vector_table = VectorTable::NotEncountered;
        for (idx, segment) in header.segments().iter().enumerate() {
            let mut segment = *segment;

            if segment.base == VECTOR_TABLE_ADDRESS {
                let held = (segment.size as usize).min(VECTOR_TABLE_SIZE);
                let mut table = Vec::new();
                table
                    .resize(held, 0)
                    .map_err(|_| cpx_protocol::Error::BufferTooSmall)?;
                let from = self.segment_address(&segment);
                self.flash.read(from, &mut table).map_err(error::flash)?;
                debug!("Holding {} vector table bytes of segment {}", held, idx);
                vector_table = VectorTable::Deferred(table);
                segment.advance(held as u32);
            }

            if segment.size == 0 {
                continue;
            }

            let strategy = Region::classify(segment.base).strategy();
            debug!(
                "Segment {}: {} bytes from {:#x} to {:#x} ({:?})",
                idx, segment.size, segment.offset, segment.base, strategy
            );
            let from = self.segment_address(&segment);
            strategy.copy(
                &mut self.flash,
                &mut self.platform,
                &mut self.scratch,
                from,
                &segment,
            )?;
        }

        Ok(Loaded {
            entry: header.entry,
            vector_table,
        })
    }

    /// Load the image and start it. Returns only if the image could not be
    /// loaded, in which case nothing irreversible has happened yet.
    pub fn boot(&mut self) -> Result<Infallible, Error> {
        let Loaded {
            entry,
            mut vector_table,
        } = self.load()?;

        info!("Starting application at {:#x}", entry);
        self.platform.disable_interrupts();
        self.platform.disable_system_timer();
        vector_table.apply(&mut self.platform);
        self.platform.flush_icache();

        // SAFETY: the image header names `entry` and the segments it lives in
        // were just loaded. Nothing after this point runs.
        unsafe { self.platform.jump(entry) }
    }

    /// Flash address of a segment's data.
    fn segment_address(&self, segment: &SegmentDescriptor) -> u32 {
        self.config.firmware_offset.wrapping_add(segment.offset)
    }
}
