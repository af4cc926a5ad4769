// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

mod engine;
mod link;

use crate::{Bootloader, Config, Error, LinkError, Platform, Transport};
use consts::FIRMWARE_START_ADDRESS;
use cpx_protocol::{Command, Function, ImageHeader, Packet, Routing, SegmentDescriptor, Target};
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

const FLASH_SIZE: usize = 0x80000;

pub struct MockFlash {
    pub data: Vec<u8>,
    pub erases: Vec<(u32, u32)>,
    /// Programming a range containing this address fails.
    pub bad_address: Option<u32>,
}

impl MockFlash {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; FLASH_SIZE],
            erases: Vec::new(),
            bad_address: None,
        }
    }

    /// Place `bytes` at `offset` without going through erase/write.
    pub fn program(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn slice(&self, offset: u32, len: usize) -> &[u8] {
        &self.data[offset as usize..offset as usize + len]
    }
}

impl ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        bytes.copy_from_slice(self.slice(offset, bytes.len()));
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = 1;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.data[from as usize..to as usize].fill(0xFF);
        self.erases.push((from, to));
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        if let Some(bad) = self.bad_address {
            if (offset..offset + bytes.len() as u32).contains(&bad) {
                return Err(NorFlashErrorKind::Other);
            }
        }
        let start = offset as usize;
        for (slot, &value) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            if *slot != 0xFF {
                return Err(NorFlashErrorKind::Other);
            }
            *slot = value;
        }
        Ok(())
    }
}

/// Flash erased by 4 KiB sectors and programmed 8 bytes at a time.
pub struct SectorFlash(pub MockFlash);

impl SectorFlash {
    pub fn new() -> Self {
        Self(MockFlash::new())
    }
}

impl ErrorType for SectorFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for SectorFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl NorFlash for SectorFlash {
    const WRITE_SIZE: usize = 8;
    const ERASE_SIZE: usize = 0x1000;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.0.erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        self.0.write(offset, bytes)
    }
}

pub struct MockTransport {
    pub inbound: VecDeque<Packet>,
    pub sent: Vec<Packet>,
    pub capacity: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            sent: Vec::new(),
            capacity: consts::PAYLOAD_MAX,
        }
    }
}

impl Transport for MockTransport {
    fn payload_capacity(&self) -> usize {
        self.capacity
    }

    fn send(&mut self, packet: &Packet) -> Result<(), LinkError> {
        self.sent.push(packet.clone());
        Ok(())
    }

    fn receive(&mut self, packet: &mut Packet) -> Result<(), LinkError> {
        *packet = self.inbound.pop_front().ok_or(LinkError::UnexpectedEof)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Memory { base: u32, len: usize },
    DisableInterrupts,
    DisableTimer,
    FlushIcache,
}

/// Panic payload standing in for a jump that never returns.
#[derive(Debug)]
pub struct Jumped(pub u32);

pub const L2_BASE: u32 = 0x1C00_0000;
pub const L1_BASE: u32 = 0x1B00_0000;

pub struct MockPlatform {
    pub l2: Vec<u8>,
    pub l1: Vec<u8>,
    pub events: Vec<Event>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            l2: vec![0; 0x20000],
            l1: vec![0; 0x4000],
            events: Vec::new(),
        }
    }

    pub fn slice(&self, base: u32, len: usize) -> &[u8] {
        if base >= L2_BASE {
            let at = (base - L2_BASE) as usize;
            &self.l2[at..at + len]
        } else {
            let at = (base - L1_BASE) as usize;
            &self.l1[at..at + len]
        }
    }

    pub fn position(&self, event: Event) -> Option<usize> {
        self.events.iter().position(|e| *e == event)
    }
}

impl Platform for MockPlatform {
    fn memory(&mut self, base: u32, len: usize) -> &mut [u8] {
        self.events.push(Event::Memory { base, len });
        if base >= L2_BASE {
            let at = (base - L2_BASE) as usize;
            &mut self.l2[at..at + len]
        } else {
            let at = (base - L1_BASE) as usize;
            &mut self.l1[at..at + len]
        }
    }

    fn disable_interrupts(&mut self) {
        self.events.push(Event::DisableInterrupts);
    }

    fn disable_system_timer(&mut self) {
        self.events.push(Event::DisableTimer);
    }

    fn flush_icache(&mut self) {
        self.events.push(Event::FlushIcache);
    }

    unsafe fn jump(&mut self, entry: u32) -> ! {
        std::panic::panic_any(Jumped(entry))
    }
}

pub fn bootloader<F: NorFlash>(flash: F) -> Bootloader<F, MockTransport, MockPlatform> {
    Bootloader::new(flash, MockTransport::new(), MockPlatform::new(), Config::default())
}

/// Bootloader packet from the host to the GAP8.
pub fn request(payload: &[u8]) -> Packet {
    let mut packet = Packet::new(Routing::new(Target::Gap8, Target::Host, Function::Bootloader));
    packet.set_payload(payload).unwrap();
    packet
}

pub fn command(command: Command) -> Packet {
    let mut buf = [0u8; 16];
    let len = command.encode(&mut buf).unwrap();
    request(&buf[..len])
}

/// Packet on a channel other than the bootloader one.
pub fn foreign(function: Function, payload: &[u8]) -> Packet {
    let mut packet = Packet::new(Routing::new(Target::Gap8, Target::Host, function));
    packet.set_payload(payload).unwrap();
    packet
}

pub fn reply_routing() -> Routing {
    Routing::new(Target::Host, Target::Gap8, Function::Bootloader)
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

/// Write an image header plus segment data to the firmware partition.
/// Segment data is laid out right after the header, in order.
pub fn install_image(flash: &mut MockFlash, entry: u32, segments: &[(u32, &[u8])]) {
    let mut header = ImageHeader {
        total_size: 0,
        segment_count: segments.len() as u32,
        entry,
        entry_base: entry,
        segments: [SegmentDescriptor::default(); consts::MAX_SEGMENTS],
    };

    let mut offset = ImageHeader::SIZE as u32;
    for (descriptor, (base, data)) in header.segments.iter_mut().zip(segments) {
        *descriptor = SegmentDescriptor {
            offset,
            base: *base,
            size: data.len() as u32,
            block_count: 0,
        };
        flash.program(FIRMWARE_START_ADDRESS + offset, data);
        offset += data.len() as u32;
    }
    header.total_size = offset;

    let mut raw = [0u8; ImageHeader::SIZE];
    header.serialize(&mut raw).unwrap();
    flash.program(FIRMWARE_START_ADDRESS, &raw);
}

/// Run `f`, reporting a jump as `Ok(Some(entry))`.
pub fn catch_jump<R>(f: impl FnOnce() -> Result<R, Error>) -> Result<Option<u32>, Error> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map(|_| None),
        Err(payload) => Ok(Some(payload.downcast::<Jumped>().unwrap().0)),
    }
}
