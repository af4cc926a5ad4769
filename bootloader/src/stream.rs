// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read, write and hash operations over flash ranges of any length, moved
//! through the fixed size scratch buffer one chunk at a time.

use crate::error::{self, Error, FlashError};
use crate::{Bootloader, Platform, Transport};
use consts::{PAYLOAD_MAX, SCRATCH_SIZE};
use cpx_protocol::{FlashRange, Opcode, Routing, MD5_REPLY_LEN};
use embedded_storage::nor_flash::NorFlash;
use md5::{Digest, Md5};

/// Value of an erased flash byte.
const ERASED: u8 = 0xFF;

/// Progress of a write: `scratch[..pending]` holds staged bytes destined for
/// `address`, always fewer than one program unit between packets.
struct WriteCursor {
    address: u32,
    pending: usize,
}

impl<F, T, P> Bootloader<F, T, P>
where
    F: NorFlash,
    T: Transport,
    P: Platform,
{
    /// Stream `range` to the requester, one packet per chunk, in address
    /// order. Chunks carry raw flash data with no opcode prefix.
    pub(crate) fn read(&mut self, request: Routing, range: FlashRange) -> Result<(), Error> {
        let capacity = self.transport.payload_capacity().clamp(1, PAYLOAD_MAX);
        let mut cursor = range.start;
        let mut remaining = range.size as usize;

        debug!("Reading {} bytes at {:#x}", remaining, cursor);
        self.tx.routing = request.reply(self.config.identity);
        while remaining > 0 {
            let chunk = remaining.min(capacity);
            self.flash
                .read(cursor, &mut self.scratch[..chunk])
                .map_err(error::flash)?;
            self.tx.set_payload(&self.scratch[..chunk])?;
            // Blocks until sent, which paces the flash reads to the link.
            self.transport.send(&self.tx)?;

            cursor = cursor.wrapping_add(chunk as u32);
            remaining -= chunk;
            trace!("Size left = {}, cursor = {:#x}", remaining, cursor);
        }
        debug!("Read completed");
        Ok(())
    }

    /// Erase the sectors covering `range`, then fill the range with the
    /// payloads of the following bootloader packets. Sends no reply.
    ///
    /// Erasing works on whole sectors, so the rest of the first and last
    /// sector touched is erased too. Data is programmed in units of
    /// `F::WRITE_SIZE`; bytes of a unit outside the range are written as
    /// `0xFF` and keep their erased value.
    ///
    /// A packet longer than what is left of the range is truncated to fit;
    /// the excess is dropped and the write ends there.
    ///
    /// After a flash error the remaining declared bytes are still received
    /// and dropped, so no image data is ever handled as a command. The error
    /// is returned once the range is fully consumed.
    pub(crate) fn write(&mut self, range: FlashRange) -> Result<(), Error> {
        let mut remaining = range.size as usize;
        if remaining == 0 {
            return Ok(());
        }

        let mut failure = self.erase_sectors(range).err();

        let lead = range.start as usize % F::WRITE_SIZE;
        let mut at = WriteCursor {
            address: range.start - lead as u32,
            pending: lead,
        };
        if F::WRITE_SIZE > SCRATCH_SIZE {
            failure = failure.or(Some(Error::Flash(FlashError::NotAligned)));
        } else {
            self.scratch[..lead].fill(ERASED);
        }

        info!("Start update of {} bytes at {:#x}", remaining, range.start);
        while remaining > 0 {
            self.transport.receive(&mut self.rx)?;
            if !self.rx.routing.is_bootloader() {
                warn!(
                    "Dropping {:?} packet received while writing",
                    self.rx.routing.function
                );
                continue;
            }

            let received = self.rx.payload.len();
            let len = received.min(remaining);
            if len < received {
                warn!(
                    "Chunk of {} bytes overruns the write by {}, truncating",
                    received,
                    received - len
                );
            }
            remaining -= len;
            trace!("Size left = {}", remaining);

            if failure.is_some() {
                continue;
            }
            let mut staged = self.stage(&mut at, len);
            if staged.is_ok() && remaining == 0 {
                staged = self.finish(&mut at);
            }
            if let Err(err) = staged {
                warn!("Write failed at {:#x}, dropping the rest: {:?}", at.address, err);
                failure = Some(err);
            }
        }

        match failure {
            Some(err) => Err(err),
            None => {
                info!("Write completed");
                Ok(())
            }
        }
    }

    /// Erase every sector overlapping `range`.
    fn erase_sectors(&mut self, range: FlashRange) -> Result<(), Error> {
        let sector = F::ERASE_SIZE as u64;
        let end = u64::from(range.start) + u64::from(range.size);
        let from = u64::from(range.start) / sector * sector;
        let to = end.div_ceil(sector) * sector;
        let to = u32::try_from(to).map_err(|_| Error::Flash(FlashError::OutOfBounds))?;

        info!("Erasing flash from {:#x} to {:#x}", from, to);
        self.flash
            .erase(from as u32, to)
            .map_err(error::flash)
    }

    /// Append the first `len` bytes of the inbound payload to the staged
    /// data, programming every complete unit.
    fn stage(&mut self, at: &mut WriteCursor, len: usize) -> Result<(), Error> {
        let mut consumed = 0;
        while consumed < len {
            let take = (len - consumed).min(SCRATCH_SIZE - at.pending);
            self.scratch[at.pending..at.pending + take]
                .copy_from_slice(&self.rx.payload[consumed..consumed + take]);
            at.pending += take;
            consumed += take;

            let ready = at.pending - at.pending % F::WRITE_SIZE;
            if ready > 0 {
                self.flash
                    .write(at.address, &self.scratch[..ready])
                    .map_err(error::flash)?;
                self.scratch.copy_within(ready..at.pending, 0);
                at.address = at.address.wrapping_add(ready as u32);
                at.pending -= ready;
            }
        }
        Ok(())
    }

    /// Pad the last partial unit with erased bytes and program it.
    fn finish(&mut self, at: &mut WriteCursor) -> Result<(), Error> {
        if at.pending == 0 {
            return Ok(());
        }
        self.scratch[at.pending..F::WRITE_SIZE].fill(ERASED);
        self.flash
            .write(at.address, &self.scratch[..F::WRITE_SIZE])
            .map_err(error::flash)?;
        at.address = at.address.wrapping_add(F::WRITE_SIZE as u32);
        at.pending = 0;
        Ok(())
    }

    /// Hash `range` and reply with the opcode followed by the digest.
    pub(crate) fn md5(&mut self, request: Routing, range: FlashRange) -> Result<(), Error> {
        let digest = self.digest(range)?;

        let mut reply = [0u8; MD5_REPLY_LEN];
        reply[0] = Opcode::Md5 as u8;
        reply[1..].copy_from_slice(&digest);
        self.reply(request, &reply)
    }

    /// MD5 of the `range.size` bytes of flash at `range.start`.
    pub fn digest(&mut self, range: FlashRange) -> Result<[u8; 16], Error> {
        let chunk_size = self.config.md5_chunk();
        let mut cursor = range.start;
        let mut remaining = range.size as usize;

        let mut hasher = Md5::new();
        while remaining > 0 {
            let chunk = remaining.min(chunk_size);
            self.flash
                .read(cursor, &mut self.scratch[..chunk])
                .map_err(error::flash)?;
            hasher.update(&self.scratch[..chunk]);

            cursor = cursor.wrapping_add(chunk as u32);
            remaining -= chunk;
        }
        Ok(hasher.finalize().into())
    }
}
