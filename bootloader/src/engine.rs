// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{Config, Error, Platform, Transport};
use consts::{BOOTLOADER_VERSION, SCRATCH_SIZE};
use cpx_protocol::{Command, Opcode, Packet, Routing};
use embedded_storage::nor_flash::NorFlash;

/// Bootloader state: the hardware seams plus every buffer a request needs.
///
/// All buffers live here and are reused across requests. Handlers take
/// `&mut self`, so only one request can ever be in flight.
pub struct Bootloader<F, T, P> {
    pub(crate) flash: F,
    pub(crate) transport: T,
    pub(crate) platform: P,
    pub(crate) config: Config,
    /// Outbound packet
    pub(crate) tx: Packet,
    /// Inbound packet
    pub(crate) rx: Packet,
    /// Flash side staging buffer, never aliased with the packet buffers
    pub(crate) scratch: [u8; SCRATCH_SIZE],
}

impl<F, T, P> Bootloader<F, T, P>
where
    F: NorFlash,
    T: Transport,
    P: Platform,
{
    pub fn new(flash: F, transport: T, platform: P, config: Config) -> Self {
        Self {
            flash,
            transport,
            platform,
            config,
            tx: Packet::default(),
            rx: Packet::default(),
            scratch: [0; SCRATCH_SIZE],
        }
    }

    pub fn into_parts(self) -> (F, T, P) {
        (self.flash, self.transport, self.platform)
    }

    /// Serve requests forever. Only a successful jump leaves this loop.
    pub fn run(&mut self) -> ! {
        info!("Bootloader v{} ready", BOOTLOADER_VERSION);
        loop {
            if let Err(err) = self.poll() {
                warn!("Request dropped: {:?}", err);
            }
        }
    }

    /// Wait for one packet and handle it.
    pub fn poll(&mut self) -> Result<(), Error> {
        self.transport.receive(&mut self.rx)?;
        self.handle()
    }

    /// Handle the packet currently held in the inbound buffer.
    ///
    /// Packets for other channels are ignored. Errors are returned to the
    /// caller; nothing is reported to the peer.
    pub fn handle(&mut self) -> Result<(), Error> {
        let request = self.rx.routing;
        if !request.is_bootloader() {
            debug!("Ignoring packet for {:?}", request.function);
            return Ok(());
        }

        let command = Command::decode(&self.rx.payload)?;
        info!("{:?} from {:?}", command, request.source);

        match command {
            Command::Version => self.reply(request, &[Opcode::Version as u8, BOOTLOADER_VERSION]),
            Command::Read(range) => self.read(request, range),
            Command::Write(range) => self.write(range),
            Command::Md5(range) => self.md5(request, range),
            Command::Jump => self.boot().map(|never| match never {}),
            Command::Unknown(opcode) => {
                warn!("Unhandled opcode {}", opcode);
                Ok(())
            }
        }
    }

    /// Send `payload` back to the sender of `request`.
    pub(crate) fn reply(&mut self, request: Routing, payload: &[u8]) -> Result<(), Error> {
        self.tx.routing = request.reply(self.config.identity);
        self.tx.set_payload(payload)?;
        self.transport.send(&self.tx)?;
        Ok(())
    }
}
