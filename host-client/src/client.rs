// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{ClientError, Result};
use crate::wire::{WifiLink, WifiPacket};
use consts::{FIRMWARE_START_ADDRESS, HOST_WRITE_CHUNK};
use cpx_protocol::{Command, FlashRange, Opcode, MD5_REPLY_LEN, VERSION_REPLY_LEN};
use log::{debug, info, warn};
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncWrite};

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Requests to the GAP8 bootloader over the Wi-Fi bridge.
pub struct Gap8Bootloader<S> {
    link: WifiLink<S>,
}

impl<S> Gap8Bootloader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            link: WifiLink::new(stream),
        }
    }

    async fn request(&mut self, command: Command) -> Result<()> {
        let mut buf = [0u8; 1 + FlashRange::SIZE];
        let len = command.encode(&mut buf)?;
        self.link
            .send(&WifiPacket::to_bootloader(buf[..len].to_vec()))
            .await
    }

    /// Next packet on the bootloader channel. Anything else the deck sends in
    /// between (console output, etc.) is logged and skipped.
    async fn reply(&mut self) -> Result<WifiPacket> {
        loop {
            let packet = self.link.receive().await?;
            if packet.routing.is_bootloader() {
                return Ok(packet);
            }
            debug!(
                "Skipping {:?} packet: {:02x?}",
                packet.routing.function, packet.payload
            );
        }
    }

    pub async fn version(&mut self) -> Result<u8> {
        self.request(Command::Version).await?;
        let reply = self.reply().await?;
        if reply.payload.len() != VERSION_REPLY_LEN || reply.payload[0] != Opcode::Version as u8 {
            return Err(ClientError::UnexpectedReply {
                request: Opcode::Version,
                reply: reply.payload,
            });
        }
        Ok(reply.payload[1])
    }

    pub async fn read(&mut self, range: FlashRange) -> Result<Vec<u8>> {
        self.request(Command::Read(range)).await?;

        let size = range.size as usize;
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let chunk = self.reply().await?;
            debug!("Read {} bytes, {} left", chunk.payload.len(), size - data.len());
            data.extend_from_slice(&chunk.payload);
        }
        data.truncate(size);
        Ok(data)
    }

    pub async fn md5(&mut self, range: FlashRange) -> Result<[u8; 16]> {
        self.request(Command::Md5(range)).await?;
        let reply = self.reply().await?;
        if reply.payload.len() != MD5_REPLY_LEN || reply.payload[0] != Opcode::Md5 as u8 {
            return Err(ClientError::UnexpectedReply {
                request: Opcode::Md5,
                reply: reply.payload,
            });
        }

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&reply.payload[1..]);
        Ok(digest)
    }

    /// Erase and program `data` at `start`. The bootloader does not
    /// acknowledge writes; verify with [`Self::md5`].
    pub async fn write(&mut self, start: u32, data: &[u8]) -> Result<()> {
        let size = u32::try_from(data.len()).map_err(|_| ClientError::ImageTooLarge(data.len()))?;
        self.request(Command::Write(FlashRange::new(start, size)))
            .await?;

        let mut written = 0;
        for chunk in data.chunks(HOST_WRITE_CHUNK) {
            debug!("At {}, next chunk is {} bytes", written, chunk.len());
            self.link
                .send(&WifiPacket::to_bootloader(chunk.to_vec()))
                .await?;
            written += chunk.len();
        }
        Ok(())
    }

    pub async fn jump(&mut self) -> Result<()> {
        self.request(Command::Jump).await
    }

    /// Install `image` in the firmware partition and start it once the
    /// device side digest matches.
    pub async fn flash(&mut self, image: &[u8]) -> Result<()> {
        let version = self.version().await?;
        info!("GAP8 bootloader is version {:#04x}", version);

        let local: [u8; 16] = Md5::digest(image).into();
        info!("Firmware is {} bytes, MD5 {}", image.len(), hex(&local));

        self.write(FIRMWARE_START_ADDRESS, image).await?;
        let size = u32::try_from(image.len()).map_err(|_| ClientError::ImageTooLarge(image.len()))?;
        let device = self
            .md5(FlashRange::new(FIRMWARE_START_ADDRESS, size))
            .await?;

        if device != local {
            warn!("Flash failed, firmware MD5 does not match");
            return Err(ClientError::DigestMismatch {
                local: hex(&local),
                device: hex(&device),
            });
        }

        info!("Flash OK, firmware MD5 matches. Starting application");
        self.jump().await
    }
}
