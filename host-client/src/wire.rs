// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Packet framing spoken by the ESP32 Wi-Fi bridge.
//!
//! ```text
//! | length: u16 LE | targets | function | payload ... |
//! ```
//!
//! `length` counts the two routing bytes plus the payload. The targets byte
//! packs the source in bits 3..6, the destination in bits 0..3 and the
//! last-packet flag in bit 6.

use crate::error::{ClientError, Result};
use consts::MTU;
use cpx_protocol::{Function, Routing, Target, ROUTING_HEADER_SIZE};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_SIZE: usize = 4;
pub const LAST_PACKET: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiPacket {
    pub routing: Routing,
    pub last: bool,
    pub payload: Vec<u8>,
}

impl WifiPacket {
    /// Host to GAP8 packet on the bootloader channel.
    pub fn to_bootloader(payload: Vec<u8>) -> Self {
        Self {
            routing: Routing::new(Target::Gap8, Target::Host, Function::Bootloader),
            last: false,
            payload,
        }
    }

    pub fn header(&self) -> Result<[u8; HEADER_SIZE]> {
        let wire_len = self.payload.len() + ROUTING_HEADER_SIZE;
        if wire_len > MTU {
            return Err(ClientError::Oversized(wire_len));
        }

        let source = u8::from(self.routing.source) & 0x07;
        let destination = u8::from(self.routing.destination) & 0x07;
        let mut targets = (source << 3) | destination;
        if self.last {
            targets |= LAST_PACKET;
        }

        let len = (wire_len as u16).to_le_bytes();
        Ok([len[0], len[1], targets, u8::from(self.routing.function)])
    }

    /// Split a header into the wire length and an empty packet.
    pub fn parse_header(header: [u8; HEADER_SIZE]) -> (usize, Self) {
        let len = u16::from_le_bytes([header[0], header[1]]) as usize;
        let targets = header[2];
        let packet = Self {
            routing: Routing::new(
                Target::from(targets & 0x07),
                Target::from((targets >> 3) & 0x07),
                Function::from(header[3]),
            ),
            last: targets & LAST_PACKET != 0,
            payload: Vec::new(),
        };
        (len, packet)
    }
}

pub struct WifiLink<S> {
    stream: S,
}

impl<S> WifiLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, packet: &WifiPacket) -> Result<()> {
        let header = packet.header()?;
        trace!("tx {:?} {} bytes", packet.routing, packet.payload.len());
        self.stream.write_all(&header).await?;
        self.stream.write_all(&packet.payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn receive(&mut self) -> Result<WifiPacket> {
        let mut header = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut header).await?;
        let (len, mut packet) = WifiPacket::parse_header(header);
        if len < ROUTING_HEADER_SIZE {
            return Err(ClientError::Protocol(cpx_protocol::Error::Truncated));
        }

        packet.payload = vec![0; len - ROUTING_HEADER_SIZE];
        self.stream.read_exact(&mut packet.payload).await?;
        trace!("rx {:?} {} bytes", packet.routing, packet.payload.len());
        Ok(packet)
    }
}
