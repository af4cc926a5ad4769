// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::*;

#[test]
fn version_replies_to_requester() {
    let mut bl = bootloader(MockFlash::new());
    bl.transport.inbound.push_back(request(&[0]));
    bl.poll().unwrap();

    assert_eq!(bl.transport.sent.len(), 1);
    let reply = &bl.transport.sent[0];
    assert_eq!(reply.routing, reply_routing());
    assert_eq!(&reply.payload[..], &[0, consts::BOOTLOADER_VERSION]);
}

#[test]
fn version_ignores_extra_payload() {
    let mut bl = bootloader(MockFlash::new());
    bl.transport.inbound.push_back(request(&[0, 0xAA, 0xBB, 0xCC]));
    bl.poll().unwrap();

    assert_eq!(&bl.transport.sent[0].payload[..], &[0, 1]);
}

#[test]
fn reply_goes_back_to_source() {
    let mut bl = bootloader(MockFlash::new());
    let mut packet = request(&[0]);
    packet.routing.source = Target::Esp32;
    bl.transport.inbound.push_back(packet);
    bl.poll().unwrap();

    let routing = bl.transport.sent[0].routing;
    assert_eq!(routing.destination, Target::Esp32);
    assert_eq!(routing.source, Target::Gap8);
    assert_eq!(routing.function, Function::Bootloader);
}

#[test]
fn reply_uses_configured_identity() {
    let config = Config {
        identity: Target::Unknown(9),
        ..Config::default()
    };
    let mut bl = Bootloader::new(MockFlash::new(), MockTransport::new(), MockPlatform::new(), config);
    bl.transport.inbound.push_back(request(&[0]));
    bl.poll().unwrap();

    assert_eq!(bl.transport.sent[0].routing.source, Target::Unknown(9));
}

#[test]
fn other_channels_are_ignored() {
    let mut bl = bootloader(MockFlash::new());
    for function in [Function::Console, Function::App, Function::Unknown(7)] {
        bl.transport.inbound.push_back(foreign(function, &[0]));
        bl.poll().unwrap();
    }
    assert!(bl.transport.sent.is_empty());
}

#[test]
fn unknown_and_reserved_opcodes_are_dropped() {
    let mut bl = bootloader(MockFlash::new());
    for opcode in [1, 5, 7, 0x42, 0xFF] {
        bl.transport.inbound.push_back(request(&[opcode, 0, 0, 0, 0, 0, 0, 0, 0]));
        bl.poll().unwrap();
    }
    assert!(bl.transport.sent.is_empty());
    assert!(bl.flash.erases.is_empty());
}

#[test]
fn empty_payload_is_rejected() {
    let mut bl = bootloader(MockFlash::new());
    bl.transport.inbound.push_back(request(&[]));
    assert_eq!(
        bl.poll(),
        Err(Error::Protocol(cpx_protocol::Error::Truncated))
    );
    assert!(bl.transport.sent.is_empty());
}

#[test]
fn short_range_arguments_are_rejected() {
    let mut bl = bootloader(MockFlash::new());
    bl.transport.inbound.push_back(request(&[3, 0x00, 0x00, 0x04]));
    assert_eq!(
        bl.poll(),
        Err(Error::Protocol(cpx_protocol::Error::Truncated))
    );
    assert!(bl.transport.sent.is_empty());
}

#[test]
fn failed_request_does_not_stop_service() {
    let mut bl = bootloader(MockFlash::new());
    bl.transport.inbound.push_back(request(&[4, 1]));
    bl.transport.inbound.push_back(request(&[0]));

    assert!(bl.poll().is_err());
    bl.poll().unwrap();
    assert_eq!(bl.transport.sent.len(), 1);
}

#[test]
fn closed_link_surfaces_as_link_error() {
    let mut bl = bootloader(MockFlash::new());
    assert_eq!(bl.poll(), Err(Error::Link(LinkError::UnexpectedEof)));
}
