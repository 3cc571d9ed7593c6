//! Synthetic Ethernet frames for tests, benches and demos.

use std::net::{Ipv4Addr, Ipv6Addr};

use pnet::packet::{
    ethernet::{EtherTypes, MutableEthernetPacket},
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::MutableIpv4Packet,
    ipv6::MutableIpv6Packet,
    tcp::MutableTcpPacket,
    udp::MutableUdpPacket,
};
use rxsteer_common::constants::ETH_HLEN;

use crate::walker::VXLAN_PORT;

/// Source port used on the outer header of tunnel frames.
const TUNNEL_SRC_PORT: u16 = 49152;
/// VXLAN flags byte with the "valid VNI" bit set.
const VXLAN_FLAGS: u8 = 0x08;

#[derive(Debug, Clone, Copy)]
enum Transport {
    Udp { src: u16, dst: u16 },
    Tcp { src: u16, dst: u16 },
    Raw(u8),
}

/// Builds an Ethernet II frame carrying IPv4 (or IPv6) and one L4 header.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    transport: Transport,
    ipv6: bool,
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// A UDP datagram from `src` to `dst`.
    pub const fn udp(src: u16, dst: u16) -> Self {
        Self { transport: Transport::Udp { src, dst }, ipv6: false, payload: Vec::new() }
    }

    /// A TCP segment from `src` to `dst`.
    pub const fn tcp(src: u16, dst: u16) -> Self {
        Self { transport: Transport::Tcp { src, dst }, ipv6: false, payload: Vec::new() }
    }

    /// A frame with an arbitrary IP protocol number and no L4 header.
    pub const fn raw(protocol: u8) -> Self {
        Self { transport: Transport::Raw(protocol), ipv6: false, payload: Vec::new() }
    }

    /// Wraps `inner` (a complete Ethernet frame) in UDP to the VXLAN port.
    pub fn vxlan(inner: Vec<u8>) -> Self {
        let mut payload = Vec::with_capacity(8 + inner.len());
        payload.extend_from_slice(&[VXLAN_FLAGS, 0, 0, 0, 0, 0, 0x2a, 0]);
        payload.extend_from_slice(&inner);

        Self::udp(TUNNEL_SRC_PORT, VXLAN_PORT).payload(payload)
    }

    /// Uses an IPv6 header instead of IPv4.
    pub fn ipv6(mut self) -> Self {
        self.ipv6 = true;
        self
    }

    /// Sets the bytes after the L4 header.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Serializes the frame, starting with the Ethernet header at offset 0.
    pub fn build(&self) -> Vec<u8> {
        let (proto, l4_len) = match self.transport {
            Transport::Udp { .. } => (IpNextHeaderProtocols::Udp, 8),
            Transport::Tcp { .. } => (IpNextHeaderProtocols::Tcp, 20),
            Transport::Raw(p) => (IpNextHeaderProtocol(p), 0),
        };
        let l3_len = if self.ipv6 { 40 } else { 20 };
        let l4_total = l4_len + self.payload.len();

        let mut buf = vec![0u8; ETH_HLEN + l3_len + l4_total];
        let (eth, rest) = buf.split_at_mut(ETH_HLEN);
        let (l3, l4) = rest.split_at_mut(l3_len);

        if let Some(mut eth) = MutableEthernetPacket::new(eth) {
            eth.set_ethertype(if self.ipv6 { EtherTypes::Ipv6 } else { EtherTypes::Ipv4 });
        }

        if self.ipv6 {
            if let Some(mut ip) = MutableIpv6Packet::new(l3) {
                ip.set_version(6);
                ip.set_payload_length(l4_total as u16);
                ip.set_next_header(proto);
                ip.set_hop_limit(64);
                ip.set_source(Ipv6Addr::LOCALHOST);
                ip.set_destination(Ipv6Addr::LOCALHOST);
            }
        } else if let Some(mut ip) = MutableIpv4Packet::new(l3) {
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length((l3_len + l4_total) as u16);
            ip.set_ttl(64);
            ip.set_next_level_protocol(proto);
            ip.set_source(Ipv4Addr::new(10, 0, 0, 1));
            ip.set_destination(Ipv4Addr::new(10, 0, 0, 2));
        }

        let (header, body) = l4.split_at_mut(l4_len);
        body.copy_from_slice(&self.payload);

        match self.transport {
            Transport::Udp { src, dst } => {
                if let Some(mut udp) = MutableUdpPacket::new(header) {
                    udp.set_source(src);
                    udp.set_destination(dst);
                    udp.set_length(l4_total as u16);
                }
            }
            Transport::Tcp { src, dst } => {
                if let Some(mut tcp) = MutableTcpPacket::new(header) {
                    tcp.set_source(src);
                    tcp.set_destination(dst);
                    tcp.set_data_offset(5);
                }
            }
            Transport::Raw(_) => {}
        }

        buf
    }
}
