//! Bounded L3/L4 header walking.
//!
//! Parsing state is an immutable [`Cursor`] (buffer + offset). Every header is taken as a
//! checked slice before it is viewed through a `pnet` packet type, so a short or lying
//! buffer fails the walk instead of being read past its end.

use pnet::packet::{
    ip::{IpNextHeaderProtocol, IpNextHeaderProtocols},
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    udp::UdpPacket,
};
use rxsteer_common::constants::ETH_HLEN;
use thiserror::Error;

/// IANA-assigned VXLAN destination port, the default tunnel signature.
pub const VXLAN_PORT: u16 = 4789;

/// Default bound on the number of tunnel layers decapsulated in one walk.
pub const DEFAULT_MAX_DEPTH: usize = 4;

const IPV4_MIN_HLEN: usize = 20;
const IPV6_HLEN: usize = 40;
const UDP_HLEN: usize = 8;
const TCP_MIN_HLEN: usize = 20;
const VXLAN_HLEN: usize = 8;

/// Why a header walk stopped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalkError {
    /// A header would extend past the end of the buffer.
    #[error("Truncated {layer} header: need {needed} bytes at offset {offset}, buffer has {len}")]
    Truncated { layer: &'static str, offset: usize, needed: usize, len: usize },
    /// The IP version nibble is neither 4 nor 6.
    #[error("Unsupported network protocol version: {0}")]
    UnsupportedNetwork(u8),
    /// The IPv4 IHL field is below the minimum header size.
    #[error("Invalid IPv4 header length: {0} bytes")]
    InvalidHeaderLength(usize),
    /// More nested tunnels than the depth bound allows.
    #[error("Tunnel nesting exceeds depth bound of {0}")]
    TooDeep(usize),
}

/// A read position into an immutable byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    /// A cursor at `offset` into `buf`. The offset may lie past the end.
    pub const fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left between the cursor and the end of the buffer.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    /// Returns exactly `len` bytes at the cursor, or [`WalkError::Truncated`] if
    /// `offset + len` would pass the end of the buffer.
    pub fn take(&self, layer: &'static str, len: usize) -> Result<&'a [u8], WalkError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.buf.len());

        match end {
            Some(end) => Ok(&self.buf[self.offset..end]),
            None => Err(WalkError::Truncated {
                layer,
                offset: self.offset,
                needed: len,
                len: self.buf.len(),
            }),
        }
    }

    /// Moves the cursor forward. Does not check bounds; the next `take` does.
    #[inline]
    pub const fn advance(self, n: usize) -> Self {
        Self { buf: self.buf, offset: self.offset.saturating_add(n) }
    }
}

/// The L3 protocol of a walked layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkProtocol {
    Ipv4,
    Ipv6,
}

/// The L4 protocol of a walked layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L4Protocol {
    Udp,
    Tcp,
    /// Any other IP protocol number. Carries no ports.
    Other(u8),
}

impl From<IpNextHeaderProtocol> for L4Protocol {
    fn from(proto: IpNextHeaderProtocol) -> Self {
        if proto == IpNextHeaderProtocols::Udp {
            Self::Udp
        } else if proto == IpNextHeaderProtocols::Tcp {
            Self::Tcp
        } else {
            Self::Other(proto.0)
        }
    }
}

/// The result of walking one layer of headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headers {
    pub network: NetworkProtocol,
    pub protocol: L4Protocol,
    pub src_port: u16,
    pub dst_port: u16,
    /// Whether this layer carries the tunnel signature.
    pub tunnel: bool,
    /// Number of tunnel layers decapsulated to reach this one.
    pub depth: usize,
    /// Offset of the L4 header in the buffer.
    pub l4_offset: usize,
}

impl Headers {
    /// Source and destination ports, for UDP and TCP only.
    pub const fn ports(&self) -> Option<(u16, u16)> {
        match self.protocol {
            L4Protocol::Udp | L4Protocol::Tcp => Some((self.src_port, self.dst_port)),
            L4Protocol::Other(_) => None,
        }
    }

    /// Whether this is a UDP datagram to `port`.
    pub const fn is_udp_to(&self, port: u16) -> bool {
        matches!(self.protocol, L4Protocol::Udp) && self.dst_port == port
    }
}

/// Walks L3/L4 headers, decapsulating tunnels up to a fixed depth.
#[derive(Debug, Clone, Copy)]
pub struct HeaderWalker {
    tunnel_port: u16,
    max_depth: usize,
}

impl Default for HeaderWalker {
    fn default() -> Self {
        Self { tunnel_port: VXLAN_PORT, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl HeaderWalker {
    /// A walker decapsulating UDP to `tunnel_port`, at most `max_depth` layers deep.
    pub const fn new(tunnel_port: u16, max_depth: usize) -> Self {
        Self { tunnel_port, max_depth }
    }

    #[inline]
    pub const fn tunnel_port(&self) -> u16 {
        self.tunnel_port
    }

    #[inline]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Offset of the inner L3 header behind a tunnel layer: outer UDP header, tunnel header,
    /// then the inner Ethernet header.
    pub const fn inner_offset(&self, headers: &Headers) -> usize {
        headers.l4_offset + UDP_HLEN + VXLAN_HLEN + ETH_HLEN
    }

    /// Walks from `offset` (the start of an L3 header), following tunnel layers, and returns
    /// the innermost headers.
    pub fn walk(&self, buf: &[u8], offset: usize) -> Result<Headers, WalkError> {
        let mut cursor = Cursor::new(buf, offset);
        let mut depth = 0;

        loop {
            let mut headers = self.walk_layer(cursor)?;
            headers.depth = depth;

            if !headers.tunnel {
                return Ok(headers);
            }

            if depth == self.max_depth {
                return Err(WalkError::TooDeep(self.max_depth));
            }

            depth += 1;
            cursor = Cursor::new(buf, self.inner_offset(&headers));
        }
    }

    /// Walks exactly one layer of L3 + L4 headers at the cursor.
    pub fn walk_layer(&self, cursor: Cursor<'_>) -> Result<Headers, WalkError> {
        let first = cursor.take("network", 1)?;
        let (network, protocol, l4) = match first[0] >> 4 {
            4 => {
                let fixed = cursor.take("ipv4", IPV4_MIN_HLEN)?;
                let Some(ip) = Ipv4Packet::new(fixed) else {
                    return Err(truncated("ipv4", cursor, IPV4_MIN_HLEN));
                };

                let hlen = ip.get_header_length() as usize * 4;
                if hlen < IPV4_MIN_HLEN {
                    return Err(WalkError::InvalidHeaderLength(hlen));
                }
                // Options must be present in the buffer too.
                cursor.take("ipv4 options", hlen)?;

                (NetworkProtocol::Ipv4, ip.get_next_level_protocol(), cursor.advance(hlen))
            }
            6 => {
                let fixed = cursor.take("ipv6", IPV6_HLEN)?;
                let Some(ip) = Ipv6Packet::new(fixed) else {
                    return Err(truncated("ipv6", cursor, IPV6_HLEN));
                };

                (NetworkProtocol::Ipv6, ip.get_next_header(), cursor.advance(IPV6_HLEN))
            }
            version => return Err(WalkError::UnsupportedNetwork(version)),
        };

        let protocol = L4Protocol::from(protocol);
        let (src_port, dst_port) = match protocol {
            L4Protocol::Udp => {
                let Some(udp) = UdpPacket::new(l4.take("udp", UDP_HLEN)?) else {
                    return Err(truncated("udp", l4, UDP_HLEN));
                };
                (udp.get_source(), udp.get_destination())
            }
            L4Protocol::Tcp => {
                let Some(tcp) = TcpPacket::new(l4.take("tcp", TCP_MIN_HLEN)?) else {
                    return Err(truncated("tcp", l4, TCP_MIN_HLEN));
                };
                (tcp.get_source(), tcp.get_destination())
            }
            L4Protocol::Other(_) => (0, 0),
        };

        Ok(Headers {
            network,
            protocol,
            src_port,
            dst_port,
            tunnel: matches!(protocol, L4Protocol::Udp) && dst_port == self.tunnel_port,
            depth: 0,
            l4_offset: l4.offset(),
        })
    }
}

fn truncated(layer: &'static str, cursor: Cursor<'_>, needed: usize) -> WalkError {
    WalkError::Truncated {
        layer,
        offset: cursor.offset(),
        needed,
        len: cursor.offset() + cursor.remaining(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;

    #[test]
    fn cursor_refuses_out_of_bounds() {
        let buf = [0u8; 10];
        let cursor = Cursor::new(&buf, 4);

        assert_eq!(cursor.remaining(), 6);
        assert!(cursor.take("x", 6).is_ok());
        assert_eq!(
            cursor.take("x", 7),
            Err(WalkError::Truncated { layer: "x", offset: 4, needed: 7, len: 10 })
        );
        assert!(Cursor::new(&buf, usize::MAX).take("x", 1).is_err());
        assert_eq!(Cursor::new(&buf, 20).remaining(), 0);
    }

    #[test]
    fn walk_udp() {
        let frame = FrameBuilder::udp(5000, 6000).build();
        let headers = HeaderWalker::default().walk(&frame, ETH_HLEN).unwrap();

        assert_eq!(headers.network, NetworkProtocol::Ipv4);
        assert_eq!(headers.protocol, L4Protocol::Udp);
        assert_eq!(headers.ports(), Some((5000, 6000)));
        assert!(!headers.tunnel);
        assert_eq!(headers.depth, 0);
        assert_eq!(headers.l4_offset, ETH_HLEN + 20);
    }

    #[test]
    fn walk_tcp_ipv6() {
        let frame = FrameBuilder::tcp(443, 51000).ipv6().build();
        let headers = HeaderWalker::default().walk(&frame, ETH_HLEN).unwrap();

        assert_eq!(headers.network, NetworkProtocol::Ipv6);
        assert_eq!(headers.protocol, L4Protocol::Tcp);
        assert_eq!(headers.ports(), Some((443, 51000)));
    }

    #[test]
    fn walk_unknown_protocol_has_no_ports() {
        // ICMP
        let frame = FrameBuilder::raw(1).build();
        let headers = HeaderWalker::default().walk(&frame, ETH_HLEN).unwrap();

        assert_eq!(headers.protocol, L4Protocol::Other(1));
        assert_eq!(headers.ports(), None);
    }

    #[test]
    fn walk_decapsulates_tunnel() {
        let inner = FrameBuilder::tcp(7000, 8000).build();
        let frame = FrameBuilder::vxlan(inner).build();
        let walker = HeaderWalker::default();

        let outer = walker.walk_layer(Cursor::new(&frame, ETH_HLEN)).unwrap();
        assert!(outer.tunnel);
        assert_eq!(outer.dst_port, VXLAN_PORT);

        let headers = walker.walk(&frame, ETH_HLEN).unwrap();
        assert_eq!(headers.depth, 1);
        assert_eq!(headers.protocol, L4Protocol::Tcp);
        assert_eq!(headers.ports(), Some((7000, 8000)));
        assert_eq!(walker.inner_offset(&outer), ETH_HLEN + 20 + 8 + 8 + ETH_HLEN);
    }

    #[test]
    fn walk_depth_is_bounded() {
        let mut frame = FrameBuilder::udp(1, 2).build();
        for _ in 0..3 {
            frame = FrameBuilder::vxlan(frame).build();
        }

        assert_eq!(HeaderWalker::new(VXLAN_PORT, 3).walk(&frame, ETH_HLEN).unwrap().depth, 3);
        assert_eq!(
            HeaderWalker::new(VXLAN_PORT, 2).walk(&frame, ETH_HLEN),
            Err(WalkError::TooDeep(2))
        );
    }

    #[test]
    fn walk_rejects_truncated_headers() {
        let frame = FrameBuilder::tcp(1, 2).build();
        let walker = HeaderWalker::default();

        // Cut into the TCP header.
        let err = walker.walk(&frame[..ETH_HLEN + 20 + 10], ETH_HLEN).unwrap_err();
        assert!(matches!(err, WalkError::Truncated { layer: "tcp", .. }));

        // Cut into the IP header.
        let err = walker.walk(&frame[..ETH_HLEN + 12], ETH_HLEN).unwrap_err();
        assert!(matches!(err, WalkError::Truncated { layer: "ipv4", .. }));

        // Offset beyond the buffer.
        assert!(walker.walk(&frame, frame.len() + 5).is_err());
    }

    #[test]
    fn walk_rejects_truncated_tunnel() {
        let inner = FrameBuilder::udp(1, 2).build();
        let frame = FrameBuilder::vxlan(inner).build();
        // Keep the outer headers but drop most of the inner IP header.
        let cut = ETH_HLEN + 20 + 8 + 8 + ETH_HLEN + 4;

        assert!(matches!(
            HeaderWalker::default().walk(&frame[..cut], ETH_HLEN),
            Err(WalkError::Truncated { .. })
        ));
    }

    #[test]
    fn walk_rejects_bad_ihl_and_version() {
        let mut frame = FrameBuilder::udp(1, 2).build();
        frame[ETH_HLEN] = 0x43;
        assert_eq!(
            HeaderWalker::default().walk(&frame, ETH_HLEN),
            Err(WalkError::InvalidHeaderLength(12))
        );

        frame[ETH_HLEN] = 0x25;
        assert_eq!(
            HeaderWalker::default().walk(&frame, ETH_HLEN),
            Err(WalkError::UnsupportedNetwork(2))
        );
    }

    #[test]
    fn walk_ihl_with_options_out_of_bounds() {
        let mut frame = FrameBuilder::raw(1).build();
        // Claim 60 bytes of IPv4 header on a frame that does not have them.
        frame[ETH_HLEN] = 0x4f;
        frame.truncate(ETH_HLEN + 40);

        assert!(matches!(
            HeaderWalker::default().walk(&frame, ETH_HLEN),
            Err(WalkError::Truncated { layer: "ipv4 options", .. })
        ));
    }
}
