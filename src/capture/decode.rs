//! Ethernet/IPv4/IPv6/TCP/UDP decoding into the core's `Packet` record
//! (§10.1). Generalizes the teacher's `capture::sniffer::parse_packet`
//! (IPv4/TCP only) to IPv6 and UDP.

use std::net::IpAddr;

use etherparse::{NetHeaders, PacketHeaders, TransportHeader};
use pcap::PacketHeader;

use crate::packet::{Packet, TcpFlags, TcpInfo, PROTO_TCP, PROTO_UDP};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("no parseable network-layer header")]
    NoNetworkHeader,
    #[error("unsupported transport protocol")]
    UnsupportedTransport,
    #[error("etherparse error: {0}")]
    Parse(String),
}

const ETH_HEADER_LEN: u16 = 14;

/// Decodes one captured frame into a `Packet`. Frames with no parseable L3
/// header are reported as an error; the pipeline driver turns that into a
/// counted drop rather than a silently zeroed record (§4.5).
pub fn decode(header: &PacketHeader, data: &[u8]) -> Result<Packet, DecodeError> {
    let timestamp = header.ts.tv_sec as f64 + header.ts.tv_usec as f64 / 1_000_000.0;

    let parsed = PacketHeaders::from_ethernet_slice(data).map_err(|e| DecodeError::Parse(e.to_string()))?;

    let (src_addr, dst_addr, ip_header_len): (IpAddr, IpAddr, u16) = match &parsed.net {
        Some(NetHeaders::Ipv4(v4, _)) => (
            IpAddr::V4(v4.source.into()),
            IpAddr::V4(v4.destination.into()),
            v4.header_len() as u16,
        ),
        Some(NetHeaders::Ipv6(v6, _)) => (IpAddr::V6(v6.source.into()), IpAddr::V6(v6.destination.into()), 40),
        _ => return Err(DecodeError::NoNetworkHeader),
    };

    let (l4_proto, src_port, dst_port, l4_header_len, tcp) = match &parsed.transport {
        Some(TransportHeader::Tcp(tcp)) => (
            PROTO_TCP,
            tcp.source_port,
            tcp.destination_port,
            tcp.data_offset() as u16 * 4,
            Some(TcpInfo { flags: TcpFlags::from_bits(tcp_flags_byte(tcp)), window: tcp.window_size }),
        ),
        Some(TransportHeader::Udp(udp)) => (PROTO_UDP, udp.source_port, udp.destination_port, 8, None),
        _ => return Err(DecodeError::UnsupportedTransport),
    };

    let total_len = header.len;
    let header_len = ETH_HEADER_LEN as u32 + ip_header_len as u32 + l4_header_len as u32;
    let payload_len = total_len.saturating_sub(header_len);

    Ok(Packet {
        timestamp,
        src_addr,
        dst_addr,
        l4_proto,
        src_port,
        dst_port,
        ip_header_len,
        l4_header_len,
        payload_len,
        total_len,
        tcp,
    })
}

fn tcp_flags_byte(tcp: &etherparse::TcpHeader) -> u8 {
    (tcp.cwr as u8) << 7
        | (tcp.ece as u8) << 6
        | (tcp.urg as u8) << 5
        | (tcp.ack as u8) << 4
        | (tcp.psh as u8) << 3
        | (tcp.rst as u8) << 2
        | (tcp.syn as u8) << 1
        | (tcp.fin as u8)
}
