// src/packet.rs
//! Packets exchanged between routers, and their binary frame format.
//!
//! Every frame starts with a one-byte type tag:
//! - `1`: route advertisement `[len(1), host id, latency(4)]`
//! - `2`: data `[len(1), destination, len(1), source, len(2), payload]`
//!
//! All integers are big-endian.

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::PacketError;
use crate::types::{HostId, Latency};

/// A distance-vector advertisement: "I can reach `destination` at `latency`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePacket {
    pub destination: HostId,
    pub latency: Latency,
}

/// A data-plane packet travelling from one host to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub destination: HostId,
    /// Originating host, carried for diagnostics only.
    pub source: HostId,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Route(RoutePacket),
    Data(DataPacket),
}

impl Packet {
    pub const TYPE_ROUTE: u8 = 1;
    pub const TYPE_DATA: u8 = 2;

    pub fn route(destination: HostId, latency: Latency) -> Self {
        Packet::Route(RoutePacket {
            destination,
            latency,
        })
    }

    pub fn data(source: HostId, destination: HostId, payload: Vec<u8>) -> Self {
        Packet::Data(DataPacket {
            destination,
            source,
            payload,
        })
    }

    pub fn type_tag(&self) -> u8 {
        match self {
            Packet::Route(_) => Self::TYPE_ROUTE,
            Packet::Data(_) => Self::TYPE_DATA,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PacketError> {
        let mut buf = Vec::new();
        buf.write_u8(self.type_tag())?;
        match self {
            Packet::Route(r) => {
                write_host(&mut buf, &r.destination)?;
                buf.write_u32::<BigEndian>(r.latency)?;
            }
            Packet::Data(d) => {
                write_host(&mut buf, &d.destination)?;
                write_host(&mut buf, &d.source)?;
                let len = u16::try_from(d.payload.len())
                    .map_err(|_| PacketError::PayloadTooLong(d.payload.len()))?;
                buf.write_u16::<BigEndian>(len)?;
                buf.extend_from_slice(&d.payload);
            }
        }
        Ok(buf)
    }

    /// Decode exactly one packet from `buf`; leftover bytes are an error.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, PacketError> {
        let mut cur = Cursor::new(buf);
        let tag = cur.read_u8().map_err(eof)?;
        let packet = match tag {
            Self::TYPE_ROUTE => {
                let destination = read_host(&mut cur)?;
                let latency = cur.read_u32::<BigEndian>().map_err(eof)?;
                Packet::Route(RoutePacket {
                    destination,
                    latency,
                })
            }
            Self::TYPE_DATA => {
                let destination = read_host(&mut cur)?;
                let source = read_host(&mut cur)?;
                let len = cur.read_u16::<BigEndian>().map_err(eof)? as usize;
                let mut payload = vec![0; len];
                cur.read_exact(&mut payload).map_err(eof)?;
                Packet::Data(DataPacket {
                    destination,
                    source,
                    payload,
                })
            }
            other => return Err(PacketError::UnknownType(other)),
        };

        let rest = buf.len() - cur.position() as usize;
        if rest != 0 {
            return Err(PacketError::TrailingBytes(rest));
        }
        Ok(packet)
    }
}

fn write_host(buf: &mut Vec<u8>, host: &HostId) -> Result<(), PacketError> {
    let bytes = host.as_str().as_bytes();
    let len = u8::try_from(bytes.len()).map_err(|_| PacketError::HostIdTooLong(bytes.len()))?;
    buf.write_u8(len)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_host(cur: &mut Cursor<&[u8]>) -> Result<HostId, PacketError> {
    let len = cur.read_u8().map_err(eof)? as usize;
    let mut raw = vec![0; len];
    cur.read_exact(&mut raw).map_err(eof)?;
    let name = String::from_utf8(raw).map_err(|_| PacketError::InvalidHostId)?;
    Ok(HostId::from(name))
}

fn eof(e: io::Error) -> PacketError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        PacketError::Truncated
    } else {
        PacketError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_packet_layout() {
        let pkt = Packet::route(HostId::from("h1"), 16);
        let bytes = pkt.to_bytes().unwrap();
        assert_eq!(bytes, vec![1, 2, b'h', b'1', 0, 0, 0, 16]);
    }

    #[test]
    fn route_roundtrip() {
        let pkt = Packet::route(HostId::from("server"), 7);
        let back = Packet::from_bytes(&pkt.to_bytes().unwrap()).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn data_roundtrip_keeps_payload() {
        let pkt = Packet::data(HostId::from("a"), HostId::from("b"), b"ping".to_vec());
        let bytes = pkt.to_bytes().unwrap();
        assert_eq!(bytes[0], Packet::TYPE_DATA);
        match Packet::from_bytes(&bytes).unwrap() {
            Packet::Data(d) => {
                assert_eq!(d.source.as_str(), "a");
                assert_eq!(d.destination.as_str(), "b");
                assert_eq!(d.payload, b"ping");
            }
            other => panic!("expected data packet, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Packet::from_bytes(&[9, 0]).unwrap_err();
        assert!(matches!(err, PacketError::UnknownType(9)));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = Packet::route(HostId::from("h1"), 3).to_bytes().unwrap();
        let err = Packet::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, PacketError::Truncated));
        assert!(matches!(
            Packet::from_bytes(&[]).unwrap_err(),
            PacketError::Truncated
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = Packet::route(HostId::from("h1"), 3).to_bytes().unwrap();
        bytes.push(0);
        let err = Packet::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, PacketError::TrailingBytes(1)));
    }

    #[test]
    fn invalid_utf8_host_is_rejected() {
        let err = Packet::from_bytes(&[1, 1, 0xff, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, PacketError::InvalidHostId));
    }

    #[test]
    fn oversized_host_id_fails_to_encode() {
        let long = HostId::new("x".repeat(300));
        let err = Packet::route(long, 1).to_bytes().unwrap_err();
        assert!(matches!(err, PacketError::HostIdTooLong(300)));
    }
}
