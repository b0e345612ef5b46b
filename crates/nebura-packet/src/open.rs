use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PacketError, Result};
use crate::header::{decode_frame, BgpHeader, BgpType, BGP_HEADER_LEN};

pub const BGP_VERSION: u8 = 4;
pub const DEFAULT_HOLD_TIME: u16 = 180;

/// OPEN message body: version, local AS, hold-time, BGP identifier, and an
/// opaque optional-parameters block this implementation never populates
/// (no capability negotiation beyond version/AS/holdtime/identifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPacket {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub opt_params: Vec<u8>,
}

impl OpenPacket {
    pub fn new(asn: u16, hold_time: u16, bgp_id: Ipv4Addr) -> Self {
        OpenPacket {
            version: BGP_VERSION,
            asn,
            hold_time,
            bgp_id,
            opt_params: Vec::new(),
        }
    }

    /// Encodes the full frame (header + OPEN body).
    pub fn encode(&self) -> BytesMut {
        let body_len = 1 + 2 + 2 + 4 + 1 + self.opt_params.len();
        let total = BGP_HEADER_LEN as usize + body_len;
        let mut buf = BytesMut::with_capacity(total);
        let header = BgpHeader::new(BgpType::Open, total as u16);
        header.encode(&mut buf);
        buf.put_u8(self.version);
        buf.put_u16(self.asn);
        buf.put_u16(self.hold_time);
        buf.put(&self.bgp_id.octets()[..]);
        buf.put_u8(self.opt_params.len() as u8);
        buf.put(&self.opt_params[..]);
        buf
    }

    /// Decodes an OPEN body (the bytes following the 19-byte header).
    pub fn decode_body(mut body: &[u8]) -> Result<OpenPacket> {
        if body.len() < 10 {
            return Err(PacketError::ShortRead {
                needed: 10,
                got: body.len(),
            });
        }
        let version = body.get_u8();
        let asn = body.get_u16();
        let hold_time = body.get_u16();
        let mut id = [0u8; 4];
        body.copy_to_slice(&mut id);
        let bgp_id = Ipv4Addr::from(id);
        let opt_param_len = body.get_u8() as usize;
        if body.len() < opt_param_len {
            return Err(PacketError::ShortRead {
                needed: opt_param_len,
                got: body.len(),
            });
        }
        let opt_params = body[..opt_param_len].to_vec();
        Ok(OpenPacket {
            version,
            asn,
            hold_time,
            bgp_id,
            opt_params,
        })
    }

    /// Parses a full OPEN frame (header + body) as received on the wire.
    pub fn decode_frame(buf: &[u8]) -> Result<OpenPacket> {
        let frame = decode_frame(buf)?;
        if frame.typ != BgpType::Open {
            return Err(PacketError::UpdateUnsupported);
        }
        OpenPacket::decode_body(&frame.body)
    }
}

/// Encodes a KEEPALIVE frame: header only, empty body.
pub fn encode_keepalive() -> BytesMut {
    let mut buf = BytesMut::with_capacity(BGP_HEADER_LEN as usize);
    BgpHeader::new(BgpType::Keepalive, BGP_HEADER_LEN).encode(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_open_encode() {
        let open = OpenPacket::new(65000, 180, "1.1.1.1".parse().unwrap());
        let bytes = open.encode();
        let mut expect = vec![0xffu8; 16];
        expect.extend_from_slice(&[
            0x00, 0x1d, 0x01, 0x04, 0xfd, 0xe8, 0x00, 0xb4, 0x01, 0x01, 0x01, 0x01, 0x00,
        ]);
        assert_eq!(&bytes[..], &expect[..]);
    }

    #[test]
    fn s2_keepalive_encode() {
        let bytes = encode_keepalive();
        let mut expect = vec![0xffu8; 16];
        expect.extend_from_slice(&[0x00, 0x13, 0x04]);
        assert_eq!(&bytes[..], &expect[..]);
    }

    #[test]
    fn open_round_trip() {
        let open = OpenPacket::new(65000, 180, "1.1.1.1".parse().unwrap());
        let bytes = open.encode();
        let decoded = OpenPacket::decode_frame(&bytes).unwrap();
        assert_eq!(decoded, open);
    }
}
