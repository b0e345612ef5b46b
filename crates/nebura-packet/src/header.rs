use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PacketError, Result};

pub const BGP_HEADER_LEN: u16 = 19;
pub const BGP_MAX_LEN: u16 = 4096;
pub const BGP_MARKER: [u8; 16] = [0xff; 16];

#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BgpType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
}

impl BgpType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(BgpType::Open),
            2 => Some(BgpType::Update),
            3 => Some(BgpType::Notification),
            4 => Some(BgpType::Keepalive),
            _ => None,
        }
    }
}

/// The fixed 19-octet BGP header: 16 marker bytes, a 2-byte total length
/// (header included), and a 1-byte type code.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BgpHeader {
    pub length: u16,
    pub typ: BgpType,
}

impl BgpHeader {
    pub fn new(typ: BgpType, length: u16) -> Self {
        BgpHeader { length, typ }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put(&BGP_MARKER[..]);
        buf.put_u16(self.length);
        buf.put_u8(self.typ as u8);
    }

    /// Decodes exactly 19 header bytes. Does not consume more than that;
    /// the caller reads `length - 19` further body bytes separately.
    pub fn decode(buf: &[u8]) -> Result<BgpHeader> {
        if buf.len() < BGP_HEADER_LEN as usize {
            return Err(PacketError::ShortRead {
                needed: BGP_HEADER_LEN as usize,
                got: buf.len(),
            });
        }
        let marker = &buf[0..16];
        if marker != BGP_MARKER {
            return Err(PacketError::MarkerMismatch);
        }
        let mut rest = &buf[16..BGP_HEADER_LEN as usize];
        let length = rest.get_u16();
        if length < BGP_HEADER_LEN || length > BGP_MAX_LEN {
            return Err(PacketError::InvalidLength(length));
        }
        let typ_byte = rest.get_u8();
        let typ = match BgpType::from_u8(typ_byte) {
            Some(t) => t,
            None => return Err(PacketError::InvalidLength(length)),
        };
        Ok(BgpHeader { length, typ })
    }
}

/// A full decoded frame: the type code and the raw body bytes (the header
/// is not retained past the decode — callers that need the length can
/// derive it from `body.len() + 19`).
#[derive(Debug, Clone)]
pub struct BgpFrame {
    pub typ: BgpType,
    pub body: BytesMut,
}

/// Reads exactly 19 header bytes and `length - 19` body bytes from `buf`,
/// per the decode contract in the wire codec's specification.
pub fn decode_frame(buf: &[u8]) -> Result<BgpFrame> {
    let header = BgpHeader::decode(buf)?;
    let body_len = header.length as usize - BGP_HEADER_LEN as usize;
    let total = BGP_HEADER_LEN as usize + body_len;
    if buf.len() < total {
        return Err(PacketError::ShortRead {
            needed: total,
            got: buf.len(),
        });
    }
    let body = BytesMut::from(&buf[BGP_HEADER_LEN as usize..total]);
    Ok(BgpFrame {
        typ: header.typ,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Property 1: encoding then decoding a header yields back the
    /// original type and length for every valid (type, length) pair.
    #[test]
    fn header_round_trip() {
        for typ in [BgpType::Open, BgpType::Update, BgpType::Notification, BgpType::Keepalive] {
            for length in [BGP_HEADER_LEN, 64, BGP_MAX_LEN] {
                let header = BgpHeader::new(typ, length);
                let mut buf = BytesMut::new();
                header.encode(&mut buf);
                let decoded = BgpHeader::decode(&buf).unwrap();
                assert_eq!(decoded, header);
            }
        }
    }

    /// Property 2 / S6: a header whose first 16 bytes are not all
    /// 0xff is rejected, regardless of how plausible the rest looks.
    #[test]
    fn s6_marker_violation_is_rejected() {
        let mut buf = BytesMut::new();
        BgpHeader::new(BgpType::Keepalive, BGP_HEADER_LEN).encode(&mut buf);
        buf[0] = 0x00;
        assert!(matches!(BgpHeader::decode(&buf), Err(PacketError::MarkerMismatch)));

        let mut all_zero = vec![0u8; BGP_HEADER_LEN as usize];
        all_zero[16..18].copy_from_slice(&19u16.to_be_bytes());
        all_zero[18] = BgpType::Keepalive as u8;
        assert!(matches!(BgpHeader::decode(&all_zero), Err(PacketError::MarkerMismatch)));
    }

    /// Property 3: lengths outside [19, 4096] are rejected.
    #[test]
    fn length_bounds_are_enforced() {
        for bad_length in [0u16, 1, 18, 4097, u16::MAX] {
            let mut buf = BytesMut::new();
            buf.extend_from_slice(&BGP_MARKER);
            buf.extend_from_slice(&bad_length.to_be_bytes());
            buf.extend_from_slice(&[BgpType::Keepalive as u8]);
            assert!(matches!(
                BgpHeader::decode(&buf),
                Err(PacketError::InvalidLength(l)) if l == bad_length
            ));
        }
    }

    #[test]
    fn short_read_is_reported() {
        let buf = vec![0xffu8; 10];
        assert!(matches!(
            BgpHeader::decode(&buf),
            Err(PacketError::ShortRead { needed: 19, got: 10 })
        ));
    }
}
