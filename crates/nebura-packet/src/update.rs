use std::net::Ipv4Addr;

use bytes::Buf;

use crate::error::{PacketError, Result};
use crate::header::{decode_frame, BgpType};

const NEXT_HOP_ATTR_TYPE: u8 = 3;

/// Decoded IPv4 unicast UPDATE: the NEXT_HOP path attribute value and the
/// single NLRI entry this narrow parser supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePacket {
    pub nexthop: Ipv4Addr,
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
}

impl UpdatePacket {
    /// Decodes a full UPDATE frame (header + body).
    pub fn decode_frame(buf: &[u8]) -> Result<UpdatePacket> {
        let frame = decode_frame(buf)?;
        if frame.typ != BgpType::Update {
            return Err(PacketError::UpdateUnsupported);
        }
        UpdatePacket::decode_body(&frame.body)
    }

    /// Decodes an UPDATE body using the fixed offsets this daemon supports:
    /// nexthop at `[18:22]`, prefix length at `[22]`, NLRI at `[23:27]`.
    /// Only the single-NLRI, no-withdrawn-routes shape is accepted; any
    /// other layout is reported as `UpdateUnsupported` rather than
    /// generalized RFC-4271 attribute parsing.
    pub fn decode_body(body: &[u8]) -> Result<UpdatePacket> {
        if body.len() < 27 {
            return Err(PacketError::UpdateUnsupported);
        }
        let mut withdrawn_len_bytes = &body[0..2];
        let withdrawn_len = withdrawn_len_bytes.get_u16();
        if withdrawn_len != 0 {
            return Err(PacketError::UpdateUnsupported);
        }
        // NEXT_HOP attribute header (flag, type, len) sits immediately
        // before its 4-byte value at offset 18; verify the type byte so a
        // structurally different attribute block is rejected rather than
        // silently misread.
        if body[16] != NEXT_HOP_ATTR_TYPE {
            return Err(PacketError::UpdateUnsupported);
        }
        let mut nh = &body[18..22];
        let mut octets = [0u8; 4];
        nh.copy_to_slice(&mut octets);
        let nexthop = Ipv4Addr::from(octets);

        let prefix_len = body[22];
        let mut nlri = &body[23..27];
        let mut prefix_octets = [0u8; 4];
        nlri.copy_to_slice(&mut prefix_octets);
        let prefix = Ipv4Addr::from(prefix_octets);

        Ok(UpdatePacket {
            nexthop,
            prefix,
            prefix_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Vec<u8> {
        let mut body = vec![0u8; 27];
        body[0..2].copy_from_slice(&0u16.to_be_bytes()); // withdrawn_len
        body[2..4].copy_from_slice(&14u16.to_be_bytes()); // path_attr_len
        body[16] = NEXT_HOP_ATTR_TYPE;
        body[18..22].copy_from_slice(&[10, 0, 0, 1]);
        body[22] = 24;
        body[23..27].copy_from_slice(&[10, 1, 1, 0]);
        body
    }

    #[test]
    fn s3_update_decode() {
        let body = sample_body();
        let decoded = UpdatePacket::decode_body(&body).unwrap();
        assert_eq!(decoded.nexthop, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(decoded.prefix, Ipv4Addr::new(10, 1, 1, 0));
        assert_eq!(decoded.prefix_len, 24);
    }

    #[test]
    fn rejects_withdrawn_routes() {
        let mut body = sample_body();
        body[0..2].copy_from_slice(&4u16.to_be_bytes());
        assert!(matches!(
            UpdatePacket::decode_body(&body),
            Err(PacketError::UpdateUnsupported)
        ));
    }

    #[test]
    fn rejects_short_body() {
        let body = vec![0u8; 10];
        assert!(matches!(
            UpdatePacket::decode_body(&body),
            Err(PacketError::UpdateUnsupported)
        ));
    }
}
