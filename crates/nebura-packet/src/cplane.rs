use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PacketError, Result};

pub const CPLANE_HEADER_LEN: u16 = 3;

/// Canonical control-plane type codes, frozen per the dispatch table this
/// protocol uses; the source's revisions disagree with each other, this
/// assignment does not.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CplaneType {
    Ipv4RouteAdd = 1,
    Ipv4RouteAddAlt = 2,
    Ipv6RouteAdd = 3,
    Srv6EncapAdd = 4,
    Srv6EndAction = 5,
    Netem = 6,
    XdpAttach = 7,
}

impl CplaneType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(CplaneType::Ipv4RouteAdd),
            2 => Some(CplaneType::Ipv4RouteAddAlt),
            3 => Some(CplaneType::Ipv6RouteAdd),
            4 => Some(CplaneType::Srv6EncapAdd),
            5 => Some(CplaneType::Srv6EndAction),
            6 => Some(CplaneType::Netem),
            7 => Some(CplaneType::XdpAttach),
            _ => None,
        }
    }
}

/// Origin flag carried in the IPv4 route-add payload; distinguishes BGP-
/// from operator-originated entries without needing a separate type code.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RouteOrigin {
    Bgp,
    Static,
}

impl RouteOrigin {
    pub fn as_tag(&self) -> &'static str {
        match self {
            RouteOrigin::Bgp => "BGP",
            RouteOrigin::Static => "STATIC",
        }
    }

    fn from_flag(flag: u8) -> RouteOrigin {
        if flag == 0 {
            RouteOrigin::Static
        } else {
            RouteOrigin::Bgp
        }
    }

    fn to_flag(self) -> u8 {
        match self {
            RouteOrigin::Bgp => 1,
            RouteOrigin::Static => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Ipv4RouteAdd {
    pub dst: Ipv4Addr,
    pub dst_len: u8,
    pub nexthop: Ipv4Addr,
    pub origin: RouteOrigin,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Ipv6RouteAdd {
    pub dst: Ipv6Addr,
    pub dst_len: u8,
    pub nexthop: Ipv6Addr,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Srv6EncapAdd {
    pub encap: Ipv4Addr,
    pub segs: [u8; 16],
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Srv6EndAction {
    pub action: u8,
    pub encap: [u8; 16],
    pub nexthop: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct NetemAdd {
    pub rate: [u8; 5],
    pub ifindex: u8,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct XdpAttach {
    pub prog_type: u8,
    pub ifindex: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CplaneMessage {
    Ipv4RouteAdd(Ipv4RouteAdd),
    Ipv6RouteAdd(Ipv6RouteAdd),
    Srv6EncapAdd(Srv6EncapAdd),
    Srv6EndAction(Srv6EndAction),
    Netem(NetemAdd),
    XdpAttach(XdpAttach),
}

fn frame(typ: CplaneType, payload: &[u8]) -> BytesMut {
    let total = CPLANE_HEADER_LEN as usize + payload.len();
    let mut buf = BytesMut::with_capacity(total);
    buf.put_u16(total as u16);
    buf.put_u8(typ as u8);
    buf.put(payload);
    buf
}

impl Ipv4RouteAdd {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(11);
        payload.put_u8(self.dst_len);
        payload.put(&self.dst.octets()[..]);
        payload.put_u8(self.dst_len); // nexthop prefix length, mirrors dst_len
        payload.put(&self.nexthop.octets()[..]);
        payload.put_u8(self.origin.to_flag());
        // The client has historically emitted type 2 for this payload
        // shape; the server's dispatch table treats 1 and 2 as aliases
        // (§4.4), so this is accepted on the decode side either way.
        frame(CplaneType::Ipv4RouteAddAlt, &payload)
    }

    fn decode(mut payload: &[u8]) -> Result<Ipv4RouteAdd> {
        if payload.len() != 11 {
            return Err(PacketError::Malformed);
        }
        let dst_len = payload.get_u8();
        let mut dst = [0u8; 4];
        payload.copy_to_slice(&mut dst);
        let _pad = payload.get_u8();
        let mut nh = [0u8; 4];
        payload.copy_to_slice(&mut nh);
        let flag = payload.get_u8();
        Ok(Ipv4RouteAdd {
            dst: Ipv4Addr::from(dst),
            dst_len,
            nexthop: Ipv4Addr::from(nh),
            origin: RouteOrigin::from_flag(flag),
        })
    }
}

impl Ipv6RouteAdd {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(33);
        payload.put(&self.dst.octets()[..]);
        payload.put_u8(self.dst_len);
        payload.put(&self.nexthop.octets()[..]);
        frame(CplaneType::Ipv6RouteAdd, &payload)
    }

    fn decode(mut payload: &[u8]) -> Result<Ipv6RouteAdd> {
        if payload.len() != 33 {
            return Err(PacketError::Malformed);
        }
        let mut dst = [0u8; 16];
        payload.copy_to_slice(&mut dst);
        let dst_len = payload.get_u8();
        let mut nh = [0u8; 16];
        payload.copy_to_slice(&mut nh);
        Ok(Ipv6RouteAdd {
            dst: Ipv6Addr::from(dst),
            dst_len,
            nexthop: Ipv6Addr::from(nh),
        })
    }
}

impl Srv6EncapAdd {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(20);
        payload.put(&self.encap.octets()[..]);
        payload.put(&self.segs[..]);
        frame(CplaneType::Srv6EncapAdd, &payload)
    }

    fn decode(mut payload: &[u8]) -> Result<Srv6EncapAdd> {
        if payload.len() != 20 {
            return Err(PacketError::Malformed);
        }
        let mut encap = [0u8; 4];
        payload.copy_to_slice(&mut encap);
        let mut segs = [0u8; 16];
        payload.copy_to_slice(&mut segs);
        Ok(Srv6EncapAdd {
            encap: Ipv4Addr::from(encap),
            segs,
        })
    }
}

impl Srv6EndAction {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(21);
        payload.put_u8(self.action);
        payload.put(&self.encap[..]);
        payload.put(&self.nexthop.octets()[..]);
        frame(CplaneType::Srv6EndAction, &payload)
    }

    fn decode(mut payload: &[u8]) -> Result<Srv6EndAction> {
        if payload.len() != 21 {
            return Err(PacketError::Malformed);
        }
        let action = payload.get_u8();
        let mut encap = [0u8; 16];
        payload.copy_to_slice(&mut encap);
        let mut nh = [0u8; 4];
        payload.copy_to_slice(&mut nh);
        Ok(Srv6EndAction {
            action,
            encap,
            nexthop: Ipv4Addr::from(nh),
        })
    }
}

impl NetemAdd {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(6);
        payload.put(&self.rate[..]);
        payload.put_u8(self.ifindex);
        frame(CplaneType::Netem, &payload)
    }

    fn decode(mut payload: &[u8]) -> Result<NetemAdd> {
        if payload.len() != 6 {
            return Err(PacketError::Malformed);
        }
        let mut rate = [0u8; 5];
        payload.copy_to_slice(&mut rate);
        let ifindex = payload.get_u8();
        Ok(NetemAdd { rate, ifindex })
    }
}

impl XdpAttach {
    pub fn encode(&self) -> BytesMut {
        let mut payload = BytesMut::with_capacity(2);
        payload.put_u8(self.prog_type);
        payload.put_u8(self.ifindex);
        frame(CplaneType::XdpAttach, &payload)
    }

    fn decode(mut payload: &[u8]) -> Result<XdpAttach> {
        if payload.len() != 2 {
            return Err(PacketError::Malformed);
        }
        let prog_type = payload.get_u8();
        let ifindex = payload.get_u8();
        Ok(XdpAttach { prog_type, ifindex })
    }
}

/// Parses the 3-byte header; returns `(type, declared_total_length)`.
pub fn decode_header(buf: &[u8]) -> Result<(CplaneType, u16)> {
    if buf.len() < CPLANE_HEADER_LEN as usize {
        return Err(PacketError::ShortRead {
            needed: CPLANE_HEADER_LEN as usize,
            got: buf.len(),
        });
    }
    let mut head = &buf[0..3];
    let len = head.get_u16();
    let typ_byte = head.get_u8();
    let typ = CplaneType::from_u8(typ_byte).ok_or(PacketError::UnknownType(typ_byte))?;
    Ok((typ, len))
}

/// Decodes a full frame (header + payload) into a typed message. Rejects
/// a payload whose observed length does not match the declared header
/// length, and logs-and-skips (returns `UnknownType`) for codes outside
/// the canonical table rather than mutating any state.
pub fn decode_message(buf: &[u8]) -> Result<CplaneMessage> {
    let (typ, len) = decode_header(buf)?;
    if buf.len() != len as usize {
        return Err(PacketError::Malformed);
    }
    let payload = &buf[CPLANE_HEADER_LEN as usize..];
    match typ {
        CplaneType::Ipv4RouteAdd | CplaneType::Ipv4RouteAddAlt => {
            Ok(CplaneMessage::Ipv4RouteAdd(Ipv4RouteAdd::decode(payload)?))
        }
        CplaneType::Ipv6RouteAdd => Ok(CplaneMessage::Ipv6RouteAdd(Ipv6RouteAdd::decode(payload)?)),
        CplaneType::Srv6EncapAdd => Ok(CplaneMessage::Srv6EncapAdd(Srv6EncapAdd::decode(payload)?)),
        CplaneType::Srv6EndAction => {
            Ok(CplaneMessage::Srv6EndAction(Srv6EndAction::decode(payload)?))
        }
        CplaneType::Netem => Ok(CplaneMessage::Netem(NetemAdd::decode(payload)?)),
        CplaneType::XdpAttach => Ok(CplaneMessage::XdpAttach(XdpAttach::decode(payload)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_ipv4_route_add() {
        let msg = Ipv4RouteAdd {
            dst: "10.1.1.0".parse().unwrap(),
            dst_len: 24,
            nexthop: "10.0.0.1".parse().unwrap(),
            origin: RouteOrigin::Bgp,
        };
        let bytes = msg.encode();
        let expect: &[u8] = &[
            0x00, 0x0e, 0x02, 0x18, 0x0a, 0x01, 0x01, 0x00, 0x18, 0x0a, 0x00, 0x00, 0x01, 0x01,
        ];
        assert_eq!(&bytes[..], expect);
    }

    #[test]
    fn ipv4_route_add_round_trip() {
        let msg = Ipv4RouteAdd {
            dst: "10.1.1.0".parse().unwrap(),
            dst_len: 24,
            nexthop: "10.0.0.1".parse().unwrap(),
            origin: RouteOrigin::Static,
        };
        let bytes = msg.encode();
        match decode_message(&bytes).unwrap() {
            CplaneMessage::Ipv4RouteAdd(decoded) => assert_eq!(decoded, msg),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn rejects_length_mismatch() {
        let msg = Ipv4RouteAdd {
            dst: "10.1.1.0".parse().unwrap(),
            dst_len: 24,
            nexthop: "10.0.0.1".parse().unwrap(),
            origin: RouteOrigin::Bgp,
        };
        let mut bytes = msg.encode();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(decode_message(&bytes), Err(PacketError::Malformed)));
    }

    #[test]
    fn unknown_type_is_reported_not_swallowed() {
        let buf: &[u8] = &[0x00, 0x03, 0x09];
        assert!(matches!(decode_header(buf), Err(PacketError::UnknownType(9))));
    }
}
