use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};

use crate::error::{PacketError, Result};

pub const ZAPI_VERSION: u8 = 6;
pub const ZAPI_MARKER: u8 = 0xfe;
pub const ZAPI_HEADER_LEN: u16 = 10;

#[repr(u16)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ZapiCommand {
    Hello = 1,
    RouterIdAdd = 2,
    Ipv4RouteAdd = 3,
}

/// ZAPI (zserv) version-6 header: length, a fixed 0xfe marker, the
/// version byte, a 32-bit VRF id, and a 16-bit command code.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ZapiHeader {
    pub length: u16,
    pub vrf_id: u32,
    pub command: ZapiCommand,
}

impl ZapiHeader {
    pub fn new(command: ZapiCommand, body_len: u16) -> Self {
        ZapiHeader {
            length: ZAPI_HEADER_LEN + body_len,
            vrf_id: 0,
            command,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.length);
        buf.put_u8(ZAPI_MARKER);
        buf.put_u8(ZAPI_VERSION);
        buf.put_u32(self.vrf_id);
        buf.put_u16(self.command as u16);
    }
}

/// HELLO body: the redistributed route type the client wants to receive,
/// here fixed to "bgp".
pub fn encode_hello() -> BytesMut {
    let mut buf = BytesMut::with_capacity(ZAPI_HEADER_LEN as usize + 1);
    ZapiHeader::new(ZapiCommand::Hello, 1).encode(&mut buf);
    buf.put_u8(0); // ZEBRA_ROUTE_BGP
    buf
}

/// IP-ROUTE-ADD body: route type, flags, message flags, prefix length and
/// bytes, nexthop count and nexthop address. Mirrors the fields the zserv
/// client actually sends for a single-nexthop IPv4 unicast route.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ZapiIpv4RouteAdd {
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    pub nexthop: Ipv4Addr,
    pub distance: u8,
    pub metric: u32,
}

impl ZapiIpv4RouteAdd {
    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_u8(0); // ZEBRA_ROUTE_BGP
        body.put_u8(0); // flags
        body.put_u8(0); // message flags
        body.put_u8(self.prefix_len);
        let nbytes = self.prefix_len.div_ceil(8) as usize;
        body.put(&self.prefix.octets()[..nbytes]);
        body.put_u8(1); // nexthop count
        body.put(&self.nexthop.octets()[..]);
        body.put_u8(self.distance);
        body.put_u32(self.metric);

        let mut buf = BytesMut::with_capacity(ZAPI_HEADER_LEN as usize + body.len());
        ZapiHeader::new(ZapiCommand::Ipv4RouteAdd, body.len() as u16).encode(&mut buf);
        buf.put(body);
        buf
    }
}

pub fn decode_header(buf: &[u8]) -> Result<ZapiHeader> {
    if buf.len() < ZAPI_HEADER_LEN as usize {
        return Err(PacketError::ShortRead {
            needed: ZAPI_HEADER_LEN as usize,
            got: buf.len(),
        });
    }
    use bytes::Buf;
    let mut rest = buf;
    let length = rest.get_u16();
    let marker = rest.get_u8();
    if marker != ZAPI_MARKER {
        return Err(PacketError::MarkerMismatch);
    }
    let _version = rest.get_u8();
    let vrf_id = rest.get_u32();
    let command_code = rest.get_u16();
    let command = match command_code {
        1 => ZapiCommand::Hello,
        2 => ZapiCommand::RouterIdAdd,
        3 => ZapiCommand::Ipv4RouteAdd,
        other => return Err(PacketError::UnknownType(other as u8)),
    };
    Ok(ZapiHeader {
        length,
        vrf_id,
        command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_header_uses_frr_marker() {
        let bytes = encode_hello();
        assert_eq!(bytes[2], 0xfe);
        assert_eq!(bytes[3], 6);
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.command, ZapiCommand::Hello);
        assert_eq!(header.length as usize, bytes.len());
    }

    #[test]
    fn route_add_encodes_single_nexthop() {
        let msg = ZapiIpv4RouteAdd {
            prefix: "5.4.3.7".parse().unwrap(),
            prefix_len: 32,
            nexthop: "192.168.64.6".parse().unwrap(),
            distance: 20,
            metric: 0,
        };
        let bytes = msg.encode();
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.command, ZapiCommand::Ipv4RouteAdd);
        assert_eq!(header.length as usize, bytes.len());
    }
}
