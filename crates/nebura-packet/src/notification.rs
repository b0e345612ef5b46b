use bytes::Buf;

use crate::error::{PacketError, Result};
use crate::header::{decode_frame, BgpType};

/// Cease, per RFC 4271 §8's connection-collision resolution; the only
/// code this daemon ever originates.
pub const NOTIF_CEASE: u8 = 6;

/// NOTIFICATION body: error code, subcode, and an opaque data tail. The
/// daemon only ever logs what it receives; the data is not interpreted
/// further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPacket {
    pub code: u8,
    pub subcode: u8,
    pub data: Vec<u8>,
}

impl NotificationPacket {
    pub fn new(code: u8, subcode: u8) -> Self {
        NotificationPacket {
            code,
            subcode,
            data: Vec::new(),
        }
    }

    pub fn decode_frame(buf: &[u8]) -> Result<NotificationPacket> {
        let frame = decode_frame(buf)?;
        if frame.typ != BgpType::Notification {
            return Err(PacketError::UpdateUnsupported);
        }
        NotificationPacket::decode_body(&frame.body)
    }

    pub fn decode_body(body: &[u8]) -> Result<NotificationPacket> {
        if body.len() < 2 {
            return Err(PacketError::ShortRead {
                needed: 2,
                got: body.len(),
            });
        }
        let mut head = &body[0..2];
        let code = head.get_u8();
        let subcode = head.get_u8();
        Ok(NotificationPacket {
            code,
            subcode,
            data: body[2..].to_vec(),
        })
    }
}
