use thiserror::Error;

/// Error taxonomy shared by the wire codecs. Mirrors the error kinds a
/// caller needs to decide how to react, not how the decoder failed
/// internally.
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("BGP marker mismatch: expected 16 bytes of 0xff")]
    MarkerMismatch,

    #[error("BGP length {0} out of range [19, 4096]")]
    InvalidLength(u16),

    #[error("short read: need {needed} bytes, got {got}")]
    ShortRead { needed: usize, got: usize },

    #[error("UPDATE body does not match the supported single-NLRI IPv4 shape")]
    UpdateUnsupported,

    #[error("control-plane payload shorter than declared length")]
    Malformed,

    #[error("unknown control-plane type code {0}")]
    UnknownType(u8),
}

pub type Result<T> = std::result::Result<T, PacketError>;
