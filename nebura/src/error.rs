use thiserror::Error;

/// The daemon-wide error taxonomy. Callers match on kind to decide how
/// far a failure propagates; only `ConfigError` and an external signal
/// are allowed to end the process (§7).
#[derive(Error, Debug)]
pub enum NeburaError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("forwarding installer failure: {0}")]
    InstallerFailure(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Packet(#[from] nebura_packet::PacketError),
}

pub type Result<T> = std::result::Result<T, NeburaError>;
