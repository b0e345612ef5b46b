pub mod client;
pub mod server;

pub use client::{CplaneClient, DEFAULT_SOCKET_PATH};
pub use server::{serve, CplaneServer, Message};
