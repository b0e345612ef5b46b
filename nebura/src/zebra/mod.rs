pub mod client;

pub use client::{ZebraClient, DEFAULT_ZSERV_PATH};
