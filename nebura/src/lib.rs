//! `nebura`: a minimal BGP-4 speaker paired with an in-process
//! route-distribution control plane. See the `nebura` and `neburactl`
//! binaries for the two process entry points this library backs.

pub mod bgp;
pub mod config;
pub mod context;
pub mod cplane;
pub mod error;
pub mod fib;
pub mod rib;
pub mod zebra;

pub use error::{NeburaError, Result};
