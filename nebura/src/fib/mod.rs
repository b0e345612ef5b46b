pub mod installer;

#[cfg(target_os = "linux")]
pub mod netlink;

pub use installer::{ForwardingInstaller, NullInstaller};

#[cfg(target_os = "linux")]
pub use netlink::NetlinkInstaller;
