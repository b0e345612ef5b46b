use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;

use crate::error::Result;

/// The kernel forwarding installer, as an external capability. The
/// dispatcher calls through this trait rather than depending on any one
/// backing mechanism; the Linux build binds it to Netlink, other targets
/// or tests can supply a stand-in.
#[async_trait]
pub trait ForwardingInstaller: Send + Sync {
    async fn ipv4_route_add(
        &self,
        dst: Ipv4Addr,
        dst_len: u8,
        nexthop: Ipv4Addr,
        ifindex: u32,
        install_in_fib: bool,
    ) -> Result<()>;

    async fn ipv6_route_add(
        &self,
        dst: Ipv6Addr,
        dst_len: u8,
        nexthop: Ipv6Addr,
        ifindex: u32,
        install_in_fib: bool,
    ) -> Result<()>;

    async fn seg6_route_add(&self, encap: Ipv4Addr, segments: [u8; 16]) -> Result<()>;

    /// Action is currently fixed to `End.DX4`.
    async fn seg6_end_action(&self, encap: [u8; 16], nexthop: Ipv4Addr) -> Result<()>;

    async fn tc_netem_add(&self, ifindex: u32, rate_spec: &str) -> Result<()>;

    async fn xdp_attach(&self, ifindex: u32, program_fd: i32) -> Result<()>;

    async fn xdp_detach(&self, ifindex: u32) -> Result<()>;
}

/// An installer that accepts every call and does nothing. Used when
/// `fib_install` is false, on non-Linux targets, and in tests that drive
/// the dispatcher without a kernel to install into.
pub struct NullInstaller;

#[async_trait]
impl ForwardingInstaller for NullInstaller {
    async fn ipv4_route_add(
        &self,
        _dst: Ipv4Addr,
        _dst_len: u8,
        _nexthop: Ipv4Addr,
        _ifindex: u32,
        _install_in_fib: bool,
    ) -> Result<()> {
        Ok(())
    }

    async fn ipv6_route_add(
        &self,
        _dst: Ipv6Addr,
        _dst_len: u8,
        _nexthop: Ipv6Addr,
        _ifindex: u32,
        _install_in_fib: bool,
    ) -> Result<()> {
        Ok(())
    }

    async fn seg6_route_add(&self, _encap: Ipv4Addr, _segments: [u8; 16]) -> Result<()> {
        Ok(())
    }

    async fn seg6_end_action(&self, _encap: [u8; 16], _nexthop: Ipv4Addr) -> Result<()> {
        Ok(())
    }

    async fn tc_netem_add(&self, _ifindex: u32, _rate_spec: &str) -> Result<()> {
        Ok(())
    }

    async fn xdp_attach(&self, _ifindex: u32, _program_fd: i32) -> Result<()> {
        Ok(())
    }

    async fn xdp_detach(&self, _ifindex: u32) -> Result<()> {
        Ok(())
    }
}
