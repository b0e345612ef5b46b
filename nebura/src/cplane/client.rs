use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::BytesMut;
use nebura_packet::{
    Ipv4RouteAdd, Ipv6RouteAdd, NetemAdd, RouteOrigin, Srv6EncapAdd, Srv6EndAction, XdpAttach,
};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use crate::bgp::sink::RouteSink;
use crate::error::Result;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/nebura.sock";

/// Stateless client for the local control-plane TLV protocol (§4.3): each
/// call opens a fresh connection, writes one frame, and drops it. Writes
/// are best-effort — a failure surfaces as `TransportError` and is never
/// retried; the client does not read a response, the server is expected
/// to act on receive alone.
#[derive(Clone)]
pub struct CplaneClient {
    path: PathBuf,
}

impl CplaneClient {
    pub fn new(path: impl AsRef<Path>) -> Self {
        CplaneClient {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn send(&self, frame: BytesMut) -> Result<()> {
        let mut stream = UnixStream::connect(&self.path).await?;
        stream.write_all(&frame).await?;
        Ok(())
    }

    pub async fn ipv4_route_add(
        &self,
        dst: Ipv4Addr,
        dst_len: u8,
        nexthop: Ipv4Addr,
        origin: RouteOrigin,
    ) -> Result<()> {
        let msg = Ipv4RouteAdd {
            dst,
            dst_len,
            nexthop,
            origin,
        };
        self.send(msg.encode()).await
    }

    pub async fn ipv6_route_add(
        &self,
        dst: Ipv6Addr,
        dst_len: u8,
        nexthop: Ipv6Addr,
    ) -> Result<()> {
        let msg = Ipv6RouteAdd {
            dst,
            dst_len,
            nexthop,
        };
        self.send(msg.encode()).await
    }

    pub async fn srv6_encap_add(&self, encap: Ipv4Addr, segs: [u8; 16]) -> Result<()> {
        let msg = Srv6EncapAdd { encap, segs };
        self.send(msg.encode()).await
    }

    pub async fn srv6_end_action(
        &self,
        action: u8,
        encap: [u8; 16],
        nexthop: Ipv4Addr,
    ) -> Result<()> {
        let msg = Srv6EndAction {
            action,
            encap,
            nexthop,
        };
        self.send(msg.encode()).await
    }

    pub async fn netem_add(&self, rate: [u8; 5], ifindex: u8) -> Result<()> {
        let msg = NetemAdd { rate, ifindex };
        self.send(msg.encode()).await
    }

    pub async fn xdp_attach(&self, prog_type: u8, ifindex: u8) -> Result<()> {
        let msg = XdpAttach { prog_type, ifindex };
        self.send(msg.encode()).await
    }
}

/// The peer FSM's default sink in "nebura" mode: a BGP-learned UPDATE
/// becomes a single IPv4 route-add frame tagged `BGP`, sent to whatever
/// process owns the control-plane server (in this daemon's case, itself).
#[async_trait]
impl RouteSink for CplaneClient {
    async fn route_add(&self, nexthop: Ipv4Addr, prefix: Ipv4Addr, prefix_len: u8) -> Result<()> {
        self.ipv4_route_add(prefix, prefix_len, nexthop, RouteOrigin::Bgp)
            .await
    }
}
