use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::Result;

/// Where a peer forwards a decoded UPDATE. The control-plane client and
/// the zebra client are the two implementations; the peer's FSM is
/// written against this trait so "zebra mode" is a drop-in alternate
/// sink rather than a branch inside the FSM itself.
#[async_trait]
pub trait RouteSink: Send + Sync {
    async fn route_add(&self, nexthop: Ipv4Addr, prefix: Ipv4Addr, prefix_len: u8) -> Result<()>;
}
