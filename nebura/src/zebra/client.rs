use std::net::Ipv4Addr;
use std::path::Path;

use async_trait::async_trait;
use nebura_packet::{encode_hello, ZapiIpv4RouteAdd};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::bgp::sink::RouteSink;
use crate::error::Result;

pub const DEFAULT_ZSERV_PATH: &str = "/var/run/frr/zserv.api";

/// A fixed administrative distance for routes this daemon redistributes
/// into zebra, matching the value FRR's own `bgpd` advertises for eBGP.
const ZEBRA_DISTANCE: u8 = 20;

/// Alternate sink speaking a subset of FRRouting's zserv protocol
/// (§4.7). Used instead of the control-plane client when the
/// configuration's `select` is `"zebra"`: the BGP peer hands its decoded
/// UPDATEs straight to an external zebra process rather than to this
/// daemon's own control-plane server.
pub struct ZebraClient {
    conn: Mutex<UnixStream>,
}

impl ZebraClient {
    /// Connects to the zserv endpoint at `path` and sends the initial
    /// HELLO announcing this client redistributes the BGP route type.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let mut stream = UnixStream::connect(path).await?;
        stream.write_all(&encode_hello()).await?;
        Ok(ZebraClient {
            conn: Mutex::new(stream),
        })
    }
}

#[async_trait]
impl RouteSink for ZebraClient {
    async fn route_add(&self, nexthop: Ipv4Addr, prefix: Ipv4Addr, prefix_len: u8) -> Result<()> {
        let msg = ZapiIpv4RouteAdd {
            prefix,
            prefix_len,
            nexthop,
            distance: ZEBRA_DISTANCE,
            metric: 0,
        };
        let bytes = msg.encode();
        let mut conn = self.conn.lock().await;
        conn.write_all(&bytes).await?;
        Ok(())
    }
}
