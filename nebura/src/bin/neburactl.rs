use std::path::PathBuf;

use clap::Parser;
use nebura::config::{self, Conf};
use nebura::cplane::{CplaneClient, DEFAULT_SOCKET_PATH};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the same YAML configuration document the daemon reads
    /// (§4.10): whichever request-shaped section is populated decides
    /// the one control-plane message this run emits.
    config: PathBuf,
}

/// Builds and sends the single control-plane message implied by
/// whichever request-shaped section of `conf` is populated. A config
/// with none of them populated is a logged no-op, not an error — §4.10
/// only guarantees one message is emitted when a section is present.
async fn emit(conf: &Conf, client: &CplaneClient) -> nebura::Result<()> {
    if let Some(ip_prefix) = &conf.ip_prefix {
        let net: ipnet::Ipv4Net = ip_prefix
            .dstaddr
            .parse()
            .map_err(|e| nebura::NeburaError::Config(format!("invalid ip_prefix.dstaddr: {e}")))?;
        client
            .ipv4_route_add(
                net.addr(),
                net.prefix_len(),
                ip_prefix.srcaddr,
                nebura_packet::RouteOrigin::Static,
            )
            .await?;
        return Ok(());
    }
    if let Some(srv6) = &conf.srv6 {
        client
            .srv6_encap_add(srv6.encapaddr, srv6.segs.octets())
            .await?;
        return Ok(());
    }
    if let Some(srv6_end) = &conf.srv6_end {
        client
            .srv6_end_action(srv6_end.endaction, srv6_end.encapaddr.octets(), srv6_end.nexthop)
            .await?;
        return Ok(());
    }
    if let Some(tc) = &conf.tc {
        let mut rate = [b' '; 5];
        let ms = tc.ms.as_bytes();
        let n = ms.len().min(5);
        rate[..n].copy_from_slice(&ms[..n]);
        client.netem_add(rate, tc.inter).await?;
        return Ok(());
    }
    tracing::info!("no request-shaped section populated in config, nothing to send");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let args = Args::parse();
    let conf = config::load(&args.config)?;
    let client = CplaneClient::new(DEFAULT_SOCKET_PATH);
    emit(&conf, &client).await?;
    Ok(())
}
