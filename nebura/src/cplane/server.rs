use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ipnet::IpNet;
use nebura_packet::{CplaneMessage, RouteOrigin, CPLANE_HEADER_LEN};
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::context::Task;
use crate::error::Result;
use crate::fib::ForwardingInstaller;
use crate::rib::{ProtoTag, Rib, RibEntry};

pub enum Message {
    ClientRead(Vec<u8>),
    Shutdown(oneshot::Sender<()>),
}

/// Reads one framed control-plane message off `stream`: the 3-byte
/// header, then exactly `length - 3` payload bytes. One message per
/// connection is sufficient (§4.4) — the caller drops the stream once
/// this returns.
async fn read_message(stream: &mut UnixStream) -> Result<Vec<u8>> {
    let mut header = [0u8; CPLANE_HEADER_LEN as usize];
    stream.read_exact(&mut header).await?;
    let (_typ, len) = nebura_packet::decode_header(&header)?;
    if len < CPLANE_HEADER_LEN {
        return Err(nebura_packet::PacketError::Malformed.into());
    }
    let mut buf = vec![0u8; len as usize];
    buf[..CPLANE_HEADER_LEN as usize].copy_from_slice(&header);
    let payload_len = len as usize - CPLANE_HEADER_LEN as usize;
    if payload_len > 0 {
        stream
            .read_exact(&mut buf[CPLANE_HEADER_LEN as usize..])
            .await?;
    }
    Ok(buf)
}

/// Accepts control-plane connections on a UNIX socket, demultiplexes the
/// typed requests it reads, and invokes the forwarding installer (§4.4).
/// Both BGP-originated and operator-originated (`neburactl`) requests
/// arrive on the same socket and traverse the same dispatcher — this is
/// the re-expression of the source's global RIB as a value the server
/// owns and passes to its own handlers (§9).
pub struct CplaneServer {
    socket_path: PathBuf,
    rib: Arc<Rib>,
    installer: Arc<dyn ForwardingInstaller>,
    fib_install: bool,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
    listen_task: Option<Task>,
}

impl CplaneServer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        rib: Arc<Rib>,
        installer: Arc<dyn ForwardingInstaller>,
        fib_install: bool,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        CplaneServer {
            socket_path: socket_path.into(),
            rib,
            installer,
            fib_install,
            tx,
            rx,
            listen_task: None,
        }
    }

    fn listen(&self) -> Task {
        let tx = self.tx.clone();
        let path = self.socket_path.clone();
        Task::spawn(move || async move {
            let _ = std::fs::remove_file(&path);
            let listener = match UnixListener::bind(&path) {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(error = %e, path = %path.display(), "failed to bind control-plane socket");
                    return;
                }
            };
            loop {
                match listener.accept().await {
                    Ok((mut stream, _addr)) => {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            match read_message(&mut stream).await {
                                Ok(buf) => {
                                    let _ = tx.send(Message::ClientRead(buf));
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "control-plane connection closed: malformed frame");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "control-plane accept failed, backing off");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }

    async fn dispatch(&self, msg: CplaneMessage) {
        match msg {
            CplaneMessage::Ipv4RouteAdd(add) => {
                let tag = match add.origin {
                    RouteOrigin::Bgp => ProtoTag::Bgp,
                    RouteOrigin::Static => ProtoTag::Static,
                };
                match IpNet::new(IpAddr::V4(add.dst), add.dst_len) {
                    Ok(prefix) => {
                        self.rib.add(RibEntry {
                            prefix,
                            nexthop: IpAddr::V4(add.nexthop),
                            ifindex: 0,
                            tag,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "ipv4 route add: invalid prefix length, dropping");
                        return;
                    }
                }
                if let Err(e) = self
                    .installer
                    .ipv4_route_add(add.dst, add.dst_len, add.nexthop, 0, self.fib_install)
                    .await
                {
                    tracing::warn!(error = %e, dst = %add.dst, "forwarding installer failed for ipv4 route add");
                }
            }
            CplaneMessage::Ipv6RouteAdd(add) => {
                if let Err(e) = self
                    .installer
                    .ipv6_route_add(add.dst, add.dst_len, add.nexthop, 0, self.fib_install)
                    .await
                {
                    tracing::warn!(error = %e, dst = %add.dst, "forwarding installer failed for ipv6 route add");
                }
            }
            CplaneMessage::Srv6EncapAdd(add) => {
                if let Err(e) = self.installer.seg6_route_add(add.encap, add.segs).await {
                    tracing::warn!(error = %e, "forwarding installer failed for srv6 encap add");
                }
            }
            CplaneMessage::Srv6EndAction(action) => {
                if let Err(e) = self
                    .installer
                    .seg6_end_action(action.encap, action.nexthop)
                    .await
                {
                    tracing::warn!(error = %e, "forwarding installer failed for srv6 end-action");
                }
            }
            CplaneMessage::Netem(netem) => {
                let rate = std::str::from_utf8(&netem.rate).unwrap_or("").trim();
                if let Err(e) = self
                    .installer
                    .tc_netem_add(netem.ifindex as u32, rate)
                    .await
                {
                    tracing::warn!(error = %e, "forwarding installer failed for netem add");
                }
            }
            CplaneMessage::XdpAttach(attach) => {
                if let Err(e) = self
                    .installer
                    .xdp_attach(attach.ifindex as u32, attach.prog_type as i32)
                    .await
                {
                    tracing::warn!(error = %e, "forwarding installer failed for xdp attach");
                }
            }
        }
    }

    async fn process_msg(&mut self, msg: Message) -> bool {
        match msg {
            Message::ClientRead(buf) => {
                match nebura_packet::decode_message(&buf) {
                    Ok(msg) => self.dispatch(msg).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "unrecognized or malformed control-plane message, dropping");
                    }
                }
                true
            }
            Message::Shutdown(ack) => {
                let _ = std::fs::remove_file(&self.socket_path);
                let _ = ack.send(());
                false
            }
        }
    }

    pub async fn event_loop(mut self) {
        while let Some(msg) = self.rx.recv().await {
            if !self.process_msg(msg).await {
                break;
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Starts the accept loop and the dispatcher, and installs the
/// SIGINT/SIGTERM handler that removes the socket file before the
/// process exits (§4.9).
pub fn serve(mut server: CplaneServer) {
    server.listen_task = Some(server.listen());
    let tx = server.tx.clone();
    tokio::spawn(async move {
        server.event_loop().await;
    });
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let (ack_tx, ack_rx) = oneshot::channel();
        let _ = tx.send(Message::Shutdown(ack_tx));
        let _ = ack_rx.await;
        std::process::exit(0);
    });
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use nebura_packet::{Ipv4RouteAdd, Ipv6RouteAdd, NetemAdd, RouteOrigin, Srv6EncapAdd, Srv6EndAction, XdpAttach};

    use super::*;
    use crate::rib::ProtoTag;

    #[derive(Default)]
    struct CountingInstaller {
        ipv4: AtomicUsize,
        ipv6: AtomicUsize,
        seg6_route: AtomicUsize,
        seg6_end: AtomicUsize,
        netem: AtomicUsize,
        xdp: AtomicUsize,
    }

    #[async_trait]
    impl ForwardingInstaller for CountingInstaller {
        async fn ipv4_route_add(&self, _: Ipv4Addr, _: u8, _: Ipv4Addr, _: u32, _: bool) -> Result<()> {
            self.ipv4.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn ipv6_route_add(&self, _: Ipv6Addr, _: u8, _: Ipv6Addr, _: u32, _: bool) -> Result<()> {
            self.ipv6.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn seg6_route_add(&self, _: Ipv4Addr, _: [u8; 16]) -> Result<()> {
            self.seg6_route.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn seg6_end_action(&self, _: [u8; 16], _: Ipv4Addr) -> Result<()> {
            self.seg6_end.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn tc_netem_add(&self, _: u32, _: &str) -> Result<()> {
            self.netem.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn xdp_attach(&self, _: u32, _: i32) -> Result<()> {
            self.xdp.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn xdp_detach(&self, _: u32) -> Result<()> {
            Ok(())
        }
    }

    fn server_with(installer: Arc<CountingInstaller>) -> CplaneServer {
        CplaneServer::new("/tmp/nebura-test-unused.sock", Arc::new(Rib::new()), installer, true)
    }

    /// Property 5: every defined control-plane type reaches its handler
    /// exactly once per received frame.
    #[tokio::test]
    async fn dispatch_coverage_every_type_reaches_its_handler() {
        let installer = Arc::new(CountingInstaller::default());
        let server = server_with(installer.clone());

        server
            .dispatch(CplaneMessage::Ipv4RouteAdd(Ipv4RouteAdd {
                dst: "10.1.1.0".parse().unwrap(),
                dst_len: 24,
                nexthop: "10.0.0.1".parse().unwrap(),
                origin: RouteOrigin::Bgp,
            }))
            .await;
        server
            .dispatch(CplaneMessage::Ipv6RouteAdd(Ipv6RouteAdd {
                dst: "2001:db8::".parse().unwrap(),
                dst_len: 32,
                nexthop: "2001:db8::1".parse().unwrap(),
            }))
            .await;
        server
            .dispatch(CplaneMessage::Srv6EncapAdd(Srv6EncapAdd {
                encap: "10.0.0.1".parse().unwrap(),
                segs: [0u8; 16],
            }))
            .await;
        server
            .dispatch(CplaneMessage::Srv6EndAction(Srv6EndAction {
                action: 1,
                encap: [0u8; 16],
                nexthop: "10.0.0.1".parse().unwrap(),
            }))
            .await;
        server
            .dispatch(CplaneMessage::Netem(NetemAdd {
                rate: *b"10mb ",
                ifindex: 3,
            }))
            .await;
        server
            .dispatch(CplaneMessage::XdpAttach(XdpAttach {
                prog_type: 1,
                ifindex: 3,
            }))
            .await;

        assert_eq!(installer.ipv4.load(Ordering::SeqCst), 1);
        assert_eq!(installer.ipv6.load(Ordering::SeqCst), 1);
        assert_eq!(installer.seg6_route.load(Ordering::SeqCst), 1);
        assert_eq!(installer.seg6_end.load(Ordering::SeqCst), 1);
        assert_eq!(installer.netem.load(Ordering::SeqCst), 1);
        assert_eq!(installer.xdp.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ipv4_route_add_inserts_into_rib_tagged_by_origin() {
        let installer = Arc::new(CountingInstaller::default());
        let server = server_with(installer);
        server
            .dispatch(CplaneMessage::Ipv4RouteAdd(Ipv4RouteAdd {
                dst: "10.1.1.0".parse().unwrap(),
                dst_len: 24,
                nexthop: "10.0.0.1".parse().unwrap(),
                origin: RouteOrigin::Static,
            }))
            .await;
        assert_eq!(server.rib.list(ProtoTag::Static).len(), 1);
        assert_eq!(server.rib.list(ProtoTag::Bgp).len(), 0);
    }

    /// An unrecognized type code is logged and does not mutate state —
    /// property 5's negative case.
    #[test]
    fn unknown_type_code_does_not_decode() {
        let buf: &[u8] = &[0x00, 0x03, 0x09];
        assert!(nebura_packet::decode_message(buf).is_err());
    }
}
