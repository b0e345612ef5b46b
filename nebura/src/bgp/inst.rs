use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::bgp::peer::{fsm, handle_collision, Event, Peer};
use crate::bgp::sink::RouteSink;
use crate::context::Task;

#[derive(Debug)]
pub enum Message {
    Event(Ipv4Addr, Event),
    Accept(TcpStream, SocketAddr),
}

/// Owns every configured peer and the TCP listener that accepts their
/// inbound connections. A thin supervisor in its own right: on a fatal
/// FSM error it replaces the failed peer with a fresh one and re-arms
/// the connect attempt after a short backoff, so nothing short of
/// `ConfigError` or a process signal ends the session for good.
pub struct Bgp {
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
    peers: HashMap<Ipv4Addr, Peer>,
    local_as: u16,
    local_id: Ipv4Addr,
    sink: Arc<dyn RouteSink>,
    listen_task: Option<Task>,
}

impl Bgp {
    pub fn new(local_as: u16, local_id: Ipv4Addr, neighbor: Ipv4Addr, sink: Arc<dyn RouteSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut peers = HashMap::new();
        peers.insert(
            neighbor,
            Peer::new(neighbor, local_as, local_id, tx.clone(), sink.clone()),
        );
        Bgp {
            tx,
            rx,
            peers,
            local_as,
            local_id,
            sink,
            listen_task: None,
        }
    }

    fn start(&mut self) {
        self.listen_task = Some(self.listen());
        for (&ident, _) in self.peers.iter() {
            let _ = self.tx.send(Message::Event(ident, Event::StartConnect));
        }
    }

    fn listen(&self) -> Task {
        let tx = self.tx.clone();
        Task::spawn(move || async move {
            let listener = match TcpListener::bind("0.0.0.0:179").await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(error = %e, "failed to bind BGP listen socket");
                    return;
                }
            };
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if tx.send(Message::Accept(stream, addr)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed, backing off");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }

    fn respawn(&mut self, ident: Ipv4Addr) {
        let peer = Peer::new(ident, self.local_as, self.local_id, self.tx.clone(), self.sink.clone());
        self.peers.insert(ident, peer);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(Message::Event(ident, Event::StartConnect));
        });
    }

    async fn process_msg(&mut self, msg: Message) {
        match msg {
            Message::Event(ident, event) => {
                let Some(peer) = self.peers.get_mut(&ident) else {
                    tracing::warn!(%ident, "event for unknown peer");
                    return;
                };
                if let Err(e) = fsm(peer, event).await {
                    tracing::warn!(%ident, error = %e, "peer session terminated, respawning");
                    self.respawn(ident);
                }
            }
            Message::Accept(stream, addr) => {
                let ip = match addr.ip() {
                    std::net::IpAddr::V4(v4) => v4,
                    std::net::IpAddr::V6(_) => {
                        tracing::warn!(%addr, "rejecting non-IPv4 inbound BGP connection");
                        return;
                    }
                };
                let Some(peer) = self.peers.get_mut(&ip) else {
                    tracing::warn!(%addr, "inbound connection from unconfigured peer");
                    return;
                };
                if let Err(e) = handle_collision(peer, stream).await {
                    tracing::warn!(%ip, error = %e, "collision handling terminated peer, respawning");
                    self.respawn(ip);
                }
            }
        }
    }

    pub async fn event_loop(mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.process_msg(msg).await;
        }
    }
}

pub fn serve(mut bgp: Bgp) -> tokio::task::JoinHandle<()> {
    bgp.start();
    tokio::spawn(async move { bgp.event_loop().await })
}
