use std::net::Ipv4Addr;
use std::sync::Arc;

use bytes::BytesMut;
use nebura_packet::{
    encode_keepalive, NotificationPacket, OpenPacket, UpdatePacket, BGP_HEADER_LEN, NOTIF_CEASE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;

use crate::bgp::inst::Message;
use crate::bgp::sink::RouteSink;
use crate::bgp::timer;
use crate::context::Task;
use crate::error::{NeburaError, Result};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum State {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl State {
    pub fn is_established(&self) -> bool {
        matches!(self, State::Established)
    }
}

/// Tagged FSM events. `Connected`/`ConnFail` arrive from the connect
/// task, `OpenReceived`/`KeepAliveReceived`/`UpdateReceived`/
/// `NotificationReceived` from the reader task, the `*Expired` variants
/// from the peer's timers — all funneled through the same per-peer
/// channel so the driver still processes one event at a time.
pub enum Event {
    StartConnect,
    Connected(TcpStream),
    ConnFail(String),
    SendOpen,
    OpenReceived(OpenPacket),
    KeepAliveReceived,
    UpdateReceived(UpdatePacket),
    NotificationReceived(NotificationPacket),
    HoldTimerExpired,
    KeepaliveTimerExpired,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::StartConnect => write!(f, "StartConnect"),
            Event::Connected(_) => write!(f, "Connected(..)"),
            Event::ConnFail(reason) => write!(f, "ConnFail({reason})"),
            Event::SendOpen => write!(f, "SendOpen"),
            Event::OpenReceived(open) => write!(f, "OpenReceived({:?})", open),
            Event::KeepAliveReceived => write!(f, "KeepAliveReceived"),
            Event::UpdateReceived(update) => write!(f, "UpdateReceived({:?})", update),
            Event::NotificationReceived(notif) => write!(f, "NotificationReceived({:?})", notif),
            Event::HoldTimerExpired => write!(f, "HoldTimerExpired"),
            Event::KeepaliveTimerExpired => write!(f, "KeepaliveTimerExpired"),
        }
    }
}

#[derive(Default)]
struct PeerTask {
    connect: Option<Task>,
    reader: Option<Task>,
}

#[derive(Default)]
struct PeerTimer {
    hold: Option<timer::Timer>,
    keepalive: Option<timer::Timer>,
}

#[derive(Debug, Clone, Copy)]
struct Negotiated {
    hold_time: u16,
    keepalive: u16,
}

impl Default for Negotiated {
    fn default() -> Self {
        Negotiated {
            hold_time: nebura_packet::DEFAULT_HOLD_TIME,
            keepalive: nebura_packet::DEFAULT_HOLD_TIME / 3,
        }
    }
}

pub struct Peer {
    pub ident: Ipv4Addr,
    pub local_as: u16,
    pub local_id: Ipv4Addr,
    pub state: State,
    pub tx: UnboundedSender<Message>,
    writer: Option<OwnedWriteHalf>,
    task: PeerTask,
    timer: PeerTimer,
    negotiated: Negotiated,
    sink: Arc<dyn RouteSink>,
}

impl Peer {
    pub fn new(
        ident: Ipv4Addr,
        local_as: u16,
        local_id: Ipv4Addr,
        tx: UnboundedSender<Message>,
        sink: Arc<dyn RouteSink>,
    ) -> Self {
        Peer {
            ident,
            local_as,
            local_id,
            state: State::Idle,
            tx,
            writer: None,
            task: PeerTask::default(),
            timer: PeerTimer::default(),
            negotiated: Negotiated::default(),
            sink,
        }
    }

    pub(crate) fn configured_hold_time(&self) -> u16 {
        nebura_packet::DEFAULT_HOLD_TIME
    }

    pub(crate) fn set_negotiated(&mut self, hold_time: u16, keepalive: u16) {
        self.negotiated = Negotiated {
            hold_time,
            keepalive,
        };
    }

    async fn write_frame(&mut self, frame: BytesMut) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| NeburaError::ProtocolViolation("no write half for peer".into()))?;
        writer.write_all(&frame).await?;
        Ok(())
    }

    /// Spawns the TCP-connect task. On success it hands the stream back
    /// through the same channel as `Event::Connected`; on failure as
    /// `Event::ConnFail`, letting the driver re-raise to the supervisor.
    fn spawn_connect(&mut self) {
        let ident = self.ident;
        let tx = self.tx.clone();
        self.task.connect = Some(Task::spawn(move || async move {
            let addr = format!("{}:179", ident);
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let _ = tx.send(Message::Event(ident, Event::Connected(stream)));
                }
                Err(e) => {
                    let _ = tx.send(Message::Event(ident, Event::ConnFail(e.to_string())));
                }
            }
        }));
    }

    /// Splits the connection, keeps the write half, and spawns the reader
    /// task on the read half — the peer/reader circular reference is
    /// resolved by giving the reader only a one-way sender back into the
    /// peer's event channel.
    fn adopt_stream(&mut self, stream: TcpStream) {
        let (read_half, write_half) = stream.into_split();
        self.writer = Some(write_half);
        let ident = self.ident;
        let tx = self.tx.clone();
        self.task.reader = Some(Task::spawn(move || peer_read(ident, read_half, tx)));
    }

    fn clear_timers(&mut self) {
        self.timer.hold = None;
        self.timer.keepalive = None;
    }

    fn arm_timers(&mut self) {
        if self.negotiated.hold_time > 0 {
            let ident = self.ident;
            let tx = self.tx.clone();
            self.timer.hold = Some(timer::Timer::once(self.negotiated.hold_time as u64, move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(Message::Event(ident, Event::HoldTimerExpired));
                }
            }));
        }
        if self.negotiated.keepalive > 0 {
            let ident = self.ident;
            let tx = self.tx.clone();
            self.timer.keepalive = Some(timer::Timer::repeat(self.negotiated.keepalive as u64, move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(Message::Event(ident, Event::KeepaliveTimerExpired));
                }
            }));
        }
    }

    fn refresh_hold_timer(&self) {
        if let Some(hold) = self.timer.hold.as_ref() {
            hold.refresh();
        }
    }
}

async fn peer_read(
    ident: Ipv4Addr,
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    tx: UnboundedSender<Message>,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        let mut header = [0u8; BGP_HEADER_LEN as usize];
        if read_half.read_exact(&mut header).await.is_err() {
            return;
        }
        let header_parsed = match nebura_packet::BgpHeader::decode(&header) {
            Ok(h) => h,
            Err(_) => return,
        };
        let body_len = header_parsed.length as usize - BGP_HEADER_LEN as usize;
        if buf.len() < body_len {
            buf.resize(body_len, 0);
        }
        if body_len > 0 && read_half.read_exact(&mut buf[..body_len]).await.is_err() {
            return;
        }
        let mut frame = BytesMut::with_capacity(BGP_HEADER_LEN as usize + body_len);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&buf[..body_len]);

        let event = match header_parsed.typ {
            nebura_packet::BgpType::Open => {
                match OpenPacket::decode_body(&buf[..body_len]) {
                    Ok(open) => Event::OpenReceived(open),
                    Err(_) => return,
                }
            }
            nebura_packet::BgpType::Keepalive => Event::KeepAliveReceived,
            nebura_packet::BgpType::Update => match UpdatePacket::decode_body(&buf[..body_len]) {
                Ok(update) => Event::UpdateReceived(update),
                Err(_) => return,
            },
            nebura_packet::BgpType::Notification => {
                match NotificationPacket::decode_body(&buf[..body_len]) {
                    Ok(notif) => Event::NotificationReceived(notif),
                    Err(_) => return,
                }
            }
        };
        if tx.send(Message::Event(ident, event)).is_err() {
            return;
        }
    }
}

/// Drives one (state, event) transition to completion. Unreachable
/// combinations are `ProtocolViolation`, never a silent fall-through.
pub async fn fsm(peer: &mut Peer, event: Event) -> Result<()> {
    use State::*;

    match (peer.state, event) {
        (Idle, Event::StartConnect) => {
            peer.state = Connect;
            peer.spawn_connect();
        }
        (Connect, Event::Connected(stream)) => {
            peer.adopt_stream(stream);
            peer.state = Active;
            let _ = peer
                .tx
                .send(Message::Event(peer.ident, Event::SendOpen));
        }
        (Connect, Event::ConnFail(reason)) => {
            return Err(NeburaError::ProtocolViolation(format!(
                "connect failed: {reason}"
            )));
        }
        (Active, Event::SendOpen) => {
            let open = OpenPacket::new(peer.local_as, peer.configured_hold_time(), peer.local_id);
            peer.write_frame(open.encode()).await?;
            peer.state = OpenSent;
        }
        (OpenSent, Event::OpenReceived(open)) => {
            timer::update_open_timers(peer, &open);
            peer.write_frame(encode_keepalive()).await?;
            peer.state = OpenConfirm;
            peer.arm_timers();
        }
        (OpenConfirm, Event::KeepAliveReceived) => {
            peer.write_frame(encode_keepalive()).await?;
            peer.state = Established;
            peer.refresh_hold_timer();
        }
        (Established, Event::KeepAliveReceived) => {
            peer.write_frame(encode_keepalive()).await?;
            peer.refresh_hold_timer();
        }
        (Established, Event::UpdateReceived(update)) => {
            peer.refresh_hold_timer();
            peer
                .sink
                .route_add(update.nexthop, update.prefix, update.prefix_len)
                .await?;
        }
        (OpenConfirm, Event::KeepaliveTimerExpired) | (Established, Event::KeepaliveTimerExpired) => {
            peer.write_frame(encode_keepalive()).await?;
        }
        (OpenSent, Event::HoldTimerExpired)
        | (OpenConfirm, Event::HoldTimerExpired)
        | (Established, Event::HoldTimerExpired) => {
            return Err(NeburaError::ProtocolViolation("hold timer expired".into()));
        }
        (_, Event::NotificationReceived(notif)) if peer.state != Idle => {
            return Err(NeburaError::ProtocolViolation(format!(
                "peer sent NOTIFICATION code={} subcode={}",
                notif.code, notif.subcode
            )));
        }
        (state, event) => {
            return Err(NeburaError::ProtocolViolation(format!(
                "unreachable event {:?} in state {:?}",
                event, state
            )));
        }
    }
    Ok(())
}

/// Applies RFC 4271 §8 connection-collision resolution to an inbound
/// TCP connection for a peer already past `Idle`. In `OpenConfirm`/
/// `Established` the incoming connection loses: reject with a Cease
/// NOTIFICATION and drop it. In earlier states the existing attempt
/// loses: abandon it and adopt the new connection instead.
pub async fn handle_collision(peer: &mut Peer, stream: TcpStream) -> Result<()> {
    if peer.state.is_established() || peer.state == State::OpenConfirm {
        reject_connection(stream).await;
        return Ok(());
    }
    peer.task.connect = None;
    peer.task.reader = None;
    peer.clear_timers();
    peer.state = State::Connect;
    fsm(peer, Event::Connected(stream)).await
}

async fn reject_connection(stream: TcpStream) {
    let mut stream = stream;
    let notif = NotificationPacket::new(NOTIF_CEASE, 0);
    let mut buf = BytesMut::new();
    nebura_packet::BgpHeader::new(
        nebura_packet::BgpType::Notification,
        BGP_HEADER_LEN + 2 + notif.data.len() as u16,
    )
    .encode(&mut buf);
    buf.extend_from_slice(&[notif.code, notif.subcode]);
    let _ = stream.write_all(&buf).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::net::TcpListener;

    struct DiscardSink;

    #[async_trait]
    impl RouteSink for DiscardSink {
        async fn route_add(&self, _nexthop: Ipv4Addr, _prefix: Ipv4Addr, _prefix_len: u8) -> Result<()> {
            Ok(())
        }
    }

    fn next_event(msg: Message) -> Event {
        match msg {
            Message::Event(_, event) => event,
            Message::Accept(..) => panic!("unexpected inbound connection in fsm reachability test"),
        }
    }

    /// Property 6: from `Idle`, a conforming peer traces
    /// Idle→Connect→Active→OpenSent→OpenConfirm→Established on a script
    /// that provides TCP accept, echoes an OPEN, and sends a KEEPALIVE —
    /// driven here over a loopback socket standing in for the neighbor.
    #[tokio::test]
    async fn fsm_reachability_idle_to_established() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let remote = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut header = [0u8; BGP_HEADER_LEN as usize];
            stream.read_exact(&mut header).await.unwrap();
            let decoded = nebura_packet::BgpHeader::decode(&header).unwrap();
            let mut body = vec![0u8; decoded.length as usize - BGP_HEADER_LEN as usize];
            stream.read_exact(&mut body).await.unwrap();

            let open = OpenPacket::new(65001, 180, "2.2.2.2".parse().unwrap());
            stream.write_all(&open.encode()).await.unwrap();

            let mut ka_header = [0u8; BGP_HEADER_LEN as usize];
            stream.read_exact(&mut ka_header).await.unwrap();

            stream.write_all(&encode_keepalive()).await.unwrap();
        });

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink: Arc<dyn RouteSink> = Arc::new(DiscardSink);
        let mut peer = Peer::new(
            "127.0.0.1".parse().unwrap(),
            65000,
            "1.1.1.1".parse().unwrap(),
            tx,
            sink,
        );

        let stream = TcpStream::connect(addr).await.unwrap();
        peer.state = State::Connect;
        fsm(&mut peer, Event::Connected(stream)).await.unwrap();
        assert_eq!(peer.state, State::Active);

        let event = next_event(rx.recv().await.unwrap());
        assert!(matches!(event, Event::SendOpen));
        fsm(&mut peer, event).await.unwrap();
        assert_eq!(peer.state, State::OpenSent);

        let event = next_event(rx.recv().await.unwrap());
        assert!(matches!(event, Event::OpenReceived(_)));
        fsm(&mut peer, event).await.unwrap();
        assert_eq!(peer.state, State::OpenConfirm);

        let event = next_event(rx.recv().await.unwrap());
        assert!(matches!(event, Event::KeepAliveReceived));
        fsm(&mut peer, event).await.unwrap();
        assert_eq!(peer.state, State::Established);

        remote.await.unwrap();
    }
}
