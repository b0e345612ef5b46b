use std::cmp::min;

use nebura_packet::OpenPacket;

use crate::bgp::peer::Peer;

pub use crate::context::timer::Timer;

/// Negotiates hold-time and the derived keepalive interval from a
/// received OPEN, per the rule in §4.2: the smaller of the two sides'
/// advertised hold-times wins, and either side advertising 0 disables
/// both timers for the session.
pub fn update_open_timers(peer: &mut Peer, open: &OpenPacket) {
    let local_hold = peer.configured_hold_time();
    if open.hold_time == 0 || local_hold == 0 {
        peer.set_negotiated(0, 0);
        return;
    }
    let hold_time = min(open.hold_time, local_hold);
    let keepalive = hold_time / 3;
    peer.set_negotiated(hold_time, keepalive);
}
