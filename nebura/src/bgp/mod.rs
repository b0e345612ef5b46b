pub mod inst;
pub mod peer;
pub mod sink;
pub mod timer;

pub use inst::{serve, Bgp, Message};
pub use peer::{Event, Peer, State};
pub use sink::RouteSink;
