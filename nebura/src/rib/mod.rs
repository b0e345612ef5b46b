pub mod inst;

pub use inst::{ProtoTag, Rib, RibEntry};
