use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use ipnet::IpNet;

/// Source-protocol tag a RIB entry is filed under. The RIB keeps one
/// bucket per tag rather than per peer or per prefix family.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ProtoTag {
    Bgp,
    Static,
}

impl ProtoTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtoTag::Bgp => "BGP",
            ProtoTag::Static => "STATIC",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RibEntry {
    pub prefix: IpNet,
    pub nexthop: IpAddr,
    pub ifindex: u32,
    pub tag: ProtoTag,
}

/// Deduplicated, mutex-protected prefix store keyed by source-protocol
/// tag. `Add` is idempotent by prefix equality: the first-seen nexthop
/// for a given (tag, prefix) wins and later adds are silent no-ops. No
/// removal API is exposed — bucket contents only shrink on shutdown.
#[derive(Default)]
pub struct Rib {
    table: Mutex<HashMap<ProtoTag, Vec<RibEntry>>>,
}

impl Rib {
    pub fn new() -> Self {
        Rib {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the entry was newly inserted, `false` if a
    /// matching prefix already existed in that tag's bucket (property 4:
    /// `Add(e); Add(e)` leaves the bucket unchanged after the first call).
    pub fn add(&self, entry: RibEntry) -> bool {
        let mut table = self.table.lock().expect("rib mutex poisoned");
        let bucket = table.entry(entry.tag).or_default();
        if bucket.iter().any(|e| e.prefix == entry.prefix) {
            return false;
        }
        bucket.push(entry);
        true
    }

    pub fn find(&self, tag: ProtoTag, prefix: IpNet) -> Option<RibEntry> {
        let table = self.table.lock().expect("rib mutex poisoned");
        table
            .get(&tag)
            .and_then(|bucket| bucket.iter().find(|e| e.prefix == prefix))
            .copied()
    }

    /// Snapshot of a tag's bucket, for the `show` surface and for tests.
    pub fn list(&self, tag: ProtoTag) -> Vec<RibEntry> {
        let table = self.table.lock().expect("rib mutex poisoned");
        table.get(&tag).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RibEntry {
        RibEntry {
            prefix: "10.1.1.0/24".parse().unwrap(),
            nexthop: "10.0.0.1".parse().unwrap(),
            ifindex: 0,
            tag: ProtoTag::Bgp,
        }
    }

    #[test]
    fn s5_rib_dedup() {
        let rib = Rib::new();
        assert!(rib.add(sample()));
        assert!(!rib.add(sample()));
        assert_eq!(rib.list(ProtoTag::Bgp).len(), 1);
    }

    #[test]
    fn first_seen_nexthop_wins() {
        let rib = Rib::new();
        let mut e1 = sample();
        e1.nexthop = "10.0.0.1".parse().unwrap();
        let mut e2 = sample();
        e2.nexthop = "10.0.0.9".parse().unwrap();
        assert!(rib.add(e1));
        assert!(!rib.add(e2));
        let entries = rib.list(ProtoTag::Bgp);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].nexthop, "10.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn buckets_are_independent_per_tag() {
        let rib = Rib::new();
        let mut bgp = sample();
        bgp.tag = ProtoTag::Bgp;
        let mut st = sample();
        st.tag = ProtoTag::Static;
        assert!(rib.add(bgp));
        assert!(rib.add(st));
        assert_eq!(rib.list(ProtoTag::Bgp).len(), 1);
        assert_eq!(rib.list(ProtoTag::Static).len(), 1);
    }
}
