use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use serde::Deserialize;

use crate::error::{NeburaError, Result};

/// Top-level YAML document: a one-element `config:` list, mirroring the
/// source's `Data{Conf []Conf}` shape.
#[derive(Debug, Clone, Deserialize)]
struct Document {
    config: Vec<Conf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Conf {
    pub select: Option<String>,
    #[serde(default)]
    pub fib_install: bool,
    pub bgp: Option<BgpConf>,
    pub ip_prefix: Option<IpPrefixConf>,
    pub srv6: Option<Srv6Conf>,
    pub srv6_end: Option<Srv6EndConf>,
    pub tc: Option<TcConf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BgpConf {
    #[serde(rename = "as")]
    pub asn: u16,
    pub id: Ipv4Addr,
    pub peer: PeerConf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerConf {
    pub neiaddr: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpPrefixConf {
    pub srcaddr: Ipv4Addr,
    pub dstaddr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Srv6Conf {
    pub segs: Ipv6Addr,
    pub encapaddr: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Srv6EndConf {
    pub endaction: u8,
    pub encapaddr: Ipv6Addr,
    pub nexthop: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TcConf {
    pub qdisc: String,
    pub ms: String,
    pub inter: u8,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Backend {
    Nebura,
    Zebra,
}

impl Conf {
    pub fn backend(&self) -> Result<Backend> {
        match self.select.as_deref() {
            Some("nebura") => Ok(Backend::Nebura),
            Some("zebra") => Ok(Backend::Zebra),
            other => Err(NeburaError::Config(format!(
                "unrecognized or missing 'select' value: {:?}",
                other
            ))),
        }
    }

    pub fn bgp(&self) -> Result<&BgpConf> {
        self.bgp
            .as_ref()
            .ok_or_else(|| NeburaError::Config("missing 'bgp' section".into()))
    }
}

/// Loads and parses the YAML configuration document at `path`, returning
/// the single `Conf` entry it carries. A missing/empty `config:` list is
/// a `ConfigError`; the sections within the entry are validated lazily by
/// whichever consumer needs them.
pub fn load(path: &Path) -> Result<Conf> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| NeburaError::Config(format!("reading {}: {}", path.display(), e)))?;
    let doc: Document = serde_yaml::from_str(&text)
        .map_err(|e| NeburaError::Config(format!("parsing {}: {}", path.display(), e)))?;
    doc.config
        .into_iter()
        .next()
        .ok_or_else(|| NeburaError::Config("'config:' list is empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_bgp_document() {
        let yaml = r#"
config:
  - select: nebura
    fib_install: true
    bgp:
      as: 65000
      id: 1.1.1.1
      peer:
        neiaddr: 10.0.0.2
"#;
        let doc: Document = serde_yaml::from_str(yaml).unwrap();
        let conf = doc.config.into_iter().next().unwrap();
        assert_eq!(conf.backend().unwrap(), Backend::Nebura);
        assert!(conf.fib_install);
        assert_eq!(conf.bgp().unwrap().asn, 65000);
        assert_eq!(conf.bgp().unwrap().peer.neiaddr, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn missing_select_is_config_error() {
        let conf = Conf::default();
        assert!(conf.backend().is_err());
    }
}
