use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use daemonize::Daemonize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nebura::bgp::{self, Bgp, RouteSink};
use nebura::config::{self, Backend};
use nebura::cplane::{self, CplaneClient, CplaneServer, DEFAULT_SOCKET_PATH};
use nebura::fib::{ForwardingInstaller, NullInstaller};
use nebura::rib::Rib;
use nebura::zebra::{ZebraClient, DEFAULT_ZSERV_PATH};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration document (§6).
    config: PathBuf,

    #[arg(short, long, help = "Run as daemon in background")]
    daemon: bool,
}

enum LoggingOutput {
    Stdout,
    Syslog,
    File(PathBuf),
}

/// Structured, level-filterable logging per §6: stdout in the
/// foreground, syslog (facility `daemon`) when daemonized, falling back
/// to a rolling file and finally a discarding sink if neither is
/// available. Each fallback step is itself logged to stderr before the
/// switch.
fn setup_tracing(output: LoggingOutput) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match output {
        LoggingOutput::Stdout => {
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .init();
        }
        LoggingOutput::Syslog => {
            use std::io::Write;
            use std::sync::Mutex;
            use syslog::{Facility, Formatter3164};

            struct SyslogWriter {
                logger: Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>,
            }

            impl Write for SyslogWriter {
                fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                    if let Ok(mut logger) = self.logger.lock() {
                        let _ = logger.info(String::from_utf8_lossy(buf).trim());
                    }
                    Ok(buf.len())
                }
                fn flush(&mut self) -> std::io::Result<()> {
                    Ok(())
                }
            }

            let formatter = Formatter3164 {
                facility: Facility::LOG_DAEMON,
                hostname: None,
                process: "nebura".into(),
                pid: std::process::id(),
            };
            let logger = syslog::unix(formatter)
                .map_err(|e| anyhow::anyhow!("failed to connect to syslog: {e}"))?;
            let writer = SyslogWriter {
                logger: Mutex::new(logger),
            };
            let layer = fmt::layer()
                .with_writer(Mutex::new(writer))
                .with_target(false)
                .with_ansi(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LoggingOutput::File(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path.file_name().ok_or_else(|| anyhow::anyhow!("invalid log file path"))?;
            let writer = tracing_appender::rolling::never(dir, name);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
    Ok(())
}

fn setup_tracing_with_fallback(daemon_mode: bool) {
    if !daemon_mode {
        setup_tracing(LoggingOutput::Stdout).unwrap_or_else(|e| {
            eprintln!("failed to set up stdout logging: {e}");
        });
        return;
    }
    setup_tracing(LoggingOutput::Syslog).unwrap_or_else(|e| {
        eprintln!("failed to set up syslog logging: {e}, falling back to a log file");
        setup_tracing(LoggingOutput::File(PathBuf::from("/var/log/nebura.log"))).unwrap_or_else(|e| {
            eprintln!("failed to set up file logging: {e}, discarding logs");
            tracing_subscriber::fmt().with_writer(std::io::sink).init();
        });
    });
}

/// Binds the forwarding installer (§4.6): Netlink on Linux, a no-op
/// stand-in elsewhere. `fib_install = false` is honored per-call inside
/// the installer itself so the RIB entry is still recorded either way.
#[cfg(target_os = "linux")]
fn build_installer() -> anyhow::Result<Arc<dyn ForwardingInstaller>> {
    match nebura::fib::NetlinkInstaller::new() {
        Ok(installer) => Ok(Arc::new(installer)),
        Err(e) => {
            tracing::warn!(error = %e, "netlink installer unavailable, falling back to a no-op installer");
            Ok(Arc::new(NullInstaller))
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn build_installer() -> anyhow::Result<Arc<dyn ForwardingInstaller>> {
    Ok(Arc::new(NullInstaller))
}

async fn build_sink(conf: &config::Conf) -> anyhow::Result<Arc<dyn RouteSink>> {
    match conf.backend()? {
        Backend::Nebura => Ok(Arc::new(CplaneClient::new(DEFAULT_SOCKET_PATH))),
        Backend::Zebra => Ok(Arc::new(ZebraClient::connect(DEFAULT_ZSERV_PATH).await?)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let conf = config::load(&args.config)?;
    setup_tracing_with_fallback(args.daemon);

    let rib = Arc::new(Rib::new());
    let installer = build_installer()?;
    let server = CplaneServer::new(DEFAULT_SOCKET_PATH, rib.clone(), installer, conf.fib_install);
    cplane::serve(server);

    let bgp_conf = conf.bgp()?;
    let sink = build_sink(&conf).await?;
    let neighbor: Ipv4Addr = bgp_conf.peer.neiaddr;
    let peer_daemon = Bgp::new(bgp_conf.asn, bgp_conf.id, neighbor, sink);
    let bgp_handle = bgp::serve(peer_daemon);

    if args.daemon {
        Daemonize::new()
            .pid_file("/var/run/nebura.pid")
            .chown_pid_file(true)
            .working_directory("/")
            .umask(0o027)
            .start()
            .map_err(|e| anyhow::anyhow!("failed to daemonize: {e}"))?;
    }

    tracing::info!(neighbor = %neighbor, asn = bgp_conf.asn, "nebura started");

    bgp_handle.await?;
    Ok(())
}
