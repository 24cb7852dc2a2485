use chord_node::config::{ChordConfig, DEFAULT_PORT, LOCALHOST};
use chord_node::scheduler;
use chord_node::server::Server;
use chord_node::Node;
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Starts one Chord node: binds its TCP server, optionally joins an
/// existing ring through a bootstrap peer, then runs the maintenance
/// loop until interrupted.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// "ip:port" of an existing node to join through.
    #[arg(short, long)]
    join: Option<String>,

    /// Replication factor (number of successors each key is copied to).
    #[arg(long, default_value_t = 3)]
    replication_factor: usize,

    /// Enable AES-256-CBC encryption of RPC traffic.
    #[arg(long, default_value_t = false)]
    encrypt: bool,

    /// Shared secret used to derive the encryption/signing keys.
    #[arg(long, default_value = "")]
    secret: String,

    /// "ip:port" of a chord-monitor instance to report status to.
    #[arg(long)]
    monitor: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = ChordConfig {
        replication_factor: args.replication_factor,
        encryption_enabled: args.encrypt,
        secret_key: args.secret,
        ..ChordConfig::default()
    };

    let node = Node::new(LOCALHOST, args.port, config.clone());
    log::info!(
        "node starting at {}:{} with id {}",
        std::net::Ipv4Addr::from(node.ip),
        node.port,
        node.id
    );

    match args.join.as_deref() {
        Some(addr) => {
            let bootstrap = parse_bootstrap(addr)?;
            node.join(bootstrap).await?;
        }
        None => node.create_ring(),
    }

    let shutdown = CancellationToken::new();
    scheduler::spawn_all(node.clone(), shutdown.clone());

    if let Some(monitor) = args.monitor.as_deref() {
        let addr: std::net::SocketAddr = monitor
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid monitor address '{monitor}', expected ip:port"))?;
        scheduler::spawn_monitor_report(node.clone(), shutdown.clone(), addr);
    }

    let ctrl_c_node = node.clone();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("received interrupt, leaving ring");
        ctrl_c_node.leave().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctrl_c_shutdown.cancel();
        std::process::exit(0);
    });

    let server = Server::new(node);
    server.run(shutdown).await?;
    Ok(())
}

fn parse_bootstrap(addr: &str) -> anyhow::Result<chord_core::NodeInfo> {
    let socket: std::net::SocketAddrV4 = addr
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid bootstrap address '{addr}', expected ip:port"))?;
    Ok(chord_core::NodeInfo::new(
        chord_core::Id::ZERO,
        socket.ip().octets(),
        socket.port(),
    ))
}
