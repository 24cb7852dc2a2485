//! A CLI for talking to a running `chord_node` over the same wire
//! protocol the nodes use among themselves: it builds a `RemoteClient`
//! exactly as a node would when dialing a peer, so there is no separate
//! client protocol to keep in sync with the ring's own.

use chord_core::security::MessageSecurity;
use chord_core::{Id, NodeInfo};
use chord_node::{ChordConfig, NodeClient, RemoteClient};
use clap::{Parser, Subcommand};
use std::net::SocketAddrV4;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// "ip:port" of the node to talk to.
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    node: String,

    /// Shared secret for signing/encrypting traffic (must match the node's).
    #[arg(long, default_value = "")]
    secret: String,

    /// Speak unsigned, unencrypted plaintext (the node must be started
    /// with both signature and encryption disabled to match).
    #[arg(long, default_value_t = false)]
    plain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a key/value pair in the ring.
    Put { key: String, value: String },
    /// Fetch a value from the ring.
    Get { key: String },
    /// Ask the node who owns an identifier (hex-encoded, 64 chars).
    FindSuccessor { id_hex: String },
    /// Print the node's ring position and local key count.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let target: SocketAddrV4 = cli
        .node
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid node address '{}', expected ip:port", cli.node))?;
    let peer = NodeInfo::new(Id::ZERO, (*target.ip()).octets(), target.port());
    let local = NodeInfo::new(Id::ZERO, [127, 0, 0, 1], 0);
    // `chord_node` defaults to `signature_enabled = true`, so plaintext is
    // the opt-in case here too, not the default.
    let security = if cli.plain {
        None
    } else {
        Some(Arc::new(MessageSecurity::new(&cli.secret)))
    };
    let client = RemoteClient::new(peer, local, ChordConfig::default(), security);

    match cli.command {
        Command::Put { key, value } => match client.store_key(key, value).await {
            Ok(true) => println!("stored"),
            Ok(false) => println!("store failed"),
            Err(e) => println!("error: {e}"),
        },
        Command::Get { key } => match client.get_key(key).await {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => println!("(not found)"),
            Err(e) => println!("error: {e}"),
        },
        Command::FindSuccessor { id_hex } => {
            let target_id = Id::from_hex(&id_hex)
                .map_err(|_| anyhow::anyhow!("invalid id '{id_hex}', expected 64 hex chars"))?;
            match client.find_successor(target_id, 0).await {
                Ok(found) => println!("{} at {}", found.id, found.addr()),
                Err(e) => println!("error: {e}"),
            }
        }
        Command::Status => match client.get_status().await {
            Ok(status) => {
                println!("id: {}", status.id);
                println!("successor: {:?}", status.successor);
                println!("predecessor: {:?}", status.predecessor);
                println!("keys held: {}", status.keys_count);
                for key in &status.keys {
                    println!("  {key}");
                }
            }
            Err(e) => println!("error: {e}"),
        },
    }
    Ok(())
}
