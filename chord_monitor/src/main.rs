//! A dashboard process for a running ring: nodes push their `GET_STATUS`
//! snapshot here over the same wire protocol they speak to each other
//! (the `REPORT_STATE` message, fire-and-forget), and this binary serves
//! the aggregated view as JSON over HTTP, plus a small operator API that
//! routes put/get through the ring and spawns new node processes —
//! mirroring the teacher's own `chord_monitor` dashboard, rebuilt against
//! `RemoteClient` and `std::process::Command` instead of its gRPC client.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chord_core::security::MessageSecurity;
use chord_core::wire::{read_message, request_type};
use chord_core::{Id, NodeInfo};
use chord_node::{ChordConfig, NodeClient, NodeStatus, RemoteClient};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tower_http::cors::CorsLayer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the wire-protocol listener (for REPORT_STATE) binds to.
    #[arg(long, default_value = "0.0.0.0:6000")]
    listen: SocketAddr,

    /// Address the HTTP dashboard API binds to.
    #[arg(long, default_value = "0.0.0.0:6001")]
    http: SocketAddr,

    /// First port handed out to nodes spawned via `/api/add_node`.
    #[arg(long, default_value_t = 5010)]
    spawn_base_port: u16,
}

struct MonitorState {
    nodes: HashMap<Id, NodeStatus>,
    next_port: u16,
    listen: SocketAddr,
}

type SharedState = Arc<Mutex<MonitorState>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let state: SharedState = Arc::new(Mutex::new(MonitorState {
        nodes: HashMap::new(),
        next_port: args.spawn_base_port,
        listen: args.listen,
    }));

    let report_state = state.clone();
    let report_listener = TcpListener::bind(args.listen).await?;
    log::info!("monitor listening for node reports at {}", args.listen);
    tokio::spawn(async move {
        loop {
            let (stream, peer) = match report_listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("accept error: {e}");
                    continue;
                }
            };
            let state = report_state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_report(state, stream).await {
                    log::debug!("report from {peer} failed: {e}");
                }
            });
        }
    });

    let app = Router::new()
        .route("/api/state", get(get_state))
        .route("/api/put", post(handle_put))
        .route("/api/get", post(handle_get))
        .route("/api/add_node", post(handle_add_node))
        .layer(CorsLayer::permissive())
        .with_state(state);
    let listener = TcpListener::bind(args.http).await?;
    log::info!("monitor HTTP dashboard listening at {}", args.http);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_report(state: SharedState, mut stream: TcpStream) -> anyhow::Result<()> {
    let message = read_message(&mut stream, None).await?;
    if message.kind != request_type::REPORT_STATE {
        anyhow::bail!("unexpected message type: {}", message.kind);
    }
    let status: NodeStatus = serde_json::from_value(message.payload)?;
    log::info!("received state from node {}", status.id);
    state.lock().unwrap().nodes.insert(status.id, status);
    Ok(())
}

async fn get_state(State(state): State<SharedState>) -> Json<Vec<NodeStatus>> {
    let nodes: Vec<NodeStatus> = state.lock().unwrap().nodes.values().cloned().collect();
    Json(nodes)
}

/// Any node the monitor has heard a report from can be used as an entry
/// point: the ring's own routing takes it from there.
fn any_known_node(state: &SharedState) -> Option<NodeInfo> {
    let guard = state.lock().unwrap();
    let status = guard.nodes.values().next()?;
    Some(NodeInfo::new(status.id, status.ip, status.port))
}

fn client_for(peer: NodeInfo) -> RemoteClient {
    let local = NodeInfo::new(Id::ZERO, [127, 0, 0, 1], 0);
    // Nodes reporting to this monitor default to `ChordConfig::default()`,
    // which signs (but does not encrypt) traffic; the monitor talks to
    // them the same way a `chord_client` invocation would.
    let security = Some(Arc::new(MessageSecurity::new("")));
    RemoteClient::new(peer, local, ChordConfig::default(), security)
}

#[derive(Deserialize)]
struct ApiPutRequest {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct ApiStatusResponse {
    success: bool,
    message: String,
}

async fn handle_put(
    State(state): State<SharedState>,
    Json(payload): Json<ApiPutRequest>,
) -> Json<ApiStatusResponse> {
    let Some(node) = any_known_node(&state) else {
        return Json(ApiStatusResponse {
            success: false,
            message: "no nodes available".into(),
        });
    };
    match client_for(node).store_key(payload.key, payload.value).await {
        Ok(true) => Json(ApiStatusResponse {
            success: true,
            message: "put successful".into(),
        }),
        Ok(false) => Json(ApiStatusResponse {
            success: false,
            message: "put failed".into(),
        }),
        Err(e) => Json(ApiStatusResponse {
            success: false,
            message: format!("rpc error: {e}"),
        }),
    }
}

#[derive(Deserialize)]
struct ApiGetRequest {
    key: String,
}

#[derive(Serialize)]
struct ApiGetResponse {
    found: bool,
    value: String,
}

async fn handle_get(
    State(state): State<SharedState>,
    Json(payload): Json<ApiGetRequest>,
) -> Json<ApiGetResponse> {
    let Some(node) = any_known_node(&state) else {
        return Json(ApiGetResponse {
            found: false,
            value: "no nodes available".into(),
        });
    };
    match client_for(node).get_key(payload.key).await {
        Ok(Some(value)) => Json(ApiGetResponse { found: true, value }),
        Ok(None) => Json(ApiGetResponse {
            found: false,
            value: String::new(),
        }),
        Err(e) => Json(ApiGetResponse {
            found: false,
            value: format!("rpc error: {e}"),
        }),
    }
}

/// Spawns a new `chord_node` process, joined through an already-known
/// node if the ring isn't empty, and pointed back at this monitor.
async fn handle_add_node(State(state): State<SharedState>) -> Json<ApiStatusResponse> {
    let (port, join_addr, monitor_addr) = {
        let mut guard = state.lock().unwrap();
        let port = guard.next_port;
        guard.next_port += 1;
        let join_addr = guard.nodes.values().next().map(|n| format!("127.0.0.1:{}", n.port));
        (port, join_addr, guard.listen)
    };

    let mut cmd = Command::new("cargo");
    cmd.arg("run")
        .arg("--bin")
        .arg("chord_node")
        .arg("--")
        .arg("--port")
        .arg(port.to_string())
        .arg("--monitor")
        .arg(monitor_addr.to_string());
    if let Some(join) = join_addr {
        cmd.arg("--join").arg(join);
    }

    match cmd.spawn() {
        Ok(_) => Json(ApiStatusResponse {
            success: true,
            message: format!("spawned node on port {port}"),
        }),
        Err(e) => Json(ApiStatusResponse {
            success: false,
            message: format!("failed to spawn node: {e}"),
        }),
    }
}
