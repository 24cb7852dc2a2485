//! The Chord node: identifier-space topology, replicated key storage,
//! the TCP wire-protocol server, and the background maintenance tasks
//! that keep the ring correct as peers join, leave and fail.

pub mod client;
pub mod config;
pub mod datastore;
pub mod failure_detector;
pub mod finger_table;
pub mod node;
pub mod scheduler;
pub mod server;
pub mod topology;

pub use client::{LocalClient, NodeClient, NodeStatus, RemoteClient};
pub use config::ChordConfig;
pub use node::Node;
