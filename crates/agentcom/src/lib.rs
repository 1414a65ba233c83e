//! Agentcom - Agent Snapshot Director
//!
//! This crate accepts agent state reports over gRPC, keeps the most recent
//! report in memory, persists it to a single JSON file and serves it back
//! over a small HTTP view.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Lifecycle (AgentCom)                 │
//! │                                                           │
//! │   ┌──────────────────────┐      ┌──────────────────────┐  │
//! │   │  gRPC listener       │      │  HTTP listener       │  │
//! │   │  Report              │      │  GET /lastSnapshot   │  │
//! │   │  ReportStream        │      └──────────┬───────────┘  │
//! │   │  Retrieve (unimpl.)  │                 │              │
//! │   └──────────┬───────────┘                 │              │
//! │              │                             │              │
//! │       ┌──────▼──────┐                      │              │
//! │       │  Auth Gate  │                      │              │
//! │       └──────┬──────┘                      │              │
//! │              │                             │              │
//! │       ┌──────▼─────────────────────────────▼──────┐       │
//! │       │   Snapshot Store (cache slot + file)       │       │
//! │       └────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Both listeners start together and stop together: the first listener
//! failure or termination signal drives a bounded, coordinated shutdown.

pub mod auth;
pub mod config;
pub mod director;
pub mod error;
pub mod lifecycle;
pub mod proto;
pub mod readback;
pub mod snapshot;
pub mod store;

pub use auth::{AuthError, AuthGate};
pub use config::AgentComConfig;
pub use director::{reassemble, DirectorService};
pub use error::{AgentComError, Result};
pub use lifecycle::{shutdown_signal, AgentCom, Completion, ShutdownReason};
pub use readback::ReadBack;
pub use snapshot::{Identity, Snapshot, StoredSnapshot};
pub use store::SnapshotStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default gRPC port
pub const DEFAULT_RPC_PORT: u16 = 8080;

/// Port of the HTTP read-back view
pub const READBACK_PORT: u16 = 3001;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Where the latest accepted snapshot is persisted
pub const DEFAULT_SNAPSHOT_PATH: &str = "/tmp/snapshot.json";

/// Metadata field carrying the caller's credential
pub const DEFAULT_API_KEY_HEADER: &str = "x-ambassador-api-key";

/// Upper bound on shutdown of each listener
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

/// Largest snapshot accepted on either ingestion path
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 64 * 1024 * 1024;
