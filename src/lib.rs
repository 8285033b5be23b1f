//! SmartOps backend.
//!
//! A single listener serves both a WebSocket push channel (`/ws`) and a small
//! JSON HTTP API (`/api/contact`, `/api/health`, `/api/monitoring`). Every two
//! seconds a synthetic [`metrics::MetricsSample`] is broadcast to all open
//! sockets; chat queries sent over the socket are answered by a keyword
//! [`responder`].

pub mod cli;
pub mod config;
pub mod contact;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod monitoring;
pub mod protocol;
pub mod responder;
pub mod ticker;
pub mod web;

pub use config::ServerConfig;
pub use error::{Result, SmartOpsError};
pub use hub::Hub;
pub use metrics::MetricsSample;
pub use monitoring::MonitoringSnapshot;
pub use web::{serve, AppState};
