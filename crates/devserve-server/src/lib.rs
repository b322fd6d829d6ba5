#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::type_complexity)]

//! HTTP front end for devserve.
//!
//! The server provides:
//! - Per-request module transformation through the plugin container
//! - Static files, SPA history fallback and HTML entry points
//! - A WebSocket endpoint pushing live-update messages
//! - A file watcher feeding the update dispatcher
//!
//! ## Request chain
//! request log → transform → HTML → static files → history fallback → 404.

pub mod client;
mod error;
pub mod fallback;
mod middleware;
mod server;
pub mod watch;
mod ws;

pub use error::ServerError;
pub use fallback::HistoryFallback;
pub use server::DevServer;
pub use watch::{FileWatcher, WatchError};

/// URL of the browser client runtime.
pub const CLIENT_PATH: &str = "/@devserve/client";

/// URL of the WebSocket update endpoint.
pub const WS_PATH: &str = "/@devserve/ws";
