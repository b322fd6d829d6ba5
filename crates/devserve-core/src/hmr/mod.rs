//! Live-update protocol: change events in, update messages out.
//!
//! Provides:
//! - Extension-based classification of filesystem changes
//! - The JSON message grammar spoken to client runtimes
//! - A broadcast channel over all connected clients

pub mod channel;
pub mod dispatch;
pub mod message;

pub use channel::{Connection, ConnectionId, Outbound, UpdateChannel};
pub use dispatch::{classify, ChangeEvent, ChangeKind, UpdateDispatcher};
pub use message::{UpdateEntry, UpdateKind, UpdateMessage};
