use crate::watch::WatchError;
use thiserror::Error;

/// Errors starting or running the dev server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server is already listening on {addr}")]
    AlreadyListening { addr: std::net::SocketAddr },

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
