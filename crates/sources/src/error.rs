use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised by message sources.
///
/// Anything sent on a source's fatal-error channel tears down the whole bridge.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{name} does not support sending messages")]
    SendUnsupported { name: String },

    #[error("{name}: failed to bind {addr}: {source}")]
    Bind {
        name: String,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: server on {addr} stopped: {source}")]
    Serve {
        name: String,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: event channel is closed")]
    ChannelClosed { name: String },

    #[error("{name}: already started")]
    AlreadyStarted { name: String },
}
