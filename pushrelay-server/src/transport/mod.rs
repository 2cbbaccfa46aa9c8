//! Transport layer of the relay server
//!
//! Transports accept client connections, decode notifications and drive them
//! through the shared [`RelayHandle`]. The relay speaks the same HTTP API as
//! the remote notification service, so [`http`] is the only transport.

pub mod http;


use crate::relay::RelayHandle;
use anyhow::Result;
use async_trait::async_trait;

/// Common interface for transport implementations
#[async_trait]
pub trait Transport {
    /// Start the transport server
    ///
    /// Binds the configured address and serves requests with the provided
    /// relay until an error occurs or the server shuts down.
    async fn start(self, relay: RelayHandle) -> Result<()>;
}
