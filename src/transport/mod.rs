//! Transport boundary - topic-multiplexed persistent socket

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{Payload, Result};

pub mod packet;
pub mod socketio;

#[cfg(test)]
pub(crate) mod mock;

pub use socketio::{SocketIoDialer, SocketIoTransport};

/// Inbound message callback, invoked from the transport's reader context
pub type Handler = Arc<dyn Fn(Payload) + Send + Sync>;

/// A live, topic-multiplexed connection.
///
/// Methods never block: emits are queued to the writer and handlers run on
/// the reader. Implementations must fail `on`/`emit` once closed.
pub trait Transport: Send + Sync {
    /// Register `handler` for `event`, replacing any previous registration.
    fn on(&self, event: &str, handler: Handler) -> Result<()>;

    /// Queue `payload` for delivery on `event`.
    fn emit(&self, event: &str, payload: &Payload) -> Result<()>;

    /// Release the socket. Further calls to `on`/`emit` fail.
    fn close(&self);
}

/// Opens transports; the seam tests use to inject failures
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn Transport>>;
}
