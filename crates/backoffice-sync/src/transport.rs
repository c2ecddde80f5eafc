use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::error::TransportError;

/// Listener invoked with the `data` of every matching event.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Persistent, full-duplex channel to a server namespace. Reconnection,
/// ordering and delivery belong to the implementation.
pub trait Transport: Send + Sync {
    /// Open a connection to `namespace`, authenticated with `token` when given.
    fn connect(
        &self,
        namespace: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

pub trait Connection: Send {
    fn id(&self) -> Uuid;

    /// Register `handler` for `event`. Ignored once disconnected.
    fn on(&mut self, event: &str, handler: EventHandler);

    /// Close the connection and drop every listener. Idempotent.
    fn disconnect(&mut self);
}
