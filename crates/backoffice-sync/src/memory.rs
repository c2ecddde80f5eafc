//! In-process transport. Events are delivered synchronously on the caller's
//! thread, which makes delivery order and connection lifecycle observable in
//! tests without a socket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::{Connection, EventHandler, Transport};

#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    /// Live connections in the order they were opened.
    connections: Vec<LiveConnection>,
    last_token: Option<String>,
    refuse: bool,
}

struct LiveConnection {
    id: Uuid,
    namespace: String,
    token: Option<String>,
    listeners: Vec<(String, EventHandler)>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every live listener of `event`. Returns how many
    /// listeners ran.
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        // Handlers run outside the lock so they may touch the transport.
        let handlers: Vec<EventHandler> = self
            .lock()
            .connections
            .iter()
            .flat_map(|conn| conn.listeners.iter())
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }

    /// Make subsequent `connect` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse = refuse;
    }

    pub fn live_connections(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock()
            .connections
            .iter()
            .flat_map(|conn| conn.listeners.iter())
            .filter(|(name, _)| name == event)
            .count()
    }

    /// Token presented by the most recent connection.
    pub fn last_token(&self) -> Option<String> {
        self.lock().last_token.clone()
    }

    /// Tokens of every live connection, oldest first.
    pub fn live_tokens(&self) -> Vec<Option<String>> {
        self.lock()
            .connections
            .iter()
            .map(|conn| conn.token.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn connect(
        &self,
        namespace: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let mut inner = self.lock();
        if inner.refuse {
            return Err(TransportError::Refused {
                namespace: namespace.to_string(),
            });
        }

        let id = Uuid::new_v4();
        inner.last_token = token.map(str::to_string);
        inner.connections.push(LiveConnection {
            id,
            namespace: namespace.to_string(),
            token: token.map(str::to_string),
            listeners: Vec::new(),
        });
        debug!("memory connection {} opened on {}", id, namespace);

        Ok(Box::new(MemoryConnection {
            id,
            transport: self.clone(),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    id: Uuid,
    transport: MemoryTransport,
    closed: bool,
}

impl Connection for MemoryConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on(&mut self, event: &str, handler: EventHandler) {
        if self.closed {
            return;
        }
        let mut inner = self.transport.lock();
        if let Some(conn) = inner.connections.iter_mut().find(|c| c.id == self.id) {
            conn.listeners.push((event.to_string(), handler));
        }
    }

    fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut inner = self.transport.lock();
        if let Some(pos) = inner.connections.iter().position(|c| c.id == self.id) {
            let conn = inner.connections.remove(pos);
            debug!("memory connection {} closed on {}", conn.id, conn.namespace);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
