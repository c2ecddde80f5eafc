use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use backoffice_cache::{CacheKey, CacheStore};
use backoffice_types::{EntityKind, EventEnvelope, UPDATES_NAMESPACE};

use crate::error::SyncError;
use crate::merge::apply_default_merge;
use crate::session::Session;
use crate::transport::{Connection, EventHandler, Transport};

/// Caller-supplied replacement for the default merge. Receives the raw
/// payload and owns every cache write for it. Panics are not caught.
pub type UpdateHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Keeps one cache collection in step with `<entity>:update` pushes for as
/// long as it is open. At most one live connection per synchronizer.
pub struct Synchronizer {
    entity: EntityKind,
    cache_key: CacheKey,
    cache: Arc<dyn CacheStore>,
    on_update: Option<UpdateHandler>,
    connection: Option<Box<dyn Connection>>,
    /// `sub` of the session the live connection was opened with.
    identity: Option<String>,
}

impl Synchronizer {
    pub fn new(entity: EntityKind, cache_key: CacheKey, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            entity,
            cache_key,
            cache,
            on_update: None,
            connection: None,
            identity: None,
        }
    }

    pub fn with_handler(mut self, handler: UpdateHandler) -> Self {
        self.on_update = Some(handler);
        self
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Connect and start listening. Any previous connection is closed first.
    ///
    /// Without a session the connection is opened unauthenticated and the
    /// custom handler is not installed; pushes go through the default merge.
    pub fn open(&mut self, transport: &dyn Transport, session: Option<&Session>) -> Result<(), SyncError> {
        self.close();

        let token = session.map(Session::access_token);
        let mut connection = transport
            .connect(UPDATES_NAMESPACE, token)
            .map_err(|source| SyncError::Open {
                entity: self.entity,
                source,
            })?;

        let event = self.entity.update_event();
        connection.on(&event, self.handler(session.is_some()));

        info!(
            "{} synchronizer listening for {} on connection {} ({})",
            self.entity,
            event,
            connection.id(),
            session.map_or("anonymous", Session::identity)
        );
        self.identity = session.map(|s| s.identity().to_string());
        self.connection = Some(connection);
        Ok(())
    }

    /// Follow a session change. Reopens only when the identity differs from
    /// the one the live connection was opened with, or nothing is open.
    pub fn rebind(&mut self, transport: &dyn Transport, session: Option<&Session>) -> Result<(), SyncError> {
        let identity = session.map(Session::identity);
        if self.is_open() && self.identity.as_deref() == identity {
            return Ok(());
        }
        if self.is_open() {
            debug!(
                "{} synchronizer identity changed ({:?} -> {:?})",
                self.entity, self.identity, identity
            );
        }
        self.open(transport, session)
    }

    /// Disconnect and drop all listeners. Safe to call when already closed.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
            info!("{} synchronizer closed connection {}", self.entity, connection.id());
        }
        self.identity = None;
    }

    fn handler(&self, authenticated: bool) -> EventHandler {
        if authenticated {
            if let Some(custom) = &self.on_update {
                return custom.clone();
            }
        }

        let entity = self.entity;
        let cache_key = self.cache_key.clone();
        let cache = self.cache.clone();
        Arc::new(move |payload: Value| {
            let envelope = EventEnvelope::new(entity, payload);
            match apply_default_merge(cache.as_ref(), &cache_key, &envelope) {
                Ok(outcome) => debug!(
                    "{} update merged into {} (per-id: {}, collection: {})",
                    entity, cache_key, outcome.per_id_written, outcome.collection_replaced
                ),
                Err(e) => warn!("dropping {} update: {}", entity, e),
            }
        })
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.close();
    }
}
