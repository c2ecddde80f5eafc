//! Custom update handlers for entities that need append semantics, which the
//! default merge deliberately lacks.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use backoffice_cache::merge::{record_id, upsert_by_id};
use backoffice_cache::{CacheKey, CacheStore};
use backoffice_types::models::RoomPatch;
use backoffice_types::{ChatMessage, EntityKind};

use crate::synchronizer::UpdateHandler;
use crate::unseen::UnseenStore;

/// Appends new chat messages to `[...chat_key, shipmentId]` and replaces
/// edited or soft-deleted ones in place.
pub struct ChatMessageHandler {
    cache: Arc<dyn CacheStore>,
    chat_key: CacheKey,
    unseen: Option<(Arc<dyn UnseenStore>, String)>,
}

impl ChatMessageHandler {
    pub fn new(cache: Arc<dyn CacheStore>, chat_key: CacheKey) -> Self {
        Self {
            cache,
            chat_key,
            unseen: None,
        }
    }

    /// Flag the conversation unseen when someone other than `viewer_id` writes.
    pub fn flag_unseen(mut self, store: Arc<dyn UnseenStore>, viewer_id: impl Into<String>) -> Self {
        self.unseen = Some((store, viewer_id.into()));
        self
    }

    pub fn handle(&self, payload: Value) {
        let message = match ChatMessage::deserialize(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping chat update: {}", e);
                return;
            }
        };

        let key = self.chat_key.child(message.shipment_id.as_str());
        self.cache
            .set_query_data(&key, &mut |messages| Some(upsert_by_id(messages, &payload)));
        debug!("chat message {} stored under {}", message.id, key);

        if let Some((store, viewer_id)) = &self.unseen {
            if message.sender_id != *viewer_id {
                if let Err(e) = store.mark_unseen(EntityKind::Chat, &message.shipment_id) {
                    warn!("failed to flag chat {} unseen: {}", message.shipment_id, e);
                }
            }
        }
    }

    pub fn into_handler(self) -> UpdateHandler {
        let handler = Arc::new(self);
        Arc::new(move |payload: Value| handler.handle(payload))
    }
}

/// Adds newly created support rooms to the rooms collection, attaching the
/// parent shipment found in the cached shipments collection.
pub struct RoomCreatedHandler {
    cache: Arc<dyn CacheStore>,
    rooms_key: CacheKey,
    shipments_key: CacheKey,
    unseen: Option<Arc<dyn UnseenStore>>,
}

impl RoomCreatedHandler {
    pub fn new(cache: Arc<dyn CacheStore>, rooms_key: CacheKey, shipments_key: CacheKey) -> Self {
        Self {
            cache,
            rooms_key,
            shipments_key,
            unseen: None,
        }
    }

    pub fn flag_unseen(mut self, store: Arc<dyn UnseenStore>) -> Self {
        self.unseen = Some(store);
        self
    }

    pub fn handle(&self, payload: Value) {
        let patch = match RoomPatch::deserialize(&payload) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("dropping room update: {}", e);
                return;
            }
        };
        let (Some(room_id), Value::Object(fields)) = (patch.id.as_deref(), &payload) else {
            warn!("dropping room update without id");
            return;
        };

        let mut room = fields.clone();
        if let Some(shipment_id) = patch.shipment_id.as_deref() {
            match self.find_shipment(shipment_id) {
                Some(shipment) => {
                    room.insert("shipment".to_string(), shipment);
                }
                None => debug!("room {} refers to uncached shipment {}", room_id, shipment_id),
            }
        }
        let room = Value::Object(room);

        self.cache
            .set_query_data(&self.rooms_key, &mut |rooms| Some(upsert_by_id(rooms, &room)));

        if let Some(store) = &self.unseen {
            if let Err(e) = store.mark_unseen(EntityKind::Rooms, room_id) {
                warn!("failed to flag room {} unseen: {}", room_id, e);
            }
        }
    }

    fn find_shipment(&self, shipment_id: &str) -> Option<Value> {
        let shipments = self.cache.get_query_data(&self.shipments_key)?;
        shipments
            .as_array()?
            .iter()
            .find(|shipment| record_id(shipment) == Some(shipment_id))
            .cloned()
    }

    pub fn into_handler(self) -> UpdateHandler {
        let handler = Arc::new(self);
        Arc::new(move |payload: Value| handler.handle(payload))
    }
}
