use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::events::EntityKind;

/// A support-chat message attached to a shipment conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub shipment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

// Partial updates. Every field is optional so a push can carry any subset;
// fields not listed here pass through untouched in the raw payload.
// Timestamps and statuses stay strings; any string the server sends is kept.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentPatch {
    pub id: Option<String>,
    pub code: Option<String>,
    pub status: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub driver_id: Option<String>,
    pub quantity: Option<Number>,
    pub scheduled_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePatch {
    pub id: Option<String>,
    pub name: Option<String>,
    pub driver_id: Option<String>,
    pub shipment_ids: Option<Vec<String>>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPositionPatch {
    pub id: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub recorded_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    pub id: Option<String>,
    pub shipment_id: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePatch {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<String>,
    pub shipment_id: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{entity} payload is not a JSON object")]
    NotAnObject { entity: EntityKind },

    #[error("{entity} payload has a non-string id")]
    InvalidId { entity: EntityKind },

    #[error("malformed {entity} payload: {source}")]
    Malformed {
        entity: EntityKind,
        #[source]
        source: serde_json::Error,
    },
}

/// A payload validated against the shape of its entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPatch {
    Chat(ChatMessagePatch),
    Shipment(ShipmentPatch),
    Rooms(RoomPatch),
    Route(RoutePatch),
    Driver(DriverPositionPatch),
}

impl EntityPatch {
    pub fn decode(entity: EntityKind, payload: &Value) -> Result<Self, PatchError> {
        if !payload.is_object() {
            return Err(PatchError::NotAnObject { entity });
        }
        let malformed = |source| PatchError::Malformed { entity, source };
        let patch = match entity {
            EntityKind::Chat => Self::Chat(ChatMessagePatch::deserialize(payload).map_err(malformed)?),
            EntityKind::Shipment => {
                Self::Shipment(ShipmentPatch::deserialize(payload).map_err(malformed)?)
            }
            EntityKind::Rooms => Self::Rooms(RoomPatch::deserialize(payload).map_err(malformed)?),
            EntityKind::Route => Self::Route(RoutePatch::deserialize(payload).map_err(malformed)?),
            EntityKind::Driver => {
                Self::Driver(DriverPositionPatch::deserialize(payload).map_err(malformed)?)
            }
        };
        Ok(patch)
    }
}
