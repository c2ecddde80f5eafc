use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Namespace every back-office update connection is scoped to.
pub const UPDATES_NAMESPACE: &str = "/backoffice-updates";

/// Category of a server-pushed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Chat,
    Shipment,
    Rooms,
    Route,
    Driver,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Chat,
        EntityKind::Shipment,
        EntityKind::Rooms,
        EntityKind::Route,
        EntityKind::Driver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Shipment => "shipment",
            Self::Rooms => "rooms",
            Self::Route => "route",
            Self::Driver => "driver",
        }
    }

    /// Event name the server emits for this entity, e.g. `shipment:update`.
    pub fn update_event(&self) -> String {
        format!("{}:update", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity kind '{0}'")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEntityKind(s.to_string()))
    }
}

/// A single update received from the transport. Consumed exactly once.
/// Built from every pushed payload before the default merge reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub entity: EntityKind,
    /// `None` when the payload carries no string `id`.
    pub id: Option<String>,
    pub payload: Value,
}

impl EventEnvelope {
    pub fn new(entity: EntityKind, payload: Value) -> Self {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            entity,
            id,
            payload,
        }
    }
}

/// Text frame exchanged on the updates namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl UpdateFrame {
    /// Entity kind encoded in the event name, if it is an `<entity>:update` event.
    pub fn entity(&self) -> Option<EntityKind> {
        self.event
            .strip_suffix(":update")
            .and_then(|kind| kind.parse().ok())
    }
}
