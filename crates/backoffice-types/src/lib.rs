pub mod api;
pub mod events;
pub mod models;

pub use events::{EntityKind, EventEnvelope, UPDATES_NAMESPACE, UpdateFrame};
pub use models::{ChatMessage, EntityPatch, PatchError};
