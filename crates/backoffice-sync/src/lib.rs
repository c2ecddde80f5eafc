//! Real-time cache synchronization for the back-office dashboard.
//!
//! A [`Synchronizer`] owns one connection to the updates namespace for one
//! entity kind and reconciles every `<entity>:update` push into the query
//! cache, either through the default upsert-by-id merge or through a custom
//! [`UpdateHandler`].

pub mod error;
pub mod handlers;
pub mod memory;
pub mod merge;
pub mod session;
pub mod synchronizer;
pub mod transport;
pub mod unseen;
pub mod websocket;

pub use error::{SessionError, SyncError, TransportError};
pub use memory::MemoryTransport;
pub use merge::{MergeOutcome, apply_default_merge};
pub use session::Session;
pub use synchronizer::{Synchronizer, UpdateHandler};
pub use transport::{Connection, EventHandler, Transport};
pub use unseen::{MemoryUnseen, UnseenStore};
pub use websocket::WebSocketTransport;
