use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use backoffice_types::EntityKind;

/// Local "unseen" flags for items that arrived while the viewer was looking
/// elsewhere, scoped by entity kind (a chat conversation, a new room).
pub trait UnseenStore: Send + Sync {
    fn mark_unseen(&self, scope: EntityKind, item_id: &str) -> Result<()>;
    fn mark_seen(&self, scope: EntityKind, item_id: &str) -> Result<()>;
    fn is_unseen(&self, scope: EntityKind, item_id: &str) -> Result<bool>;
    /// Flagged ids in `scope`, sorted.
    fn unseen(&self, scope: EntityKind) -> Result<Vec<String>>;
}

/// Volatile flags, lost on restart.
#[derive(Default)]
pub struct MemoryUnseen {
    flags: Mutex<BTreeSet<(EntityKind, String)>>,
}

impl MemoryUnseen {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> std::sync::MutexGuard<'_, BTreeSet<(EntityKind, String)>> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UnseenStore for MemoryUnseen {
    fn mark_unseen(&self, scope: EntityKind, item_id: &str) -> Result<()> {
        self.flags().insert((scope, item_id.to_string()));
        Ok(())
    }

    fn mark_seen(&self, scope: EntityKind, item_id: &str) -> Result<()> {
        self.flags().remove(&(scope, item_id.to_string()));
        Ok(())
    }

    fn is_unseen(&self, scope: EntityKind, item_id: &str) -> Result<bool> {
        Ok(self.flags().contains(&(scope, item_id.to_string())))
    }

    fn unseen(&self, scope: EntityKind) -> Result<Vec<String>> {
        Ok(self
            .flags()
            .iter()
            .filter(|(s, _)| *s == scope)
            .map(|(_, id)| id.clone())
            .collect())
    }
}
