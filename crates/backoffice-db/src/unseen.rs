use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use backoffice_sync::UnseenStore;
use backoffice_types::EntityKind;

use crate::Database;

/// Unseen flags persisted in SQLite so they survive restarts.
#[derive(Clone)]
pub struct SqliteUnseen {
    db: Arc<Database>,
}

impl SqliteUnseen {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl UnseenStore for SqliteUnseen {
    fn mark_unseen(&self, scope: EntityKind, item_id: &str) -> Result<()> {
        debug!("flagging {} {} unseen", scope, item_id);
        self.db.insert_unseen(scope.as_str(), item_id)
    }

    fn mark_seen(&self, scope: EntityKind, item_id: &str) -> Result<()> {
        self.db.delete_unseen(scope.as_str(), item_id)?;
        Ok(())
    }

    fn is_unseen(&self, scope: EntityKind, item_id: &str) -> Result<bool> {
        self.db.unseen_exists(scope.as_str(), item_id)
    }

    fn unseen(&self, scope: EntityKind) -> Result<Vec<String>> {
        Ok(self
            .db
            .list_unseen(scope.as_str())?
            .into_iter()
            .map(|row| row.item_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteUnseen {
        SqliteUnseen::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn flag_and_clear() {
        let store = store();
        store.mark_unseen(EntityKind::Rooms, "r2").unwrap();
        store.mark_unseen(EntityKind::Rooms, "r1").unwrap();
        store.mark_unseen(EntityKind::Rooms, "r1").unwrap();
        store.mark_unseen(EntityKind::Chat, "S1").unwrap();

        assert_eq!(store.unseen(EntityKind::Rooms).unwrap(), vec!["r1", "r2"]);
        assert!(store.is_unseen(EntityKind::Chat, "S1").unwrap());
        assert!(!store.is_unseen(EntityKind::Rooms, "S1").unwrap());

        store.mark_seen(EntityKind::Rooms, "r1").unwrap();
        assert_eq!(store.unseen(EntityKind::Rooms).unwrap(), vec!["r2"]);
    }

    #[test]
    fn flags_survive_reopen() {
        let dir = std::env::temp_dir().join(format!("backoffice_unseen_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.db");

        {
            let store = SqliteUnseen::new(Arc::new(Database::open(&path).unwrap()));
            store.mark_unseen(EntityKind::Chat, "S7").unwrap();
        }

        let store = SqliteUnseen::new(Arc::new(Database::open(&path).unwrap()));
        assert!(store.is_unseen(EntityKind::Chat, "S7").unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rows_record_when_they_were_flagged() {
        let db = Database::open_in_memory().unwrap();
        db.insert_unseen("rooms", "r1").unwrap();
        let rows = db.list_unseen("rooms").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scope, "rooms");
        assert!(!rows[0].flagged_at.is_empty());
        assert!(db.delete_unseen("rooms", "r1").unwrap());
        assert!(!db.delete_unseen("rooms", "r1").unwrap());
    }
}
