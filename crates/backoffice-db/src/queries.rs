use crate::Database;
use crate::models::UnseenRow;
use anyhow::Result;

impl Database {
    // -- Unseen flags --

    /// Flag an item. Re-flagging keeps the original `flagged_at`.
    pub fn insert_unseen(&self, scope: &str, item_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO unseen (scope, item_id) VALUES (?1, ?2)",
                (scope, item_id),
            )?;
            Ok(())
        })
    }

    pub fn delete_unseen(&self, scope: &str, item_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM unseen WHERE scope = ?1 AND item_id = ?2",
                (scope, item_id),
            )?;
            Ok(removed > 0)
        })
    }

    pub fn unseen_exists(&self, scope: &str, item_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM unseen WHERE scope = ?1 AND item_id = ?2",
                (scope, item_id),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn list_unseen(&self, scope: &str) -> Result<Vec<UnseenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT scope, item_id, flagged_at FROM unseen WHERE scope = ?1 ORDER BY item_id",
            )?;

            let rows = stmt
                .query_map([scope], |row| {
                    Ok(UnseenRow {
                        scope: row.get(0)?,
                        item_id: row.get(1)?,
                        flagged_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
