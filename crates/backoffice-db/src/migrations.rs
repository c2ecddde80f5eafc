use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS unseen (
            scope       TEXT NOT NULL,
            item_id     TEXT NOT NULL,
            flagged_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope, item_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
