/// Row types mapping directly to SQLite rows.

pub struct UnseenRow {
    pub scope: String,
    pub item_id: String,
    pub flagged_at: String,
}
