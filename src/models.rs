/// One linked institution item and its sync state. The orchestrator is
/// the only writer of `cursor`/`last_synced_at`/`status`.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub item_id: String,
    pub institution: Option<String>,
    pub cursor: Option<String>,
    pub last_synced_at: Option<String>,
    pub status: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub pattern: String,
    pub category_id: i64,
    pub confidence: String,
    pub hit_count: i64,
}
