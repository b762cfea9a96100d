use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use chrono::Utc;
use rusqlite::Connection;

use crate::classifier::{classify, load_rules, load_taxonomy};
use crate::error::{Result, TallyError};
use crate::models::Item;
use crate::policy::SyncPolicy;
use crate::provider::{LedgerClient, RemoteTxn, RemovedTxn};
use crate::writer::{apply_batch, ClassifiedTxn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunStatus {
    /// Feed drained to the end.
    Completed,
    /// A safety cap stopped the run early; more data is pending upstream.
    Capped,
    /// Too soon since the last run; nothing was fetched or written.
    Cooldown,
    /// A fetch or write failed; progress up to the failure is kept.
    Failed,
}

/// Result of one sync invocation. Ephemeral: later runs resume from the
/// persisted item row, never from this value.
#[derive(Debug)]
pub struct SyncOutcome {
    pub item_id: String,
    pub status: RunStatus,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub pages: usize,
    pub failed_chunks: usize,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn empty(item_id: &str, status: RunStatus) -> Self {
        Self {
            item_id: item_id.to_string(),
            status,
            added: 0,
            modified: 0,
            removed: 0,
            pages: 0,
            failed_chunks: 0,
            error: None,
        }
    }
}

// One run per item at a time, enforced rather than advisory.
static ACTIVE_ITEMS: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

#[derive(Debug)]
struct RunGuard {
    item_id: String,
}

impl RunGuard {
    fn acquire(item_id: &str) -> Result<Self> {
        let active = ACTIVE_ITEMS.get_or_init(|| Mutex::new(HashSet::new()));
        let mut set = active.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(item_id.to_string()) {
            return Err(TallyError::SyncInProgress(item_id.to_string()));
        }
        Ok(Self { item_id: item_id.to_string() })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let active = ACTIVE_ITEMS.get_or_init(|| Mutex::new(HashSet::new()));
        let mut set = active.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.item_id);
    }
}

fn load_item(conn: &Connection, item_id: &str) -> Result<Item> {
    conn.query_row(
        "SELECT id, item_id, institution, cursor, last_synced_at, status \
         FROM items WHERE item_id = ?1",
        [item_id],
        |row| {
            Ok(Item {
                id: row.get(0)?,
                item_id: row.get(1)?,
                institution: row.get(2)?,
                cursor: row.get(3)?,
                last_synced_at: row.get(4)?,
                status: row.get(5)?,
            })
        },
    )
    .map_err(|_| TallyError::UnknownItem(item_id.to_string()))
}

fn persist_state(conn: &Connection, item_id: &str, cursor: Option<&str>, status: &str) -> Result<()> {
    conn.execute(
        "UPDATE items SET cursor = ?2, last_synced_at = ?3, status = ?4 WHERE item_id = ?1",
        rusqlite::params![item_id, cursor, Utc::now().to_rfc3339(), status],
    )?;
    Ok(())
}

/// Run one sync for one linked item.
///
/// Cooldown-rejected runs return immediately without provider calls or
/// writes and leave the item row untouched. Otherwise pages are fetched in
/// provider cursor order until the feed drains, a safety cap trips, or a
/// fetch fails; whatever was fully received is classified, written, and its
/// cursor persisted. Capping and failure bound a run; they never discard
/// acknowledged progress.
pub fn sync_item(
    conn: &Connection,
    client: &dyn LedgerClient,
    access_token: &str,
    item_id: &str,
    policy: &SyncPolicy,
) -> Result<SyncOutcome> {
    let _guard = RunGuard::acquire(item_id)?;
    let item = load_item(conn, item_id)?;

    if policy
        .cooldown_remaining(item.last_synced_at.as_deref(), Utc::now())
        .is_some()
    {
        return Ok(SyncOutcome::empty(item_id, RunStatus::Cooldown));
    }

    let mut added: Vec<RemoteTxn> = Vec::new();
    let mut modified: Vec<RemoteTxn> = Vec::new();
    let mut removed: Vec<RemovedTxn> = Vec::new();
    let mut cursor = item.cursor.clone();
    let mut pages = 0usize;
    let mut capped = false;
    let mut fetch_error: Option<String> = None;

    loop {
        match client.fetch_page(access_token, cursor.as_deref()) {
            Ok(page) => {
                pages += 1;
                added.extend(page.added);
                modified.extend(page.modified);
                removed.extend(page.removed);
                // The cursor only ever advances past fully received pages.
                cursor = Some(page.next_cursor);
                if !page.has_more {
                    break;
                }
                if policy.capped(pages, added.len() + modified.len()) {
                    capped = true;
                    break;
                }
            }
            Err(e) => {
                fetch_error = Some(e.to_string());
                break;
            }
        }
    }

    // Classify the additions. Modified deltas are not classified: the
    // writer leaves their category alone.
    let rules = load_rules(conn)?;
    let taxonomy = load_taxonomy(conn)?;
    let classified: Vec<ClassifiedTxn> = added
        .into_iter()
        .map(|txn| {
            let classification = classify(
                txn.merchant_name.as_deref(),
                &txn.name,
                txn.category_code.as_deref(),
                &rules,
                &taxonomy,
            );
            ClassifiedTxn { txn, classification }
        })
        .collect();

    let batch = match apply_batch(conn, item.id, &classified, &modified, &removed) {
        Ok(batch) => batch,
        Err(e) => {
            // Nothing committed; keep the old cursor so the next run
            // re-fetches the same pages.
            persist_state(conn, item_id, item.cursor.as_deref(), "error")?;
            let mut outcome = SyncOutcome::empty(item_id, RunStatus::Failed);
            outcome.pages = pages;
            outcome.error = Some(e.to_string());
            return Ok(outcome);
        }
    };

    let status = match &fetch_error {
        Some(_) => RunStatus::Failed,
        None if capped => RunStatus::Capped,
        None => RunStatus::Completed,
    };
    let item_status = if status == RunStatus::Failed { "error" } else { "active" };
    persist_state(conn, item_id, cursor.as_deref(), item_status)?;

    Ok(SyncOutcome {
        item_id: item_id.to_string(),
        status,
        added: batch.added,
        modified: batch.modified,
        removed: batch.removed,
        pages,
        failed_chunks: batch.failed_chunks,
        error: fetch_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::db::{category_id_by_name, get_connection, init_db};
    use crate::provider::TxnPage;

    // Each test links its own uniquely named item: the run guard is
    // process-global and tests run in parallel.
    fn test_db(item_id: &str) -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        conn.execute("INSERT INTO items (item_id) VALUES (?1)", [item_id]).unwrap();
        (dir, conn)
    }

    fn remote_txn(id: &str, name: &str) -> RemoteTxn {
        RemoteTxn {
            transaction_id: id.to_string(),
            account_id: "acct-ext-1".to_string(),
            amount: 10.0,
            name: name.to_string(),
            merchant_name: Some(name.to_string()),
            date: "2026-07-01".to_string(),
            pending: false,
            category_code: Some("FOOD_AND_DRINK".to_string()),
        }
    }

    fn page(added: Vec<RemoteTxn>, next_cursor: &str, has_more: bool) -> TxnPage {
        TxnPage {
            added,
            modified: vec![],
            removed: vec![],
            next_cursor: next_cursor.to_string(),
            has_more,
        }
    }

    /// Plays back a fixed page script and records what it was asked for.
    struct ScriptedClient {
        pages: RefCell<Vec<Result<TxnPage>>>,
        calls: Cell<usize>,
        cursors_seen: RefCell<Vec<Option<String>>>,
    }

    impl ScriptedClient {
        fn new(pages: Vec<Result<TxnPage>>) -> Self {
            Self {
                pages: RefCell::new(pages),
                calls: Cell::new(0),
                cursors_seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl LedgerClient for ScriptedClient {
        fn fetch_page(&self, _access_token: &str, cursor: Option<&str>) -> Result<TxnPage> {
            self.calls.set(self.calls.get() + 1);
            self.cursors_seen.borrow_mut().push(cursor.map(str::to_string));
            let mut pages = self.pages.borrow_mut();
            if pages.is_empty() {
                return Err(TallyError::Provider("script exhausted".to_string()));
            }
            pages.remove(0)
        }
    }

    fn stored_cursor(conn: &Connection, item_id: &str) -> Option<String> {
        conn.query_row("SELECT cursor FROM items WHERE item_id = ?1", [item_id], |r| r.get(0)).unwrap()
    }

    fn txn_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_full_sync_drains_feed() {
        let (_dir, conn) = test_db("item-full");
        let client = ScriptedClient::new(vec![
            Ok(page(vec![remote_txn("t1", "CAFE A")], "c1", true)),
            Ok(page(vec![remote_txn("t2", "CAFE B")], "c2", false)),
        ]);
        let outcome = sync_item(&conn, &client, "tok", "item-full", &SyncPolicy::default()).unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.added, 2);
        assert_eq!(stored_cursor(&conn, "item-full").as_deref(), Some("c2"));
        assert_eq!(txn_count(&conn), 2);
        // First call starts from scratch, second resumes from page 1's cursor.
        assert_eq!(*client.cursors_seen.borrow(), vec![None, Some("c1".to_string())]);

        // Taxonomy fallback kicked in for the provider code.
        let dining = category_id_by_name(&conn, "Dining & Drinks").unwrap();
        let cat: Option<i64> = conn.query_row(
            "SELECT category_id FROM transactions WHERE external_id = 't1'", [], |r| r.get(0),
        ).unwrap();
        assert_eq!(cat, Some(dining));
    }

    #[test]
    fn test_page_cap_keeps_progress_and_cursor() {
        // 5 pages upstream, capped at 2: pages 1-2 written, cursor = end of
        // page 2, result flagged capped.
        let (_dir, conn) = test_db("item-pagecap");
        let client = ScriptedClient::new(vec![
            Ok(page(vec![remote_txn("t1", "A")], "c1", true)),
            Ok(page(vec![remote_txn("t2", "B")], "c2", true)),
            Ok(page(vec![remote_txn("t3", "C")], "c3", true)),
            Ok(page(vec![remote_txn("t4", "D")], "c4", true)),
            Ok(page(vec![remote_txn("t5", "E")], "c5", false)),
        ]);
        let policy = SyncPolicy { page_cap: 2, ..SyncPolicy::default() };
        let outcome = sync_item(&conn, &client, "tok", "item-pagecap", &policy).unwrap();

        assert_eq!(outcome.status, RunStatus::Capped);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.added, 2);
        assert_eq!(client.calls.get(), 2);
        assert_eq!(stored_cursor(&conn, "item-pagecap").as_deref(), Some("c2"));
        assert_eq!(txn_count(&conn), 2);
    }

    #[test]
    fn test_txn_cap_stops_accumulation() {
        let (_dir, conn) = test_db("item-txncap");
        let client = ScriptedClient::new(vec![
            Ok(page(vec![remote_txn("t1", "A"), remote_txn("t2", "B")], "c1", true)),
            Ok(page(vec![remote_txn("t3", "C")], "c2", true)),
        ]);
        let policy = SyncPolicy { txn_cap: 2, ..SyncPolicy::default() };
        let outcome = sync_item(&conn, &client, "tok", "item-txncap", &policy).unwrap();
        assert_eq!(outcome.status, RunStatus::Capped);
        assert_eq!(client.calls.get(), 1);
        assert_eq!(stored_cursor(&conn, "item-txncap").as_deref(), Some("c1"));
    }

    #[test]
    fn test_cooldown_blocks_without_io() {
        let (_dir, conn) = test_db("item-cooldown");
        conn.execute(
            "UPDATE items SET last_synced_at = ?1, cursor = 'kept' WHERE item_id = 'item-cooldown'",
            [Utc::now().to_rfc3339()],
        ).unwrap();
        let client = ScriptedClient::new(vec![Ok(page(vec![remote_txn("t1", "A")], "c1", false))]);
        let outcome = sync_item(&conn, &client, "tok", "item-cooldown", &SyncPolicy::default()).unwrap();

        assert_eq!(outcome.status, RunStatus::Cooldown);
        assert_eq!(client.calls.get(), 0);
        assert_eq!(txn_count(&conn), 0);
        assert_eq!(stored_cursor(&conn, "item-cooldown").as_deref(), Some("kept"));
    }

    #[test]
    fn test_cooldown_elapsed_allows_run() {
        let (_dir, conn) = test_db("item-cooldown-ok");
        let stale = (Utc::now() - chrono::Duration::seconds(600)).to_rfc3339();
        conn.execute(
            "UPDATE items SET last_synced_at = ?1 WHERE item_id = 'item-cooldown-ok'",
            [stale],
        ).unwrap();
        let client = ScriptedClient::new(vec![Ok(page(vec![remote_txn("t1", "A")], "c1", false))]);
        let outcome = sync_item(&conn, &client, "tok", "item-cooldown-ok", &SyncPolicy::default()).unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
    }

    #[test]
    fn test_fetch_failure_keeps_prior_pages() {
        // Page 2 dies: page 1's transactions are written, its cursor is
        // persisted, the item is flagged for retry.
        let (_dir, conn) = test_db("item-fail");
        let client = ScriptedClient::new(vec![
            Ok(page(vec![remote_txn("t1", "A")], "c1", true)),
            Err(TallyError::Provider("503: upstream".to_string())),
        ]);
        let outcome = sync_item(&conn, &client, "tok", "item-fail", &SyncPolicy::default()).unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("503"));
        assert_eq!(outcome.added, 1);
        assert_eq!(txn_count(&conn), 1);
        assert_eq!(stored_cursor(&conn, "item-fail").as_deref(), Some("c1"));
        let status: String = conn.query_row(
            "SELECT status FROM items WHERE item_id = 'item-fail'", [], |r| r.get(0),
        ).unwrap();
        assert_eq!(status, "error");
    }

    #[test]
    fn test_first_page_failure_leaves_cursor_null() {
        let (_dir, conn) = test_db("item-fail-first");
        let client = ScriptedClient::new(vec![Err(TallyError::Provider("timeout".to_string()))]);
        let outcome = sync_item(&conn, &client, "tok", "item-fail-first", &SyncPolicy::default()).unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.pages, 0);
        assert_eq!(stored_cursor(&conn, "item-fail-first"), None);
    }

    #[test]
    fn test_rerun_after_capped_resumes_from_cursor() {
        let (_dir, conn) = test_db("item-rerun");
        let client = ScriptedClient::new(vec![
            Ok(page(vec![remote_txn("t1", "A")], "c1", true)),
            Ok(page(vec![remote_txn("t2", "B")], "c2", false)),
        ]);
        let policy = SyncPolicy { page_cap: 1, cooldown_secs: 0, ..SyncPolicy::default() };
        let first = sync_item(&conn, &client, "tok", "item-rerun", &policy).unwrap();
        assert_eq!(first.status, RunStatus::Capped);

        let second = sync_item(&conn, &client, "tok", "item-rerun", &policy).unwrap();
        assert_eq!(second.status, RunStatus::Completed);
        assert_eq!(*client.cursors_seen.borrow(), vec![None, Some("c1".to_string())]);
        assert_eq!(txn_count(&conn), 2);
        assert_eq!(stored_cursor(&conn, "item-rerun").as_deref(), Some("c2"));
    }

    #[test]
    fn test_unknown_item_is_an_error() {
        let (_dir, conn) = test_db("item-known");
        let client = ScriptedClient::new(vec![]);
        let err = sync_item(&conn, &client, "tok", "nope", &SyncPolicy::default()).unwrap_err();
        assert!(matches!(err, TallyError::UnknownItem(_)));
    }

    #[test]
    fn test_rules_outrank_taxonomy_during_sync() {
        let (_dir, conn) = test_db("item-rules");
        let groceries = category_id_by_name(&conn, "Groceries").unwrap();
        conn.execute(
            "INSERT INTO rules (pattern, category_id) VALUES ('%CAFE%', ?1)",
            [groceries],
        ).unwrap();
        let client = ScriptedClient::new(vec![Ok(page(vec![remote_txn("t1", "CAFE A")], "c1", false))]);
        sync_item(&conn, &client, "tok", "item-rules", &SyncPolicy::default()).unwrap();
        let cat: Option<i64> = conn.query_row(
            "SELECT category_id FROM transactions WHERE external_id = 't1'", [], |r| r.get(0),
        ).unwrap();
        assert_eq!(cat, Some(groceries));
    }

    #[test]
    fn test_guard_blocks_concurrent_run_for_same_item() {
        let guard = RunGuard::acquire("guard-item").unwrap();
        let err = RunGuard::acquire("guard-item").unwrap_err();
        assert!(matches!(err, TallyError::SyncInProgress(_)));
        drop(guard);
        assert!(RunGuard::acquire("guard-item").is_ok());
    }
}
