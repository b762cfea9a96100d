use std::collections::HashMap;

use rusqlite::Connection;

use crate::classifier::Classification;
use crate::error::Result;
use crate::provider::{RemoteTxn, RemovedTxn};

/// Rows per store write. Purely a payload bound, not a business rule.
pub const CHUNK_SIZE: usize = 100;

/// An incoming "added" transaction with its classification attached.
pub struct ClassifiedTxn {
    pub txn: RemoteTxn,
    pub classification: Option<Classification>,
}

#[derive(Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    /// Chunks that failed to commit. Committed chunks stay committed;
    /// chunk-level atomicity is the unit of guarantee.
    pub failed_chunks: usize,
}

/// Split the provider's signed amount into stored magnitude + type.
fn split_amount(signed: f64) -> (f64, &'static str) {
    if signed < 0.0 {
        (-signed, "credit")
    } else {
        (signed, "debit")
    }
}

/// Make sure every provider account referenced by the deltas has a local
/// row, and return the external-id -> local-id map.
fn ensure_accounts(
    conn: &Connection,
    item_db_id: i64,
    added: &[ClassifiedTxn],
    modified: &[RemoteTxn],
) -> Result<HashMap<String, i64>> {
    let externals: std::collections::HashSet<&str> = added
        .iter()
        .map(|c| c.txn.account_id.as_str())
        .chain(modified.iter().map(|t| t.account_id.as_str()))
        .collect();

    // TODO: pull real account names from the provider's accounts endpoint
    // once it is wired; until then the external id doubles as the name.
    let mut map = HashMap::new();
    for external_id in externals {
        conn.execute(
            "INSERT INTO accounts (item_id, external_id, name) VALUES (?1, ?2, ?2) \
             ON CONFLICT(external_id) DO NOTHING",
            rusqlite::params![item_db_id, external_id],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM accounts WHERE external_id = ?1",
            [external_id],
            |r| r.get(0),
        )?;
        map.insert(external_id.to_string(), id);
    }
    Ok(map)
}

const UPSERT_SQL: &str = "\
INSERT INTO transactions \
    (external_id, account_id, date, description, merchant, amount, txn_type, \
     category_id, pending, reviewed, source) \
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'external') \
ON CONFLICT(external_id) DO UPDATE SET \
    account_id = excluded.account_id, \
    date = excluded.date, \
    description = excluded.description, \
    merchant = excluded.merchant, \
    amount = excluded.amount, \
    txn_type = excluded.txn_type, \
    pending = excluded.pending, \
    category_id = COALESCE(transactions.category_id, excluded.category_id), \
    reviewed = CASE \
        WHEN COALESCE(transactions.category_id, excluded.category_id) IS NULL THEN 0 \
        ELSE 1 END";

/// Apply one accumulated set of provider deltas: three passes (added,
/// modified, removed), each chunked, each chunk in its own transaction.
/// A failed chunk is recorded and skipped; it never rolls back or blocks
/// the chunks around it. The caller decides what to do about failures.
pub fn apply_batch(
    conn: &Connection,
    item_db_id: i64,
    added: &[ClassifiedTxn],
    modified: &[RemoteTxn],
    removed: &[RemovedTxn],
) -> Result<BatchOutcome> {
    let accounts = ensure_accounts(conn, item_db_id, added, modified)?;
    let mut outcome = BatchOutcome::default();
    let mut matched_rules: Vec<i64> = Vec::new();

    // Added: upsert on external_id. Re-delivery updates in place, and an
    // already-assigned category is preserved over the incoming one.
    for chunk in added.chunks(CHUNK_SIZE) {
        let applied: Result<usize> = (|| {
            let tx = conn.unchecked_transaction()?;
            let mut rows = 0usize;
            for item in chunk {
                let (amount, txn_type) = split_amount(item.txn.amount);
                let category_id = item.classification.map(|c| c.category_id);
                let reviewed = category_id.is_some() as i64;
                rows += tx.execute(
                    UPSERT_SQL,
                    rusqlite::params![
                        item.txn.transaction_id,
                        accounts[&item.txn.account_id],
                        item.txn.date,
                        item.txn.name,
                        item.txn.merchant_name,
                        amount,
                        txn_type,
                        category_id,
                        item.txn.pending as i64,
                        reviewed,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(rows)
        })();
        match applied {
            Ok(rows) => {
                outcome.added += rows;
                matched_rules.extend(
                    chunk.iter().filter_map(|c| c.classification.and_then(|cl| cl.rule_id)),
                );
            }
            Err(_) => outcome.failed_chunks += 1,
        }
    }

    // Modified: provider-side edits update the mutable fields only,
    // never the category (a human may have corrected it since).
    for chunk in modified.chunks(CHUNK_SIZE) {
        let applied: Result<usize> = (|| {
            let tx = conn.unchecked_transaction()?;
            let mut rows = 0usize;
            for txn in chunk {
                let (amount, txn_type) = split_amount(txn.amount);
                rows += tx.execute(
                    "UPDATE transactions SET \
                         account_id = ?2, date = ?3, description = ?4, merchant = ?5, \
                         amount = ?6, txn_type = ?7, pending = ?8 \
                     WHERE external_id = ?1 AND source = 'external'",
                    rusqlite::params![
                        txn.transaction_id,
                        accounts[&txn.account_id],
                        txn.date,
                        txn.name,
                        txn.merchant_name,
                        amount,
                        txn_type,
                        txn.pending as i64,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(rows)
        })();
        match applied {
            Ok(rows) => outcome.modified += rows,
            Err(_) => outcome.failed_chunks += 1,
        }
    }

    // Removed: hard delete.
    for chunk in removed.chunks(CHUNK_SIZE) {
        let applied: Result<usize> = (|| {
            let tx = conn.unchecked_transaction()?;
            let mut rows = 0usize;
            for txn in chunk {
                rows += tx.execute(
                    "DELETE FROM transactions WHERE external_id = ?1 AND source = 'external'",
                    [&txn.transaction_id],
                )?;
            }
            tx.commit()?;
            Ok(rows)
        })();
        match applied {
            Ok(rows) => outcome.removed += rows,
            Err(_) => outcome.failed_chunks += 1,
        }
    }

    // Best-effort hit-count bump for rule-won classifications in committed
    // chunks. Must never fail the batch.
    for rule_id in matched_rules {
        let _ = conn.execute(
            "UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1",
            [rule_id],
        );
    }

    Ok(outcome)
}
