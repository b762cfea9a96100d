use rusqlite::Connection;

use crate::error::{Result, TallyError};

pub struct UnreviewedTxn {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub merchant: Option<String>,
    pub amount: f64,
    pub txn_type: String,
    pub account_name: String,
}

pub fn get_unreviewed(conn: &Connection) -> Result<Vec<UnreviewedTxn>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.date, t.description, t.merchant, t.amount, t.txn_type, a.name \
         FROM transactions t JOIN accounts a ON t.account_id = a.id \
         WHERE t.reviewed = 0 AND t.source = 'external' ORDER BY t.date",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(UnreviewedTxn {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                merchant: row.get(3)?,
                amount: row.get(4)?,
                txn_type: row.get(5)?,
                account_name: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Manually assign a category to one transaction. With `promote_rule`, a
/// contains-rule for the transaction's merchant is created (or confirmed,
/// if the same pattern already targets the category) so future deliveries
/// classify automatically.
pub fn recategorize(
    conn: &Connection,
    txn_id: i64,
    category_id: i64,
    promote_rule: bool,
) -> Result<Option<String>> {
    let merchant: Option<String> = conn
        .query_row(
            "SELECT COALESCE(merchant, description) FROM transactions WHERE id = ?1",
            [txn_id],
            |r| r.get(0),
        )
        .map_err(|_| TallyError::Other(format!("No transaction with ID {txn_id}")))?;

    conn.execute(
        "UPDATE transactions SET category_id = ?1, reviewed = 1 WHERE id = ?2",
        rusqlite::params![category_id, txn_id],
    )?;

    if !promote_rule {
        return Ok(None);
    }
    let Some(merchant) = merchant.filter(|m| !m.is_empty()) else {
        return Ok(None);
    };

    let pattern = format!("%{}%", merchant.to_uppercase());
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM rules WHERE pattern = ?1 AND category_id = ?2",
            rusqlite::params![pattern, category_id],
            |r| r.get(0),
        )
        .ok();

    match existing {
        Some(rule_id) => {
            // A second human confirmation upgrades the inferred rule.
            conn.execute(
                "UPDATE rules SET confidence = 'confirmed', is_active = 1 WHERE id = ?1",
                [rule_id],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO rules (pattern, category_id, confidence) VALUES (?1, ?2, 'inferred')",
                rusqlite::params![pattern, category_id],
            )?;
        }
    }
    Ok(Some(pattern))
}
