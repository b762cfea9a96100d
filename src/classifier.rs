use std::collections::HashMap;

use rusqlite::Connection;

use crate::error::Result;
use crate::matcher::match_rule;
use crate::models::Rule;

/// How a category assignment was decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category_id: i64,
    /// Set when a merchant rule won; used for the hit-count side write.
    pub rule_id: Option<i64>,
}

/// Active rules ranked for evaluation: most-used first, ties by
/// insertion order. Re-read fresh per run so rankings never go stale.
pub fn load_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, category_id, confidence, hit_count FROM rules \
         WHERE is_active = 1 ORDER BY hit_count DESC, id",
    )?;
    let rules = stmt
        .query_map([], |row| {
            Ok(Rule {
                id: row.get(0)?,
                pattern: row.get(1)?,
                category_id: row.get(2)?,
                confidence: row.get(3)?,
                hit_count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rules)
}

pub fn load_taxonomy(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT provider_code, category_id FROM taxonomy")?;
    let map = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<String, i64>, _>>()?;
    Ok(map)
}

/// Assign a category: merchant rules first, provider taxonomy fallback
/// second, otherwise none (the transaction stays unreviewed for a human).
///
/// Pure: hit counts are not touched here; that side write belongs to the
/// store passes that act on the result.
pub fn classify(
    merchant: Option<&str>,
    description: &str,
    provider_code: Option<&str>,
    rules: &[Rule],
    taxonomy: &HashMap<String, i64>,
) -> Option<Classification> {
    let text = merchant.filter(|m| !m.is_empty()).unwrap_or(description);
    if let Some(rule) = match_rule(text, rules) {
        return Some(Classification {
            category_id: rule.category_id,
            rule_id: Some(rule.id),
        });
    }
    provider_code
        .and_then(|code| taxonomy.get(code))
        .map(|&category_id| Classification { category_id, rule_id: None })
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_unreviewed: usize,
}

/// Re-run classification over stored unreviewed external transactions,
/// e.g. after new rules are added. Manual rows are never touched.
pub fn categorize_unreviewed(conn: &Connection) -> Result<CategorizeResult> {
    let rules = load_rules(conn)?;
    let taxonomy = load_taxonomy(conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, merchant, description FROM transactions \
         WHERE reviewed = 0 AND source = 'external'",
    )?;
    let pending: Vec<(i64, Option<String>, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut categorized = 0usize;
    let mut still_unreviewed = 0usize;

    for (txn_id, merchant, description) in &pending {
        // Stored rows carry no provider code, so only rules apply here.
        match classify(merchant.as_deref(), description, None, &rules, &taxonomy) {
            Some(hit) => {
                conn.execute(
                    "UPDATE transactions SET category_id = ?1, reviewed = 1 WHERE id = ?2",
                    rusqlite::params![hit.category_id, txn_id],
                )?;
                if let Some(rule_id) = hit.rule_id {
                    let _ = conn.execute(
                        "UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1",
                        [rule_id],
                    );
                }
                categorized += 1;
            }
            None => still_unreviewed += 1,
        }
    }

    Ok(CategorizeResult { categorized, still_unreviewed })
}
