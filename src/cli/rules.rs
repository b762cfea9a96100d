use comfy_table::{Cell, Table};

use crate::db::{category_id_by_name, get_connection, DB_FILE};
use crate::error::{Result, TallyError};
use crate::settings::get_data_dir;

pub fn add(pattern: &str, category: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let cat_id = category_id_by_name(&conn, category)
        .ok_or_else(|| TallyError::UnknownCategory(category.to_string()))?;

    conn.execute(
        "INSERT INTO rules (pattern, category_id, confidence) VALUES (?1, ?2, 'confirmed')",
        rusqlite::params![pattern, cat_id],
    )?;
    println!("Added rule: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let mut stmt = conn.prepare(
        "SELECT r.id, r.pattern, r.confidence, c.name, r.hit_count \
         FROM rules r JOIN categories c ON r.category_id = c.id \
         WHERE r.is_active = 1 ORDER BY r.hit_count DESC, r.id",
    )?;
    let rows: Vec<(i64, String, String, String, i64)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Confidence", "Category", "Hits"]);
    for (id, pattern, confidence, category, hits) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(pattern),
            Cell::new(confidence),
            Cell::new(category),
            Cell::new(hits),
        ]);
    }
    println!("Rules (evaluation order)\n{table}");
    Ok(())
}

pub fn confirm(id: i64) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let updated = conn.execute(
        "UPDATE rules SET confidence = 'confirmed' WHERE id = ?1 AND is_active = 1",
        [id],
    )?;
    if updated == 0 {
        return Err(TallyError::Other(format!("No active rule with ID {id}")));
    }
    println!("Confirmed rule {id}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;

    let row: std::result::Result<(String, String, i32), _> = conn.query_row(
        "SELECT r.pattern, c.name, r.is_active FROM rules r \
         JOIN categories c ON r.category_id = c.id WHERE r.id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );

    match row {
        Err(_) => Err(TallyError::Other(format!("No rule with ID {id}"))),
        Ok((_, _, 0)) => Err(TallyError::Other(format!("Rule {id} is already inactive"))),
        Ok((pattern, category, _)) => {
            conn.execute("UPDATE rules SET is_active = 0 WHERE id = ?1", [id])?;
            println!("Deleted rule {id}: '{pattern}' \u{2192} {category}");
            Ok(())
        }
    }
}
