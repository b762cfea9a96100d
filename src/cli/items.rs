use comfy_table::{Cell, Table};

use crate::db::{get_connection, DB_FILE};
use crate::error::{Result, TallyError};
use crate::secrets;
use crate::settings::get_data_dir;

pub fn add(item_id: &str, institution: Option<&str>, access_token: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;

    secrets::store_access_token(item_id, access_token)?;
    conn.execute(
        "INSERT INTO items (item_id, institution) VALUES (?1, ?2)",
        rusqlite::params![item_id, institution],
    )?;
    println!("Linked item {item_id}; first sync starts from the beginning of its feed.");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let mut stmt = conn.prepare(
        "SELECT item_id, institution, status, last_synced_at, cursor IS NOT NULL \
         FROM items ORDER BY id",
    )?;
    let rows: Vec<(String, Option<String>, String, Option<String>, bool)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Item", "Institution", "Status", "Last Synced", "Cursor"]);
    for (item_id, institution, status, last_synced, has_cursor) in rows {
        table.add_row(vec![
            Cell::new(item_id),
            Cell::new(institution.unwrap_or_default()),
            Cell::new(status),
            Cell::new(last_synced.unwrap_or_else(|| "never".to_string())),
            Cell::new(if has_cursor { "stored" } else { "—" }),
        ]);
    }
    println!("Items\n{table}");
    Ok(())
}

pub fn remove(item_id: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    // Accounts and transactions stay; the item just stops syncing.
    let updated = conn.execute(
        "UPDATE items SET status = 'removed' WHERE item_id = ?1",
        [item_id],
    )?;
    if updated == 0 {
        return Err(TallyError::UnknownItem(item_id.to_string()));
    }
    secrets::delete_access_token(item_id)?;
    println!("Unlinked item {item_id}. Its transactions remain in the ledger.");
    Ok(())
}
