use comfy_table::{Cell, Table};

use crate::db::{category_id_by_name, get_connection, DB_FILE};
use crate::error::{Result, TallyError};
use crate::fmt::{money, signed_amount};
use crate::review::{get_unreviewed, recategorize};
use crate::settings::get_data_dir;

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let rows = get_unreviewed(&conn)?;
    if rows.is_empty() {
        println!("Nothing awaiting review.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Account", "Description", "Merchant", "Amount"]);
    for txn in &rows {
        table.add_row(vec![
            Cell::new(txn.id),
            Cell::new(&txn.date),
            Cell::new(&txn.account_name),
            Cell::new(&txn.description),
            Cell::new(txn.merchant.as_deref().unwrap_or_default()),
            Cell::new(money(signed_amount(txn.amount, &txn.txn_type))),
        ]);
    }
    println!("Awaiting review\n{table}");
    println!("Assign with `tally recategorize <id> --category <name> [--rule]`.");
    Ok(())
}

pub fn set(txn_id: i64, category: &str, make_rule: bool) -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let cat_id = category_id_by_name(&conn, category)
        .ok_or_else(|| TallyError::UnknownCategory(category.to_string()))?;

    let promoted = recategorize(&conn, txn_id, cat_id, make_rule)?;
    println!("Categorized transaction {txn_id} as {category}");
    if let Some(pattern) = promoted {
        println!("Rule '{pattern}' \u{2192} {category} will catch this merchant next sync.");
    }
    Ok(())
}
