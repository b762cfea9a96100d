use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!(
        "Provider:   {}",
        if settings.provider_url.is_empty() { "(not set)" } else { &settings.provider_url }
    );

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `tally init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let items: i64 = conn.query_row(
        "SELECT count(*) FROM items WHERE status != 'removed'", [], |r| r.get(0),
    )?;
    let accounts: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0))?;
    let transactions: i64 = conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?;
    let unreviewed: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE reviewed = 0 AND source = 'external'",
        [],
        |r| r.get(0),
    )?;
    let rules: i64 = conn.query_row(
        "SELECT count(*) FROM rules WHERE is_active = 1", [], |r| r.get(0),
    )?;

    println!();
    println!("Items:         {items}");
    println!("Accounts:      {accounts}");
    println!("Transactions:  {transactions}");
    println!("Unreviewed:    {unreviewed}");
    println!("Rules:         {rules}");
    Ok(())
}
