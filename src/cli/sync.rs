use colored::Colorize;

use crate::db::{get_connection, DB_FILE};
use crate::error::{Result, TallyError};
use crate::policy::SyncPolicy;
use crate::provider::HttpLedgerClient;
use crate::secrets;
use crate::settings::{get_data_dir, load_settings};
use crate::sync::{sync_item, RunStatus, SyncOutcome};

pub fn run(item: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let client = HttpLedgerClient::new(&settings.provider_url)?;
    let policy = SyncPolicy::default();

    let item_ids: Vec<String> = match item {
        Some(id) => vec![id.to_string()],
        None => {
            let mut stmt =
                conn.prepare("SELECT item_id FROM items WHERE status != 'removed' ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        }
    };
    if item_ids.is_empty() {
        println!("No linked items. Run `tally items add` first.");
        return Ok(());
    }

    let mut failures = 0usize;
    for item_id in &item_ids {
        let token = secrets::get_access_token(item_id)?;
        let outcome = sync_item(&conn, &client, &token, item_id, &policy)?;
        report(&outcome);
        if outcome.status == RunStatus::Failed {
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(TallyError::Other(format!(
            "{failures} of {} item(s) failed to sync",
            item_ids.len()
        )));
    }
    Ok(())
}

fn report(outcome: &SyncOutcome) {
    let counts = format!(
        "{} added, {} modified, {} removed ({} pages)",
        outcome.added, outcome.modified, outcome.removed, outcome.pages
    );
    match outcome.status {
        RunStatus::Completed => {
            println!("{} {}: {counts}", "synced".green(), outcome.item_id);
        }
        RunStatus::Capped => {
            println!(
                "{} {}: {counts} (capped, more data pending; sync again later)",
                "synced".yellow(),
                outcome.item_id
            );
        }
        RunStatus::Cooldown => {
            println!("{} {}: synced recently, skipping", "cooldown".cyan(), outcome.item_id);
        }
        RunStatus::Failed => {
            println!(
                "{} {}: {counts}: {}; progress kept, will retry next run",
                "failed".red(),
                outcome.item_id,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if outcome.failed_chunks > 0 {
        println!("  {} write chunk(s) failed and were skipped", outcome.failed_chunks);
    }
}
