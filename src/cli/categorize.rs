use crate::classifier::categorize_unreviewed;
use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn run() -> Result<()> {
    let conn = get_connection(&get_data_dir().join(DB_FILE))?;
    let result = categorize_unreviewed(&conn)?;
    println!(
        "{} categorized, {} still awaiting review",
        result.categorized, result.still_unreviewed
    );
    Ok(())
}
