use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use rusqlite::Connection;

use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn run(output: Option<&str>) -> Result<()> {
    let data_dir = get_data_dir();
    let src = get_connection(&data_dir.join(DB_FILE))?;

    let dest_path = match output {
        Some(path) => PathBuf::from(path),
        None => {
            let stamp = Local::now().format("%Y%m%d-%H%M%S");
            let dir = data_dir.join("backups");
            std::fs::create_dir_all(&dir)?;
            dir.join(format!("tally-{stamp}.db"))
        }
    };

    let mut dest = Connection::open(&dest_path)?;
    let backup = rusqlite::backup::Backup::new(&src, &mut dest)?;
    backup.run_to_completion(100, Duration::from_millis(10), None)?;

    println!("Backed up to {}", dest_path.display());
    Ok(())
}
