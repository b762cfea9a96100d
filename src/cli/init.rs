use colored::Colorize;

use crate::db::{get_connection, init_db, DB_FILE};
use crate::error::Result;
use crate::settings::{load_settings, save_settings};

pub fn run(data_dir: Option<String>, provider_url: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    if let Some(url) = provider_url {
        settings.provider_url = url;
    }

    let dir = std::path::PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    let conn = get_connection(&dir.join(DB_FILE))?;
    init_db(&conn)?;
    save_settings(&settings)?;

    println!("{} {}", "Initialized".green(), dir.join(DB_FILE).display());
    if settings.provider_url.is_empty() {
        println!("No provider URL set; syncing will need `tally init --provider-url <url>`.");
    }
    Ok(())
}
