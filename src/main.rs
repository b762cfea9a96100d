mod classifier;
mod cli;
mod db;
mod error;
mod fmt;
mod matcher;
mod models;
mod policy;
mod provider;
mod review;
mod secrets;
mod settings;
mod sync;
mod writer;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands, ItemsCommands, RulesCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, provider_url } => cli::init::run(data_dir, provider_url),
        Commands::Items { command } => match command {
            ItemsCommands::Add { item_id, institution, access_token } => {
                cli::items::add(&item_id, institution.as_deref(), &access_token)
            }
            ItemsCommands::List => cli::items::list(),
            ItemsCommands::Remove { item_id } => cli::items::remove(&item_id),
        },
        Commands::Sync { item } => cli::sync::run(item.as_deref()),
        Commands::Categorize => cli::categorize::run(),
        Commands::Rules { command } => match command {
            RulesCommands::Add { pattern, category } => cli::rules::add(&pattern, &category),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Confirm { id } => cli::rules::confirm(id),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Review => cli::review::list(),
        Commands::Recategorize { id, category, rule } => cli::review::set(id, &category, rule),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "tally", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
