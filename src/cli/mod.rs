pub mod backup;
pub mod categorize;
pub mod init;
pub mod items;
pub mod review;
pub mod rules;
pub mod status;
pub mod sync;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tally", about = "Local-first ledger sync and auto-categorization CLI.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Tally: choose a data directory and initialize the database.
    Init {
        /// Path for Tally data (default: ~/Documents/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Base URL of the ledger provider's API
        #[arg(long = "provider-url")]
        provider_url: Option<String>,
    },
    /// Manage linked institution items.
    Items {
        #[command(subcommand)]
        command: ItemsCommands,
    },
    /// Pull transactions from the provider for one or all linked items.
    Sync {
        /// Item ID to sync (default: every active item)
        #[arg(long)]
        item: Option<String>,
    },
    /// Re-run categorization rules on unreviewed transactions.
    Categorize,
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// List transactions awaiting a category.
    Review,
    /// Assign a category to one transaction.
    Recategorize {
        /// Transaction ID (shown in `tally review`)
        id: i64,
        /// Category name to assign
        #[arg(long)]
        category: String,
        /// Also create a merchant rule from this correction
        #[arg(long)]
        rule: bool,
    },
    /// Show current database and sync state.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/tally-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Generate shell completions.
    Completions {
        /// Shell to generate for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ItemsCommands {
    /// Link an institution item and store its access token in the vault.
    Add {
        /// Provider item ID
        item_id: String,
        /// Institution name
        #[arg(long)]
        institution: Option<String>,
        /// Provider access token for this item
        #[arg(long = "access-token")]
        access_token: String,
    },
    /// List linked items and their sync state.
    List,
    /// Unlink an item and delete its stored access token.
    Remove {
        /// Provider item ID
        item_id: String,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a categorization rule (%X% contains, X% prefix, %X suffix, X exact).
    Add {
        /// Pattern to match against merchant names
        pattern: String,
        /// Category name to assign
        #[arg(long)]
        category: String,
    },
    /// List rules in evaluation order.
    List,
    /// Mark a rule as user-confirmed.
    Confirm {
        /// Rule ID (shown in `tally rules list`)
        id: i64,
    },
    /// Delete (deactivate) a rule by ID.
    Delete {
        /// Rule ID (shown in `tally rules list`)
        id: i64,
    },
}
