use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "tally.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY,
    item_id TEXT NOT NULL UNIQUE,
    institution TEXT,
    cursor TEXT,
    last_synced_at TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    item_id INTEGER NOT NULL,
    external_id TEXT UNIQUE,
    name TEXT NOT NULL,
    mask TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (item_id) REFERENCES items(id)
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category_type TEXT NOT NULL,
    description TEXT,
    is_active INTEGER DEFAULT 1
);

CREATE TABLE IF NOT EXISTS taxonomy (
    id INTEGER PRIMARY KEY,
    provider_code TEXT NOT NULL UNIQUE,
    category_id INTEGER NOT NULL,
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    confidence TEXT NOT NULL DEFAULT 'inferred',
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    external_id TEXT UNIQUE,
    account_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    merchant TEXT,
    amount REAL NOT NULL,
    txn_type TEXT NOT NULL,
    category_id INTEGER,
    pending INTEGER DEFAULT 0,
    reviewed INTEGER DEFAULT 0,
    source TEXT NOT NULL DEFAULT 'external',
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_reviewed
    ON transactions(reviewed) WHERE reviewed = 0;
";

// (name, category_type, description)
const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Income", "income", "Paychecks, deposits, refunds"),
    ("Groceries", "expense", "Supermarkets, corner stores"),
    ("Dining & Drinks", "expense", "Restaurants, cafes, bars, delivery"),
    ("Transport", "expense", "Transit, rideshare, fuel, parking"),
    ("Travel", "expense", "Flights, hotels, rental cars"),
    ("Shopping", "expense", "Retail, online merchandise"),
    ("Entertainment", "expense", "Movies, games, events"),
    ("Subscriptions", "expense", "Streaming, memberships, SaaS"),
    ("Health & Fitness", "expense", "Pharmacy, doctors, gyms"),
    ("Personal Care", "expense", "Salons, grooming"),
    ("Services", "expense", "Repairs, cleaning, professional services"),
    ("Rent & Utilities", "expense", "Rent, power, water, internet, phone"),
    ("Loan Payments", "expense", "Mortgage, student and auto loans"),
    ("Bank Fees", "expense", "Overdraft, ATM, wire fees"),
    ("Education", "expense", "Tuition, courses, books"),
    ("Transfer", "transfer", "Movement between own accounts"),
];

// provider coarse category code -> local category name
const DEFAULT_TAXONOMY: &[(&str, &str)] = &[
    ("INCOME", "Income"),
    ("TRANSFER_IN", "Transfer"),
    ("TRANSFER_OUT", "Transfer"),
    ("LOAN_PAYMENTS", "Loan Payments"),
    ("BANK_FEES", "Bank Fees"),
    ("ENTERTAINMENT", "Entertainment"),
    ("FOOD_AND_DRINK", "Dining & Drinks"),
    ("GENERAL_MERCHANDISE", "Shopping"),
    ("MEDICAL", "Health & Fitness"),
    ("PERSONAL_CARE", "Personal Care"),
    ("GENERAL_SERVICES", "Services"),
    ("TRANSPORTATION", "Transport"),
    ("TRAVEL", "Travel"),
    ("RENT_AND_UTILITIES", "Rent & Utilities"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, cat_type, description) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, category_type, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, cat_type, description],
            )?;
        }
        for (code, category) in DEFAULT_TAXONOMY {
            conn.execute(
                "INSERT INTO taxonomy (provider_code, category_id) \
                 SELECT ?1, id FROM categories WHERE name = ?2",
                rusqlite::params![code, category],
            )?;
        }
    }
    Ok(())
}

pub fn category_id_by_name(conn: &Connection, name: &str) -> Option<i64> {
    conn.query_row("SELECT id FROM categories WHERE name = ?1", [name], |r| r.get(0))
        .ok()
}
