use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credit_cards (
    id TEXT PRIMARY KEY,
    account_id TEXT,
    processor_name TEXT NOT NULL DEFAULT '',
    statement_closing_day INTEGER NOT NULL DEFAULT 1,
    payment_due_date INTEGER NOT NULL DEFAULT 8,
    credit_limit INTEGER NOT NULL DEFAULT 0,
    stage TEXT,
    sort_order INTEGER NOT NULL,
    tombstone INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS card_actions (
    card_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    field TEXT NOT NULL,
    op TEXT NOT NULL,
    value TEXT NOT NULL,
    options TEXT,
    PRIMARY KEY (card_id, position),
    FOREIGN KEY (card_id) REFERENCES credit_cards(id)
);

CREATE TABLE IF NOT EXISTS payees (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS credit_cards_account ON credit_cards(account_id);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    register_functions(&conn)?;
    Ok(conn)
}

/// `unicode_lower(text)`: SQLite's own `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
