use rusqlite::{Connection, Result};

/// Initialise the contacts table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    // UNIQUE(phone_digits) doubles as the index for lookups by digits.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS contacts (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id     TEXT,
            name          TEXT NOT NULL,
            phone_digits  TEXT NOT NULL UNIQUE,
            updated_at    TEXT NOT NULL
        );",
    )
}

/// Insert or replace the contact stored for `digits`.
pub fn upsert_contact(
    conn: &Connection,
    digits: &str,
    name: &str,
    person_id: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO contacts (person_id, name, phone_digits, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(phone_digits) DO UPDATE SET
            person_id = excluded.person_id,
            name = excluded.name,
            updated_at = excluded.updated_at",
        rusqlite::params![person_id, name, digits, now],
    )?;
    Ok(())
}
