use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    // Idempotent: CREATE TABLE IF NOT EXISTS plus INSERT OR IGNORE seeds.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS providers (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            ruc         TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            telephone   TEXT NOT NULL DEFAULT '',
            address     TEXT NOT NULL DEFAULT '',
            email       TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS invoices (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            code        TEXT NOT NULL,
            date        TEXT NOT NULL,
            observation TEXT NOT NULL DEFAULT '',
            provider_id INTEGER NOT NULL REFERENCES providers(id) ON DELETE RESTRICT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invoices_provider ON invoices(provider_id);

        CREATE TABLE IF NOT EXISTS inventory (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            price       REAL NOT NULL DEFAULT 0 CHECK(price >= 0),
            quantity    INTEGER NOT NULL DEFAULT 0 CHECK(quantity >= 0),
            damaged     INTEGER NOT NULL DEFAULT 0 CHECK(damaged >= 0),
            description TEXT NOT NULL DEFAULT '',
            category_id INTEGER REFERENCES categories(id) ON DELETE RESTRICT,
            invoice_id  INTEGER REFERENCES invoices(id) ON DELETE RESTRICT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_inventory_category ON inventory(category_id);
        CREATE INDEX IF NOT EXISTS idx_inventory_invoice  ON inventory(invoice_id);

        CREATE TABLE IF NOT EXISTS images (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            inventory_id INTEGER NOT NULL REFERENCES inventory(id) ON DELETE CASCADE,
            name         TEXT NOT NULL UNIQUE,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_images_inventory ON images(inventory_id);

        CREATE TABLE IF NOT EXISTS damaged_images (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            inventory_id INTEGER NOT NULL REFERENCES inventory(id) ON DELETE CASCADE,
            name         TEXT NOT NULL UNIQUE,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_damaged_images_inventory ON damaged_images(inventory_id);

        CREATE TABLE IF NOT EXISTS roles (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS user_statuses (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL,
            lastname      TEXT NOT NULL,
            dni           TEXT NOT NULL UNIQUE,
            username      TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role_id       INTEGER NOT NULL REFERENCES roles(id),
            status_id     INTEGER NOT NULL REFERENCES user_statuses(id),
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash  TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

        INSERT OR IGNORE INTO roles (id, name) VALUES (1, 'admin'), (2, 'operator');
        INSERT OR IGNORE INTO user_statuses (id, name) VALUES (1, 'active'), (2, 'inactive');
        ",
    )
    .to_db()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let roles: i64 = conn
            .query_row("SELECT count(*) FROM roles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(roles, 2);
    }
}
