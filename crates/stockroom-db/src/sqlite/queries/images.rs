//! Image rows for both attachment groups. The table is chosen by
//! [`ImageKind::table`], so one set of queries serves both.

use chrono::Utc;
use rusqlite::{params, Connection, Row};

use stockroom_core::image::{ImageKind, ImageRecord};

use super::super::SqliteResultExt;
use crate::DbError;

fn row_to_image(kind: ImageKind) -> impl Fn(&Row) -> rusqlite::Result<ImageRecord> {
    move |row| {
        Ok(ImageRecord {
            id: row.get("id")?,
            kind,
            inventory_id: row.get("inventory_id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(
    conn: &Connection,
    kind: ImageKind,
    item_id: i64,
    stored_name: &str,
) -> Result<ImageRecord, DbError> {
    let now = Utc::now();
    conn.execute(
        &format!(
            "INSERT INTO {} (inventory_id, name, created_at) VALUES (?1, ?2, ?3)",
            kind.table()
        ),
        params![item_id, stored_name, now],
    )
    .to_db()?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        &format!("SELECT * FROM {} WHERE id = ?1", kind.table()),
        params![id],
        row_to_image(kind),
    )
    .to_db()
}

pub fn list(conn: &Connection, kind: ImageKind, item_id: i64) -> Result<Vec<ImageRecord>, DbError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT * FROM {} WHERE inventory_id = ?1 ORDER BY id",
            kind.table()
        ))
        .to_db()?;
    let images = stmt
        .query_map(params![item_id], row_to_image(kind))
        .to_db()?
        .collect::<Result<Vec<_>, _>>()
        .to_db()?;
    Ok(images)
}

pub fn delete_for_item(conn: &Connection, kind: ImageKind, item_id: i64) -> Result<u64, DbError> {
    let changed = conn
        .execute(
            &format!("DELETE FROM {} WHERE inventory_id = ?1", kind.table()),
            params![item_id],
        )
        .to_db()?;
    Ok(changed as u64)
}
