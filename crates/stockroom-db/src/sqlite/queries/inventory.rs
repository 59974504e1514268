//! Inventory rows. These take a bare connection so they can run both inside
//! an explicit transaction and under the shared connection lock.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use stockroom_core::inventory::{CreateInventory, InventoryItem, UpdateInventory};
use stockroom_core::page::{Page, PageQuery};

use super::super::{not_found, SqliteResultExt};
use super::{apply_update, fetch_page, push_set, PageSql};
use crate::DbError;

const PAGE: PageSql<'static> = PageSql {
    select: "SELECT *",
    from: "FROM inventory",
    search: &["name", "description"],
    order_by: "name, id",
};

fn row_to_item(row: &Row) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get("id")?,
        name: row.get("name")?,
        price: row.get("price")?,
        quantity: row.get("quantity")?,
        damaged: row.get("damaged")?,
        description: row.get("description")?,
        category_id: row.get("category_id")?,
        invoice_id: row.get("invoice_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<InventoryItem, DbError> {
    conn.query_row(
        "SELECT * FROM inventory WHERE id = ?1",
        params![id],
        row_to_item,
    )
    .map_err(not_found(format!("inventory item {id}")))
}

pub fn insert(conn: &Connection, input: &CreateInventory) -> Result<InventoryItem, DbError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO inventory
             (name, price, quantity, damaged, description, category_id, invoice_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            input.name.trim(),
            input.price,
            input.quantity,
            input.damaged,
            input.description,
            input.category_id,
            input.invoice_id,
            now,
            now
        ],
    )
    .to_db()?;
    get(conn, conn.last_insert_rowid())
}

/// Apply the supplied fields. `None` when the item does not exist.
pub fn update(
    conn: &Connection,
    id: i64,
    update: &UpdateInventory,
) -> Result<Option<InventoryItem>, DbError> {
    let mut sets = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    let name = update.name.as_deref().map(|n| n.trim().to_string());
    push_set(&mut sets, &mut values, "name = ?", &name);
    push_set(&mut sets, &mut values, "price = ?", &update.price);
    push_set(&mut sets, &mut values, "quantity = ?", &update.quantity);
    push_set(&mut sets, &mut values, "damaged = ?", &update.damaged);
    push_set(&mut sets, &mut values, "description = ?", &update.description);
    push_set(&mut sets, &mut values, "category_id = ?", &update.category_id);
    push_set(&mut sets, &mut values, "invoice_id = ?", &update.invoice_id);

    if !sets.is_empty() && apply_update(conn, "inventory", id, sets, values)? == 0 {
        return Ok(None);
    }
    conn.query_row(
        "SELECT * FROM inventory WHERE id = ?1",
        params![id],
        row_to_item,
    )
    .optional()
    .to_db()
}

/// Delete the item; its image rows go with it through `ON DELETE CASCADE`.
pub fn delete(conn: &Connection, id: i64) -> Result<u64, DbError> {
    let changed = conn
        .execute("DELETE FROM inventory WHERE id = ?1", params![id])
        .to_db()?;
    Ok(changed as u64)
}

pub fn page(
    conn: &Connection,
    page: &PageQuery,
    pattern: Option<&str>,
) -> Result<Page<InventoryItem>, DbError> {
    fetch_page(conn, &PAGE, page, pattern, row_to_item)
}
