use chrono::Utc;
use rusqlite::{params, Connection, Row};

use stockroom_core::invoice::{CreateInvoice, Invoice, UpdateInvoice};
use stockroom_core::page::{Page, PageQuery};

use super::super::{map_sqlite_err, not_found, SqliteDatabase, SqliteResultExt};
use super::{apply_update, fetch_page, push_set, still_referenced, PageSql};
use crate::DbError;

const SELECT: &str = "SELECT i.*, p.name AS provider_name";
const FROM: &str = "FROM invoices i JOIN providers p ON p.id = i.provider_id";

const PAGE: PageSql<'static> = PageSql {
    select: SELECT,
    from: FROM,
    search: &["i.code", "i.date", "i.observation", "p.name"],
    order_by: "i.date DESC, i.id DESC",
};

fn row_to_invoice(row: &Row) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get("id")?,
        code: row.get("code")?,
        date: row.get("date")?,
        observation: row.get("observation")?,
        provider_id: row.get("provider_id")?,
        provider_name: row.get("provider_name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn fetch(conn: &Connection, id: i64) -> Result<Invoice, DbError> {
    conn.query_row(
        &format!("{SELECT} {FROM} WHERE i.id = ?1"),
        params![id],
        row_to_invoice,
    )
    .map_err(not_found(format!("invoice {id}")))
}

fn unknown_provider(provider_id: i64) -> impl FnOnce(rusqlite::Error) -> DbError {
    move |e| match map_sqlite_err(e) {
        DbError::Conflict(_) => DbError::NotFound(format!("provider {provider_id}")),
        other => other,
    }
}

impl SqliteDatabase {
    pub fn create_invoice_sync(&self, input: &CreateInvoice) -> Result<Invoice, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO invoices (code, date, observation, provider_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    input.code.trim(),
                    input.date,
                    input.observation,
                    input.provider_id,
                    now,
                    now
                ],
            )
            .map_err(unknown_provider(input.provider_id))?;
            fetch(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_invoice_sync(&self, id: i64) -> Result<Invoice, DbError> {
        self.with_conn(|conn| fetch(conn, id))
    }

    pub fn list_invoices_sync(&self) -> Result<Vec<Invoice>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{SELECT} {FROM} ORDER BY i.date DESC, i.id DESC"))
                .to_db()?;
            let invoices = stmt
                .query_map([], row_to_invoice)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(invoices)
        })
    }

    pub fn list_provider_invoices_sync(&self, provider_id: i64) -> Result<Vec<Invoice>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT} {FROM} WHERE i.provider_id = ?1 ORDER BY i.date DESC, i.id DESC"
                ))
                .to_db()?;
            let invoices = stmt
                .query_map(params![provider_id], row_to_invoice)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(invoices)
        })
    }

    pub fn page_invoices_sync(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Invoice>, DbError> {
        self.with_conn(|conn| fetch_page(conn, &PAGE, page, pattern, row_to_invoice))
    }

    pub fn update_invoice_sync(&self, id: i64, update: &UpdateInvoice) -> Result<Invoice, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let code = update.code.as_deref().map(|c| c.trim().to_string());
            push_set(&mut sets, &mut values, "code = ?", &code);
            push_set(&mut sets, &mut values, "date = ?", &update.date);
            push_set(&mut sets, &mut values, "observation = ?", &update.observation);
            push_set(&mut sets, &mut values, "provider_id = ?", &update.provider_id);

            if !sets.is_empty() {
                let changed = match update.provider_id {
                    Some(provider_id) => apply_update(conn, "invoices", id, sets, values)
                        .map_err(|e| match e {
                            DbError::Conflict(_) => {
                                DbError::NotFound(format!("provider {provider_id}"))
                            }
                            other => other,
                        })?,
                    None => apply_update(conn, "invoices", id, sets, values)?,
                };
                if changed == 0 {
                    return Err(DbError::NotFound(format!("invoice {id}")));
                }
            }
            fetch(conn, id)
        })
    }

    pub fn delete_invoice_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM invoices WHERE id = ?1", params![id])
                .map_err(still_referenced(format!(
                    "invoice {id} still has inventory items"
                )))?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("invoice {id}")));
            }
            Ok(())
        })
    }
}
