use chrono::Utc;
use rusqlite::{params, Row};

use stockroom_core::category::{Category, CreateCategory, UpdateCategory};
use stockroom_core::page::{Page, PageQuery};

use super::super::{not_found, SqliteDatabase, SqliteResultExt};
use super::{apply_update, fetch_page, push_set, still_referenced, PageSql};
use crate::DbError;

const PAGE: PageSql<'static> = PageSql {
    select: "SELECT *",
    from: "FROM categories",
    search: &["name", "description"],
    order_by: "name, id",
};

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_category_sync(&self, input: &CreateCategory) -> Result<Category, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO categories (name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![input.name.trim(), input.description, now, now],
            )
            .to_db()?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .to_db()
        })
    }

    pub fn get_category_sync(&self, id: i64) -> Result<Category, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .map_err(not_found(format!("category {id}")))
        })
    }

    pub fn list_categories_sync(&self) -> Result<Vec<Category>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM categories ORDER BY name, id")
                .to_db()?;
            let categories = stmt
                .query_map([], row_to_category)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(categories)
        })
    }

    pub fn page_categories_sync(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Category>, DbError> {
        self.with_conn(|conn| fetch_page(conn, &PAGE, page, pattern, row_to_category))
    }

    pub fn update_category_sync(
        &self,
        id: i64,
        update: &UpdateCategory,
    ) -> Result<Category, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let name = update.name.as_deref().map(|n| n.trim().to_string());
            push_set(&mut sets, &mut values, "name = ?", &name);
            push_set(&mut sets, &mut values, "description = ?", &update.description);

            if !sets.is_empty() && apply_update(conn, "categories", id, sets, values)? == 0 {
                return Err(DbError::NotFound(format!("category {id}")));
            }
            conn.query_row(
                "SELECT * FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .map_err(not_found(format!("category {id}")))
        })
    }

    pub fn delete_category_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM categories WHERE id = ?1", params![id])
                .map_err(still_referenced(format!(
                    "category {id} still has inventory items"
                )))?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("category {id}")));
            }
            Ok(())
        })
    }
}
