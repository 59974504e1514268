use chrono::Utc;
use rusqlite::{params, Row};

use stockroom_core::page::{Page, PageQuery};
use stockroom_core::provider::{CreateProvider, Provider, UpdateProvider};

use super::super::{not_found, SqliteDatabase, SqliteResultExt};
use super::{apply_update, fetch_page, push_set, still_referenced, PageSql};
use crate::DbError;

const PAGE: PageSql<'static> = PageSql {
    select: "SELECT *",
    from: "FROM providers",
    search: &["ruc", "name", "telephone", "address", "email"],
    order_by: "name, id",
};

fn row_to_provider(row: &Row) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get("id")?,
        ruc: row.get("ruc")?,
        name: row.get("name")?,
        telephone: row.get("telephone")?,
        address: row.get("address")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_provider_sync(&self, input: &CreateProvider) -> Result<Provider, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO providers (ruc, name, telephone, address, email, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    input.ruc.trim(),
                    input.name.trim(),
                    input.telephone,
                    input.address,
                    input.email,
                    now,
                    now
                ],
            )
            .to_db()?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                "SELECT * FROM providers WHERE id = ?1",
                params![id],
                row_to_provider,
            )
            .to_db()
        })
    }

    pub fn get_provider_sync(&self, id: i64) -> Result<Provider, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM providers WHERE id = ?1",
                params![id],
                row_to_provider,
            )
            .map_err(not_found(format!("provider {id}")))
        })
    }

    pub fn list_providers_sync(&self) -> Result<Vec<Provider>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM providers ORDER BY name, id")
                .to_db()?;
            let providers = stmt
                .query_map([], row_to_provider)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(providers)
        })
    }

    pub fn page_providers_sync(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Provider>, DbError> {
        self.with_conn(|conn| fetch_page(conn, &PAGE, page, pattern, row_to_provider))
    }

    pub fn update_provider_sync(
        &self,
        id: i64,
        update: &UpdateProvider,
    ) -> Result<Provider, DbError> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            let ruc = update.ruc.as_deref().map(|r| r.trim().to_string());
            let name = update.name.as_deref().map(|n| n.trim().to_string());
            push_set(&mut sets, &mut values, "ruc = ?", &ruc);
            push_set(&mut sets, &mut values, "name = ?", &name);
            push_set(&mut sets, &mut values, "telephone = ?", &update.telephone);
            push_set(&mut sets, &mut values, "address = ?", &update.address);
            push_set(&mut sets, &mut values, "email = ?", &update.email);

            if !sets.is_empty() && apply_update(conn, "providers", id, sets, values)? == 0 {
                return Err(DbError::NotFound(format!("provider {id}")));
            }
            conn.query_row(
                "SELECT * FROM providers WHERE id = ?1",
                params![id],
                row_to_provider,
            )
            .map_err(not_found(format!("provider {id}")))
        })
    }

    pub fn delete_provider_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM providers WHERE id = ?1", params![id])
                .map_err(still_referenced(format!(
                    "provider {id} has linked invoices"
                )))?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("provider {id}")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{DbError, SqliteDatabase};
    use stockroom_core::page::PageQuery;
    use stockroom_core::provider::{CreateProvider, UpdateProvider};

    fn provider(ruc: &str, name: &str) -> CreateProvider {
        CreateProvider {
            ruc: ruc.into(),
            name: name.into(),
            telephone: "555-0100".into(),
            address: "1 Dock Road".into(),
            email: format!("sales@{}.test", name.to_lowercase()),
        }
    }

    #[test]
    fn test_provider_crud() {
        let db = SqliteDatabase::open_in_memory().unwrap();

        let acme = db.create_provider_sync(&provider("20100", "Acme")).unwrap();
        assert_eq!(acme.ruc, "20100");
        assert_eq!(db.get_provider_sync(acme.id).unwrap().name, "Acme");

        let updated = db
            .update_provider_sync(
                acme.id,
                &UpdateProvider {
                    telephone: Some("555-0199".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.telephone, "555-0199");
        assert_eq!(updated.email, "sales@acme.test");

        assert_eq!(db.list_providers_sync().unwrap().len(), 1);
        db.delete_provider_sync(acme.id).unwrap();
        assert!(db.list_providers_sync().unwrap().is_empty());
    }

    #[test]
    fn update_of_missing_provider_is_not_found() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let err = db
            .update_provider_sync(
                42,
                &UpdateProvider {
                    name: Some("Ghost".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)), "{err:?}");
    }

    #[test]
    fn page_matches_any_searchable_column() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.create_provider_sync(&provider("20100", "Acme")).unwrap();
        db.create_provider_sync(&provider("20200", "Bolt Supply")).unwrap();

        let by_ruc = db
            .page_providers_sync(&PageQuery::default(), Some("%202%"))
            .unwrap();
        assert_eq!(by_ruc.count, 1);
        assert_eq!(by_ruc.rows[0].name, "Bolt Supply");

        let by_email = db
            .page_providers_sync(&PageQuery::default(), Some("%sales@acme%"))
            .unwrap();
        assert_eq!(by_email.count, 1);
    }
}
