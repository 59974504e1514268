pub(crate) mod migrations;
pub mod queries;
mod transaction;

pub use transaction::SqliteTransaction;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use stockroom_core::category::{Category, CreateCategory, UpdateCategory};
use stockroom_core::image::{ImageKind, ImageRecord};
use stockroom_core::inventory::InventoryItem;
use stockroom_core::invoice::{CreateInvoice, Invoice, UpdateInvoice};
use stockroom_core::page::{Page, PageQuery};
use stockroom_core::provider::{CreateProvider, Provider, UpdateProvider};
use stockroom_core::user::{CreateUser, Role, Session, UpdateUser, User, UserCredentials, UserStatus};

use crate::{Database, DbConfig, DbError, DbTransaction};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
///
/// Calling `.to_db()?` is the shortest way to map errors inside the query
/// modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

/// SQLite backend. One connection per process, guarded by an async mutex so
/// an open [`SqliteTransaction`] can hold it across await points.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("stockroom.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        migrations::run(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run raw SQL against the connection. Used by tooling and tests that
    /// need to shape the schema (for instance installing a trigger).
    pub async fn execute_script(&self, sql: &str) -> Result<(), DbError> {
        let sql = sql.to_string();
        self.blocking(move |db| db.with_conn(|conn| conn.execute_batch(&sql).to_db()))
            .await
    }

    /// Must only be called from a blocking context (`spawn_blocking`).
    ///
    /// Plain operations autocommit. Holding the lock means no
    /// [`SqliteTransaction`] is live, so an open transaction here is stale
    /// and is rolled back before `f` runs.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.conn.blocking_lock();
        if !conn.is_autocommit() {
            tracing::warn!("rolling back a stale transaction before a plain statement");
            conn.execute_batch("ROLLBACK").to_db()?;
        }
        f(&conn)
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError`. Constraint violations become
/// `Conflict`, everything else `Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => DbError::Internal(e.to_string()),
    }
}

/// Like `map_sqlite_err`, but an empty result becomes `NotFound(what)`.
pub(crate) fn not_found(what: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> DbError {
    let what = what.into();
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what),
        other => map_sqlite_err(other),
    }
}


#[async_trait]
impl Database for SqliteDatabase {
    // -- Transactions --
    async fn begin(&self) -> Result<Box<dyn DbTransaction>, DbError> {
        let guard = self.conn.clone().lock_owned().await;
        Ok(Box::new(SqliteTransaction::start(guard).await?))
    }

    // -- Categories --
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_category_sync(&input)).await
    }
    async fn get_category(&self, id: i64) -> Result<Category, DbError> {
        self.blocking(move |db| db.get_category_sync(id)).await
    }
    async fn list_categories(&self) -> Result<Vec<Category>, DbError> {
        self.blocking(|db| db.list_categories_sync()).await
    }
    async fn page_categories(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Category>, DbError> {
        let page = *page;
        let pattern = pattern.map(str::to_string);
        self.blocking(move |db| db.page_categories_sync(&page, pattern.as_deref()))
            .await
    }
    async fn update_category(
        &self,
        id: i64,
        update: &UpdateCategory,
    ) -> Result<Category, DbError> {
        let update = update.clone();
        self.blocking(move |db| db.update_category_sync(id, &update)).await
    }
    async fn delete_category(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_category_sync(id)).await
    }

    // -- Providers --
    async fn create_provider(&self, input: &CreateProvider) -> Result<Provider, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_provider_sync(&input)).await
    }
    async fn get_provider(&self, id: i64) -> Result<Provider, DbError> {
        self.blocking(move |db| db.get_provider_sync(id)).await
    }
    async fn list_providers(&self) -> Result<Vec<Provider>, DbError> {
        self.blocking(|db| db.list_providers_sync()).await
    }
    async fn page_providers(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Provider>, DbError> {
        let page = *page;
        let pattern = pattern.map(str::to_string);
        self.blocking(move |db| db.page_providers_sync(&page, pattern.as_deref()))
            .await
    }
    async fn update_provider(
        &self,
        id: i64,
        update: &UpdateProvider,
    ) -> Result<Provider, DbError> {
        let update = update.clone();
        self.blocking(move |db| db.update_provider_sync(id, &update)).await
    }
    async fn delete_provider(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_provider_sync(id)).await
    }

    // -- Invoices --
    async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_invoice_sync(&input)).await
    }
    async fn get_invoice(&self, id: i64) -> Result<Invoice, DbError> {
        self.blocking(move |db| db.get_invoice_sync(id)).await
    }
    async fn list_invoices(&self) -> Result<Vec<Invoice>, DbError> {
        self.blocking(|db| db.list_invoices_sync()).await
    }
    async fn list_provider_invoices(&self, provider_id: i64) -> Result<Vec<Invoice>, DbError> {
        self.blocking(move |db| db.list_provider_invoices_sync(provider_id))
            .await
    }
    async fn page_invoices(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Invoice>, DbError> {
        let page = *page;
        let pattern = pattern.map(str::to_string);
        self.blocking(move |db| db.page_invoices_sync(&page, pattern.as_deref()))
            .await
    }
    async fn update_invoice(&self, id: i64, update: &UpdateInvoice) -> Result<Invoice, DbError> {
        let update = update.clone();
        self.blocking(move |db| db.update_invoice_sync(id, &update)).await
    }
    async fn delete_invoice(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_invoice_sync(id)).await
    }

    // -- Inventory --
    async fn get_item(&self, id: i64) -> Result<InventoryItem, DbError> {
        self.blocking(move |db| db.with_conn(|conn| queries::inventory::get(conn, id)))
            .await
    }
    async fn page_items(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<InventoryItem>, DbError> {
        let page = *page;
        let pattern = pattern.map(str::to_string);
        self.blocking(move |db| {
            db.with_conn(|conn| queries::inventory::page(conn, &page, pattern.as_deref()))
        })
        .await
    }
    async fn list_images(
        &self,
        kind: ImageKind,
        item_id: i64,
    ) -> Result<Vec<ImageRecord>, DbError> {
        self.blocking(move |db| db.with_conn(|conn| queries::images::list(conn, kind, item_id)))
            .await
    }

    // -- Users --
    async fn create_user(
        &self,
        input: &CreateUser,
        password_hash: &str,
    ) -> Result<User, DbError> {
        let input = input.clone();
        let password_hash = password_hash.to_string();
        self.blocking(move |db| db.create_user_sync(&input, &password_hash))
            .await
    }
    async fn get_user(&self, id: i64) -> Result<User, DbError> {
        self.blocking(move |db| db.get_user_sync(id)).await
    }
    async fn find_user_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DbError> {
        let username = username.to_string();
        self.blocking(move |db| db.find_user_credentials_sync(&username))
            .await
    }
    async fn page_users(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<User>, DbError> {
        let page = *page;
        let pattern = pattern.map(str::to_string);
        self.blocking(move |db| db.page_users_sync(&page, pattern.as_deref()))
            .await
    }
    async fn update_user(
        &self,
        id: i64,
        update: &UpdateUser,
        password_hash: Option<&str>,
    ) -> Result<User, DbError> {
        let update = update.clone();
        let password_hash = password_hash.map(str::to_string);
        self.blocking(move |db| db.update_user_sync(id, &update, password_hash.as_deref()))
            .await
    }
    async fn reset_password(&self, dni: &str, password_hash: &str) -> Result<(), DbError> {
        let dni = dni.to_string();
        let password_hash = password_hash.to_string();
        self.blocking(move |db| db.reset_password_sync(&dni, &password_hash))
            .await
    }
    async fn delete_user(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_user_sync(id)).await
    }
    async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
        self.blocking(|db| db.list_roles_sync()).await
    }
    async fn list_user_statuses(&self) -> Result<Vec<UserStatus>, DbError> {
        self.blocking(|db| db.list_user_statuses_sync()).await
    }

    // -- Sessions --
    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.create_session_sync(user_id, &token_hash, expires_at))
            .await
    }
    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.find_session_sync(&token_hash)).await
    }
    async fn delete_session(&self, token_hash: &str) -> Result<(), DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.delete_session_sync(&token_hash)).await
    }
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        self.blocking(move |db| db.purge_expired_sessions_sync(now)).await
    }
}
