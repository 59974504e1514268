pub mod records;
mod sqlite;

pub use records::{DbTransaction, ImageRecords, InventoryRecords};
pub use sqlite::{SqliteDatabase, SqliteTransaction};

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::category::{Category, CreateCategory, UpdateCategory};
use stockroom_core::image::{ImageKind, ImageRecord};
use stockroom_core::inventory::InventoryItem;
use stockroom_core::invoice::{CreateInvoice, Invoice, UpdateInvoice};
use stockroom_core::page::{Page, PageQuery};
use stockroom_core::provider::{CreateProvider, Provider, UpdateProvider};
use stockroom_core::user::{CreateUser, Role, Session, UpdateUser, User, UserCredentials, UserStatus};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A constraint rejected the write (unique key, foreign key, check).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Path of the database file. Defaults to `data_dir()/stockroom.db`.
    pub sqlite_path: Option<String>,
}

/// `$XDG_DATA_HOME/stockroom`, falling back to `~/.local/share/stockroom`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("stockroom")
}

/// Storage backend for everything the server persists.
///
/// Plain methods run in their own implicit transaction. Multi-step writes
/// that must commit or roll back together go through [`Database::begin`].
/// `page_*` methods take an optional `LIKE` pattern applied across the
/// entity's searchable columns.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Transactions --
    async fn begin(&self) -> Result<Box<dyn DbTransaction>, DbError>;

    // -- Categories --
    async fn create_category(&self, input: &CreateCategory) -> Result<Category, DbError>;
    async fn get_category(&self, id: i64) -> Result<Category, DbError>;
    async fn list_categories(&self) -> Result<Vec<Category>, DbError>;
    async fn page_categories(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Category>, DbError>;
    async fn update_category(&self, id: i64, update: &UpdateCategory)
        -> Result<Category, DbError>;
    async fn delete_category(&self, id: i64) -> Result<(), DbError>;

    // -- Providers --
    async fn create_provider(&self, input: &CreateProvider) -> Result<Provider, DbError>;
    async fn get_provider(&self, id: i64) -> Result<Provider, DbError>;
    async fn list_providers(&self) -> Result<Vec<Provider>, DbError>;
    async fn page_providers(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Provider>, DbError>;
    async fn update_provider(&self, id: i64, update: &UpdateProvider)
        -> Result<Provider, DbError>;
    async fn delete_provider(&self, id: i64) -> Result<(), DbError>;

    // -- Invoices --
    async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, DbError>;
    async fn get_invoice(&self, id: i64) -> Result<Invoice, DbError>;
    async fn list_invoices(&self) -> Result<Vec<Invoice>, DbError>;
    async fn list_provider_invoices(&self, provider_id: i64) -> Result<Vec<Invoice>, DbError>;
    async fn page_invoices(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<Invoice>, DbError>;
    async fn update_invoice(&self, id: i64, update: &UpdateInvoice) -> Result<Invoice, DbError>;
    async fn delete_invoice(&self, id: i64) -> Result<(), DbError>;

    // -- Inventory (reads; writes go through a transaction) --
    async fn get_item(&self, id: i64) -> Result<InventoryItem, DbError>;
    async fn page_items(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<InventoryItem>, DbError>;
    async fn list_images(&self, kind: ImageKind, item_id: i64)
        -> Result<Vec<ImageRecord>, DbError>;

    // -- Users --
    async fn create_user(&self, input: &CreateUser, password_hash: &str)
        -> Result<User, DbError>;
    async fn get_user(&self, id: i64) -> Result<User, DbError>;
    async fn find_user_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DbError>;
    async fn page_users(
        &self,
        page: &PageQuery,
        pattern: Option<&str>,
    ) -> Result<Page<User>, DbError>;
    async fn update_user(
        &self,
        id: i64,
        update: &UpdateUser,
        password_hash: Option<&str>,
    ) -> Result<User, DbError>;
    async fn reset_password(&self, dni: &str, password_hash: &str) -> Result<(), DbError>;
    async fn delete_user(&self, id: i64) -> Result<(), DbError>;
    async fn list_roles(&self) -> Result<Vec<Role>, DbError>;
    async fn list_user_statuses(&self) -> Result<Vec<UserStatus>, DbError>;

    // -- Sessions --
    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DbError>;
    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, DbError>;
    async fn delete_session(&self, token_hash: &str) -> Result<(), DbError>;
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}
