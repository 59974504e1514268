use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use stockroom_core::category::{Category, CreateCategory, UpdateCategory};
use stockroom_core::image::{AttachmentSet, ImageKind, ImageRecord};
use stockroom_core::inventory::{CreateInventory, InventoryItem, UpdateInventory};
use stockroom_core::invoice::{CreateInvoice, Invoice, UpdateInvoice};
use stockroom_core::page::{FilterQuery, Page};
use stockroom_core::provider::{CreateProvider, Provider, UpdateProvider};
use stockroom_core::user::{
    CreateUser, ResetPassword, Role, UpdateUser, User, UserStatus,
};
use stockroom_db::Database;
use stockroom_store::{FileStore, StoreError};

use crate::{AttachmentError, AttachmentTransaction, Completed, ServiceError};

pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

const BAD_CREDENTIALS: &str = "wrong username or password";

/// Both image groups of one inventory item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemImages {
    pub images: Vec<ImageRecord>,
    pub damaged_images: Vec<ImageRecord>,
}

/// Everything the HTTP layer needs, backed by a [`Database`] and a
/// [`FileStore`].
#[derive(Clone)]
pub struct LocalService {
    db: Arc<dyn Database>,
    files: Arc<dyn FileStore>,
    attachments: AttachmentTransaction,
    bcrypt_cost: u32,
}

impl LocalService {
    pub fn new(db: Arc<dyn Database>, files: Arc<dyn FileStore>) -> Self {
        Self {
            attachments: AttachmentTransaction::new(db.clone(), files.clone()),
            db,
            files,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Override the bcrypt work factor. Tests use the minimum to stay fast.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn files(&self) -> &Arc<dyn FileStore> {
        &self.files
    }

    // -- Categories --

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.db.list_categories().await?)
    }

    pub async fn get_category(&self, id: i64) -> Result<Category, ServiceError> {
        Ok(self.db.get_category(id).await?)
    }

    pub async fn page_categories(
        &self,
        query: &FilterQuery,
    ) -> Result<Page<Category>, ServiceError> {
        let pattern = like_pattern(query);
        Ok(self
            .db
            .page_categories(&query.page(), pattern.as_deref())
            .await?)
    }

    pub async fn create_category(&self, input: &CreateCategory) -> Result<Category, ServiceError> {
        input.validate()?;
        Ok(self.db.create_category(input).await?)
    }

    pub async fn update_category(
        &self,
        id: i64,
        update: &UpdateCategory,
    ) -> Result<Category, ServiceError> {
        update.validate()?;
        Ok(self.db.update_category(id, update).await?)
    }

    pub async fn delete_category(&self, id: i64) -> Result<(), ServiceError> {
        Ok(self.db.delete_category(id).await?)
    }

    // -- Providers --

    pub async fn list_providers(&self) -> Result<Vec<Provider>, ServiceError> {
        Ok(self.db.list_providers().await?)
    }

    pub async fn get_provider(&self, id: i64) -> Result<Provider, ServiceError> {
        Ok(self.db.get_provider(id).await?)
    }

    pub async fn page_providers(
        &self,
        query: &FilterQuery,
    ) -> Result<Page<Provider>, ServiceError> {
        let pattern = like_pattern(query);
        Ok(self
            .db
            .page_providers(&query.page(), pattern.as_deref())
            .await?)
    }

    pub async fn create_provider(&self, input: &CreateProvider) -> Result<Provider, ServiceError> {
        input.validate()?;
        Ok(self.db.create_provider(input).await?)
    }

    pub async fn update_provider(
        &self,
        id: i64,
        update: &UpdateProvider,
    ) -> Result<Provider, ServiceError> {
        update.validate()?;
        Ok(self.db.update_provider(id, update).await?)
    }

    pub async fn delete_provider(&self, id: i64) -> Result<(), ServiceError> {
        Ok(self.db.delete_provider(id).await?)
    }

    pub async fn list_provider_invoices(
        &self,
        provider_id: i64,
    ) -> Result<Vec<Invoice>, ServiceError> {
        // Distinguish "no invoices" from "no such provider".
        self.db.get_provider(provider_id).await?;
        Ok(self.db.list_provider_invoices(provider_id).await?)
    }

    // -- Invoices --

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self.db.list_invoices().await?)
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Invoice, ServiceError> {
        Ok(self.db.get_invoice(id).await?)
    }

    pub async fn page_invoices(&self, query: &FilterQuery) -> Result<Page<Invoice>, ServiceError> {
        let pattern = like_pattern(query);
        Ok(self
            .db
            .page_invoices(&query.page(), pattern.as_deref())
            .await?)
    }

    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, ServiceError> {
        input.validate()?;
        Ok(self.db.create_invoice(input).await?)
    }

    pub async fn update_invoice(
        &self,
        id: i64,
        update: &UpdateInvoice,
    ) -> Result<Invoice, ServiceError> {
        update.validate()?;
        Ok(self.db.update_invoice(id, update).await?)
    }

    pub async fn delete_invoice(&self, id: i64) -> Result<(), ServiceError> {
        Ok(self.db.delete_invoice(id).await?)
    }

    // -- Inventory --

    pub async fn get_item(&self, id: i64) -> Result<InventoryItem, ServiceError> {
        Ok(self.db.get_item(id).await?)
    }

    pub async fn page_items(
        &self,
        query: &FilterQuery,
    ) -> Result<Page<InventoryItem>, ServiceError> {
        let pattern = like_pattern(query);
        Ok(self.db.page_items(&query.page(), pattern.as_deref()).await?)
    }

    pub async fn item_images(&self, id: i64) -> Result<ItemImages, ServiceError> {
        self.db.get_item(id).await?;
        Ok(ItemImages {
            images: self.db.list_images(ImageKind::Item, id).await?,
            damaged_images: self.db.list_images(ImageKind::Damage, id).await?,
        })
    }

    pub async fn create_item(
        &self,
        fields: &CreateInventory,
        uploads: &AttachmentSet,
    ) -> Result<Completed, AttachmentError> {
        self.attachments.create(fields, uploads).await
    }

    pub async fn update_item(
        &self,
        id: i64,
        fields: &UpdateInventory,
        uploads: &AttachmentSet,
    ) -> Result<Completed, AttachmentError> {
        self.attachments.update(id, fields, uploads).await
    }

    pub async fn remove_item(&self, id: i64) -> Result<Completed, AttachmentError> {
        self.attachments.remove(id).await
    }

    /// Read a stored upload by its generated name.
    pub async fn read_upload(&self, name: &str) -> Result<Bytes, ServiceError> {
        self.files.get(name).await.map_err(|e| match e {
            StoreError::NotFound(_) | StoreError::InvalidName(_) => {
                ServiceError::NotFound(format!("file {name}"))
            }
            other => ServiceError::Internal(other.to_string()),
        })
    }

    // -- Users --

    pub async fn page_users(&self, query: &FilterQuery) -> Result<Page<User>, ServiceError> {
        let pattern = like_pattern(query);
        Ok(self.db.page_users(&query.page(), pattern.as_deref()).await?)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, ServiceError> {
        Ok(self.db.get_user(id).await?)
    }

    pub async fn create_user(&self, input: &CreateUser) -> Result<User, ServiceError> {
        input.validate()?;
        let hash = self.hash_password(&input.password).await?;
        let user = self.db.create_user(input, &hash).await?;
        tracing::info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn update_user(&self, id: i64, update: &UpdateUser) -> Result<User, ServiceError> {
        update.validate()?;
        let hash = match &update.password {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };
        Ok(self.db.update_user(id, update, hash.as_deref()).await?)
    }

    pub async fn reset_password(&self, input: &ResetPassword) -> Result<(), ServiceError> {
        input.validate()?;
        let hash = self.hash_password(&input.password).await?;
        Ok(self.db.reset_password(&input.dni, &hash).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ServiceError> {
        Ok(self.db.delete_user(id).await?)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        Ok(self.db.list_roles().await?)
    }

    pub async fn list_user_statuses(&self) -> Result<Vec<UserStatus>, ServiceError> {
        Ok(self.db.list_user_statuses().await?)
    }

    /// Check a username and password. Unknown users, wrong passwords and
    /// inactive accounts all get the same answer.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let Some(creds) = self.db.find_user_credentials(username).await? else {
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
        };

        let password = password.to_string();
        let hash = creds.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .unwrap_or(false);

        if !valid || creds.user.status_name == "inactive" {
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        Ok(creds.user)
    }

    async fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
    }
}

/// A blank filter lists everything.
fn like_pattern(query: &FilterQuery) -> Option<String> {
    if query.filter.trim().is_empty() {
        None
    } else {
        Some(query.pattern())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_db::SqliteDatabase;
    use stockroom_store::LocalStore;

    fn service(dir: &std::path::Path) -> LocalService {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let files: Arc<dyn FileStore> = Arc::new(LocalStore::new(dir));
        LocalService::new(db, files).with_bcrypt_cost(4)
    }

    fn ana() -> CreateUser {
        CreateUser {
            name: "Ana".into(),
            lastname: "Quispe".into(),
            dni: "44556677".into(),
            username: "ana".into(),
            password: "correct-horse".into(),
            role_id: 1,
            status_id: 1,
        }
    }

    #[tokio::test]
    async fn credentials_round_trip_through_bcrypt() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        svc.create_user(&ana()).await.unwrap();

        let user = svc.verify_credentials("ana", "correct-horse").await.unwrap();
        assert_eq!(user.role_name, "admin");

        let wrong = svc.verify_credentials("ana", "battery-staple").await;
        assert!(matches!(wrong, Err(ServiceError::Unauthorized(_))));
        let unknown = svc.verify_credentials("bob", "correct-horse").await;
        assert!(matches!(unknown, Err(ServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn reset_password_replaces_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        svc.create_user(&ana()).await.unwrap();

        svc.reset_password(&ResetPassword {
            dni: "44556677".into(),
            password: "new-password".into(),
        })
        .await
        .unwrap();

        assert!(svc.verify_credentials("ana", "correct-horse").await.is_err());
        assert!(svc.verify_credentials("ana", "new-password").await.is_ok());
    }

    #[tokio::test]
    async fn inactive_users_cannot_log_in() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        let user = svc.create_user(&ana()).await.unwrap();
        svc.update_user(
            user.id,
            &UpdateUser {
                status_id: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = svc.verify_credentials("ana", "correct-horse").await;
        assert!(matches!(err, Err(ServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn short_passwords_are_rejected_before_hashing() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        let err = svc
            .create_user(&CreateUser {
                password: "short".into(),
                ..ana()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)), "{err:?}");
    }

    #[tokio::test]
    async fn blank_filter_lists_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        for name in ["Tools", "Paint"] {
            svc.create_category(&CreateCategory {
                name: name.into(),
                description: String::new(),
            })
            .await
            .unwrap();
        }

        let mut query = FilterQuery {
            filter: "   ".into(),
            per_page: 10,
            current_page: 1,
        };
        assert_eq!(svc.page_categories(&query).await.unwrap().count, 2);

        query.filter = "pai".into();
        let page = svc.page_categories(&query).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.rows[0].name, "Paint");
    }

    #[tokio::test]
    async fn invoices_of_unknown_provider_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        let err = svc.list_provider_invoices(9).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
    }

    #[tokio::test]
    async fn read_upload_hides_invalid_names() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        let err = svc.read_upload("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
    }
}
