//! Inventory writes that carry image uploads.
//!
//! Each operation runs one database transaction plus the file deletions it
//! implies. Rows are atomic; files are not, so deletions are ordered around
//! the transaction boundary:
//!
//! - uploads are already on disk when an operation starts, and any failure
//!   deletes them again ("discarding the uploads");
//! - files being replaced or removed are deleted while the transaction is
//!   still open, so a failed deletion can roll the rows back.
//!
//! The one window left is a file deleted before a later step fails: its row
//! comes back on rollback but the file does not.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use stockroom_core::image::{AttachmentSet, ImageKind, UploadedFile};
use stockroom_core::inventory::{CreateInventory, InventoryItem, UpdateInventory};
use stockroom_db::{Database, DbError, DbTransaction};
use stockroom_store::{FileStore, PartialDeleteFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before anything was written.
    Validation,
    /// A row operation failed; the transaction was rolled back.
    Persistence,
    /// Stored files could not be deleted; the transaction was rolled back.
    PhysicalIo,
    /// A prior state the operation relies on was missing.
    Consistency,
    /// Opening or committing the transaction, or another unexpected fault.
    Infrastructure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Validation => "validation",
            FailureKind::Persistence => "persistence",
            FailureKind::PhysicalIo => "physical io",
            FailureKind::Consistency => "consistency",
            FailureKind::Infrastructure => "infrastructure",
        };
        f.write_str(s)
    }
}

/// A failed attachment operation.
///
/// `cleanup` holds the secondary failure of discarding the uploads, when
/// that went wrong too. It never replaces the primary failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AttachmentError {
    pub kind: FailureKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub cleanup: Option<PartialDeleteFailure>,
}

impl AttachmentError {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            cleanup: None,
        }
    }

    fn caused_by(
        kind: FailureKind,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(kind, message)
        }
    }

    /// Failures the caller can act on, as opposed to infrastructure faults.
    pub fn is_domain(&self) -> bool {
        self.kind != FailureKind::Infrastructure
    }
}

/// A successful attachment operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub message: String,
    /// Set on create.
    pub item_id: Option<i64>,
}

/// Runs create, update and remove of inventory items together with their
/// image records and files.
///
/// While a transaction is open it holds the database, so nothing in here may
/// call a plain [`Database`] method between `begin` and commit or rollback.
#[derive(Clone)]
pub struct AttachmentTransaction {
    db: Arc<dyn Database>,
    files: Arc<dyn FileStore>,
}

impl AttachmentTransaction {
    pub fn new(db: Arc<dyn Database>, files: Arc<dyn FileStore>) -> Self {
        Self { db, files }
    }

    pub async fn create(
        &self,
        fields: &CreateInventory,
        uploads: &AttachmentSet,
    ) -> Result<Completed, AttachmentError> {
        if let Err(e) = fields.validate() {
            let err = AttachmentError::caused_by(FailureKind::Validation, e.to_string(), e);
            return Err(self.discard(uploads, err).await);
        }
        if fields.damaged == 0 && !uploads.damaged_images.is_empty() {
            let err = AttachmentError::new(
                FailureKind::Consistency,
                format!(
                    "item {} has no damaged units, so damage images cannot be kept",
                    fields.name
                ),
            );
            return Err(self.discard(uploads, err).await);
        }

        let mut tx = match self.db.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.discard(uploads, begin_failed(e)).await),
        };

        let item = match tx.create_item(fields).await {
            Ok(item) => item,
            Err(e) => {
                let err = AttachmentError::caused_by(
                    FailureKind::Persistence,
                    format!("item {} was not saved", fields.name),
                    e,
                );
                return Err(self.fail(tx, uploads, err).await);
            }
        };

        for kind in ImageKind::ALL {
            let recorded = record_group(tx.as_mut(), *kind, item.id, uploads.group(*kind)).await;
            if let Err(e) = recorded {
                let err = AttachmentError::caused_by(
                    FailureKind::Persistence,
                    format!("{kind} could not be recorded"),
                    e,
                );
                return Err(self.fail(tx, uploads, err).await);
            }
        }

        if let Err(e) = tx.commit().await {
            return Err(self.discard(uploads, commit_failed(e)).await);
        }

        info!(
            item_id = item.id,
            images = uploads.images.len(),
            damaged_images = uploads.damaged_images.len(),
            "inventory item created"
        );
        Ok(Completed {
            message: format!("item {} saved", item.name),
            item_id: Some(item.id),
        })
    }

    pub async fn update(
        &self,
        item_id: i64,
        fields: &UpdateInventory,
        uploads: &AttachmentSet,
    ) -> Result<Completed, AttachmentError> {
        if let Err(e) = fields.validate() {
            let err = AttachmentError::caused_by(FailureKind::Validation, e.to_string(), e);
            return Err(self.discard(uploads, err).await);
        }

        let mut tx = match self.db.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.discard(uploads, begin_failed(e)).await),
        };

        let item = match tx.update_item(item_id, fields).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                let err = AttachmentError::new(
                    FailureKind::Consistency,
                    format!("item {item_id} not found"),
                );
                return Err(self.fail(tx, uploads, err).await);
            }
            Err(e) => {
                let err = AttachmentError::caused_by(
                    FailureKind::Persistence,
                    format!("item {item_id} was not updated"),
                    e,
                );
                return Err(self.fail(tx, uploads, err).await);
            }
        };

        if !uploads.images.is_empty() {
            let replaced = self.replace_images(tx.as_mut(), item_id, &uploads.images).await;
            if let Err(err) = replaced {
                return Err(self.fail(tx, uploads, err).await);
            }
        }

        let reconciled = self
            .reconcile_damage(tx.as_mut(), &item, &uploads.damaged_images)
            .await;
        if let Err(err) = reconciled {
            return Err(self.fail(tx, uploads, err).await);
        }

        if let Err(e) = tx.commit().await {
            return Err(self.discard(uploads, commit_failed(e)).await);
        }

        info!(item_id, damaged = item.damaged, "inventory item updated");
        Ok(Completed {
            message: format!("item {item_id} updated"),
            item_id: None,
        })
    }

    pub async fn remove(&self, item_id: i64) -> Result<Completed, AttachmentError> {
        let mut tx = self.db.begin().await.map_err(begin_failed)?;

        // Names must be read before the cascade takes the rows away.
        let mut names = Vec::new();
        for kind in ImageKind::ALL {
            match tx.list_images(*kind, item_id).await {
                Ok(records) => names.extend(records.into_iter().map(|r| r.name)),
                Err(e) => {
                    abort(tx).await;
                    return Err(AttachmentError::caused_by(
                        FailureKind::Infrastructure,
                        format!("{kind} of item {item_id} could not be read"),
                        e,
                    ));
                }
            }
        }

        match tx.delete_item(item_id).await {
            Ok(0) => {
                abort(tx).await;
                return Err(AttachmentError::new(
                    FailureKind::Consistency,
                    format!("item {item_id} not found"),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                abort(tx).await;
                return Err(AttachmentError::caused_by(
                    FailureKind::Persistence,
                    format!("item {item_id} was not deleted"),
                    e,
                ));
            }
        }

        if let Err(failure) = self.files.delete_all(&names).await {
            abort(tx).await;
            return Err(AttachmentError::caused_by(
                FailureKind::PhysicalIo,
                format!("images of item {item_id} could not be deleted"),
                failure,
            ));
        }

        tx.commit().await.map_err(commit_failed)?;

        info!(item_id, files = names.len(), "inventory item removed");
        Ok(Completed {
            message: format!("item {item_id} deleted"),
            item_id: None,
        })
    }

    /// Swap the item's images for `uploads`: old rows, then old files, then
    /// new rows.
    async fn replace_images(
        &self,
        tx: &mut dyn DbTransaction,
        item_id: i64,
        uploads: &[UploadedFile],
    ) -> Result<(), AttachmentError> {
        let not_updated = |e: DbError| {
            AttachmentError::caused_by(FailureKind::Persistence, "item images not updated", e)
        };

        let previous = tx
            .list_images(ImageKind::Item, item_id)
            .await
            .map_err(not_updated)?;
        let deleted = tx
            .delete_images(ImageKind::Item, item_id)
            .await
            .map_err(not_updated)?;
        if deleted == 0 {
            return Err(AttachmentError::new(
                FailureKind::Consistency,
                "previous images could not be located for update",
            ));
        }

        let names: Vec<String> = previous.into_iter().map(|r| r.name).collect();
        self.delete_files(&names, "previous item images could not be deleted")
            .await?;

        record_group(tx, ImageKind::Item, item_id, uploads)
            .await
            .map_err(not_updated)
    }

    /// Bring the damage images in line with the item's damaged count.
    async fn reconcile_damage(
        &self,
        tx: &mut dyn DbTransaction,
        item: &InventoryItem,
        uploads: &[UploadedFile],
    ) -> Result<(), AttachmentError> {
        if item.damaged > 0 && uploads.is_empty() {
            return Ok(());
        }
        if item.damaged == 0 && !uploads.is_empty() {
            return Err(AttachmentError::new(
                FailureKind::Consistency,
                format!(
                    "item {} has no damaged units, so damage images cannot be kept",
                    item.id
                ),
            ));
        }

        let not_updated = |e: DbError| {
            AttachmentError::caused_by(FailureKind::Persistence, "damage images not updated", e)
        };

        let previous = tx
            .list_images(ImageKind::Damage, item.id)
            .await
            .map_err(not_updated)?;
        if !previous.is_empty() {
            tx.delete_images(ImageKind::Damage, item.id)
                .await
                .map_err(not_updated)?;
            let names: Vec<String> = previous.into_iter().map(|r| r.name).collect();
            self.delete_files(&names, "previous damage images could not be deleted")
                .await?;
        }

        record_group(tx, ImageKind::Damage, item.id, uploads)
            .await
            .map_err(not_updated)
    }

    async fn delete_files(&self, names: &[String], message: &str) -> Result<(), AttachmentError> {
        self.files
            .delete_all(names)
            .await
            .map_err(|failure| AttachmentError::caused_by(FailureKind::PhysicalIo, message, failure))
    }

    /// Roll back, then discard the uploads.
    async fn fail(
        &self,
        tx: Box<dyn DbTransaction>,
        uploads: &AttachmentSet,
        err: AttachmentError,
    ) -> AttachmentError {
        abort(tx).await;
        self.discard(uploads, err).await
    }

    /// Delete every uploaded file of the request. A failure here is attached
    /// to `err` as its cleanup failure.
    async fn discard(&self, uploads: &AttachmentSet, mut err: AttachmentError) -> AttachmentError {
        let names = uploads.stored_names();
        if names.is_empty() {
            return err;
        }
        if let Err(cleanup) = self.files.delete_all(&names).await {
            warn!(error = %cleanup, "uploaded files could not be discarded");
            err.cleanup = Some(cleanup);
        }
        err
    }
}

/// Insert one row per upload, stopping at the first failure.
async fn record_group(
    tx: &mut dyn DbTransaction,
    kind: ImageKind,
    item_id: i64,
    uploads: &[UploadedFile],
) -> Result<(), DbError> {
    for upload in uploads {
        tx.create_image(kind, item_id, &upload.stored_name).await?;
    }
    Ok(())
}

async fn abort(tx: Box<dyn DbTransaction>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "rollback failed");
    }
}

fn begin_failed(e: DbError) -> AttachmentError {
    tracing::error!(error = %e, "could not open a transaction");
    AttachmentError::caused_by(FailureKind::Infrastructure, "could not open a transaction", e)
}

fn commit_failed(e: DbError) -> AttachmentError {
    tracing::error!(error = %e, "commit failed");
    AttachmentError::caused_by(FailureKind::Infrastructure, "changes could not be committed", e)
}
