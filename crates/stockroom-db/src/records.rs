//! Record stores that take part in an explicit transaction.
//!
//! The attachment workflow needs the inventory row and its image rows to
//! commit or roll back together, so these operations live on the
//! transaction handle rather than on [`crate::Database`].

use async_trait::async_trait;

use stockroom_core::image::{ImageKind, ImageRecord};
use stockroom_core::inventory::{CreateInventory, InventoryItem, UpdateInventory};

use crate::DbError;

#[async_trait]
pub trait InventoryRecords: Send {
    async fn create_item(&mut self, input: &CreateInventory) -> Result<InventoryItem, DbError>;

    /// Apply the supplied fields. `Ok(None)` when no such item exists.
    async fn update_item(
        &mut self,
        id: i64,
        update: &UpdateInventory,
    ) -> Result<Option<InventoryItem>, DbError>;

    /// Delete the item row; its image rows cascade. Returns rows affected.
    async fn delete_item(&mut self, id: i64) -> Result<u64, DbError>;
}

#[async_trait]
pub trait ImageRecords: Send {
    async fn create_image(
        &mut self,
        kind: ImageKind,
        item_id: i64,
        stored_name: &str,
    ) -> Result<ImageRecord, DbError>;

    async fn list_images(&mut self, kind: ImageKind, item_id: i64)
        -> Result<Vec<ImageRecord>, DbError>;

    /// Delete every image row of `kind` owned by the item. Returns rows affected.
    async fn delete_images(&mut self, kind: ImageKind, item_id: i64) -> Result<u64, DbError>;
}

/// An open database transaction.
///
/// Dropping a transaction without calling [`commit`](DbTransaction::commit)
/// rolls it back.
#[async_trait]
pub trait DbTransaction: InventoryRecords + ImageRecords {
    async fn commit(self: Box<Self>) -> Result<(), DbError>;
    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}
