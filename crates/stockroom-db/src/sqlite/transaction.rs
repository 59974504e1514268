use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::OwnedMutexGuard;

use stockroom_core::image::{ImageKind, ImageRecord};
use stockroom_core::inventory::{CreateInventory, InventoryItem, UpdateInventory};

use super::queries::{images, inventory};
use super::SqliteResultExt;
use crate::{DbError, DbTransaction, ImageRecords, InventoryRecords};

/// A transaction holding the process-wide connection until it finishes.
///
/// Other database calls queue behind it, so a transaction must never wait
/// on a plain `Database` method of the same backend.
pub struct SqliteTransaction {
    conn: Option<HeldConnection>,
}

/// The locked connection while a transaction owns it.
///
/// The guard travels into blocking tasks and may be released there when the
/// awaiting future is cancelled. Releasing it with a transaction still open
/// rolls that transaction back first, so the mutex is never handed on inside
/// a stale `BEGIN`.
struct HeldConnection(OwnedMutexGuard<Connection>);

impl Drop for HeldConnection {
    fn drop(&mut self) {
        if !self.0.is_autocommit() {
            tracing::warn!("transaction released without commit; rolling back");
            if let Err(e) = self.0.execute_batch("ROLLBACK") {
                tracing::error!("rollback on release failed: {e}");
            }
        }
    }
}

impl SqliteTransaction {
    pub(crate) async fn start(guard: OwnedMutexGuard<Connection>) -> Result<Self, DbError> {
        let mut tx = Self {
            conn: Some(HeldConnection(guard)),
        };
        tx.run(|conn| {
            // A transaction left open by a panicked task must not leak into this one.
            if !conn.is_autocommit() {
                tracing::warn!("rolling back a transaction left open on the connection");
                conn.execute_batch("ROLLBACK").to_db()?;
            }
            conn.execute_batch("BEGIN IMMEDIATE").to_db()
        })
        .await?;
        Ok(tx)
    }

    /// Run `f` on the connection from a blocking thread, keeping the lock.
    ///
    /// If this future is dropped while `f` runs, the blocking task's output
    /// is dropped with it and [`HeldConnection`] rolls back.
    async fn run<F, T>(&mut self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let held = self
            .conn
            .take()
            .ok_or_else(|| DbError::Internal("transaction already finished".into()))?;
        let (held, result) = tokio::task::spawn_blocking(move || {
            let result = f(&held.0);
            (held, result)
        })
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?;
        self.conn = Some(held);
        result
    }

    async fn finish(mut self, sql: &'static str) -> Result<(), DbError> {
        let result = self.run(move |conn| conn.execute_batch(sql).to_db()).await;
        // A failed COMMIT leaves the transaction open; dropping the held
        // connection here rolls it back and releases the lock.
        drop(self.conn.take());
        result
    }
}

#[async_trait]
impl InventoryRecords for SqliteTransaction {
    async fn create_item(&mut self, input: &CreateInventory) -> Result<InventoryItem, DbError> {
        let input = input.clone();
        self.run(move |conn| inventory::insert(conn, &input)).await
    }

    async fn update_item(
        &mut self,
        id: i64,
        update: &UpdateInventory,
    ) -> Result<Option<InventoryItem>, DbError> {
        let update = update.clone();
        self.run(move |conn| inventory::update(conn, id, &update)).await
    }

    async fn delete_item(&mut self, id: i64) -> Result<u64, DbError> {
        self.run(move |conn| inventory::delete(conn, id)).await
    }
}

#[async_trait]
impl ImageRecords for SqliteTransaction {
    async fn create_image(
        &mut self,
        kind: ImageKind,
        item_id: i64,
        stored_name: &str,
    ) -> Result<ImageRecord, DbError> {
        let stored_name = stored_name.to_string();
        self.run(move |conn| images::insert(conn, kind, item_id, &stored_name))
            .await
    }

    async fn list_images(
        &mut self,
        kind: ImageKind,
        item_id: i64,
    ) -> Result<Vec<ImageRecord>, DbError> {
        self.run(move |conn| images::list(conn, kind, item_id)).await
    }

    async fn delete_images(&mut self, kind: ImageKind, item_id: i64) -> Result<u64, DbError> {
        self.run(move |conn| images::delete_for_item(conn, kind, item_id))
            .await
    }
}

#[async_trait]
impl DbTransaction for SqliteTransaction {
    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.finish("ROLLBACK").await
    }
}
