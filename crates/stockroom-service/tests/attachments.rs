// End-to-end tests for the attachment workflow against in-memory SQLite and
// a temp-dir upload store.

use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use stockroom_core::image::{AttachmentSet, ImageKind, UploadedFile};
use stockroom_core::inventory::{CreateInventory, UpdateInventory};
use stockroom_core::page::PageQuery;
use stockroom_db::{Database, SqliteDatabase};
use stockroom_service::{AttachmentTransaction, FailureKind};
use stockroom_store::{generate_file_name, FileStore, LocalStore};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    db: Arc<SqliteDatabase>,
    store: Arc<LocalStore>,
    attachments: AttachmentTransaction,
    _tmp: TempDir,
}

impl Harness {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let store = Arc::new(LocalStore::new(tmp.path()));
        let attachments = AttachmentTransaction::new(db.clone(), store.clone());
        Self {
            db,
            store,
            attachments,
            _tmp: tmp,
        }
    }

    /// Write a file the way the upload layer does and describe it.
    async fn upload(&self, original: &str) -> UploadedFile {
        let stored = generate_file_name("IMG", original);
        self.store
            .put(&stored, Bytes::from_static(b"\x89PNG fake"))
            .await
            .unwrap();
        UploadedFile::new(original, stored)
    }

    async fn exists(&self, file: &UploadedFile) -> bool {
        self.store.exists(&file.stored_name).await.unwrap()
    }

    async fn names(&self, kind: ImageKind, item_id: i64) -> Vec<String> {
        self.db
            .list_images(kind, item_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    async fn item_count(&self) -> i64 {
        self.db
            .page_items(&PageQuery::default(), None)
            .await
            .unwrap()
            .count
    }

    /// Create an item with the given uploads, asserting success.
    async fn seed(&self, damaged: i64, images: Vec<UploadedFile>, damaged_images: Vec<UploadedFile>) -> i64 {
        let fields = CreateInventory {
            quantity: 5,
            damaged,
            ..CreateInventory::named("Drill")
        };
        let set = AttachmentSet {
            images,
            damaged_images,
        };
        self.attachments
            .create(&fields, &set)
            .await
            .unwrap()
            .item_id
            .unwrap()
    }
}

fn images(files: &[&UploadedFile]) -> AttachmentSet {
    AttachmentSet {
        images: files.iter().map(|f| (*f).clone()).collect(),
        damaged_images: Vec::new(),
    }
}

fn damage(files: &[&UploadedFile]) -> AttachmentSet {
    AttachmentSet {
        images: Vec::new(),
        damaged_images: files.iter().map(|f| (*f).clone()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_with_one_image_records_item_and_image() {
    let h = Harness::new();
    let photo = h.upload("front.PNG").await;
    assert!(photo.stored_name.starts_with("IMG-"));
    assert!(photo.stored_name.ends_with(".png"));

    let done = h
        .attachments
        .create(&CreateInventory::named("Drill"), &images(&[&photo]))
        .await
        .unwrap();

    let item_id = done.item_id.unwrap();
    assert_eq!(h.db.get_item(item_id).await.unwrap().name, "Drill");
    assert_eq!(h.names(ImageKind::Item, item_id).await, [photo.stored_name.clone()]);
    assert!(h.names(ImageKind::Damage, item_id).await.is_empty());
    assert!(h.exists(&photo).await);
}

#[tokio::test]
async fn failed_item_insert_discards_uploads() {
    let h = Harness::new();
    let photo = h.upload("front.png").await;

    let fields = CreateInventory {
        category_id: Some(999),
        ..CreateInventory::named("Drill")
    };
    let err = h.attachments.create(&fields, &images(&[&photo])).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Persistence);
    assert!(err.message.contains("Drill"), "{}", err.message);
    assert!(err.cleanup.is_none());
    assert!(!h.exists(&photo).await);
    assert_eq!(h.item_count().await, 0);
}

#[tokio::test]
async fn failed_image_insert_rolls_back_and_discards_every_upload() {
    let h = Harness::new();
    h.db
        .execute_script(
            "CREATE TRIGGER reject_damage BEFORE INSERT ON damaged_images
             BEGIN SELECT RAISE(ABORT, 'damage images are read-only'); END;",
        )
        .await
        .unwrap();
    let photo = h.upload("front.png").await;
    let dent = h.upload("dent.png").await;

    let fields = CreateInventory {
        damaged: 1,
        ..CreateInventory::named("Drill")
    };
    let set = AttachmentSet {
        images: vec![photo.clone()],
        damaged_images: vec![dent.clone()],
    };
    let err = h.attachments.create(&fields, &set).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Persistence);
    assert_eq!(err.message, "damage images could not be recorded");
    assert_eq!(h.item_count().await, 0);
    assert!(h.names(ImageKind::Item, 1).await.is_empty());
    // The item images were recorded before the failure, but the rollback
    // took their rows too, so their files go as well.
    assert!(!h.exists(&photo).await);
    assert!(!h.exists(&dent).await);
}

#[tokio::test]
async fn damage_images_without_damaged_units_are_refused() {
    let h = Harness::new();
    let dent = h.upload("dent.png").await;

    let err = h
        .attachments
        .create(&CreateInventory::named("Drill"), &damage(&[&dent]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Consistency);
    assert!(!h.exists(&dent).await);
    assert_eq!(h.item_count().await, 0);
}

#[tokio::test]
async fn invalid_fields_discard_uploads_exhaustively() {
    let h = Harness::new();
    let photo = h.upload("front.png").await;
    let ghost = UploadedFile::new("ghost.png", "IMG-never-written.png");

    let set = AttachmentSet {
        images: vec![ghost.clone(), photo.clone()],
        damaged_images: Vec::new(),
    };
    let err = h
        .attachments
        .create(&CreateInventory::named("   "), &set)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Validation);
    // The missing file fails, the real one after it is still deleted.
    let cleanup = err.cleanup.expect("cleanup failure attached");
    assert_eq!(cleanup.attempted, 2);
    assert_eq!(cleanup.failed_names(), ["IMG-never-written.png"]);
    assert!(!h.exists(&photo).await);
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clearing_damage_deletes_damage_rows_and_files() {
    let h = Harness::new();
    let d1 = h.upload("d1.png").await;
    let d2 = h.upload("d2.png").await;
    let item_id = h.seed(2, Vec::new(), vec![d1.clone(), d2.clone()]).await;

    let fields = UpdateInventory {
        damaged: Some(0),
        ..Default::default()
    };
    h.attachments
        .update(item_id, &fields, &AttachmentSet::default())
        .await
        .unwrap();

    assert_eq!(h.db.get_item(item_id).await.unwrap().damaged, 0);
    assert!(h.names(ImageKind::Damage, item_id).await.is_empty());
    assert!(!h.exists(&d1).await);
    assert!(!h.exists(&d2).await);
}

#[tokio::test]
async fn new_damage_images_replace_previous_ones() {
    let h = Harness::new();
    let prior = h.upload("prior.png").await;
    let item_id = h.seed(1, Vec::new(), vec![prior.clone()]).await;

    let g1 = h.upload("g1.png").await;
    let g2 = h.upload("g2.png").await;
    let fields = UpdateInventory {
        damaged: Some(2),
        ..Default::default()
    };
    h.attachments
        .update(item_id, &fields, &damage(&[&g1, &g2]))
        .await
        .unwrap();

    assert_eq!(
        h.names(ImageKind::Damage, item_id).await,
        [g1.stored_name.clone(), g2.stored_name.clone()]
    );
    assert!(!h.exists(&prior).await);
    assert!(h.exists(&g1).await);
    assert!(h.exists(&g2).await);
}

#[tokio::test]
async fn damage_images_with_zero_damaged_roll_the_update_back() {
    let h = Harness::new();
    let prior = h.upload("prior.png").await;
    let item_id = h.seed(1, Vec::new(), vec![prior.clone()]).await;

    let fresh = h.upload("fresh.png").await;
    let fields = UpdateInventory {
        damaged: Some(0),
        ..Default::default()
    };
    let err = h
        .attachments
        .update(item_id, &fields, &damage(&[&fresh]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Consistency);
    assert_eq!(h.db.get_item(item_id).await.unwrap().damaged, 1);
    assert_eq!(h.names(ImageKind::Damage, item_id).await, [prior.stored_name.clone()]);
    assert!(h.exists(&prior).await);
    assert!(!h.exists(&fresh).await);
}

#[tokio::test]
async fn new_item_images_replace_previous_ones() {
    let h = Harness::new();
    let old = h.upload("old.png").await;
    let item_id = h.seed(0, vec![old.clone()], Vec::new()).await;

    let new = h.upload("new.png").await;
    let fields = UpdateInventory {
        name: Some("Cordless drill".into()),
        ..Default::default()
    };
    h.attachments
        .update(item_id, &fields, &images(&[&new]))
        .await
        .unwrap();

    assert_eq!(h.db.get_item(item_id).await.unwrap().name, "Cordless drill");
    assert_eq!(h.names(ImageKind::Item, item_id).await, [new.stored_name.clone()]);
    assert!(!h.exists(&old).await);
    assert!(h.exists(&new).await);
}

#[tokio::test]
async fn image_update_without_previous_images_is_refused() {
    let h = Harness::new();
    let item_id = h.seed(0, Vec::new(), Vec::new()).await;

    let new = h.upload("new.png").await;
    let fields = UpdateInventory {
        quantity: Some(9),
        ..Default::default()
    };
    let err = h
        .attachments
        .update(item_id, &fields, &images(&[&new]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Consistency);
    assert_eq!(err.message, "previous images could not be located for update");
    assert_eq!(h.db.get_item(item_id).await.unwrap().quantity, 5);
    assert!(!h.exists(&new).await);
}

#[tokio::test]
async fn failed_file_deletion_on_update_restores_rows() {
    let h = Harness::new();
    let old = h.upload("old.png").await;
    let item_id = h.seed(0, vec![old.clone()], Vec::new()).await;
    h.store.delete(&old.stored_name).await.unwrap();

    let new = h.upload("new.png").await;
    let err = h
        .attachments
        .update(item_id, &UpdateInventory::default(), &images(&[&new]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::PhysicalIo);
    assert!(err.is_domain());
    assert_eq!(h.names(ImageKind::Item, item_id).await, [old.stored_name.clone()]);
    assert!(!h.exists(&new).await);
}

#[tokio::test]
async fn update_of_missing_item_discards_uploads() {
    let h = Harness::new();
    let new = h.upload("new.png").await;

    let err = h
        .attachments
        .update(404, &UpdateInventory::default(), &images(&[&new]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Consistency);
    assert!(!h.exists(&new).await);
}

#[tokio::test]
async fn update_without_uploads_leaves_images_alone() {
    let h = Harness::new();
    let photo = h.upload("photo.png").await;
    let dent = h.upload("dent.png").await;
    let item_id = h.seed(1, vec![photo.clone()], vec![dent.clone()]).await;

    let fields = UpdateInventory {
        damaged: Some(3),
        ..Default::default()
    };
    h.attachments
        .update(item_id, &fields, &AttachmentSet::default())
        .await
        .unwrap();

    assert_eq!(h.names(ImageKind::Item, item_id).await.len(), 1);
    assert_eq!(h.names(ImageKind::Damage, item_id).await.len(), 1);
    assert!(h.exists(&photo).await);
    assert!(h.exists(&dent).await);
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_deletes_item_rows_and_files() {
    let h = Harness::new();
    let photo = h.upload("photo.png").await;
    let dent = h.upload("dent.png").await;
    let item_id = h.seed(1, vec![photo.clone()], vec![dent.clone()]).await;

    h.attachments.remove(item_id).await.unwrap();

    assert_eq!(h.item_count().await, 0);
    assert!(h.names(ImageKind::Item, item_id).await.is_empty());
    assert!(h.names(ImageKind::Damage, item_id).await.is_empty());
    assert!(!h.exists(&photo).await);
    assert!(!h.exists(&dent).await);
}

#[tokio::test]
async fn remove_keeps_rows_when_a_file_cannot_be_deleted() {
    let h = Harness::new();
    let photo = h.upload("photo.png").await;
    let dent = h.upload("dent.png").await;
    let item_id = h.seed(1, vec![photo.clone()], vec![dent.clone()]).await;
    h.store.delete(&dent.stored_name).await.unwrap();

    let err = h.attachments.remove(item_id).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::PhysicalIo);
    assert!(h.db.get_item(item_id).await.is_ok());
    assert_eq!(h.names(ImageKind::Item, item_id).await, [photo.stored_name.clone()]);
    assert_eq!(h.names(ImageKind::Damage, item_id).await, [dent.stored_name.clone()]);
    // Files deleted before the failure stay deleted.
    assert!(!h.exists(&photo).await);
}

#[tokio::test]
async fn remove_of_missing_item_is_a_consistency_failure() {
    let h = Harness::new();
    let err = h.attachments.remove(404).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Consistency);
    assert_eq!(err.message, "item 404 not found");
}
