// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so the same assertions
// can run against any backend that implements it.

use stockroom_core::category::CreateCategory;
use stockroom_core::image::ImageKind;
use stockroom_core::inventory::{CreateInventory, UpdateInventory};
use stockroom_core::page::PageQuery;
use stockroom_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_item(name: &str) -> CreateInventory {
    CreateInventory {
        price: 9.99,
        quantity: 3,
        ..CreateInventory::named(name)
    }
}

// ---------------------------------------------------------------------------
// Transaction tests
// ---------------------------------------------------------------------------

/// An item and its image rows become visible together on commit.
pub async fn test_commit_persists_item_and_images(db: &dyn Database) {
    let mut tx = db.begin().await.unwrap();
    let item = tx.create_item(&make_item("Drill")).await.unwrap();
    tx.create_image(ImageKind::Item, item.id, "IMG-1.png").await.unwrap();
    tx.create_image(ImageKind::Damage, item.id, "IMG-2.png").await.unwrap();
    tx.commit().await.unwrap();

    let fetched = db.get_item(item.id).await.unwrap();
    assert_eq!(fetched.name, "Drill");
    assert_eq!(db.list_images(ImageKind::Item, item.id).await.unwrap().len(), 1);
    assert_eq!(db.list_images(ImageKind::Damage, item.id).await.unwrap().len(), 1);
}

/// Rolling back leaves no trace of the item or its images.
pub async fn test_rollback_discards_everything(db: &dyn Database) {
    let mut tx = db.begin().await.unwrap();
    let item = tx.create_item(&make_item("Saw")).await.unwrap();
    tx.create_image(ImageKind::Item, item.id, "IMG-3.png").await.unwrap();
    tx.rollback().await.unwrap();

    assert!(matches!(db.get_item(item.id).await, Err(DbError::NotFound(_))));
    assert!(db.list_images(ImageKind::Item, item.id).await.unwrap().is_empty());
}

/// Dropping an unfinished transaction rolls it back and frees the connection.
pub async fn test_drop_rolls_back(db: &dyn Database) {
    let item_id = {
        let mut tx = db.begin().await.unwrap();
        tx.create_item(&make_item("Hammer")).await.unwrap().id
    };
    assert!(matches!(db.get_item(item_id).await, Err(DbError::NotFound(_))));

    // The connection is usable again.
    let page = db.page_items(&PageQuery::default(), None).await.unwrap();
    assert_eq!(page.count, 0);
}

/// A failing statement inside a transaction does not poison it; the caller
/// decides to roll back.
pub async fn test_failed_statement_then_rollback(db: &dyn Database) {
    let mut tx = db.begin().await.unwrap();
    let item = tx.create_item(&make_item("Level")).await.unwrap();
    tx.create_image(ImageKind::Item, item.id, "IMG-dup.png").await.unwrap();
    let err = tx
        .create_image(ImageKind::Item, item.id, "IMG-dup.png")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "{err:?}");
    tx.rollback().await.unwrap();

    assert!(db.page_items(&PageQuery::default(), None).await.unwrap().rows.is_empty());
}

/// Update and image replacement through a transaction.
pub async fn test_update_replaces_image_rows(db: &dyn Database) {
    let mut tx = db.begin().await.unwrap();
    let item = tx.create_item(&make_item("Clamp")).await.unwrap();
    tx.create_image(ImageKind::Item, item.id, "IMG-old.png").await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let updated = tx
        .update_item(
            item.id,
            &UpdateInventory {
                quantity: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.quantity, 10);
    assert_eq!(tx.delete_images(ImageKind::Item, item.id).await.unwrap(), 1);
    tx.create_image(ImageKind::Item, item.id, "IMG-new.png").await.unwrap();
    let names: Vec<_> = tx
        .list_images(ImageKind::Item, item.id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, ["IMG-new.png"]);
    tx.commit().await.unwrap();

    assert_eq!(db.get_item(item.id).await.unwrap().quantity, 10);
    let missing = {
        let mut tx = db.begin().await.unwrap();
        let none = tx
            .update_item(404, &UpdateInventory::default())
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        none
    };
    assert!(missing.is_none());
}

/// Deleting an item cascades to its image rows.
pub async fn test_delete_item_cascades(db: &dyn Database) {
    let mut tx = db.begin().await.unwrap();
    let item = tx.create_item(&make_item("Pliers")).await.unwrap();
    tx.create_image(ImageKind::Damage, item.id, "IMG-9.png").await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = db.begin().await.unwrap();
    assert_eq!(tx.delete_item(item.id).await.unwrap(), 1);
    tx.commit().await.unwrap();

    assert!(db.list_images(ImageKind::Damage, item.id).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Reference tests
// ---------------------------------------------------------------------------

/// A category referenced by an item cannot be deleted.
pub async fn test_category_in_use(db: &dyn Database) {
    let category = db
        .create_category(&CreateCategory {
            name: "Tools".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    let mut tx = db.begin().await.unwrap();
    tx.create_item(&CreateInventory {
        category_id: Some(category.id),
        ..make_item("Wrench")
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let err = db.delete_category(category.id).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "{err:?}");
}

/// Item listing filters on name and description.
pub async fn test_item_paging(db: &dyn Database) {
    let mut tx = db.begin().await.unwrap();
    for name in ["Drill", "Drill bits", "Sander"] {
        tx.create_item(&make_item(name)).await.unwrap();
    }
    tx.commit().await.unwrap();

    let drills = db
        .page_items(&PageQuery::new(1, 2), Some("%drill%"))
        .await
        .unwrap();
    assert_eq!(drills.count, 2);
    assert_eq!(drills.rows.len(), 1);
    assert_eq!(drills.rows[0].name, "Drill bits");
}
