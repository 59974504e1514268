pub mod category;
pub mod error;
pub mod image;
pub mod inventory;
pub mod invoice;
pub mod page;
pub mod provider;
pub mod user;

pub use error::StockroomError;
pub use image::{AttachmentSet, ImageKind, ImageRecord, UploadedFile};
pub use inventory::InventoryItem;
pub use page::{FilterQuery, Page, PageQuery};
