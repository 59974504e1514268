mod attachments;
mod error;
mod local;

pub use attachments::{AttachmentError, AttachmentTransaction, Completed, FailureKind};
pub use error::ServiceError;
pub use local::{ItemImages, LocalService, DEFAULT_BCRYPT_COST};
