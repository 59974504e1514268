//! Multipart handling for inventory writes.
//!
//! Files are written to the store under generated names while the form is
//! read, before any database work starts. Whoever rejects the form after
//! that point owns deleting them again.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Multipart;
use axum::http::StatusCode;

use stockroom_core::image::{AttachmentSet, ImageKind, UploadedFile};
use stockroom_core::inventory::{CreateInventory, UpdateInventory};
use stockroom_store::{generate_file_name, FileStore};

use crate::routes::{failure, infrastructure, ApiError};

const FILE_PREFIX: &str = "IMG";

/// Form field carrying the files of an image group.
fn group_of(field: &str) -> Option<ImageKind> {
    match field {
        "images" => Some(ImageKind::Item),
        "imgDamaged" => Some(ImageKind::Damage),
        _ => None,
    }
}

/// A parsed inventory form: its text fields plus the files already stored.
#[derive(Debug, Default)]
pub(crate) struct InventoryForm {
    pub fields: HashMap<String, String>,
    pub uploads: AttachmentSet,
}

impl InventoryForm {
    /// Read every part of `multipart`, storing file parts as they arrive.
    ///
    /// On failure the files written so far are deleted before returning.
    pub async fn read(
        files: &Arc<dyn FileStore>,
        mut multipart: Multipart,
    ) -> Result<Self, ApiError> {
        let mut form = InventoryForm::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    let message = format!("malformed form data: {}", e.body_text());
                    return Err(form.reject(files, StatusCode::BAD_REQUEST, message).await);
                }
            };

            let name = field.name().unwrap_or_default().to_string();
            let original = field.file_name().map(str::to_string);

            let Some(kind) = group_of(&name) else {
                match field.text().await {
                    Ok(text) => {
                        form.fields.insert(name, text);
                    }
                    Err(e) => {
                        let message = format!("field {name} could not be read: {}", e.body_text());
                        return Err(form.reject(files, StatusCode::BAD_REQUEST, message).await);
                    }
                }
                continue;
            };

            let bytes = match field.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    let message = format!("{kind} could not be read: {}", e.body_text());
                    return Err(form.reject(files, StatusCode::BAD_REQUEST, message).await);
                }
            };
            // Browsers send an empty part for a file input left blank.
            let original = original.unwrap_or_default();
            if bytes.is_empty() || original.is_empty() {
                continue;
            }

            let stored = generate_file_name(FILE_PREFIX, &original);
            if let Err(e) = files.put(&stored, bytes).await {
                tracing::error!(error = %e, file = %stored, "upload could not be stored");
                let err = infrastructure("uploaded files could not be stored");
                form.discard(files).await;
                return Err(err);
            }
            let upload = UploadedFile::new(original, stored);
            match kind {
                ImageKind::Item => form.uploads.images.push(upload),
                ImageKind::Damage => form.uploads.damaged_images.push(upload),
            }
        }
        Ok(form)
    }

    /// Delete the stored uploads and build the error response for `message`.
    pub async fn reject(
        &self,
        files: &Arc<dyn FileStore>,
        status: StatusCode,
        message: impl Into<String>,
    ) -> ApiError {
        self.discard(files).await;
        failure(status, message)
    }

    async fn discard(&self, files: &Arc<dyn FileStore>) {
        let names = self.uploads.stored_names();
        if names.is_empty() {
            return;
        }
        if let Err(e) = files.delete_all(&names).await {
            tracing::warn!(error = %e, "rejected uploads could not be deleted");
        }
    }

    pub fn create_fields(&self) -> Result<CreateInventory, String> {
        Ok(CreateInventory {
            name: self.text("name").unwrap_or_default(),
            price: self.number("price")?.unwrap_or_default(),
            quantity: self.number("quantity")?.unwrap_or_default(),
            damaged: self.number("damaged")?.unwrap_or_default(),
            description: self.text("description").unwrap_or_default(),
            category_id: self.number("categoryId")?,
            invoice_id: self.number("invoiceId")?,
        })
    }

    pub fn update_fields(&self) -> Result<UpdateInventory, String> {
        Ok(UpdateInventory {
            name: self.text("name"),
            price: self.number("price")?,
            quantity: self.number("quantity")?,
            damaged: self.number("damaged")?,
            description: self.text("description"),
            category_id: self.number("categoryId")?,
            invoice_id: self.number("invoiceId")?,
        })
    }

    fn text(&self, key: &str) -> Option<String> {
        self.fields.get(key).cloned()
    }

    /// A blank value counts as absent.
    fn number<T: FromStr>(&self, key: &str) -> Result<Option<T>, String> {
        match self.fields.get(key).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| format!("{key} must be a number, got '{raw}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> InventoryForm {
        InventoryForm {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            uploads: AttachmentSet::default(),
        }
    }

    #[test]
    fn create_fields_parse_numbers_and_references() {
        let fields = form(&[
            ("name", "Drill"),
            ("price", "49.90"),
            ("quantity", "4"),
            ("damaged", "1"),
            ("categoryId", "2"),
            ("invoiceId", ""),
        ])
        .create_fields()
        .unwrap();
        assert_eq!(fields.name, "Drill");
        assert_eq!(fields.price, 49.90);
        assert_eq!(fields.quantity, 4);
        assert_eq!(fields.damaged, 1);
        assert_eq!(fields.category_id, Some(2));
        assert_eq!(fields.invoice_id, None);
    }

    #[test]
    fn update_fields_leave_missing_keys_unset() {
        let fields = form(&[("damaged", "0")]).update_fields().unwrap();
        assert_eq!(fields.damaged, Some(0));
        assert!(fields.name.is_none());
        assert!(fields.quantity.is_none());
    }

    #[test]
    fn non_numeric_values_are_reported_by_key() {
        let err = form(&[("quantity", "lots")]).create_fields().unwrap_err();
        assert!(err.contains("quantity"), "{err}");
    }

    #[test]
    fn only_known_groups_carry_files() {
        assert_eq!(group_of("images"), Some(ImageKind::Item));
        assert_eq!(group_of("imgDamaged"), Some(ImageKind::Damage));
        assert_eq!(group_of("name"), None);
    }
}
