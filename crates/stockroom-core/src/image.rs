use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which attachment group an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    /// A picture of the item itself.
    Item,
    /// A picture documenting damage; governed by the item's damaged count.
    Damage,
}

impl ImageKind {
    pub const ALL: &[ImageKind] = &[ImageKind::Item, ImageKind::Damage];

    /// Table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            ImageKind::Item => "images",
            ImageKind::Damage => "damaged_images",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ImageKind::Item => "item images",
            ImageKind::Damage => "damage images",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: i64,
    pub kind: ImageKind,
    pub inventory_id: i64,
    /// Stored (generated) file name inside the upload directory.
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A file the upload step has already written to the file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_name: String,
    pub stored_name: String,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, stored_name: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            stored_name: stored_name.into(),
        }
    }
}

/// The uploads accompanying one inventory create or update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSet {
    #[serde(default)]
    pub images: Vec<UploadedFile>,
    #[serde(default)]
    pub damaged_images: Vec<UploadedFile>,
}

impl AttachmentSet {
    pub fn group(&self, kind: ImageKind) -> &[UploadedFile] {
        match kind {
            ImageKind::Item => &self.images,
            ImageKind::Damage => &self.damaged_images,
        }
    }

    pub fn group_mut(&mut self, kind: ImageKind) -> &mut Vec<UploadedFile> {
        match kind {
            ImageKind::Item => &mut self.images,
            ImageKind::Damage => &mut self.damaged_images,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.damaged_images.is_empty()
    }

    /// Stored names of every upload, item images first.
    pub fn stored_names(&self) -> Vec<String> {
        self.images
            .iter()
            .chain(&self.damaged_images)
            .map(|f| f.stored_name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_cover_both_groups_in_order() {
        let set = AttachmentSet {
            images: vec![UploadedFile::new("a.png", "IMG-1.png")],
            damaged_images: vec![
                UploadedFile::new("b.png", "IMG-2.png"),
                UploadedFile::new("c.png", "IMG-3.png"),
            ],
        };
        assert_eq!(set.stored_names(), vec!["IMG-1.png", "IMG-2.png", "IMG-3.png"]);
        assert_eq!(set.group(ImageKind::Damage).len(), 2);
        assert!(!set.is_empty());
        assert!(AttachmentSet::default().is_empty());
    }

    #[test]
    fn kinds_map_to_distinct_tables() {
        assert_eq!(ImageKind::Item.table(), "images");
        assert_eq!(ImageKind::Damage.table(), "damaged_images");
        assert_eq!(ImageKind::Damage.to_string(), "damage images");
    }
}
