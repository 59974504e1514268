mod local;

pub use local::LocalStore;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// A group delete in which at least one file could not be removed.
///
/// Every name was attempted; `failures` lists the ones that did not go.
#[derive(Debug)]
pub struct PartialDeleteFailure {
    pub attempted: usize,
    pub failures: Vec<(String, StoreError)>,
}

impl PartialDeleteFailure {
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Display for PartialDeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} file(s) could not be deleted",
            self.failures.len(),
            self.attempted
        )?;
        for (name, err) in &self.failures {
            write!(f, "; {name}: {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialDeleteFailure {}

/// Durable storage for uploaded image files, addressed by flat file names.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write (create or overwrite) a file.
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read a file. Returns `StoreError::NotFound` if absent.
    async fn get(&self, name: &str) -> Result<Bytes, StoreError>;

    /// Delete one file. A missing file is `StoreError::NotFound`.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Check if a file exists.
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Delete every named file, continuing past failures.
    ///
    /// Succeeds only if every single deletion succeeded. Deletions run one
    /// after another, in input order.
    async fn delete_all(&self, names: &[String]) -> Result<(), PartialDeleteFailure> {
        let mut failures = Vec::new();
        for name in names {
            if let Err(e) = self.delete(name).await {
                tracing::warn!(file = %name, error = %e, "failed to delete stored file");
                failures.push((name.clone(), e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PartialDeleteFailure {
                attempted: names.len(),
                failures,
            })
        }
    }
}

/// Reject names that are empty or could escape the upload directory.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name == "."
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Build a fresh stored name: `{prefix}-{uuid}` plus the lowercased
/// extension of `original_name`, if it has a sane one.
pub fn generate_file_name(prefix: &str, original_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    let ext = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{prefix}-{id}.{ext}"),
        None => format!("{prefix}-{id}"),
    }
}

// -- Configuration --

/// Configuration for the upload file store.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Directory holding uploaded files. Defaults to
    /// `$XDG_DATA_HOME/stockroom/uploads`.
    pub upload_dir: Option<String>,
}

impl StoreConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.upload_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_upload_dir)
    }
}

/// Same data directory logic as `stockroom_db::data_dir()`, without taking a
/// dependency on the db crate.
fn default_upload_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("stockroom").join("uploads")
}

// -- Factory --

/// Create a `FileStore` from configuration, making sure its directory exists.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn FileStore>, StoreError> {
    let store = LocalStore::new(config.resolved_dir());
    store.ensure_dir().await?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_keep_lowercased_extension() {
        let name = generate_file_name("IMG", "Photo.JPG");
        assert!(name.starts_with("IMG-"), "{name}");
        assert!(name.ends_with(".jpg"), "{name}");
        assert_ne!(name, generate_file_name("IMG", "Photo.JPG"));
    }

    #[test]
    fn generated_names_drop_odd_extensions() {
        let name = generate_file_name("IMG", "noextension");
        assert!(!name.contains('.'), "{name}");
        let name = generate_file_name("IMG", "evil.p/ng");
        assert!(!name.contains('/'), "{name}");
        assert!(validate_name(&name).is_ok());
    }

    #[test]
    fn validate_name_rejects_traversal() {
        assert!(validate_name("IMG-1.png").is_ok());
        for bad in ["", ".", "../etc/passwd", "a/b.png", "a\\b.png", "x..y"] {
            assert!(
                matches!(validate_name(bad), Err(StoreError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn partial_delete_failure_lists_every_failed_name() {
        let failure = PartialDeleteFailure {
            attempted: 3,
            failures: vec![
                ("a.png".into(), StoreError::NotFound("a.png".into())),
                ("b.png".into(), StoreError::Internal("denied".into())),
            ],
        };
        assert_eq!(failure.failed_names(), vec!["a.png", "b.png"]);
        let msg = failure.to_string();
        assert!(msg.starts_with("2 of 3 file(s)"), "{msg}");
        assert!(msg.contains("b.png: store error: denied"), "{msg}");
    }

    #[tokio::test]
    async fn create_store_makes_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/uploads");
        let config = StoreConfig {
            upload_dir: Some(dir.to_string_lossy().to_string()),
        };
        let store = create_store(&config).await.unwrap();
        assert!(dir.is_dir());
        assert!(!store.exists("nothing.png").await.unwrap());
    }
}
