//! Persistence of extracted libraries through a byte-oriented storage backend.
//!
//! Library files are stored under `<prefix>/<folder_name>/<path>`, where
//! `folder_name` is the versioned directory name (`H5P.Column-1.16`), so two
//! minor versions of a library never overwrite each other.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::error::{H5pError, StorageError};
use super::extractor::ExtractedLibrary;
use super::types::LibraryRef;

/// Storage backend contract. Keys are `/`-separated.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Writes `data` under `key`, replacing any existing object.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;

    /// Reads the object under `key`.
    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes the object under `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lists keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// An object held by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-process [`StorageProvider`], for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the object under `key`, content type included.
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Guesses a MIME type from a file extension.
#[must_use]
pub fn content_type_for(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "js" => "application/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

fn library_prefix(prefix: &str, folder_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{folder_name}/")
    } else {
        format!("{prefix}/{folder_name}/")
    }
}

/// Uploads every file of `library` and returns the keys written.
///
/// # Errors
///
/// Returns [`H5pError::Storage`] on the first failed upload. Files already
/// uploaded are left in place; [`remove_library`] cleans them up.
#[instrument(skip(storage, library), fields(library = %library.descriptor.folder_name()))]
pub async fn store_library(
    storage: &dyn StorageProvider,
    prefix: &str,
    library: &ExtractedLibrary,
) -> Result<Vec<String>, H5pError> {
    let base = library_prefix(prefix, &library.descriptor.folder_name());
    let mut keys = Vec::with_capacity(library.files.len());
    for (path, data) in &library.files {
        let key = format!("{base}{path}");
        let content_type = content_type_for(path);
        debug!(%key, content_type, bytes = data.len(), "uploading library file");
        storage.upload(&key, data.clone(), content_type).await?;
        keys.push(key);
    }
    info!(files = keys.len(), bytes = library.total_bytes(), "library stored");
    Ok(keys)
}

/// Removes every stored file of a library and returns how many were removed.
///
/// # Errors
///
/// Returns [`H5pError::Storage`] if listing or a removal fails.
#[instrument(skip(storage, library), fields(library = %library.folder_name()))]
pub async fn remove_library(
    storage: &dyn StorageProvider,
    prefix: &str,
    library: &LibraryRef,
) -> Result<usize, H5pError> {
    let base = library_prefix(prefix, &library.folder_name());
    let keys = storage.list(&base).await?;
    for key in &keys {
        storage.remove(key).await?;
    }
    info!(files = keys.len(), "library removed");
    Ok(keys.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("scripts/column.js"), "application/javascript");
        assert_eq!(content_type_for("styles/COLUMN.CSS"), "text/css");
        assert_eq!(content_type_for("fonts/icons.woff2"), "font/woff2");
        assert_eq!(content_type_for("LICENSE"), "application/octet-stream");
    }

    #[test]
    fn test_library_prefix() {
        assert_eq!(library_prefix("libraries/", "H5P.Text-1.1"), "libraries/H5P.Text-1.1/");
        assert_eq!(library_prefix("", "H5P.Text-1.1"), "H5P.Text-1.1/");
    }

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .upload("a/b.js", b"x".to_vec(), "application/javascript")
            .await
            .unwrap();
        storage.upload("a/c.css", b"y".to_vec(), "text/css").await.unwrap();
        storage.upload("b/d.js", b"z".to_vec(), "application/javascript").await.unwrap();

        assert_eq!(storage.download("a/b.js").await.unwrap(), b"x");
        assert_eq!(storage.list("a/").await.unwrap(), vec!["a/b.js", "a/c.css"]);

        storage.remove("a/b.js").await.unwrap();
        storage.remove("a/b.js").await.unwrap();
        assert!(matches!(
            storage.download("a/b.js").await,
            Err(StorageError::NotFound { .. })
        ));
        assert_eq!(storage.len().await, 2);
    }
}
