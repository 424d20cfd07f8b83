//! Error types for package extraction and storage.

use thiserror::Error;

use crate::error::ClientError;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object stored under the key.
    #[error("object not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// Backend-specific failure.
    #[error("storage backend error for {key}: {message}")]
    Backend {
        /// Key the operation targeted.
        key: String,
        /// Backend error text.
        message: String,
    },
}

/// Errors while extracting or persisting an H5P package.
///
/// Extraction is all-or-nothing: any of these aborts the whole package.
#[derive(Debug, Error)]
pub enum H5pError {
    /// The bytes are not a readable zip archive.
    #[error("h5p: opening package archive: {source}")]
    Archive {
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An individual entry could not be opened or read.
    #[error("h5p: reading entry {name}: {source}")]
    Entry {
        /// Entry path inside the archive.
        name: String,
        /// Read failure, or `FileTooLarge` when the size cap is hit.
        #[source]
        source: std::io::Error,
    },

    /// An entry path is absolute or climbs out of the archive root.
    #[error("h5p: entry {name} escapes the package root")]
    UnsafePath {
        /// Entry path as stored in the archive.
        name: String,
    },

    /// Root `h5p.json` is not valid JSON of the expected shape.
    #[error("h5p: parsing h5p.json: {source}")]
    Manifest {
        /// JSON decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A `library.json` is not valid JSON of the expected shape.
    #[error("h5p: parsing {path}: {source}")]
    Descriptor {
        /// Archive path of the offending `library.json`.
        path: String,
        /// JSON decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing to or listing the storage backend failed.
    #[error("h5p: storage: {0}")]
    Storage(#[from] StorageError),

    /// Downloading the package failed.
    #[error(transparent)]
    Download(#[from] ClientError),
}

impl H5pError {
    pub(crate) fn archive(source: zip::result::ZipError) -> Self {
        Self::Archive { source }
    }

    pub(crate) fn entry(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Entry {
            name: name.into(),
            source,
        }
    }
}
