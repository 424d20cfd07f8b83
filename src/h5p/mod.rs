//! H5P package handling: archive extraction, library metadata and storage.
//!
//! [`extract_package`] reads a whole `.h5p` archive in memory and returns the
//! manifest plus every library directory (one carrying a `library.json`).
//! Dependency edges are parsed but not resolved; resolving them against a
//! library registry is the caller's job.

mod error;
mod extractor;
mod fetch;
mod storage;
mod types;

pub use error::{H5pError, StorageError};
pub use extractor::{
    ExtractedLibrary, ExtractedPackage, LIBRARY_DESCRIPTOR_FILE, MANIFEST_FILE, MAX_UNCOMPRESSED_BYTES,
    extract_package, extract_package_with_limit,
};
pub use fetch::{DEFAULT_MAX_CONCURRENCY, PackageDownloader, PackageDownloaderBuilder};
pub use storage::{
    MemoryStorage, StorageProvider, StoredObject, content_type_for, remove_library, store_library,
};
pub use types::{
    CoreApi, DependencyKind, FileRef, LibraryDescriptor, LibraryRef, PackageManifest,
};
