//! In-memory extraction of `.h5p` archives.
//!
//! Layout of a package:
//!
//! ```text
//! h5p.json                  package manifest (optional here)
//! content/content.json      content parameters, not a library
//! H5P.Column-1.16/
//!     library.json          makes this directory a library
//!     scripts/column.js
//! ```
//!
//! Entries are grouped by first path segment. A directory is a library iff it
//! holds a `library.json`; other directories are dropped.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use tracing::{debug, instrument};

use crate::json::strip_bom;

use super::error::H5pError;
use super::types::{LibraryDescriptor, PackageManifest};

/// Root-level package manifest file name.
pub const MANIFEST_FILE: &str = "h5p.json";

/// Per-library descriptor file name.
pub const LIBRARY_DESCRIPTOR_FILE: &str = "library.json";

/// Upper bound on the summed uncompressed size of every entry (512 MiB).
pub const MAX_UNCOMPRESSED_BYTES: u64 = 512 << 20;

const MAX_PREALLOCATION: usize = 1 << 20;

/// A library directory with its parsed descriptor and every file it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedLibrary {
    /// Directory name inside the archive.
    pub directory: String,
    pub descriptor: LibraryDescriptor,
    /// File bytes keyed by path relative to `directory`, `library.json` included.
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ExtractedLibrary {
    /// Total size of all files.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Result of [`extract_package`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPackage {
    /// Parsed `h5p.json`, or the default value when the archive has none.
    pub manifest: PackageManifest,
    /// Libraries ordered by directory name.
    pub libraries: Vec<ExtractedLibrary>,
}

impl ExtractedPackage {
    /// Finds a library by machine name.
    #[must_use]
    pub fn library(&self, machine_name: &str) -> Option<&ExtractedLibrary> {
        self.libraries
            .iter()
            .find(|lib| lib.descriptor.machine_name == machine_name)
    }
}

/// Extracts an H5P archive held in memory, capped at [`MAX_UNCOMPRESSED_BYTES`].
///
/// # Errors
///
/// - [`H5pError::Archive`] - not a readable zip
/// - [`H5pError::Entry`] - an entry cannot be read, or the package inflates
///   past the size cap
/// - [`H5pError::UnsafePath`] - an entry escapes the archive root
/// - [`H5pError::Manifest`] / [`H5pError::Descriptor`] - malformed JSON
pub fn extract_package(bytes: &[u8]) -> Result<ExtractedPackage, H5pError> {
    extract_package_with_limit(bytes, MAX_UNCOMPRESSED_BYTES)
}

/// [`extract_package`] with a caller-chosen cap on total uncompressed bytes.
///
/// # Errors
///
/// Same as [`extract_package`].
#[instrument(skip(bytes), fields(bytes = bytes.len()))]
pub fn extract_package_with_limit(
    bytes: &[u8],
    max_uncompressed: u64,
) -> Result<ExtractedPackage, H5pError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(H5pError::archive)?;

    let mut manifest = None;
    let mut directories: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
    let mut total: u64 = 0;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| H5pError::entry(format!("#{index}"), std::io::Error::other(e)))?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().replace('\\', "/");
        if entry.enclosed_name().is_none() {
            return Err(H5pError::UnsafePath { name: raw_name });
        }
        // Some exporters prefix every entry with `./`.
        let name = raw_name.trim_start_matches("./").to_string();

        let remaining = max_uncompressed.saturating_sub(total);
        if entry.size() > remaining {
            return Err(too_large(&name, max_uncompressed));
        }

        // Declared sizes are untrusted: cap the up-front allocation and the read.
        let declared = usize::try_from(entry.size()).unwrap_or(usize::MAX);
        let mut data = Vec::with_capacity(declared.min(MAX_PREALLOCATION));
        entry
            .by_ref()
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| H5pError::entry(name.as_str(), e))?;
        let read = u64::try_from(data.len()).unwrap_or(u64::MAX);
        if read > remaining {
            return Err(too_large(&name, max_uncompressed));
        }
        total += read;

        match name.split_once('/') {
            Some((directory, path)) if !directory.is_empty() && !path.is_empty() => {
                directories
                    .entry(directory.to_string())
                    .or_default()
                    .insert(path.to_string(), data);
            }
            Some(_) => {}
            None if name == MANIFEST_FILE => {
                let parsed = serde_json::from_slice(strip_bom(&data))
                    .map_err(|source| H5pError::Manifest { source })?;
                manifest = Some(parsed);
            }
            None => debug!(file = %name, "ignoring root-level file"),
        }
    }

    let mut libraries = Vec::new();
    for (directory, files) in directories {
        let Some(raw) = files.get(LIBRARY_DESCRIPTOR_FILE) else {
            debug!(%directory, files = files.len(), "skipping non-library directory");
            continue;
        };
        let descriptor: LibraryDescriptor =
            serde_json::from_slice(strip_bom(raw)).map_err(|source| H5pError::Descriptor {
                path: format!("{directory}/{LIBRARY_DESCRIPTOR_FILE}"),
                source,
            })?;
        debug!(%directory, library = %descriptor.library_ref(), files = files.len(), "library found");
        libraries.push(ExtractedLibrary {
            directory,
            descriptor,
            files,
        });
    }

    if manifest.is_none() {
        debug!("package has no h5p.json");
    }
    Ok(ExtractedPackage {
        manifest: manifest.unwrap_or_default(),
        libraries,
    })
}

fn too_large(name: &str, limit: u64) -> H5pError {
    H5pError::entry(
        name,
        std::io::Error::new(
            std::io::ErrorKind::FileTooLarge,
            format!("package inflates past {limit} bytes"),
        ),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const LIBRARY_JSON: &str =
        r#"{"title": "Text", "machineName": "H5P.Text", "majorVersion": 1, "minorVersion": "1"}"#;

    #[test]
    fn test_bom_prefixed_descriptor() {
        let with_bom = format!("\u{feff}{LIBRARY_JSON}");
        let bytes = archive(&[("H5P.Text-1.1/library.json", with_bom.as_str())]);

        let package = extract_package(&bytes).unwrap();
        assert_eq!(package.libraries.len(), 1);
        assert_eq!(package.libraries[0].descriptor.folder_name(), "H5P.Text-1.1");
        assert_eq!(package.manifest, PackageManifest::default());
    }

    #[test]
    fn test_root_files_other_than_manifest_ignored() {
        let bytes = archive(&[
            ("README.txt", "hello"),
            ("H5P.Text-1.1/library.json", LIBRARY_JSON),
        ]);
        let package = extract_package(&bytes).unwrap();
        assert_eq!(package.libraries.len(), 1);
        assert!(package.library("H5P.Text").is_some());
    }

    #[test]
    fn test_malformed_descriptor_names_file() {
        let bytes = archive(&[("H5P.Broken-1.0/library.json", "{not json")]);
        let error = extract_package(&bytes).unwrap_err();
        assert!(
            error.to_string().contains("H5P.Broken-1.0/library.json"),
            "got: {error}"
        );
    }

    #[test]
    fn test_malformed_manifest() {
        let bytes = archive(&[("h5p.json", r#"{"title": 5}"#)]);
        assert!(matches!(
            extract_package(&bytes),
            Err(H5pError::Manifest { .. })
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            extract_package(b"definitely not a zip"),
            Err(H5pError::Archive { .. })
        ));
    }

    #[test]
    fn test_parent_dir_entry_rejected() {
        let bytes = archive(&[("../evil.js", "alert(1)")]);
        assert!(matches!(
            extract_package(&bytes),
            Err(H5pError::UnsafePath { .. })
        ));
    }

    #[test]
    fn test_dot_slash_prefixed_entries() {
        let bytes = archive(&[
            ("./h5p.json", r#"{"title": "Dotted", "mainLibrary": "H5P.Text"}"#),
            ("./H5P.Text-1.1/library.json", LIBRARY_JSON),
            ("./H5P.Text-1.1/scripts/text.js", "H5P.Text = {};"),
        ]);
        let package = extract_package(&bytes).unwrap();
        assert_eq!(package.manifest.title, "Dotted");
        assert_eq!(package.libraries.len(), 1);
        assert_eq!(package.libraries[0].directory, "H5P.Text-1.1");
        assert!(package.libraries[0].files.contains_key("scripts/text.js"));
    }

    #[test]
    fn test_uncompressed_size_cap() {
        let big = "a".repeat(4096);
        let bytes = archive(&[
            ("H5P.Text-1.1/library.json", LIBRARY_JSON),
            ("H5P.Text-1.1/scripts/big.js", big.as_str()),
        ]);

        let error = extract_package_with_limit(&bytes, 1024).unwrap_err();
        assert!(matches!(error, H5pError::Entry { .. }), "got: {error:?}");
        assert!(error.to_string().contains("big.js"), "got: {error}");

        let package = extract_package_with_limit(&bytes, 8192).unwrap();
        assert_eq!(package.libraries[0].total_bytes(), LIBRARY_JSON.len() + 4096);
    }
}
