//! `h5p.json` and `library.json` shapes.
//!
//! Version numbers arrive as numbers in most packages and as strings in some
//! older exports, so every version field is a [`FlexInt`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::json::{FlexInt, OneOrMany, null_as_default};

/// Reference to a library by machine name and major.minor version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRef {
    /// Machine name, e.g. `H5P.Column`.
    pub machine_name: String,
    /// Major version.
    pub major_version: FlexInt,
    /// Minor version.
    pub minor_version: FlexInt,
}

impl LibraryRef {
    /// Builds a reference from plain integers.
    #[must_use]
    pub fn new(machine_name: impl Into<String>, major: i64, minor: i64) -> Self {
        Self {
            machine_name: machine_name.into(),
            major_version: FlexInt(major),
            minor_version: FlexInt(minor),
        }
    }

    /// Directory name the library is stored under, e.g. `H5P.Column-1.16`.
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}

impl fmt::Display for LibraryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}

/// Which loading phase a dependency edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Loaded before the library runs.
    Preloaded,
    /// Loaded on demand at runtime.
    Dynamic,
    /// Needed only by the authoring editor.
    Editor,
}

/// A file path entry in `preloadedJs` / `preloadedCss`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Path relative to the library directory.
    pub path: String,
}

/// Core API version a library requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreApi {
    /// Major version of the required core API.
    pub major_version: FlexInt,
    /// Minor version of the required core API.
    pub minor_version: FlexInt,
}

/// Package-level metadata from the root `h5p.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Human-readable content title.
    #[serde(default)]
    pub title: String,
    /// Content language code.
    #[serde(default)]
    pub language: Option<String>,
    /// Machine name of the library that renders the content.
    #[serde(default)]
    pub main_library: String,
    /// Allowed embed modes, `div` and/or `iframe`.
    #[serde(default)]
    pub embed_types: OneOrMany<String>,
    /// License code, e.g. `CC BY`.
    #[serde(default)]
    pub license: Option<String>,
    /// Fallback language code.
    #[serde(default)]
    pub default_language: Option<String>,
    /// Author entries vary between exporters; kept as raw JSON.
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<serde_json::Value>,
    /// Libraries the content needs at load time.
    #[serde(default, deserialize_with = "null_as_default")]
    pub preloaded_dependencies: Vec<LibraryRef>,
}

/// Per-library metadata from `<library>/library.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDescriptor {
    /// Human-readable library title.
    #[serde(default)]
    pub title: String,
    /// Machine name, e.g. `H5P.Column`.
    pub machine_name: String,
    /// Major version.
    pub major_version: FlexInt,
    /// Minor version.
    pub minor_version: FlexInt,
    /// Patch version; `0` when absent.
    #[serde(default)]
    pub patch_version: FlexInt,
    /// 1 when the library can be the main library of a package.
    #[serde(default)]
    pub runnable: FlexInt,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Author name.
    #[serde(default)]
    pub author: Option<String>,
    /// License code.
    #[serde(default)]
    pub license: Option<String>,
    /// Minimum core API version, when declared.
    #[serde(default)]
    pub core_api: Option<CoreApi>,
    /// Allowed embed modes.
    #[serde(default)]
    pub embed_types: OneOrMany<String>,
    /// 1 when the library supports fullscreen.
    #[serde(default)]
    pub fullscreen: FlexInt,
    /// Scripts loaded with the library.
    #[serde(default, deserialize_with = "null_as_default")]
    pub preloaded_js: Vec<FileRef>,
    /// Stylesheets loaded with the library.
    #[serde(default, deserialize_with = "null_as_default")]
    pub preloaded_css: Vec<FileRef>,
    /// Libraries loaded before this one.
    #[serde(default, deserialize_with = "null_as_default")]
    pub preloaded_dependencies: Vec<LibraryRef>,
    /// Libraries loaded on demand.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dynamic_dependencies: Vec<LibraryRef>,
    /// Libraries needed only by the editor.
    #[serde(default, deserialize_with = "null_as_default")]
    pub editor_dependencies: Vec<LibraryRef>,
}

impl LibraryDescriptor {
    /// Reference to this library (major.minor, no patch).
    #[must_use]
    pub fn library_ref(&self) -> LibraryRef {
        LibraryRef {
            machine_name: self.machine_name.clone(),
            major_version: self.major_version,
            minor_version: self.minor_version,
        }
    }

    /// Directory name the library is stored under, e.g. `H5P.Column-1.16`.
    #[must_use]
    pub fn folder_name(&self) -> String {
        self.library_ref().folder_name()
    }

    /// Full `major.minor.patch` version.
    #[must_use]
    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major_version, self.minor_version, self.patch_version
        )
    }

    /// Whether the library can be a package's main library.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.runnable.get() != 0
    }

    /// Every declared dependency edge, preloaded first, then dynamic, then editor.
    pub fn dependencies(&self) -> impl Iterator<Item = (DependencyKind, &LibraryRef)> {
        let preloaded = self
            .preloaded_dependencies
            .iter()
            .map(|r| (DependencyKind::Preloaded, r));
        let dynamic = self
            .dynamic_dependencies
            .iter()
            .map(|r| (DependencyKind::Dynamic, r));
        let editor = self
            .editor_dependencies
            .iter()
            .map(|r| (DependencyKind::Editor, r));
        preloaded.chain(dynamic).chain(editor)
    }
}
