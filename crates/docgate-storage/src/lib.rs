//! # docgate Storage Manager
//!
//! Owns two flat directories: uploaded source files and converted Markdown
//! artifacts. Every entry is keyed by its file name; the directory listing is
//! the source of truth and nothing is cached in memory.
//!
//! ## Features
//!
//! - **Path safety**: names are validated before they touch the filesystem
//! - **Reject-on-conflict**: existing names are only replaced on explicit request
//! - **Atomic writes**: temp file + rename, so readers never see partial files
//! - **Per-name locking**: writers and deleters of one name are serialized

use chrono::{DateTime, Utc};
use docgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

mod filesystem;
mod locks;
mod service;

pub use filesystem::FileSystemStorage;
pub use service::StorageService;

/// Longest accepted file name, in bytes. Leaves room for the temp-file
/// decoration within common 255-byte filesystem limits.
pub const MAX_NAME_LEN: usize = 200;

/// Extension given to every converted artifact
pub const ARTIFACT_EXTENSION: &str = "md";

/// The two storage areas managed by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Uploaded source files
    Source,
    /// Converted Markdown artifacts
    Artifact,
}

impl Area {
    pub const ALL: [Area; 2] = [Area::Source, Area::Artifact];

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Source => "source",
            Area::Artifact => "artifact",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(Area::Source),
            "artifact" => Ok(Area::Artifact),
            other => Err(format!(
                "unknown kind '{}', expected 'source' or 'artifact'",
                other
            )),
        }
    }
}

/// Handle to a file managed by the Storage Manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRef {
    pub name: String,
    pub area: Area,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Source file an artifact was converted from; `None` for sources
    pub source: Option<String>,
    /// Media type declared when the file was stored
    pub media_type: Option<String>,
}

/// Sidecar record kept in the `.meta` directory of each area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    /// Back-reference from an artifact to its source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to store an uploaded source file
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub name: String,
    pub data: Vec<u8>,
    /// Declared media type, kept for later reconversion
    pub media_type: Option<String>,
    /// Replace an existing file of the same name instead of failing
    pub overwrite: bool,
}

impl StoreRequest {
    /// Validate the store request
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Request to store a converted artifact
#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    /// Name of the source file the Markdown was produced from
    pub source: String,
    /// Optional: explicit artifact name (if unset, derived from `source`)
    pub name: Option<String>,
    pub markdown: String,
    pub media_type: Option<String>,
    pub overwrite: bool,
}

impl ArtifactRequest {
    /// Name the artifact will be stored under
    pub fn artifact_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| artifact_name_for(&self.source))
    }

    /// Validate the artifact request
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.source)?;
        validate_name(&self.artifact_name())
    }
}

/// Existence and writability of one storage directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryHealth {
    pub path: PathBuf,
    pub exists: bool,
    pub writable: bool,
}

/// Health of both storage directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub upload_dir: DirectoryHealth,
    pub converted_dir: DirectoryHealth,
}

impl StorageHealth {
    pub fn is_healthy(&self) -> bool {
        [&self.upload_dir, &self.converted_dir]
            .iter()
            .all(|dir| dir.exists && dir.writable)
    }
}

/// Check that `name` is a plain file name that stays inside its directory.
///
/// Names starting with `.` are reserved for temp files and sidecar metadata.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_name(name, "reserved name"));
    }
    if name.contains(['/', '\\']) {
        return Err(Error::invalid_name(
            name,
            "path separators are not allowed",
        ));
    }
    if name.starts_with('.') {
        return Err(Error::invalid_name(
            name,
            "names starting with '.' are reserved",
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::invalid_name(
            name,
            "control characters are not allowed",
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid_name(
            name,
            format!("name exceeds {} bytes", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

/// Derive the artifact name for a source file: same stem, `.md` extension.
///
/// ```
/// use docgate_storage::artifact_name_for;
/// assert_eq!(artifact_name_for("report.pdf"), "report.md");
/// assert_eq!(artifact_name_for("archive.tar.gz"), "archive.tar.md");
/// assert_eq!(artifact_name_for("README"), "README.md");
/// ```
pub fn artifact_name_for(source: &str) -> String {
    let stem = match source.rfind('.') {
        Some(idx) if idx > 0 => &source[..idx],
        _ => source,
    };
    artifact_name_from_stem(stem)
}

/// Artifact name for an explicit output stem
pub fn artifact_name_from_stem(stem: &str) -> String {
    format!("{}.{}", stem, ARTIFACT_EXTENSION)
}
