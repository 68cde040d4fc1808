use chrono::{DateTime, Utc};
use docgate_storage::{Area, StorageHealth, StoredRef};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Body returned by `POST /upload` and `POST /convert/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "artifactName")]
    pub artifact_name: Option<String>,
    pub converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub size: u64,
    #[serde(rename = "mediaType")]
    pub media_type: Option<String>,
}

/// One entry of `GET /files`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub kind: Area,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "mediaType", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl From<StoredRef> for FileEntry {
    fn from(stored: StoredRef) -> Self {
        Self {
            name: stored.name,
            kind: stored.area,
            size: stored.size,
            source: stored.source,
            media_type: stored.media_type,
            modified: stored.modified,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub overwrite: bool,
}

/// `?kind=source|artifact`, kept as text so a bad value becomes a JSON 400
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertQuery {
    #[serde(default)]
    pub overwrite: bool,
    /// Custom artifact stem; `.md` is appended
    pub output: Option<String>,
    /// Overrides the media type declared at upload
    #[serde(rename = "mediaType")]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub path: PathBuf,
    pub exists: bool,
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "uploadDir")]
    pub upload_dir: DirectoryInfo,
    #[serde(rename = "convertedDir")]
    pub converted_dir: DirectoryInfo,
    #[serde(rename = "mediaTypes")]
    pub media_types: Vec<String>,
    pub extensions: Vec<String>,
    #[serde(rename = "fallbackConverter")]
    pub fallback_converter: bool,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: StorageHealth,
}
