//! File system storage implementation

use crate::locks::NameLocks;
use crate::*;
use async_trait::async_trait;
use chrono::Utc;
use docgate_core::{Error, Result, StorageConfig};
use docgate_telemetry::storage_span;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;
use uuid::Uuid;

/// Directory inside each area holding sidecar metadata
const META_DIR: &str = ".meta";

/// File system storage implementation.
///
/// Directory structure:
/// ```text
/// {upload_dir}/{name}
/// {upload_dir}/.meta/{name}.json
/// {converted_dir}/{artifact}.md
/// {converted_dir}/.meta/{artifact}.md.json
/// ```
pub struct FileSystemStorage {
    upload_dir: PathBuf,
    converted_dir: PathBuf,
    locks: NameLocks,
}

/// Removes a temp file unless the write it belongs to completed.
///
/// Dropping the write future (client disconnect, timeout) drops the guard,
/// so an aborted upload never leaves a partial file behind.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

/// Fully written and fsynced temp file, not yet visible under its name
struct StagedFile {
    target: PathBuf,
    guard: TempFileGuard,
}

impl StagedFile {
    /// Write `data` to a hidden temp file next to `dir/name`
    async fn write(dir: &Path, name: &str, data: &[u8]) -> Result<Self> {
        fs::create_dir_all(dir).await?;

        let temp_path = dir.join(format!(".{}.{}.part", name, Uuid::new_v4().simple()));
        // Created synchronously: no await point between the file appearing
        // and its guard being armed.
        let file = std::fs::File::create(&temp_path)?;
        let guard = TempFileGuard::new(temp_path);

        let mut file = fs::File::from_std(file);
        file.write_all(data).await?;
        file.sync_all().await?;

        Ok(Self {
            target: dir.join(name),
            guard,
        })
    }

    /// Rename the temp file into place
    async fn commit(mut self) -> Result<()> {
        fs::rename(&self.guard.path, &self.target).await?;
        self.guard.disarm();
        Ok(())
    }
}

impl FileSystemStorage {
    /// Create a new file system storage over two directories
    pub fn new(upload_dir: impl Into<PathBuf>, converted_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            converted_dir: converted_dir.into(),
            locks: NameLocks::new(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.upload_dir(), config.converted_dir())
    }

    /// Create the backing directories if they are missing
    pub async fn init(&self) -> Result<()> {
        for area in Area::ALL {
            fs::create_dir_all(self.meta_dir(area)).await?;
        }
        tracing::info!(
            upload_dir = %self.upload_dir.display(),
            converted_dir = %self.converted_dir.display(),
            "Storage directories ready"
        );
        Ok(())
    }

    fn area_dir(&self, area: Area) -> &Path {
        match area {
            Area::Source => &self.upload_dir,
            Area::Artifact => &self.converted_dir,
        }
    }

    fn meta_dir(&self, area: Area) -> PathBuf {
        self.area_dir(area).join(META_DIR)
    }

    fn meta_name(name: &str) -> String {
        format!("{}.json", name)
    }

    fn meta_path(&self, area: Area, name: &str) -> PathBuf {
        self.meta_dir(area).join(Self::meta_name(name))
    }

    /// Publish `data` as `name` in `area` together with its sidecar.
    ///
    /// Both files are fully staged before either is renamed. The sidecar is
    /// renamed first and put back if the data rename then fails, so an
    /// existing file is never lost to a failed replacement.
    ///
    /// Callers must hold the name lock; the conflict check is not atomic
    /// with respect to writers outside this process.
    async fn write_with_meta(
        &self,
        area: Area,
        name: &str,
        data: &[u8],
        meta: &FileMeta,
        overwrite: bool,
    ) -> Result<()> {
        let dir = self.area_dir(area);
        let target = dir.join(name);
        if !overwrite && fs::try_exists(&target).await? {
            return Err(Error::NameConflict(name.to_string()));
        }

        let meta_json = serde_json::to_vec_pretty(meta)?;
        let staged = StagedFile::write(dir, name, data).await?;
        let staged_meta =
            StagedFile::write(&self.meta_dir(area), &Self::meta_name(name), &meta_json).await?;

        let meta_path = self.meta_path(area, name);
        let previous_meta = match fs::read(&meta_path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        staged_meta.commit().await?;
        if let Err(e) = staged.commit().await {
            Self::restore_meta(&meta_path, previous_meta).await;
            return Err(e);
        }

        tracing::debug!(path = %target.display(), size = data.len(), "File written");
        Ok(())
    }

    async fn restore_meta(path: &Path, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(bytes) => fs::write(path, bytes).await,
            None => fs::remove_file(path).await,
        };
        if let Err(e) = restored {
            tracing::error!(path = %path.display(), error = %e, "Failed to restore metadata after a failed write");
        }
    }

    async fn read_meta(&self, area: Area, name: &str) -> Option<FileMeta> {
        let bytes = fs::read(self.meta_path(area, name)).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(name = %name, area = %area, error = %e, "Unreadable file metadata");
                None
            }
        }
    }

    async fn to_ref(&self, area: Area, name: String, metadata: &std::fs::Metadata) -> StoredRef {
        let (source, media_type) = match self.read_meta(area, &name).await {
            Some(meta) => (meta.source, meta.media_type),
            None => (None, None),
        };

        StoredRef {
            size: metadata.len(),
            modified: metadata.modified().ok().map(Into::into),
            name,
            area,
            source: source.filter(|_| area == Area::Artifact),
            media_type,
        }
    }

    async fn check_dir(path: &Path) -> DirectoryHealth {
        let exists = fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        let writable = if exists {
            let marker = path.join(format!(".health.{}.check", Uuid::new_v4().simple()));
            match fs::write(&marker, b"ok").await {
                Ok(()) => {
                    let _ = fs::remove_file(&marker).await;
                    true
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Storage directory is not writable");
                    false
                }
            }
        } else {
            false
        };

        DirectoryHealth {
            path: path.to_path_buf(),
            exists,
            writable,
        }
    }
}

fn not_found_or_io(err: std::io::Error, area: Area, name: &str) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::NotFound(format!("{} ({})", name, area))
    } else {
        Error::IoError(err)
    }
}

#[async_trait]
impl StorageService for FileSystemStorage {
    async fn store(&self, req: StoreRequest) -> Result<StoredRef> {
        let span = storage_span("store", Area::Source.as_str(), &req.name);
        async move {
            req.validate()?;

            let _guard = self.locks.acquire(Area::Source, &req.name).await;
            let meta = FileMeta {
                source: None,
                media_type: req.media_type.clone(),
                created_at: Utc::now(),
            };
            self.write_with_meta(Area::Source, &req.name, &req.data, &meta, req.overwrite)
                .await?;

            tracing::info!(name = %req.name, size = req.data.len(), overwrite = req.overwrite, "Source stored");
            self.stat(Area::Source, &req.name).await
        }
        .instrument(span)
        .await
    }

    async fn store_artifact(&self, req: ArtifactRequest) -> Result<StoredRef> {
        let name = req.artifact_name();
        let span = storage_span("store_artifact", Area::Artifact.as_str(), &name);
        async move {
            req.validate()?;

            let _guard = self.locks.acquire(Area::Artifact, &name).await;
            let meta = FileMeta {
                source: Some(req.source.clone()),
                media_type: req.media_type.clone(),
                created_at: Utc::now(),
            };
            self.write_with_meta(
                Area::Artifact,
                &name,
                req.markdown.as_bytes(),
                &meta,
                req.overwrite,
            )
            .await?;

            tracing::info!(artifact = %name, source = %req.source, "Artifact stored");
            self.stat(Area::Artifact, &name).await
        }
        .instrument(span)
        .await
    }

    async fn list(&self, area: Area) -> Result<Vec<StoredRef>> {
        let dir = self.area_dir(area);
        if !fs::try_exists(dir).await? {
            return Ok(Vec::new());
        }

        let mut refs = Vec::new();
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Deleted between read_dir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            refs.push(self.to_ref(area, name, &metadata).await);
        }

        refs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(refs)
    }

    async fn read(&self, area: Area, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        let path = self.area_dir(area).join(name);
        fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, area, name))
    }

    async fn delete(&self, area: Area, name: &str) -> Result<()> {
        let span = storage_span("delete", area.as_str(), name);
        async move {
            validate_name(name)?;

            let _guard = self.locks.acquire(area, name).await;
            let path = self.area_dir(area).join(name);
            fs::remove_file(&path)
                .await
                .map_err(|e| not_found_or_io(e, area, name))?;

            match fs::remove_file(self.meta_path(area, name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(name = %name, area = %area, error = %e, "Failed to remove file metadata")
                }
            }

            tracing::info!(name = %name, area = %area, "File deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn stat(&self, area: Area, name: &str) -> Result<StoredRef> {
        validate_name(name)?;
        let path = self.area_dir(area).join(name);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, area, name))?;

        if !metadata.is_file() {
            return Err(Error::NotFound(format!("{} ({})", name, area)));
        }

        Ok(self.to_ref(area, name.to_string(), &metadata).await)
    }

    fn path(&self, area: Area, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.area_dir(area).join(name))
    }

    async fn health(&self) -> StorageHealth {
        StorageHealth {
            upload_dir: Self::check_dir(&self.upload_dir).await,
            converted_dir: Self::check_dir(&self.converted_dir).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn storage(temp_dir: &TempDir) -> FileSystemStorage {
        let service = FileSystemStorage::new(
            temp_dir.path().join("uploads"),
            temp_dir.path().join("converted"),
        );
        service.init().await.unwrap();
        service
    }

    fn store_req(name: &str, data: &[u8], overwrite: bool) -> StoreRequest {
        StoreRequest {
            name: name.to_string(),
            data: data.to_vec(),
            media_type: None,
            overwrite,
        }
    }

    /// Temp files still present in `dir`
    fn part_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect()
    }

    fn artifact_req(source: &str, markdown: &str) -> ArtifactRequest {
        ArtifactRequest {
            source: source.to_string(),
            name: None,
            markdown: markdown.to_string(),
            media_type: Some("application/pdf".to_string()),
            overwrite: false,
        }
    }

    #[tokio::test]
    async fn test_store_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        let stored = service
            .store(StoreRequest {
                media_type: Some("text/plain".to_string()),
                ..store_req("a.txt", b"Hello, world!", false)
            })
            .await
            .unwrap();
        assert_eq!(stored.name, "a.txt");
        assert_eq!(stored.area, Area::Source);
        assert_eq!(stored.size, 13);
        assert!(stored.source.is_none());
        assert_eq!(stored.media_type.as_deref(), Some("text/plain"));
        assert!(temp_dir.path().join("uploads/.meta/a.txt.json").exists());

        let data = service.read(Area::Source, "a.txt").await.unwrap();
        assert_eq!(data, b"Hello, world!");

        let listed = service.list(Area::Source).await.unwrap();
        assert_eq!(listed[0].media_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_conflict_keeps_first_content() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        service.store(store_req("a.txt", b"first", false)).await.unwrap();
        let err = service
            .store(store_req("a.txt", b"second", false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NameConflict(ref name) if name == "a.txt"));

        let data = service.read(Area::Source, "a.txt").await.unwrap();
        assert_eq!(data, b"first");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        service.store(store_req("a.txt", b"first", false)).await.unwrap();
        let stored = service
            .store(store_req("a.txt", b"second!", true))
            .await
            .unwrap();
        assert_eq!(stored.size, 7);

        let data = service.read(Area::Source, "a.txt").await.unwrap();
        assert_eq!(data, b"second!");
    }

    #[tokio::test]
    async fn test_invalid_names_touch_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        for name in ["", "../escape.txt", "nested/a.txt", ".hidden"] {
            let err = service.store(store_req(name, b"x", false)).await.unwrap_err();
            assert_eq!(err.code(), "invalid_name");
        }
        assert!(!temp_dir.path().join("escape.txt").exists());
        assert!(service.list(Area::Source).await.unwrap().is_empty());

        let err = service.read(Area::Source, "../uploads").await.unwrap_err();
        assert_eq!(err.code(), "invalid_name");
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_skips_hidden_entries() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        for name in ["c.txt", "a.txt", "b.txt"] {
            service.store(store_req(name, b"data", false)).await.unwrap();
        }
        // Leftovers that must never show up in listings
        std::fs::write(temp_dir.path().join("uploads/.a.txt.0000.part"), b"partial").unwrap();
        std::fs::create_dir(temp_dir.path().join("uploads/subdir")).unwrap();

        let names: Vec<_> = service
            .list(Area::Source)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert!(service.list(Area::Artifact).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let service = FileSystemStorage::new(
            temp_dir.path().join("nope"),
            temp_dir.path().join("nope2"),
        );
        assert!(service.list(Area::Source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_not_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        service.store(store_req("a.txt", b"data", false)).await.unwrap();
        service.delete(Area::Source, "a.txt").await.unwrap();
        assert!(!temp_dir.path().join("uploads/.meta/a.txt.json").exists());

        let err = service.read(Area::Source, "a.txt").await.unwrap_err();
        assert!(err.is_not_found());

        let err = service.delete(Area::Source, "a.txt").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_artifact_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        service.store(store_req("report.pdf", b"%PDF-1.7", false)).await.unwrap();
        let artifact = service
            .store_artifact(artifact_req("report.pdf", "# Report"))
            .await
            .unwrap();
        assert_eq!(artifact.name, "report.md");
        assert_eq!(artifact.area, Area::Artifact);
        assert_eq!(artifact.source.as_deref(), Some("report.pdf"));

        let listed = service.list(Area::Artifact).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].source.as_deref(), Some("report.pdf"));

        let text = service.read(Area::Artifact, "report.md").await.unwrap();
        assert_eq!(text, b"# Report");

        // Artifact lifetime is independent of the source
        service.delete(Area::Source, "report.pdf").await.unwrap();
        assert!(service.stat(Area::Artifact, "report.md").await.is_ok());

        service.delete(Area::Artifact, "report.md").await.unwrap();
        assert!(!temp_dir.path().join("converted/.meta/report.md.json").exists());
    }

    #[tokio::test]
    async fn test_artifact_conflict_between_sources() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        service
            .store_artifact(artifact_req("report.pdf", "from pdf"))
            .await
            .unwrap();
        let err = service
            .store_artifact(artifact_req("report.docx", "from docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NameConflict(_)));

        let stat = service.stat(Area::Artifact, "report.md").await.unwrap();
        assert_eq!(stat.source.as_deref(), Some("report.pdf"));
    }

    #[tokio::test]
    async fn test_failed_metadata_write_keeps_existing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        service
            .store_artifact(artifact_req("report.pdf", "# Original"))
            .await
            .unwrap();

        // A plain file where the sidecar directory should be
        let meta_dir = temp_dir.path().join("converted/.meta");
        std::fs::remove_dir_all(&meta_dir).unwrap();
        std::fs::write(&meta_dir, b"not a directory").unwrap();

        let replacement = ArtifactRequest {
            overwrite: true,
            ..artifact_req("report.pdf", "# Replacement")
        };
        assert!(service.store_artifact(replacement).await.is_err());

        let text = service.read(Area::Artifact, "report.md").await.unwrap();
        assert_eq!(text, b"# Original");
        assert!(part_files(&temp_dir.path().join("converted")).is_empty());
    }

    #[tokio::test]
    async fn test_failed_rename_restores_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        // A directory squatting on the artifact name makes the final rename fail
        std::fs::create_dir(temp_dir.path().join("converted/report.md")).unwrap();

        let req = ArtifactRequest {
            overwrite: true,
            ..artifact_req("report.pdf", "# Report")
        };
        assert!(service.store_artifact(req).await.is_err());

        assert!(!temp_dir.path().join("converted/.meta/report.md.json").exists());
        assert!(part_files(&temp_dir.path().join("converted")).is_empty());
        assert!(part_files(&temp_dir.path().join("converted/.meta")).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_store_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;
        let req = store_req("big.bin", &vec![7u8; 32 * 1024 * 1024], false);

        let result = tokio::time::timeout(Duration::from_millis(1), service.store(req)).await;
        assert!(result.is_err(), "store finished before it could be cancelled");

        // Blocking writes already handed to the runtime finish on their own
        tokio::time::sleep(Duration::from_millis(200)).await;

        let uploads = temp_dir.path().join("uploads");
        assert!(part_files(&uploads).is_empty());
        assert!(!uploads.join("big.bin").exists());
        assert!(service.list(Area::Source).await.unwrap().is_empty());

        service
            .store(store_req("big.bin", b"small", false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_stores_of_one_name() {
        let temp_dir = TempDir::new().unwrap();
        let service = Arc::new(storage(&temp_dir).await);

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.store(store_req("race.txt", &[i; 64], false)).await
            }));
        }

        let mut stored = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => stored += 1,
                Err(Error::NameConflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(conflicts, 7);

        let data = service.read(Area::Source, "race.txt").await.unwrap();
        assert_eq!(data.len(), 64);
        assert!(data.iter().all(|b| *b == data[0]));
    }

    #[tokio::test]
    async fn test_temp_file_guard_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".upload.part");
        std::fs::write(&path, b"partial").unwrap();

        drop(TempFileGuard::new(path.clone()));
        assert!(!path.exists());

        std::fs::write(&path, b"complete").unwrap();
        let mut guard = TempFileGuard::new(path.clone());
        guard.disarm();
        drop(guard);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_health() {
        let temp_dir = TempDir::new().unwrap();
        let service = storage(&temp_dir).await;

        let health = service.health().await;
        assert!(health.is_healthy());
        assert!(health.upload_dir.writable);

        let missing = FileSystemStorage::new(temp_dir.path().join("x"), temp_dir.path().join("y"));
        let health = missing.health().await;
        assert!(!health.is_healthy());
        assert!(!health.converted_dir.exists);
    }
}
