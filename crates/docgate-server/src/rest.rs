use crate::error::AppError;
use crate::types::*;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docgate_convert::{ConverterGateway, normalize_media_type};
use docgate_core::Error;
use docgate_storage::{
    Area, ArtifactRequest, StorageService, StoreRequest, StoredRef, artifact_name_from_stem,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Default cap on request bodies (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";
const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub gateway: Arc<ConverterGateway>,
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Largest accepted request body, multipart framing included
    pub max_upload_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub fn create_router(
    storage: Arc<dyn StorageService>,
    gateway: Arc<ConverterGateway>,
    options: RouterOptions,
) -> Router {
    let state = AppState { storage, gateway };

    Router::new()
        // Service endpoints
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        // File endpoints
        .route("/upload", post(upload))
        .route("/files", get(list_files))
        .route("/files/:name", get(download_file).delete(delete_file))
        .route("/convert/:name", post(convert_file))
        // Middleware layers (applied in reverse order)
        .layer(DefaultBodyLimit::max(options.max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Service name, version and storage locations
async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let health = state.storage.health().await;
    let registry = state.gateway.registry();

    Json(ServiceInfo {
        name: "docgate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upload_dir: DirectoryInfo {
            path: health.upload_dir.path,
            exists: health.upload_dir.exists,
        },
        converted_dir: DirectoryInfo {
            path: health.converted_dir.path,
            exists: health.converted_dir.exists,
        },
        media_types: registry.media_types(),
        extensions: registry.extensions(),
        fallback_converter: registry.has_fallback(),
    })
}

/// Health check endpoint - 503 when a storage directory is missing or read-only
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = state.storage.health().await;
    let (status, label) = if storage.is_healthy() {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(?storage, "Storage directories are not usable");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            storage,
        }),
    )
}

/// Readiness check endpoint - dependencies are injected at startup
async fn readiness_check() -> impl IntoResponse {
    tracing::debug!("Readiness check requested");
    (StatusCode::OK, "READY")
}

/// File part of an upload form
struct UploadedPart {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut part: Option<UploadedPart> = None;
    let mut name_override: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                if part.is_some() {
                    return Err(AppError::BadRequest(
                        "exactly one 'file' field is allowed".to_string(),
                    ));
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                part = Some(UploadedPart {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("filename") => {
                let text = field.text().await?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    name_override = Some(trimmed.to_string());
                }
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let part = part.ok_or_else(|| {
        AppError::BadRequest("multipart body has no 'file' field".to_string())
    })?;
    let name = name_override
        .or(part.file_name)
        .ok_or_else(|| AppError::BadRequest("uploaded file has no file name".to_string()))?;

    let declared = part.content_type.as_deref().and_then(normalize_media_type);
    let stored = state
        .storage
        .store(StoreRequest {
            name,
            data: part.data.to_vec(),
            media_type: declared.clone(),
            overwrite: query.overwrite,
        })
        .await?;

    let response = match convert_to_artifact(
        &state,
        &stored.name,
        declared.as_deref(),
        None,
        query.overwrite,
    )
    .await
    {
        Ok((artifact, media_type)) => converted_response(&stored, artifact, media_type),
        Err(e) => {
            // The source stays stored; the client learns why there is no artifact
            tracing::warn!(source = %stored.name, error = %e, "Upload stored without artifact");
            UploadResponse {
                source_name: stored.name.clone(),
                artifact_name: None,
                converted: false,
                error: Some(e.to_string()),
                size: stored.size,
                media_type: declared,
            }
        }
    };

    tracing::info!(
        source = %response.source_name,
        converted = response.converted,
        size = response.size,
        "File uploaded"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Re-run the conversion for an already uploaded source.
///
/// Uses `?mediaType=` when given, else the type declared at upload.
async fn convert_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ConvertQuery>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let source = state.storage.stat(Area::Source, &name).await?;
    let media_type = query
        .media_type
        .as_deref()
        .and_then(normalize_media_type)
        .or_else(|| source.media_type.clone());
    let (artifact, media_type) = convert_to_artifact(
        &state,
        &source.name,
        media_type.as_deref(),
        query.output.as_deref(),
        query.overwrite,
    )
    .await?;

    tracing::info!(source = %source.name, artifact = %artifact.name, "File reconverted");
    Ok((
        StatusCode::CREATED,
        Json(converted_response(&source, artifact, media_type)),
    ))
}

/// Convert a stored source and persist the Markdown as its artifact
async fn convert_to_artifact(
    state: &AppState,
    source: &str,
    declared_media_type: Option<&str>,
    output_stem: Option<&str>,
    overwrite: bool,
) -> docgate_core::Result<(StoredRef, Option<String>)> {
    let path = state.storage.path(Area::Source, source)?;
    let conversion = state.gateway.convert(&path, declared_media_type).await?;

    let artifact = state
        .storage
        .store_artifact(ArtifactRequest {
            source: source.to_string(),
            name: output_stem.map(artifact_name_from_stem),
            markdown: conversion.markdown,
            media_type: conversion.media_type.clone(),
            overwrite,
        })
        .await?;

    Ok((artifact, conversion.media_type))
}

fn converted_response(
    source: &StoredRef,
    artifact: StoredRef,
    media_type: Option<String>,
) -> UploadResponse {
    UploadResponse {
        source_name: source.name.clone(),
        artifact_name: Some(artifact.name),
        converted: true,
        error: None,
        size: source.size,
        media_type,
    }
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<KindQuery>,
) -> Result<Json<Vec<FileEntry>>, AppError> {
    let mut entries = Vec::new();
    for area in lookup_order(&query)? {
        let refs = state.storage.list(area).await?;
        entries.extend(refs.into_iter().map(FileEntry::from));
    }
    Ok(Json(entries))
}

async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<Response, AppError> {
    for area in lookup_order(&query)? {
        match state.storage.read(area, &name).await {
            Ok(data) => return Ok(file_response(area, &name, data)),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::NotFound(name).into())
}

async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<StatusCode, AppError> {
    for area in lookup_order(&query)? {
        match state.storage.delete(area, &name).await {
            Ok(()) => {
                tracing::info!(name = %name, area = %area, "File deleted");
                return Ok(StatusCode::NO_CONTENT);
            }
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::NotFound(name).into())
}

/// Areas to search: the requested kind, or sources before artifacts
fn lookup_order(query: &KindQuery) -> Result<Vec<Area>, AppError> {
    match query.kind.as_deref() {
        Some(kind) => Ok(vec![kind.parse::<Area>().map_err(AppError::BadRequest)?]),
        None => Ok(Area::ALL.to_vec()),
    }
}

fn file_response(area: Area, name: &str, data: Vec<u8>) -> Response {
    let content_type = match area {
        Area::Source => BINARY_CONTENT_TYPE,
        Area::Artifact => MARKDOWN_CONTENT_TYPE,
    };
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        data,
    )
        .into_response();

    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));
    if let Ok(value) = HeaderValue::from_bytes(disposition.as_bytes()) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
