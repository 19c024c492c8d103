//! HTTP surface: the tools API and the virtual file endpoint that serves
//! uploaded React apps out of their zip archives.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::catalog::{
    AppType, CatalogError, DescriptionBlock, NewTool, Tool, ToolStore, ToolUpdate,
};
use crate::storage::StorageBackend;
use crate::vfs::{self, VfsError, ZipArchive};
use crate::MOUNT_PREFIX;

const ACCEPTED_ZIP_TYPES: [&str; 2] = ["application/zip", "application/x-zip-compressed"];

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ToolStore>,
    pub storage: Arc<dyn StorageBackend>,
}

impl FromRef<AppState> for Arc<ToolStore> {
    fn from_ref(input: &AppState) -> Self {
        Arc::clone(&input.store)
    }
}
impl FromRef<AppState> for Arc<dyn StorageBackend> {
    fn from_ref(input: &AppState) -> Self {
        Arc::clone(&input.storage)
    }
}

pub fn main_service(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/",
            get(|| async { concat!("toolmount v", env!("CARGO_PKG_VERSION"), " daemon") }),
        )
        .route("/api/tools", get(list_tools).post(create_tool))
        .route("/api/tools/search-tools", get(search_tools))
        .route(
            "/api/tools/:id",
            get(get_tool).put(update_tool).delete(delete_tool),
        )
        .route("/api/tools/:id/upload-react-app", post(upload_react_app))
        .route(&format!("{MOUNT_PREFIX}/*rest"), get(serve_app))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Client-facing projection of a tool: the internal archive reference is
/// dropped, a computed embed URL is added.
#[derive(Debug, Serialize)]
pub struct ToolView {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub description: Vec<DescriptionBlock>,
    pub thumbnail: String,
    pub slug: String,
    pub app_type: AppType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_html: Option<String>,
    pub embed_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Tool> for ToolView {
    fn from(tool: Tool) -> Self {
        let embed_url = tool.embed_url();
        Self {
            id: tool.id,
            title: tool.title,
            summary: tool.summary,
            description: tool.description,
            thumbnail: tool.thumbnail,
            slug: tool.slug,
            app_type: tool.app_type,
            embed_html: tool.embed_html,
            embed_url,
            created_at: tool.created_at,
            updated_at: tool.updated_at,
        }
    }
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "message": text.into() }))).into_response()
}

fn internal_error(what: &str, e: impl std::fmt::Display) -> Response {
    log::error!("{what} failed: {e}");
    message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn validate_blocks(blocks: &[DescriptionBlock]) -> Result<(), String> {
    if blocks.is_empty() {
        return Err("Description must be a non-empty array.".to_owned());
    }
    for (i, block) in blocks.iter().enumerate() {
        if block.image.trim().is_empty() {
            return Err(format!(
                "Description block {} must have a valid image URL.",
                i + 1
            ));
        }
        if block.text.trim().is_empty() {
            return Err(format!("Description block {} must have text.", i + 1));
        }
    }
    Ok(())
}

// ----- Tools API -----

async fn list_tools(State(store): State<Arc<ToolStore>>) -> Response {
    match store.list() {
        Ok(tools) => {
            Json(tools.into_iter().map(ToolView::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => internal_error("listing tools", e),
    }
}

async fn create_tool(
    State(store): State<Arc<ToolStore>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let new_tool: NewTool = match serde_json::from_value(body) {
        Ok(t) => t,
        Err(e) => return message(StatusCode::BAD_REQUEST, format!("Invalid tool payload: {e}")),
    };
    if new_tool.title.trim().is_empty()
        || new_tool.summary.trim().is_empty()
        || new_tool.thumbnail.trim().is_empty()
        || new_tool.slug.trim().is_empty()
    {
        return message(
            StatusCode::BAD_REQUEST,
            "All fields are required, and description must be a non-empty array.",
        );
    }
    if let Err(text) = validate_blocks(&new_tool.description) {
        return message(StatusCode::BAD_REQUEST, text);
    }
    match store.insert(new_tool) {
        Ok(tool) => Json(ToolView::from(tool)).into_response(),
        Err(CatalogError::Conflict) => message(
            StatusCode::CONFLICT,
            "A tool with this id or slug already exists.",
        ),
        Err(e) => internal_error("creating tool", e),
    }
}

async fn search_tools(
    State(store): State<Arc<ToolStore>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let query = params.get("q").map(|q| q.trim()).unwrap_or("");
    if query.is_empty() {
        return message(StatusCode::BAD_REQUEST, "Query parameter 'q' is required.");
    }
    match store.search(query) {
        Ok(tools) => {
            Json(tools.into_iter().map(ToolView::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => internal_error("searching tools", e),
    }
}

async fn get_tool(State(store): State<Arc<ToolStore>>, Path(id): Path<String>) -> Response {
    match store.find_by_id(&id) {
        Ok(Some(tool)) => Json(ToolView::from(tool)).into_response(),
        Ok(None) => message(StatusCode::NOT_FOUND, "Tool not found."),
        Err(e) => internal_error("fetching tool", e),
    }
}

async fn update_tool(
    State(store): State<Arc<ToolStore>>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let update: ToolUpdate = match serde_json::from_value(body) {
        Ok(u) => u,
        Err(e) => return message(StatusCode::BAD_REQUEST, format!("Invalid tool payload: {e}")),
    };
    if let Some(blocks) = &update.description {
        if let Err(text) = validate_blocks(blocks) {
            return message(StatusCode::BAD_REQUEST, text);
        }
    }
    match store.update(&id, update) {
        Ok(Some(tool)) => Json(ToolView::from(tool)).into_response(),
        Ok(None) => message(StatusCode::NOT_FOUND, "Tool not found."),
        Err(e) => internal_error("updating tool", e),
    }
}

async fn delete_tool(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.delete(&id) {
        Ok(Some(tool)) => {
            if let Some(reference) = &tool.archive_ref {
                state.storage.delete(reference).await;
            }
            message(StatusCode::OK, "Tool deleted.")
        }
        Ok(None) => message(StatusCode::NOT_FOUND, "Tool not found."),
        Err(e) => internal_error("deleting tool", e),
    }
}

// ----- Archive upload -----

async fn upload_react_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("archive") {
                    continue;
                }
                let content_type = field.content_type().map(str::to_owned);
                match field.bytes().await {
                    Ok(bytes) => upload = Some((bytes.to_vec(), content_type)),
                    Err(e) => {
                        return message(
                            StatusCode::BAD_REQUEST,
                            format!("Invalid multipart payload: {e}"),
                        )
                    }
                }
                break;
            }
            Ok(None) => break,
            Err(e) => {
                return message(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart payload: {e}"),
                )
            }
        }
    }
    let Some((bytes, content_type)) = upload else {
        return message(StatusCode::BAD_REQUEST, "No file uploaded.");
    };
    if !content_type
        .as_deref()
        .is_some_and(|t| ACCEPTED_ZIP_TYPES.contains(&t))
    {
        return message(StatusCode::BAD_REQUEST, "Only .zip files are allowed");
    }

    let tool = match state.store.find_by_id(&id) {
        Ok(Some(tool)) => tool,
        Ok(None) => return message(StatusCode::NOT_FOUND, "Tool not found."),
        Err(e) => return internal_error("fetching tool", e),
    };

    // A corrupt archive is the uploader's fault, as is one with nothing to
    // serve as the app shell
    let archive = match ZipArchive::parse(bytes.clone()) {
        Ok(archive) => archive,
        Err(e) => {
            log::warn!("rejecting upload for tool {id}: {e}");
            return message(StatusCode::BAD_REQUEST, "Invalid zip archive.");
        }
    };
    if !vfs::resolve::has_root_index(archive.entries()) {
        return message(
            StatusCode::BAD_REQUEST,
            "Zip file must contain an index.html file.",
        );
    }
    drop(archive);

    // Store the new blob before repointing; the old blob goes away last so
    // the record never references a deleted one
    let reference = match state.storage.store(&tool.id, &bytes).await {
        Ok(reference) => reference,
        Err(e) => return internal_error("storing archive", e),
    };
    match state.store.set_archive(&id, &reference) {
        Ok(Some((updated, previous))) => {
            if let Some(previous) = previous.filter(|p| *p != reference) {
                state.storage.delete(&previous).await;
            }
            Json(ToolView::from(updated)).into_response()
        }
        Ok(None) => {
            // Tool vanished between lookup and repoint; discard the orphan
            state.storage.delete(&reference).await;
            message(StatusCode::NOT_FOUND, "Tool not found.")
        }
        Err(e) => internal_error("updating tool", e),
    }
}

// ----- Virtual file endpoint -----

async fn serve_app(State(state): State<AppState>, Path(rest): Path<String>) -> Response {
    let (slug, sub_path) = match rest.split_once('/') {
        Some((slug, path)) => (slug, path),
        None => (rest.as_str(), ""),
    };
    serve_virtual_path(&state, slug, sub_path).await
}

async fn serve_virtual_path(state: &AppState, slug: &str, sub_path: &str) -> Response {
    let tool = match state.store.find_by_slug(slug) {
        Ok(Some(tool)) => tool,
        Ok(None) => {
            log::debug!("no tool for slug `{slug}`");
            return message(StatusCode::NOT_FOUND, "Tool not found");
        }
        Err(e) => return internal_error("tool lookup", e),
    };
    let Some(reference) = &tool.archive_ref else {
        log::debug!("no archive configured for slug `{slug}`");
        return message(StatusCode::NOT_FOUND, "React app not found");
    };

    // Infrastructure failure is not distinguished from absence here; the
    // client sees not-found either way
    let bytes = match state.storage.fetch(reference).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            log::error!("archive {reference} for slug `{slug}` is gone");
            return message(StatusCode::NOT_FOUND, "React app not found");
        }
        Err(e) => {
            log::error!("fetching archive {reference} for slug `{slug}` failed: {e}");
            return message(StatusCode::NOT_FOUND, "React app not found");
        }
    };

    let mut requested = sub_path.strip_prefix('/').unwrap_or(sub_path);
    if requested.is_empty() {
        requested = "index.html";
    }
    let base_path = format!("{MOUNT_PREFIX}/{}/", tool.slug);

    match vfs::serve_archive_path(bytes, requested, &base_path) {
        Ok(file) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(file.content_type),
            );
            // The app shell must never be cached or updates would not
            // propagate; everything else is fingerprinted build output
            if !file.is_html() {
                headers.insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=31536000"),
                );
            }
            (headers, file.content).into_response()
        }
        Err(VfsError::NotFound) => {
            log::warn!("no archive entry for `{requested}` under slug `{slug}`");
            message(StatusCode::NOT_FOUND, "File not found")
        }
        Err(e @ VfsError::CorruptArchive(_)) => {
            // Accepted at upload time, unreadable now: that is on us
            log::error!("serving slug `{slug}`: {e}");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(e @ VfsError::Read(_)) => {
            log::error!("serving `{requested}` for slug `{slug}`: {e}");
            message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading file content",
            )
        }
    }
}
