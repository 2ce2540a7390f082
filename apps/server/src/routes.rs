//! HTTP routes of the control server.
//!
//! Robot transfers answer with an event stream: the health gate and
//! size resolution run before the response starts, so an unreachable
//! robot is a plain JSON error. The batch itself runs in a spawned task
//! and outlives a disconnected client.

use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use robofile_file_service::FileServiceClient;
use robofile_multipart::{FormData, MultipartDecoder};
use robofile_protocol::{
    CopyInstruction, DownloadFromRobotRequest, MapConfig, SendToRobotRequest,
};
use robofile_transfer::{
    BatchReport, PathLeases, ProgressChannel, ProgressListener, TransferBatch, TransferOrchestrator,
    confine,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::layout::{
    CONFIG_FILE, base_name, map_target_path, sanitize_file_name, strip_maps_prefix,
};

/// Default remote directory for uploads.
const DEFAULT_DESTINATION: &str = "map";

/// State shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub decoder: MultipartDecoder,
    /// Shared by every batch so two never write the same file at once.
    pub leases: PathLeases,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let decoder =
            MultipartDecoder::new(config.scratch_dir.clone()).with_limit(config.max_upload_bytes);
        Self {
            config,
            decoder,
            leases: PathLeases::new(),
        }
    }

    fn orchestrator(&self, robot_url: &str) -> Result<TransferOrchestrator, ApiError> {
        let timeouts = self.config.timeouts();
        let client = FileServiceClient::from_url_with_timeouts(
            robot_url,
            Some(self.config.default_robot_port),
            timeouts,
        )
        .map_err(|e| ApiError::bad_request(e.to_string()))?
        .with_api_prefix(&self.config.api_prefix);

        Ok(TransferOrchestrator::new(Arc::new(client))
            .with_leases(self.leases.clone())
            .with_health_timeout(timeouts.health))
    }

    async fn decode_form(&self, headers: &HeaderMap, body: Body) -> Result<FormData, ApiError> {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(self.decoder.decode(content_type, body.into_data_stream()).await?)
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/maps/upload", post(upload_map))
        .route("/api/maps/save", post(save_map))
        .route("/api/maps/list", get(list_maps))
        .route("/api/maps/download-from-robot", post(download_from_robot))
        .route("/api/maps/send-to-robot", post(send_to_robot))
        .with_state(state)
}

/// Stores a single `.pgm` image, optionally inside a map folder.
async fn upload_map(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let form = state.decode_form(&headers, body).await?;
    let file = form.require_file("file")?;

    let file_name = sanitize_file_name(&file.filename);
    if !file_name.ends_with(".pgm") {
        return Err(ApiError::bad_request("Only .pgm files are allowed"));
    }

    let maps_dir = &state.config.maps_dir;
    let target_dir = match form.field("folderName").filter(|f| !f.is_empty()) {
        Some(folder) => confine(maps_dir, &sanitize_file_name(folder))?.join("map"),
        None => maps_dir.clone(),
    };
    tokio::fs::create_dir_all(&target_dir).await?;
    let target = target_dir.join(&file_name);
    tokio::fs::write(&target, &file.data).await?;

    info!(path = %target.display(), bytes = file.data.len(), "map image stored");
    Ok(Json(json!({ "success": true, "fileName": file_name })))
}

/// Creates or replaces a map folder from uploaded files.
async fn save_map(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let form = state.decode_form(&headers, body).await?;
    let folder_name = form.field("folderName").unwrap_or_default();
    let map_name = form.field("mapName").unwrap_or_default();
    let description = form.field("description").unwrap_or_default();
    let files: Vec<_> = form.files_named("files").collect();

    if folder_name.is_empty() || map_name.is_empty() || files.is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let maps_dir = &state.config.maps_dir;
    let folder = confine(maps_dir, folder_name)?;
    tokio::fs::create_dir_all(&folder).await?;

    for file in files {
        let Some(name) = base_name(&file.filename) else {
            warn!(filename = %file.filename, "skipping file part without a usable name");
            continue;
        };
        let target = confine(&folder, &map_target_path(name))?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &file.data).await?;
    }

    if let Some(raw) = form.field("filesToCopy").filter(|raw| !raw.is_empty()) {
        copy_within_maps(maps_dir, &folder, raw).await;
    }

    let config = MapConfig {
        name: map_name.to_string(),
        description: description.to_string(),
        create_time: Some(create_time()),
    };
    write_map_config(&folder, &config).await?;

    info!(folder = folder_name, map = map_name, "map saved");
    Ok(Json(json!({
        "success": true,
        "folderName": folder_name,
        "mapName": map_name,
    })))
}

/// Lists the map folders.
async fn list_maps(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let mut folders = Vec::new();
    let mut entries = match tokio::fs::read_dir(&state.config.maps_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(json!({ "success": true, "folders": folders })));
        }
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            folders.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    folders.sort();
    Ok(Json(json!({ "success": true, "folders": folders })))
}

/// Pulls a map's files from a robot into a local map folder.
async fn download_from_robot(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: DownloadFromRobotRequest = parse_json(&body)?;
    if request.robot_url.trim().is_empty()
        || request.map_name.trim().is_empty()
        || request.files.is_empty()
    {
        return Err(ApiError::bad_request(
            "Invalid request: robotUrl, mapName and files array required",
        ));
    }

    let folder = confine(&state.config.maps_dir, request.target_folder())?;
    let mut batch = TransferBatch::download(&folder);
    for spec in &request.files {
        let name = spec.file_name.as_deref().filter(|n| !n.is_empty());
        let remote = spec.remote_path.as_deref().filter(|p| !p.is_empty());
        match (name, remote) {
            (Some(name), Some(remote)) => {
                if let Err(e) = batch.add_download(name, remote, &map_target_path(name), spec.file_size)
                {
                    batch.add_rejected(name, e.to_string());
                }
            }
            (name, _) => batch.add_rejected(name.unwrap_or("unknown"), "Missing file name or path"),
        }
    }

    let orchestrator = state.orchestrator(&request.robot_url)?;
    orchestrator.initialize(&mut batch).await?;
    tokio::fs::create_dir_all(&folder).await?;

    let name = request.map_name.trim().to_string();
    let description = request.description.clone().unwrap_or_default();
    let (channel, listener) = ProgressChannel::new();
    tokio::spawn(async move {
        // config.json must exist by the time `complete` goes out.
        let write_config = |_: &BatchReport| async move {
            let config = MapConfig {
                name,
                description,
                create_time: Some(create_time()),
            };
            if let Err(e) = write_map_config(&folder, &config).await {
                warn!(folder = %folder.display(), error = %e, "failed to write map config");
            }
        };
        if let Err(e) = orchestrator.execute_with(batch, &channel, write_config).await {
            warn!(error = %e, "download batch aborted");
        }
    });

    Ok(event_stream(listener))
}

/// Pushes stored files to a robot.
async fn send_to_robot(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: SendToRobotRequest = parse_json(&body)?;
    if request.robot_url.trim().is_empty() || request.files.is_empty() {
        return Err(ApiError::bad_request(
            "Invalid request: robotUrl and files array required",
        ));
    }

    let default_destination = request
        .destination_path
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DESTINATION);

    let mut batch = TransferBatch::upload(&state.config.maps_dir);
    for spec in &request.files {
        if spec.file_name.trim().is_empty() || spec.local_path.trim().is_empty() {
            batch.add_rejected(
                Some(spec.file_name.as_str())
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or("unknown"),
                "Missing file name or path",
            );
            continue;
        }
        let destination = spec
            .destination_path
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(default_destination);
        if let Err(e) =
            batch.add_upload(strip_maps_prefix(&spec.local_path), &spec.file_name, destination)
        {
            batch.add_rejected(&spec.file_name, e.to_string());
        }
    }

    let orchestrator = state.orchestrator(&request.robot_url)?;
    orchestrator.initialize(&mut batch).await?;

    let (channel, listener) = ProgressChannel::new();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.execute(batch, &channel).await {
            warn!(error = %e, "upload batch aborted");
        }
    });

    Ok(event_stream(listener))
}

fn event_stream(listener: ProgressListener) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(listener.into_frames()),
    )
        .into_response()
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Empty request body"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request: {e}")))
}

/// Copies `filesToCopy` entries into `folder`. Bad entries are logged
/// and skipped.
async fn copy_within_maps(maps_dir: &Path, folder: &Path, raw: &str) {
    let instructions: Vec<CopyInstruction> = match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "ignoring malformed filesToCopy");
            return;
        }
    };

    for copy in instructions {
        let paths = confine(maps_dir, strip_maps_prefix(&copy.path))
            .and_then(|source| Ok((source, confine(folder, &copy.target_path)?)));
        let (source, target) = match paths {
            Ok(paths) => paths,
            Err(e) => {
                warn!(path = %copy.path, error = %e, "skipping copy");
                continue;
            }
        };
        if let Err(e) = copy_file(&source, &target).await {
            warn!(from = %source.display(), to = %target.display(), error = %e, "copy failed");
        }
    }
}

async fn copy_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(source, target).await?;
    Ok(())
}

/// `createTime` stamp of a map folder: RFC 3339, UTC, milliseconds.
fn create_time() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

async fn write_map_config(folder: &Path, config: &MapConfig) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    tokio::fs::write(folder.join(CONFIG_FILE), json).await
}
