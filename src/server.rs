//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the device thread
//! runs on a plain `std::thread`. Communication is via `std::sync::mpsc`.
//!
//! Colors cross the API in editor form (`#RRGGBB`, grid order). Frame
//! payloads cross it in wire form (hardware order hex).
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Json`, `Path`
//! - `Arc` for sharing state across async tasks
//! - Serde `Deserialize` for parsing JSON request bodies
//! - `tower-http` middleware for CORS and request tracing

use crate::codec::{self, FrameError};
use crate::device::{DeviceCommand, DeviceStatus, RemoteQueue};
use crate::mapping::IndexMaps;
use crate::presets::{PresetError, PresetStore};
use crate::protocol::{self, Command, RemotePayload};
use crate::{Color, normalize_color};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type ApiError = (StatusCode, String);

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the device thread
    pub command_tx: Sender<DeviceCommand>,
    /// Shared device status (device thread writes, handlers read)
    pub status: Arc<Mutex<DeviceStatus>>,
    /// Saved presets, persisted on every change
    pub presets: Arc<Mutex<PresetStore>>,
    /// Grid/hardware index maps, built once at startup
    pub maps: Arc<IndexMaps>,
    /// Payloads waiting for the remote relay
    pub remote_queue: RemoteQueue,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        post_frame,
        post_frame_raw,
        post_frame_decode,
        post_slot_show,
        post_slot_clear,
        post_command,
        get_presets,
        get_preset,
        put_preset,
        delete_preset,
        post_preset_send,
        get_remote_queue,
    ),
    components(schemas(
        StatusResponse,
        GeometryInfo,
        DeviceStatus,
        FrameRequest,
        RawFrameRequest,
        DecodeRequest,
        FrameColors,
        CommandRequest,
        PresetRequest,
        SlotRequest,
        SavedPreset,
        RemotePayload,
    )),
    tags(
        (name = "frames", description = "Frame upload and slot control"),
        (name = "presets", description = "Saved frame presets"),
        (name = "system", description = "Device status and raw commands"),
        (name = "remote", description = "Hand-off to the remote relay"),
    ),
    info(
        title = "Visor Matrix API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for editing and uploading frames to an LED visor"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Serialize, utoipa::ToSchema)]
pub struct GeometryInfo {
    columns: usize,
    rows: usize,
    serpentine: bool,
    column_major: bool,
    /// Rotation in degrees (0 or 180)
    rotation: u16,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    device: DeviceStatus,
    geometry: GeometryInfo,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct FrameRequest {
    /// Frame slot on the device
    #[serde(default)]
    #[schema(example = 0, default = 0)]
    slot: u8,
    /// One color per pixel in grid order (`y * columns + x`). Accepts `#RRGGBB`, `RRGGBB` or `#RGB`.
    colors: Vec<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RawFrameRequest {
    #[serde(default)]
    #[schema(example = 0, default = 0)]
    slot: u8,
    /// Hardware-ordered payload, 6 hex digits per LED. Non-hex characters are ignored.
    hex: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct DecodeRequest {
    /// Hardware-ordered payload, 6 hex digits per LED
    hex: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FrameColors {
    /// One `#RRGGBB` color per pixel in grid order
    colors: Vec<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CommandRequest {
    /// A raw protocol line, e.g. `MODE 4` or `TEXT HELLO`
    #[schema(example = "MODE 4")]
    command: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct PresetRequest {
    /// One color per pixel in grid order
    colors: Vec<String>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct SlotRequest {
    #[serde(default)]
    #[schema(example = 0, default = 0)]
    slot: u8,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SavedPreset {
    /// Name the preset was stored under (trimmed)
    name: String,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/frame", post(post_frame))
        .route("/api/v1/frame/raw", post(post_frame_raw))
        .route("/api/v1/frame/decode", post(post_frame_decode))
        .route("/api/v1/slot/{slot}/show", post(post_slot_show))
        .route("/api/v1/slot/{slot}/clear", post(post_slot_clear))
        .route("/api/v1/command", post(post_command))
        .route("/api/v1/presets", get(get_presets))
        .route(
            "/api/v1/presets/{name}",
            get(get_preset).put(put_preset).delete(delete_preset),
        )
        .route("/api/v1/presets/{name}/send", post(post_preset_send))
        .route("/api/v1/remote/queue", get(get_remote_queue))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Queue commands for the device thread.
fn queue(state: &AppState, commands: impl IntoIterator<Item = Command>) -> Result<(), ApiError> {
    for command in commands {
        state
            .command_tx
            .send(DeviceCommand::Send(command.to_string()))
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Device thread gone".to_string(),
                )
            })?;
    }
    Ok(())
}

/// Normalize editor colors into a full grid frame.
fn parse_grid(maps: &IndexMaps, colors: &[String]) -> Result<Vec<Color>, ApiError> {
    if colors.len() != maps.len() {
        return Err(frame_error(FrameError::PixelCount {
            expected: maps.len(),
            actual: colors.len(),
        }));
    }

    colors
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            normalize_color(raw).ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("invalid color at pixel {index}: {raw:?}"),
                )
            })
        })
        .collect()
}

fn css_colors(grid: &[Color]) -> FrameColors {
    FrameColors {
        colors: grid.iter().map(|c| c.to_css()).collect(),
    }
}

fn frame_error(e: FrameError) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn preset_error(e: PresetError) -> ApiError {
    let status = match &e {
        PresetError::NotFound(_) => StatusCode::NOT_FOUND,
        PresetError::EmptyName | PresetError::Frame(_) => StatusCode::BAD_REQUEST,
        PresetError::Io(_) | PresetError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Preset storage error: {}", e);
    }
    (status, e.to_string())
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status — device state and panel geometry
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current device status", body = StatusResponse)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let device = state.status.lock().unwrap().clone();
    let geometry = state.maps.geometry();
    Json(StatusResponse {
        device,
        geometry: GeometryInfo {
            columns: geometry.columns,
            rows: geometry.rows,
            serpentine: geometry.serpentine,
            column_major: geometry.column_major,
            rotation: geometry.rotation.degrees(),
        },
    })
}

/// POST /api/v1/frame — encode a grid frame, upload it to a slot and show it
#[utoipa::path(
    post,
    path = "/api/v1/frame",
    tag = "frames",
    request_body = FrameRequest,
    responses(
        (status = 200, description = "Frame queued for the device"),
        (status = 400, description = "Wrong pixel count or invalid color")
    )
)]
async fn post_frame(
    State(state): State<AppState>,
    Json(req): Json<FrameRequest>,
) -> Result<StatusCode, ApiError> {
    let grid = parse_grid(&state.maps, &req.colors)?;
    let hex = codec::encode_frame(&state.maps, &grid).map_err(frame_error)?;

    queue(&state, protocol::frame_upload(req.slot, hex))?;
    tracing::info!("Sent frame to slot {} and activated it", u16::from(req.slot) + 1);

    Ok(StatusCode::OK)
}

/// POST /api/v1/frame/raw — upload an already hardware-ordered payload
#[utoipa::path(
    post,
    path = "/api/v1/frame/raw",
    tag = "frames",
    request_body = RawFrameRequest,
    responses(
        (status = 200, description = "Frame queued for the device"),
        (status = 400, description = "Invalid frame data")
    )
)]
async fn post_frame_raw(
    State(state): State<AppState>,
    Json(req): Json<RawFrameRequest>,
) -> Result<StatusCode, ApiError> {
    // Validate shape before anything reaches the device.
    codec::decode_frame(&state.maps, &req.hex).map_err(frame_error)?;
    let hex = codec::clean_hex_payload(&req.hex);

    queue(&state, protocol::frame_upload(req.slot, hex))?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/frame/decode — convert a hardware payload to grid colors
#[utoipa::path(
    post,
    path = "/api/v1/frame/decode",
    tag = "frames",
    request_body = DecodeRequest,
    responses(
        (status = 200, description = "Grid-ordered colors", body = FrameColors),
        (status = 400, description = "Invalid frame data")
    )
)]
async fn post_frame_decode(
    State(state): State<AppState>,
    Json(req): Json<DecodeRequest>,
) -> Result<Json<FrameColors>, ApiError> {
    let grid = codec::decode_frame(&state.maps, &req.hex).map_err(frame_error)?;
    Ok(Json(css_colors(&grid)))
}

/// POST /api/v1/slot/{slot}/show — preview a stored slot on the device
#[utoipa::path(
    post,
    path = "/api/v1/slot/{slot}/show",
    tag = "frames",
    params(("slot" = u8, Path, description = "Frame slot")),
    responses(
        (status = 200, description = "Command queued"),
    )
)]
async fn post_slot_show(
    State(state): State<AppState>,
    Path(slot): Path<u8>,
) -> Result<StatusCode, ApiError> {
    queue(&state, [Command::ShowFrame(slot)])?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/slot/{slot}/clear — erase a slot on the device
#[utoipa::path(
    post,
    path = "/api/v1/slot/{slot}/clear",
    tag = "frames",
    params(("slot" = u8, Path, description = "Frame slot")),
    responses(
        (status = 200, description = "Command queued"),
    )
)]
async fn post_slot_clear(
    State(state): State<AppState>,
    Path(slot): Path<u8>,
) -> Result<StatusCode, ApiError> {
    queue(&state, [Command::ClearFrame(slot)])?;
    tracing::info!("Cleared slot {} on the visor", u16::from(slot) + 1);
    Ok(StatusCode::OK)
}

/// POST /api/v1/command — send a raw protocol line
#[utoipa::path(
    post,
    path = "/api/v1/command",
    tag = "system",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Command queued"),
        (status = 400, description = "Empty command")
    )
)]
async fn post_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<StatusCode, ApiError> {
    let line = req.command.trim();
    if line.is_empty() || line.contains('\n') {
        return Err((
            StatusCode::BAD_REQUEST,
            "Command must be a single non-empty line".to_string(),
        ));
    }

    state
        .command_tx
        .send(DeviceCommand::Send(line.to_string()))
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Device thread gone".to_string(),
            )
        })?;

    Ok(StatusCode::OK)
}

/// GET /api/v1/presets — list preset names
#[utoipa::path(
    get,
    path = "/api/v1/presets",
    tag = "presets",
    responses(
        (status = 200, description = "Preset names, sorted", body = Vec<String>)
    )
)]
async fn get_presets(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.presets.lock().unwrap().names())
}

/// GET /api/v1/presets/{name} — load a preset as grid colors
#[utoipa::path(
    get,
    path = "/api/v1/presets/{name}",
    tag = "presets",
    params(("name" = String, Path, description = "Preset name")),
    responses(
        (status = 200, description = "Grid-ordered colors", body = FrameColors),
        (status = 404, description = "Preset not found"),
        (status = 400, description = "Preset data invalid")
    )
)]
async fn get_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FrameColors>, ApiError> {
    let grid = state
        .presets
        .lock()
        .unwrap()
        .load_preset(&name)
        .map_err(preset_error)?;
    Ok(Json(css_colors(&grid)))
}

/// PUT /api/v1/presets/{name} — save the given frame as a preset
#[utoipa::path(
    put,
    path = "/api/v1/presets/{name}",
    tag = "presets",
    params(("name" = String, Path, description = "Preset name")),
    request_body = PresetRequest,
    responses(
        (status = 200, description = "Preset saved", body = SavedPreset),
        (status = 400, description = "Invalid name or frame")
    )
)]
async fn put_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<SavedPreset>, ApiError> {
    let grid = parse_grid(&state.maps, &req.colors)?;
    let name = state
        .presets
        .lock()
        .unwrap()
        .save(&name, &grid)
        .map_err(preset_error)?;
    Ok(Json(SavedPreset { name }))
}

/// DELETE /api/v1/presets/{name} — remove a preset
#[utoipa::path(
    delete,
    path = "/api/v1/presets/{name}",
    tag = "presets",
    params(("name" = String, Path, description = "Preset name")),
    responses(
        (status = 204, description = "Preset deleted"),
        (status = 404, description = "Preset not found")
    )
)]
async fn delete_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .presets
        .lock()
        .unwrap()
        .delete(&name)
        .map_err(preset_error)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(preset_error(PresetError::NotFound(name)))
    }
}

/// POST /api/v1/presets/{name}/send — upload a stored preset to a slot
#[utoipa::path(
    post,
    path = "/api/v1/presets/{name}/send",
    tag = "presets",
    params(("name" = String, Path, description = "Preset name")),
    request_body = SlotRequest,
    responses(
        (status = 200, description = "Frame queued for the device"),
        (status = 404, description = "Preset not found"),
        (status = 400, description = "Preset data invalid")
    )
)]
async fn post_preset_send(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SlotRequest>,
) -> Result<StatusCode, ApiError> {
    let hex = {
        let presets = state.presets.lock().unwrap();
        let hex = presets
            .get_hex(&name)
            .ok_or_else(|| preset_error(PresetError::NotFound(name.clone())))?;
        codec::decode_frame(&state.maps, hex)
            .map_err(|e| preset_error(PresetError::Frame(e)))?;
        codec::clean_hex_payload(hex)
    };

    queue(&state, protocol::frame_upload(req.slot, hex))?;
    Ok(StatusCode::OK)
}

/// GET /api/v1/remote/queue — hand pending payloads to the remote relay
///
/// Drains the queue: each payload is returned exactly once.
#[utoipa::path(
    get,
    path = "/api/v1/remote/queue",
    tag = "remote",
    responses(
        (status = 200, description = "Pending payloads, oldest first", body = Vec<RemotePayload>)
    )
)]
async fn get_remote_queue(State(state): State<AppState>) -> Json<Vec<RemotePayload>> {
    let drained = state.remote_queue.lock().unwrap().drain(..).collect();
    Json(drained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PanelGeometry;
    use crate::device::DeviceStatus;
    use crate::presets::PresetPaths;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::mpsc::{self, Receiver};
    use tempfile::TempDir;

    struct Harness {
        state: AppState,
        rx: Receiver<DeviceCommand>,
        _tmp: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let maps = Arc::new(IndexMaps::build(PanelGeometry::default()).unwrap());
            let presets = PresetStore::load(PresetPaths::in_dir(tmp.path()), maps.clone());
            let (tx, rx) = mpsc::channel();
            let state = AppState {
                command_tx: tx,
                status: Arc::new(Mutex::new(DeviceStatus::new("none".into(), true))),
                presets: Arc::new(Mutex::new(presets)),
                maps,
                remote_queue: Arc::new(Mutex::new(VecDeque::new())),
            };
            Self {
                state,
                rx,
                _tmp: tmp,
            }
        }

        fn sent(&self) -> Vec<String> {
            self.rx
                .try_iter()
                .filter_map(|cmd| match cmd {
                    DeviceCommand::Send(line) => Some(line),
                    DeviceCommand::Shutdown => None,
                })
                .collect()
        }
    }

    fn single_red_pixel() -> Vec<String> {
        let mut colors = vec!["#000000".to_string(); 256];
        colors[0] = "#f00".to_string();
        colors
    }

    #[tokio::test]
    async fn status_reports_geometry() {
        let h = Harness::new();
        let Json(status) = get_status(State(h.state.clone())).await;
        assert_eq!(status.geometry.columns, 32);
        assert_eq!(status.geometry.rows, 8);
        assert_eq!(status.geometry.rotation, 0);
        assert!(status.device.remote_only);
    }

    #[tokio::test]
    async fn frame_is_encoded_and_activated() {
        let h = Harness::new();
        let req = FrameRequest {
            slot: 1,
            colors: single_red_pixel(),
        };

        let code = post_frame(State(h.state.clone()), Json(req)).await.unwrap();

        assert_eq!(code, StatusCode::OK);
        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], format!("FRAME 1 FF0000{}", "000000".repeat(255)));
        assert_eq!(sent[1], "MODE 20");
    }

    #[tokio::test]
    async fn frame_with_bad_color_is_rejected() {
        let h = Harness::new();
        let mut colors = single_red_pixel();
        colors[5] = "chartreuse".to_string();

        let err = post_frame(State(h.state.clone()), Json(FrameRequest { slot: 0, colors }))
            .await
            .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.contains("pixel 5"));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn frame_with_wrong_count_is_rejected() {
        let h = Harness::new();
        let req = FrameRequest {
            slot: 0,
            colors: vec!["#000000".to_string(); 10],
        };
        let err = post_frame(State(h.state.clone()), Json(req)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn raw_frame_is_validated_and_cleaned() {
        let h = Harness::new();
        let hex = format!("ff0000 {}", "000000".repeat(255));

        post_frame_raw(State(h.state.clone()), Json(RawFrameRequest { slot: 0, hex }))
            .await
            .unwrap();
        let err = post_frame_raw(
            State(h.state.clone()),
            Json(RawFrameRequest {
                slot: 0,
                hex: "FF0000".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        let sent = h.sent();
        assert_eq!(sent[0], format!("FRAME 0 FF0000{}", "000000".repeat(255)));
        assert_eq!(sent[1], "MODE 19");
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn decode_returns_grid_colors() {
        let h = Harness::new();
        // Hardware index 15 is the top of column 1.
        let mut hex = "000000".repeat(256);
        hex.replace_range(15 * 6..16 * 6, "00FF00");

        let Json(frame) = post_frame_decode(State(h.state.clone()), Json(DecodeRequest { hex }))
            .await
            .unwrap();

        assert_eq!(frame.colors.len(), 256);
        assert_eq!(frame.colors[1], "#00FF00");
        assert_eq!(frame.colors[0], "#000000");
    }

    #[tokio::test]
    async fn slot_commands() {
        let h = Harness::new();
        post_slot_show(State(h.state.clone()), Path(2)).await.unwrap();
        post_slot_clear(State(h.state.clone()), Path(3)).await.unwrap();
        assert_eq!(h.sent(), vec!["SHOWFRAME 2", "CLEARFRAME 3"]);
    }

    #[tokio::test]
    async fn raw_command_must_be_one_line() {
        let h = Harness::new();
        let ok = post_command(
            State(h.state.clone()),
            Json(CommandRequest {
                command: " TEXT HI ".to_string(),
            }),
        )
        .await;
        let blank = post_command(
            State(h.state.clone()),
            Json(CommandRequest {
                command: "  ".to_string(),
            }),
        )
        .await;

        assert_eq!(ok.unwrap(), StatusCode::OK);
        assert_eq!(blank.unwrap_err().0, StatusCode::BAD_REQUEST);
        assert_eq!(h.sent(), vec!["TEXT HI"]);
    }

    #[tokio::test]
    async fn preset_lifecycle() {
        let h = Harness::new();

        let Json(saved) = put_preset(
            State(h.state.clone()),
            Path(" heart ".to_string()),
            Json(PresetRequest {
                colors: single_red_pixel(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(saved.name, "heart");

        let Json(names) = get_presets(State(h.state.clone())).await;
        assert_eq!(names, vec!["heart"]);

        let Json(frame) = get_preset(State(h.state.clone()), Path("heart".to_string()))
            .await
            .unwrap();
        assert_eq!(frame.colors[0], "#FF0000");
        assert_eq!(frame.colors[1], "#000000");

        post_preset_send(
            State(h.state.clone()),
            Path("heart".to_string()),
            Json(SlotRequest { slot: 4 }),
        )
        .await
        .unwrap();
        let sent = h.sent();
        assert_eq!(sent[0], format!("FRAME 4 FF0000{}", "000000".repeat(255)));
        assert_eq!(sent[1], "MODE 23");

        let code = delete_preset(State(h.state.clone()), Path("heart".to_string()))
            .await
            .unwrap();
        assert_eq!(code, StatusCode::NO_CONTENT);
        let err = delete_preset(State(h.state.clone()), Path("heart".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn preset_routes_agree_on_trimmed_names() {
        let h = Harness::new();
        let padded = || Path(" heart ".to_string());

        put_preset(
            State(h.state.clone()),
            padded(),
            Json(PresetRequest {
                colors: single_red_pixel(),
            }),
        )
        .await
        .unwrap();

        let Json(frame) = get_preset(State(h.state.clone()), padded()).await.unwrap();
        assert_eq!(frame.colors[0], "#FF0000");
        post_preset_send(State(h.state.clone()), padded(), Json(SlotRequest::default()))
            .await
            .unwrap();
        assert_eq!(h.sent()[1], "MODE 19");
        let code = delete_preset(State(h.state.clone()), padded()).await.unwrap();
        assert_eq!(code, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_preset_is_404() {
        let h = Harness::new();
        let err = get_preset(State(h.state.clone()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = post_preset_send(
            State(h.state.clone()),
            Path("nope".to_string()),
            Json(SlotRequest::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remote_queue_drains_once() {
        let h = Harness::new();
        h.state
            .remote_queue
            .lock()
            .unwrap()
            .push_back(RemotePayload::FrameClear {
                name: "CLEARFRAME".into(),
                slot: "1".into(),
            });

        let Json(first) = get_remote_queue(State(h.state.clone())).await;
        let Json(second) = get_remote_queue(State(h.state.clone())).await;

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn openapi_lists_frame_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/frame"));
        assert!(doc.paths.paths.contains_key("/api/v1/presets/{name}"));
        assert!(doc.paths.paths.contains_key("/api/v1/remote/queue"));
    }
}
