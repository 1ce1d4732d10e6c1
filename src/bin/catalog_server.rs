#![forbid(unsafe_code)]

//! Axum server behind the catalog page.
//!
//! The page only talks to the JSON routes below plus the import form.
//! Anything that waits on the outside world (yt-dlp, fact-check sites) runs
//! on the blocking pool so one slow download never stalls the rest of the UI.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Multipart, Path as AxumPath, State, multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use mime_guess::MimeGuess;
use ooc_catalog::{
    config::CatalogConfig,
    factcheck::{FactCheckScraper, FactCheckSource, is_http_url},
    flash::{CLEAR_FLASH_COOKIE, Flash},
    inspector::{MetadataVerdict, VideoInspector, YtDlp, enforce_duration_limit},
    logging, page,
    records::{Record, RecordStore, decode_records, fill_missing_platforms},
    security::ensure_not_root,
};
use serde_json::{Value, json};
use tokio::{fs::File, signal, task};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

// The whole catalog travels in one request body on save and import.
const CATALOG_BODY_LIMIT: usize = 512 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    store: Arc<RecordStore>,
    inspector: Arc<dyn VideoInspector>,
    factcheck: Arc<dyn FactCheckSource>,
    config: Arc<CatalogConfig>,
    template: Arc<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 400 when the tool blames the URL, 500 otherwise.
    fn from_tool_message(message: String) -> Self {
        if message.to_lowercase().contains("invalid url") {
            Self::bad_request(message)
        } else {
            Self::internal(message)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Request must be JSON.")
            }
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, other.body_text())
            }
            other => Self::bad_request(format!("Invalid JSON body: {}", other.body_text())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    ensure_not_root("catalog server")?;

    let config = CatalogConfig::default();
    let addr = config.bind_addr()?;

    std::fs::create_dir_all(&config.download_dir).with_context(|| {
        format!(
            "cannot create download directory {}",
            config.download_dir.display()
        )
    })?;
    let store = RecordStore::new(&config.data_file);
    store.ensure_exists()?;

    info!("{}", "*".repeat(60));
    info!(
        "Attempting to use cookies from browser: '{}'",
        config.cookie_browser
    );
    info!(
        "Ensure you are logged into relevant sites (like X/Twitter) in {}",
        config.cookie_browser
    );
    info!("on the machine running this server for protected content access.");
    info!("See yt-dlp documentation for '--cookies-from-browser' compatibility.");
    info!("{}", "*".repeat(60));

    let state = AppState {
        store: Arc::new(store),
        inspector: Arc::new(YtDlp::from_config(&config)),
        factcheck: Arc::new(FactCheckScraper::new()),
        template: Arc::new(page::load_template(&config.template_path)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("Catalog server listening on http://{addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running catalog server")?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/save",
            post(save).layer(DefaultBodyLimit::max(CATALOG_BODY_LIMIT)),
        )
        .route(
            "/import",
            post(import_data).layer(DefaultBodyLimit::max(CATALOG_BODY_LIMIT)),
        )
        .route("/get_politifact_details", post(politifact_details))
        .route("/get_video_metadata", post(video_metadata))
        .route("/download_video", post(download_video))
        .route("/static/{*path}", get(static_file))
        .fallback(not_found)
        .with_state(state)
}

async fn shutdown_signal() {
    // Graceful shutdown only; the process still stops on Ctrl+C.
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {err}");
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let flash = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(Flash::from_cookie_header);
    let records = state.store.load();
    let html = page::render(&state.template, &records, flash.as_ref())
        .map_err(|err| ApiError::internal(format!("{err:#}")))?;

    let mut response = Html(html).into_response();
    if flash.is_some() {
        response.headers_mut().insert(
            header::SET_COOKIE,
            header::HeaderValue::from_static(CLEAR_FLASH_COOKIE),
        );
    }
    Ok(response)
}

async fn save(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let Value::Array(items) = body else {
        warn!("Rejected save: body is not a list");
        return Err(ApiError::bad_request("Invalid data format: Expected list."));
    };
    if items.iter().any(|item| !item.is_object()) {
        warn!("Rejected save: list contains non-object items");
        return Err(ApiError::bad_request(
            "Invalid data format: List items must be objects.",
        ));
    }
    let mut records = decode_records(items)
        .map_err(|err| ApiError::bad_request(format!("Invalid data format: {err:#}")))?;
    fill_missing_platforms(&mut records);

    if state.store.save(records) {
        Ok(Json(json!({ "message": "Data saved successfully." })))
    } else {
        Err(ApiError::internal("Failed to write data to file."))
    }
}

async fn import_data(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let flash = match multipart {
        Ok(multipart) => import_upload(&state, multipart).await,
        Err(err) => {
            warn!("Import request is not multipart: {err}");
            Flash::danger("No file part.")
        }
    };
    ([(header::SET_COOKIE, flash.to_set_cookie())], Redirect::to("/")).into_response()
}

async fn import_upload(state: &AppState, mut multipart: Multipart) -> Flash {
    let (file_name, content) = loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Flash::danger("No file part."),
            Err(err) => {
                error!("Reading import upload failed: {err}");
                return Flash::danger(format!("Import error: {err}"));
            }
        };
        if field.name() != Some("jsonfile") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => break (file_name, bytes),
            Err(err) => {
                error!("Reading import upload failed: {err}");
                return Flash::danger(format!("Import error: {err}"));
            }
        }
    };

    if file_name.is_empty() {
        return Flash::warning("No selected file.");
    }
    if !file_name.to_lowercase().ends_with(".json") {
        return Flash::warning("Invalid file type (must be .json).");
    }
    let text = match std::str::from_utf8(&content) {
        Ok(text) => text,
        Err(err) => return Flash::danger(format!("Import error: {err}")),
    };
    if text.trim().is_empty() {
        return Flash::danger("Import failed: File is empty.");
    }
    let parsed: Value = match serde_json::from_str(text) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!("Import JSON decode error: {err}");
            return Flash::danger(format!("Import error: Invalid JSON format - {err}"));
        }
    };
    let Value::Array(items) = parsed else {
        return Flash::danger("Import failed: JSON not a list.");
    };
    let mut records: Vec<Record> = match decode_records(items) {
        Ok(records) => records,
        Err(err) => {
            warn!("Rejected import '{file_name}': {err:#}");
            return Flash::danger("Import failed: List items must be objects.");
        }
    };
    fill_missing_platforms(&mut records);

    let count = records.len();
    if state.store.save(records) {
        info!("Imported {count} records from '{file_name}'");
        Flash::success(format!("Data ({count} items) imported!"))
    } else {
        Flash::danger("Import failed: Could not save data.")
    }
}

fn required_url(body: &Value) -> Option<String> {
    body.get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

async fn politifact_details(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let url = required_url(&body).ok_or_else(|| ApiError::bad_request("Missing 'url' parameter."))?;
    if !is_http_url(&url) {
        return Err(ApiError::bad_request("Invalid URL format."));
    }

    info!("Fetching fact-check details for {url}");
    let factcheck = Arc::clone(&state.factcheck);
    let (headline, subheadline) =
        task::spawn_blocking(move || (factcheck.headline(&url), factcheck.subheadline(&url)))
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;

    Ok(Json(json!({
        "headline": headline.unwrap_or_default(),
        "subheadline": subheadline.unwrap_or_default(),
    })))
}

async fn video_metadata(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let url = required_url(&body).ok_or_else(|| ApiError::bad_request("Missing 'url'."))?;

    let inspector = Arc::clone(&state.inspector);
    let lookup_url = url.clone();
    let outcome = task::spawn_blocking(move || inspector.fetch_metadata(&lookup_url))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    match enforce_duration_limit(outcome, state.config.max_video_duration_secs) {
        MetadataVerdict::Accepted(outcome) => Ok(Json(outcome).into_response()),
        MetadataVerdict::TooLong(outcome) => {
            info!("Video rejected (duration) for {url}: {}", outcome.message);
            Ok(Json(outcome).into_response())
        }
        MetadataVerdict::Failed(outcome) => Err(ApiError::from_tool_message(outcome.message)),
    }
}

/// Integers and integer strings are both accepted as ids.
fn parse_item_id(value: &Value) -> Result<i64, String> {
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

async fn download_video(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let url = required_url(&body);
    let id = body.get("id").filter(|id| !id.is_null());
    let (Some(url), Some(id)) = (url, id) else {
        return Err(ApiError::bad_request("Missing 'url' or 'id'."));
    };
    let item_id = parse_item_id(id)
        .map_err(|raw| ApiError::bad_request(format!("Invalid 'id': '{raw}'.")))?;

    let inspector = Arc::clone(&state.inspector);
    let outcome = task::spawn_blocking(move || inspector.download(&url, item_id))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    if outcome.success {
        Ok(Json(outcome).into_response())
    } else {
        Err(ApiError::from_tool_message(outcome.message))
    }
}

async fn static_file(
    State(state): State<AppState>,
    AxumPath(path): AxumPath<String>,
) -> ApiResult<Response> {
    let path = resolve_static_path(&state.config.static_root, &path)?;
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let is_file = file
        .metadata()
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ApiError::not_found("file not found"));
    }

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

fn resolve_static_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let candidate = Path::new(request_path.trim_start_matches('/'));
    if candidate.as_os_str().is_empty()
        || candidate
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::Request};
    use ooc_catalog::inspector::{DownloadOutcome, MetadataOutcome};
    use parking_lot::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[derive(Default)]
    struct FakeInspector {
        metadata: Mutex<Option<MetadataOutcome>>,
        download: Mutex<Option<DownloadOutcome>>,
        downloads: Mutex<Vec<(String, i64)>>,
    }

    impl VideoInspector for FakeInspector {
        fn fetch_metadata(&self, _url: &str) -> MetadataOutcome {
            self.metadata
                .lock()
                .clone()
                .unwrap_or_else(|| MetadataOutcome::failure("no metadata configured"))
        }

        fn download(&self, url: &str, item_id: i64) -> DownloadOutcome {
            self.downloads.lock().push((url.to_string(), item_id));
            self.download
                .lock()
                .clone()
                .unwrap_or_else(|| DownloadOutcome::failure("no download configured"))
        }
    }

    struct SilentFactCheck;

    impl FactCheckSource for SilentFactCheck {
        fn headline(&self, _url: &str) -> Option<String> {
            Some("Claim rated false".into())
        }

        fn subheadline(&self, _url: &str) -> Option<String> {
            None
        }
    }

    struct TestContext {
        _dir: TempDir,
        store: Arc<RecordStore>,
        inspector: Arc<FakeInspector>,
        state: AppState,
        router: Router,
    }

    impl TestContext {
        fn new() -> Self {
            Self::with_data_file(|dir| dir.join("data.json"))
        }

        /// Data file nested under a regular file, so every save fails.
        fn with_unwritable_store() -> Self {
            Self::with_data_file(|dir| {
                let blocker = dir.join("blocker");
                std::fs::write(&blocker, "file, not a directory").unwrap();
                blocker.join("data.json")
            })
        }

        fn with_data_file(data_file: impl FnOnce(&Path) -> PathBuf) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let static_root = dir.path().join("static");
            std::fs::create_dir_all(&static_root).unwrap();
            std::fs::write(static_root.join("style.css"), "body { margin: 0; }").unwrap();
            std::fs::write(dir.path().join("secret.txt"), "secret").unwrap();

            let config = CatalogConfig {
                data_file: data_file(dir.path()),
                download_dir: dir.path().join("downloads"),
                static_root,
                ..CatalogConfig::default()
            };
            let store = Arc::new(RecordStore::new(&config.data_file));
            let inspector = Arc::new(FakeInspector::default());
            let state = AppState {
                store: Arc::clone(&store),
                inspector: inspector.clone(),
                factcheck: Arc::new(SilentFactCheck),
                config: Arc::new(config),
                template: Arc::new("{{ flash }}<script>{{ records_json }}</script>".into()),
            };
            Self {
                _dir: dir,
                store,
                inspector,
                router: build_router(state.clone()),
                state,
            }
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn post_json(&self, uri: &str, body: Value) -> Response {
            self.send(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn upload(&self, file_name: &str, content: &str) -> Response {
            self.upload_field("jsonfile", file_name, content).await
        }

        async fn upload_field(&self, field: &str, file_name: &str, content: &str) -> Response {
            let boundary = "catalog-test-boundary";
            let body = format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{boundary}--\r\n"
            );
            self.send(
                Request::post("/import")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
        }

        fn seed(&self, records: Value) {
            let Value::Array(items) = records else {
                panic!("seed expects a list");
            };
            assert!(self.store.save(decode_records(items).unwrap()));
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn flash_of(response: &Response) -> Flash {
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        Flash::from_cookie_header(cookie.split(';').next().unwrap()).unwrap()
    }

    #[test]
    fn item_ids_accept_numbers_and_numeric_strings() {
        assert_eq!(parse_item_id(&json!(7)), Ok(7));
        assert_eq!(parse_item_id(&json!(" 12 ")), Ok(12));
        assert_eq!(parse_item_id(&json!("abc")), Err("abc".into()));
        assert_eq!(parse_item_id(&json!(1.5)), Err("1.5".into()));
        assert_eq!(parse_item_id(&json!(true)), Err("true".into()));
    }

    #[test]
    fn static_paths_stay_inside_the_root() {
        let root = Path::new("/srv/static");
        assert_eq!(
            resolve_static_path(root, "css/site.css").unwrap(),
            PathBuf::from("/srv/static/css/site.css")
        );
        assert!(resolve_static_path(root, "../data.json").is_err());
        assert!(resolve_static_path(root, "/etc/passwd").is_ok_and(|path| path.starts_with(root)));
        assert!(resolve_static_path(root, "").is_err());
    }

    #[tokio::test]
    async fn save_renumbers_and_labels_platforms() {
        let ctx = TestContext::new();
        let response = ctx
            .post_json(
                "/save",
                json!([
                    {"id": 9, "social_link": "https://www.tiktok.com/@a/video/1"},
                    {"id": 3, "rating": "false"}
                ]),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Data saved successfully."})
        );

        let records = ctx.store.load();
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].id, records[1].id), (0, 1));
        assert_eq!(records[0].social_platform, "tiktok");
        assert_eq!(records[1].rating, "false");
    }

    #[tokio::test]
    async fn save_rejects_non_lists_without_touching_the_store() {
        let ctx = TestContext::new();
        ctx.seed(json!([{"rating": "true"}]));

        let response = ctx.post_json("/save", json!({"rating": "false"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Invalid data format: Expected list."})
        );

        let response = ctx.post_json("/save", json!([{"rating": "x"}, 5])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Invalid data format: List items must be objects."})
        );

        let records = ctx.store.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rating, "true");
    }

    #[tokio::test]
    async fn json_routes_require_a_json_content_type() {
        let ctx = TestContext::new();
        for uri in ["/save", "/get_video_metadata", "/download_video", "/get_politifact_details"] {
            let response = ctx
                .send(
                    Request::post(uri)
                        .header(header::CONTENT_TYPE, "text/plain")
                        .body(Body::from("[]"))
                        .unwrap(),
                )
                .await;
            assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE, "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let ctx = TestContext::new();
        let response = ctx
            .send(
                Request::post("/save")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("[{"))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn long_videos_are_rejected_with_ok_status() {
        let ctx = TestContext::new();
        *ctx.inspector.metadata.lock() = Some(MetadataOutcome {
            success: true,
            duration: Some(900.0),
            social_text: Some("Title: Long".into()),
            message: "Metadata fetched successfully.".into(),
        });

        let response = ctx
            .post_json("/get_video_metadata", json!({"url": "https://x.com/a/status/1"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["duration"], 900.0);
        assert_eq!(
            body["message"],
            "Video duration (900.0s) exceeds limit (600s). Download aborted."
        );
    }

    #[tokio::test]
    async fn accepted_metadata_is_returned_as_is() {
        let ctx = TestContext::new();
        *ctx.inspector.metadata.lock() = Some(MetadataOutcome {
            success: true,
            duration: Some(42.5),
            social_text: Some("Title: Short".into()),
            message: "Metadata fetched successfully.".into(),
        });

        let response = ctx
            .post_json("/get_video_metadata", json!({"url": "https://x.com/a/status/1"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["social_text"], "Title: Short");
    }

    #[tokio::test]
    async fn tool_failures_map_to_400_or_500() {
        let ctx = TestContext::new();
        *ctx.inspector.metadata.lock() =
            Some(MetadataOutcome::failure("yt-dlp error (Code: 1): ERROR: Invalid URL"));
        let response = ctx
            .post_json("/get_video_metadata", json!({"url": "nonsense"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        *ctx.inspector.metadata.lock() =
            Some(MetadataOutcome::failure("yt-dlp error (Code: 1): HTTP Error 403"));
        let response = ctx
            .post_json("/get_video_metadata", json!({"url": "https://x.com/a"}))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "yt-dlp error (Code: 1): HTTP Error 403"})
        );

        let response = ctx.post_json("/get_video_metadata", json!({})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Missing 'url'."}));
    }

    #[tokio::test]
    async fn download_validates_id_before_running_the_tool() {
        let ctx = TestContext::new();
        let response = ctx
            .post_json("/download_video", json!({"url": "https://x.com/a", "id": "abc"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid 'id': 'abc'."}));

        let response = ctx
            .post_json("/download_video", json!({"url": "https://x.com/a"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Missing 'url' or 'id'."})
        );
        assert!(ctx.inspector.downloads.lock().is_empty());
    }

    #[tokio::test]
    async fn download_passes_string_ids_through() {
        let ctx = TestContext::new();
        *ctx.inspector.download.lock() = Some(DownloadOutcome {
            success: true,
            message: "Download successful (video_4.mp4).".into(),
            drive_path: "/srv/downloads/video_4.mp4".into(),
        });

        let response = ctx
            .post_json("/download_video", json!({"url": "https://x.com/a", "id": "4"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["drive_path"], "/srv/downloads/video_4.mp4");
        assert_eq!(
            ctx.inspector.downloads.lock().as_slice(),
            &[("https://x.com/a".to_string(), 4)]
        );

        *ctx.inspector.download.lock() = Some(DownloadOutcome::failure(
            "Download failed (Code: 1). Error: boom",
        ));
        let response = ctx
            .post_json("/download_video", json!({"url": "https://x.com/a", "id": 4}))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn politifact_details_default_to_empty_strings() {
        let ctx = TestContext::new();
        let response = ctx
            .post_json(
                "/get_politifact_details",
                json!({"url": "https://www.politifact.com/factchecks/1"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"headline": "Claim rated false", "subheadline": ""})
        );

        let response = ctx
            .post_json("/get_politifact_details", json!({"url": "ftp://example.org"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid URL format."}));
    }

    fn large_catalog(records: usize, text_len: usize) -> Value {
        let text = "a".repeat(text_len);
        Value::Array(
            (0..records)
                .map(|index| json!({"id": index, "social_text": text}))
                .collect(),
        )
    }

    #[tokio::test]
    async fn catalogs_past_two_megabytes_still_save() {
        let ctx = TestContext::new();
        let catalog = large_catalog(1500, 1500);
        assert!(catalog.to_string().len() > 2 * 1024 * 1024);

        let response = ctx.post_json("/save", catalog).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.store.load().len(), 1500);
    }

    #[tokio::test]
    async fn large_imports_are_accepted() {
        let ctx = TestContext::new();
        let catalog = large_catalog(1500, 1500).to_string();
        let response = ctx.upload("catalog.json", &catalog).await;
        assert_eq!(flash_of(&response), Flash::success("Data (1500 items) imported!"));
        assert_eq!(ctx.store.load().len(), 1500);
    }

    #[tokio::test]
    async fn oversized_bodies_are_413() {
        let ctx = TestContext::new();
        let router = Router::new()
            .route("/save", post(save).layer(DefaultBodyLimit::max(64)))
            .with_state(ctx.state.clone());
        let response = router
            .oneshot(
                Request::post("/save")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(large_catalog(4, 64).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_json(response).await["error"].is_string());
        assert!(ctx.store.load().is_empty());
    }

    #[tokio::test]
    async fn save_reports_store_failures_as_500() {
        let ctx = TestContext::with_unwritable_store();
        let response = ctx.post_json("/save", json!([{"rating": "false"}])).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Failed to write data to file."})
        );
    }

    #[tokio::test]
    async fn import_reports_store_failures_in_the_flash() {
        let ctx = TestContext::with_unwritable_store();
        let response = ctx.upload("data.json", r#"[{"rating": "false"}]"#).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            flash_of(&response),
            Flash::danger("Import failed: Could not save data.")
        );
    }

    #[tokio::test]
    async fn import_without_a_file_part_is_flagged() {
        let ctx = TestContext::new();
        ctx.seed(json!([{"rating": "true"}]));

        let response = ctx.upload_field("attachment", "data.json", "[]").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(flash_of(&response), Flash::danger("No file part."));

        let response = ctx.post_json("/import", json!([])).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(flash_of(&response), Flash::danger("No file part."));

        assert_eq!(ctx.store.load().len(), 1);
    }

    #[tokio::test]
    async fn import_rejects_non_json_files() {
        let ctx = TestContext::new();
        ctx.seed(json!([{"rating": "true"}]));

        let response = ctx.upload("notes.txt", "[]").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(
            flash_of(&response),
            Flash::warning("Invalid file type (must be .json).")
        );
        assert_eq!(ctx.store.load().len(), 1);
    }

    #[tokio::test]
    async fn import_reports_bad_content() {
        let ctx = TestContext::new();
        ctx.seed(json!([{"rating": "true"}]));

        let response = ctx.upload("data.json", "   ").await;
        assert_eq!(flash_of(&response), Flash::danger("Import failed: File is empty."));

        let response = ctx.upload("data.json", "{\"a\": 1}").await;
        assert_eq!(flash_of(&response), Flash::danger("Import failed: JSON not a list."));

        let response = ctx.upload("data.json", "[1, 2]").await;
        assert_eq!(
            flash_of(&response),
            Flash::danger("Import failed: List items must be objects.")
        );

        let response = ctx.upload("data.json", "[{").await;
        let flash = flash_of(&response);
        assert!(flash.message.starts_with("Import error: Invalid JSON format - "));

        let response = ctx.upload("", "[]").await;
        assert_eq!(flash_of(&response), Flash::warning("No selected file."));

        assert_eq!(ctx.store.load()[0].rating, "true");
    }

    #[tokio::test]
    async fn import_replaces_the_catalog() {
        let ctx = TestContext::new();
        ctx.seed(json!([{"rating": "true"}]));

        let response = ctx
            .upload(
                "Export.JSON",
                r#"[{"id": 5, "social_link": "https://youtu.be/abc"}, {"id": 1}, {}]"#,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(flash_of(&response), Flash::success("Data (3 items) imported!"));

        let records = ctx.store.load();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, 0);
        assert_eq!(records[0].social_platform, "youtube");
        assert_eq!(records[0].rating, "");
    }

    #[tokio::test]
    async fn index_renders_records_and_consumes_the_flash() {
        let ctx = TestContext::new();
        ctx.seed(json!([{"politifact_headline": "Bridge claim"}]));

        let cookie = Flash::success("Data (1 items) imported!").to_set_cookie();
        let response = ctx
            .send(
                Request::get("/")
                    .header(header::COOKIE, cookie.split(';').next().unwrap())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SET_COOKIE], CLEAR_FLASH_COOKIE);
        let html = body_text(response).await;
        assert!(html.contains("flash-success"));
        assert!(html.contains("Bridge claim"));

        let response = ctx
            .send(Request::get("/").body(Body::empty()).unwrap())
            .await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn static_files_are_served_with_a_mime_type() {
        let ctx = TestContext::new();
        let response = ctx
            .send(Request::get("/static/style.css").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        assert_eq!(body_text(response).await, "body { margin: 0; }");

        let response = ctx
            .send(
                Request::get("/static/%2e%2e/secret.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404s() {
        let ctx = TestContext::new();
        let response = ctx
            .send(Request::get("/api/videos").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "endpoint not found"}));
    }
}
