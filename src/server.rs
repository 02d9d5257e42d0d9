//! HTTP surface: the submission form, its JSON twin, and file retrieval.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use crate::{
    audit::AuditLog,
    download::{DOWNLOAD_ROUTE, DownloadResult, Downloader},
    page::{self, PageContext},
    security::is_safe_file_name,
};

#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<Downloader>,
    pub audit: Arc<AuditLog>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    pub url: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "success": false,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(DOWNLOAD_ROUTE, post(submit_form))
        .route(&format!("{DOWNLOAD_ROUTE}/{{filename}}"), get(fetch_file))
        .route("/api/download", post(submit_json))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<String> {
    page::render(&PageContext::default())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn submit_form(
    State(state): State<AppState>,
    Form(form): Form<DownloadForm>,
) -> (StatusCode, Html<String>) {
    match run_download(&state, &form.url).await {
        Ok(result) => (
            StatusCode::OK,
            page::render(&PageContext::ready(&result.download_url, &result.filename)),
        ),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            page::render(&PageContext::failed(message)),
        ),
    }
}

async fn submit_json(
    State(state): State<AppState>,
    Json(form): Json<DownloadForm>,
) -> Response {
    match run_download(&state, &form.url).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(message) => ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        }
        .into_response(),
    }
}

async fn run_download(state: &AppState, url: &str) -> Result<DownloadResult, String> {
    state.audit.request("POST", url).await;
    state.downloader.handle(url).await.map_err(|err| {
        tracing::info!(url, error = %err, "download request failed");
        err.to_string()
    })
}

async fn fetch_file(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Response> {
    state.audit.request("GET", &filename).await;
    if !is_safe_file_name(&filename) {
        tracing::warn!(filename = %filename, "rejected unsafe file name");
        return Err(ApiError::not_found("File not found"));
    }

    let path = state.downloader.storage_dir().join(&filename);
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found("File not found"));
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    headers.insert(header::CONTENT_DISPOSITION, attachment_header(&filename)?);

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

/// `attachment` with an ASCII fallback name plus the exact name in RFC 5987
/// form for clients that understand it.
fn attachment_header(filename: &str) -> ApiResult<HeaderValue> {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).map_err(|err| ApiError::internal(err.to_string()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{
        audit::AuditStream,
        download::DownloadConfig,
        extractor::{YtDlp, stub},
        retention::RetentionScheduler,
    };
    use axum::body::to_bytes;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _root: TempDir,
        state: AppState,
    }

    fn fixture() -> Fixture {
        let root = tempdir().unwrap();
        let storage = root.path().join("videos");
        std::fs::create_dir(&storage).unwrap();
        let audit = Arc::new(AuditLog::new(root.path()));
        let downloader = Downloader::new(
            DownloadConfig::new(&storage),
            Arc::new(YtDlp::new(stub::install(root.path()))),
            RetentionScheduler::new(Duration::from_secs(120)),
            audit.clone(),
        );
        Fixture {
            _root: root,
            state: AppState {
                downloader: Arc::new(downloader),
                audit,
            },
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form(url: &str) -> Form<DownloadForm> {
        Form(DownloadForm { url: url.into() })
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let fx = fixture();
        let response = fetch_file(
            State(fx.state.clone()),
            AxumPath("doesnotexist.mp4".into()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("File not found"));
    }

    #[tokio::test]
    async fn traversal_attempts_are_not_found() {
        let fx = fixture();
        std::fs::write(fx.state.downloader.storage_dir().join("../raw.log"), "x").unwrap();
        for name in ["../raw.log", "..", "sub/../../raw.log"] {
            let response = fetch_file(State(fx.state.clone()), AxumPath(name.into()))
                .await
                .into_response();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{name}");
        }
    }

    #[tokio::test]
    async fn form_submission_downloads_and_serves_file() {
        let fx = fixture();
        let (status, Html(body)) =
            submit_form(State(fx.state.clone()), form("https://example.com/clip")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(">Stub Clip.mp4</a>"));

        let stored: Vec<_> = std::fs::read_dir(fx.state.downloader.storage_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(stored.len(), 1);
        let name = stored[0].clone();
        assert!(name.starts_with("Stub Clip ") && name.ends_with(".mp4"));

        let response = fetch_file(State(fx.state.clone()), AxumPath(name.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_owned();
        assert!(disposition.starts_with(&format!("attachment; filename=\"{name}\"")));
        assert_eq!(body_text(response).await, "media-bytes");

        let raw = std::fs::read_to_string(fx.state.audit.path(AuditStream::Raw)).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[tokio::test]
    async fn invalid_and_overlong_submissions_are_bad_requests() {
        let fx = fixture();
        let (status, Html(body)) =
            submit_form(State(fx.state.clone()), form("not a url")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Link is invalid"));

        let (status, Html(body)) =
            submit_form(State(fx.state.clone()), form("https://example.com/long")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("30 minute limit"));

        let (status, Html(body)) =
            submit_form(State(fx.state.clone()), form("https://example.com/broken")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Unsupported URL"));

        let leftovers = std::fs::read_dir(fx.state.downloader.storage_dir())
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn json_endpoint_reports_result() {
        let fx = fixture();
        let response = submit_json(
            State(fx.state.clone()),
            Json(DownloadForm {
                url: "https://example.com/clip".into(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["filename"], "Stub Clip.mp4");
        assert!(
            value["download_url"]
                .as_str()
                .unwrap()
                .starts_with("/download/Stub%20Clip%20")
        );
        assert!(value.get("stored_path").is_none());

        let response = submit_json(
            State(fx.state.clone()),
            Json(DownloadForm {
                url: "javascript:alert(1)".into(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Link is invalid");
    }

    #[test]
    fn attachment_header_keeps_non_ascii_names() {
        let value = attachment_header("Café \"live\".mp4").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"Caf_ _live_.mp4\"; filename*=UTF-8''Caf%C3%A9%20%22live%22.mp4"
        );
    }

    #[tokio::test]
    async fn index_and_health_respond() {
        let Html(body) = index().await;
        assert!(body.contains("<form"));
        assert_eq!(healthz().await, "ok");
    }

    #[test]
    fn router_builds() {
        let fx = fixture();
        let _ = router(fx.state.clone());
    }
}
