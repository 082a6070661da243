//! HTTP request handlers

use super::AppState;
use axum::{
    body::Body,
    extract::{rejection::FormRejection, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path as FsPath};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use bilimusic_core::extractor::MediaExtractor;
use bilimusic_core::{is_supported_video_url, AudioFormat, ExtractionRequest};

const NOT_FOUND_MESSAGE: &str = "File not found or already cleaned up";
const MISSING_URL_MESSAGE: &str = "Please enter a video link";

#[derive(Debug, Deserialize)]
pub struct ExtractForm {
    #[serde(default)]
    url: String,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    download_url: String,
}

#[derive(Debug, Serialize)]
pub struct EnvStatus {
    ffmpeg: bool,
    yt_dlp: bool,
}

/// `{"error": ...}` with a status code
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

/// GET / - form page
pub async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// GET /api/check-env
pub async fn check_env(State(state): State<AppState>) -> Json<EnvStatus> {
    let ffmpeg = state.workflow.locator().locate().await.is_some();
    let yt_dlp = state.workflow.extractor().version().await.is_some();
    Json(EnvStatus { ffmpeg, yt_dlp })
}

/// POST /extract - run one extraction into the download directory
pub async fn extract(
    State(state): State<AppState>,
    form: Result<Form<ExtractForm>, FormRejection>,
) -> Result<Json<ExtractResponse>, ApiError> {
    // A body that is not a form carries no link either
    let form = form
        .map(|Form(form)| form)
        .map_err(|rejection| {
            debug!("Unreadable extract form: {}", rejection);
            ApiError(StatusCode::BAD_REQUEST, MISSING_URL_MESSAGE.into())
        })?;
    let url = form.url.trim();
    if url.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, MISSING_URL_MESSAGE.into()));
    }
    if !is_supported_video_url(url) {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "Please enter a valid Bilibili video link".into(),
        ));
    }

    let format = AudioFormat::parse_or_default(form.format.as_deref().unwrap_or_default());
    let request = ExtractionRequest::new(url, state.download_dir.clone())
        .with_format(format)
        .with_quality(0);

    let outcome = match state.extract_timeout {
        Some(limit) => match tokio::time::timeout(limit, state.workflow.extract_audio(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Extraction of {} timed out after {:?}", url, limit);
                return Err(ApiError(
                    StatusCode::GATEWAY_TIMEOUT,
                    format!("Extraction timed out after {:?}", limit),
                ));
            }
        },
        None => state.workflow.extract_audio(&request).await,
    };

    let result = outcome.map_err(|e| {
        if e.is_user_error() {
            ApiError(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            error!("Extraction failed for {}: {}", url, e);
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("Extraction failed: {e}"))
        }
    })?;

    let name = result
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Ready for download: {}", name);

    Ok(Json(ExtractResponse {
        download_url: format!("/download/{}", urlencoding::encode(&name)),
    }))
}

/// GET /download/*filename - send an extracted file as an attachment
pub async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let not_found = || (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response();

    // Plain names only: no roots, no `..`
    let relative = FsPath::new(&filename);
    if filename.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        warn!("Rejected download path: {}", filename);
        return not_found();
    }

    let Ok(path) = tokio::fs::canonicalize(state.download_dir.join(relative)).await else {
        return not_found();
    };
    if !path.starts_with(&state.download_dir) {
        warn!("Rejected download outside {}: {}", state.download_dir.display(), path.display());
        return not_found();
    }
    let length = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return not_found(),
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!("Cannot open {}: {}", path.display(), e);
            return not_found();
        }
    };

    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let disposition = format!("attachment; filename*=UTF-8''{}", urlencoding::encode(&name));

    (
        [
            (header::CONTENT_TYPE, content_type(relative).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

fn content_type(path: &FsPath) -> &'static str {
    let is_mp3 = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(AudioFormat::Mp3.extension()));
    if is_mp3 {
        AudioFormat::Mp3.mime_type()
    } else {
        AudioFormat::M4a.mime_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{router, AppState};
    use async_trait::async_trait;
    use axum::http::Request;
    use bilimusic_core::config::LocatorConfig;
    use bilimusic_core::extractor::{ExtractorOptions, PostProcessor, RequestedDownload, VideoInfo};
    use bilimusic_core::{BinaryLocator, ExtractionError, Workflow};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Writes `Song [BV1xy411c7mD].<ext>` next to the output template
    struct FakeExtractor {
        fail: bool,
        delay: Option<Duration>,
        seen: Mutex<Vec<ExtractorOptions>>,
    }

    #[async_trait]
    impl MediaExtractor for FakeExtractor {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn extract(
            &self,
            _url: &str,
            options: &ExtractorOptions,
        ) -> Result<Option<VideoInfo>, ExtractionError> {
            self.seen.lock().unwrap().push(options.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ExtractionError::Extractor("Video unavailable".into()));
            }
            let PostProcessor::ExtractAudio { codec, .. } =
                options.postprocessors[0];
            let dir = options.output_template.parent().unwrap();
            let path = dir.join(format!("Song [BV1xy411c7mD].{}", codec.extension()));
            std::fs::write(&path, b"audio").unwrap();
            Ok(Some(VideoInfo {
                id: Some("BV1xy411c7mD".into()),
                title: Some("Song".into()),
                filepath: None,
                requested_downloads: Some(vec![RequestedDownload { filepath: Some(path) }]),
            }))
        }

        async fn version(&self) -> Option<String> {
            Some("2024.01.01".into())
        }
    }

    struct Harness {
        _dir: TempDir,
        download_dir: PathBuf,
        extractor: Arc<FakeExtractor>,
        app: axum::Router,
    }

    fn harness(fail: bool) -> Harness {
        harness_with(fail, None, None)
    }

    fn harness_with(fail: bool, delay: Option<Duration>, extract_timeout: Option<Duration>) -> Harness {
        let dir = TempDir::new().unwrap();
        let download_dir = dir.path().canonicalize().unwrap();
        let extractor = Arc::new(FakeExtractor {
            fail,
            delay,
            seen: Mutex::new(Vec::new()),
        });
        let locator = BinaryLocator::ffmpeg(&LocatorConfig {
            override_vars: Vec::new(),
            probe_timeout_ms: 200,
        })
        .with_env(Arc::new(|_: &str| None))
        .with_exe_dir(None)
        .with_providers(Vec::new());
        let state = AppState {
            workflow: Arc::new(Workflow::new(locator, extractor.clone())),
            download_dir: download_dir.clone(),
            extract_timeout,
        };
        Harness {
            _dir: dir,
            download_dir,
            extractor,
            app: router(state),
        }
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::post("/extract")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_url() {
        let h = harness(false);
        let response = h.app.oneshot(form_request("url=++&format=mp3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Please enter a video link");
        assert!(h.extractor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_without_form_body_is_json_400() {
        let h = harness(false);
        // no Content-Type, so the body cannot be read as a form
        let request = Request::post("/extract")
            .body(Body::from("url=x"))
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Please enter a video link");
        assert!(h.extractor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out_with_504() {
        let h = harness_with(
            false,
            Some(Duration::from_secs(5)),
            Some(Duration::from_millis(100)),
        );
        let response = h
            .app
            .oneshot(form_request(
                "url=https%3A%2F%2Fwww.bilibili.com%2Fvideo%2FBV1xy411c7mD",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            json_body(response).await["error"],
            "Extraction timed out after 100ms"
        );
    }

    #[tokio::test]
    async fn test_extract_rejects_other_sites() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(form_request("url=https%3A%2F%2Fexample.com%2Fvideo%2FBV1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Please enter a valid Bilibili video link"
        );
        assert!(h.extractor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_then_download() {
        let h = harness(false);
        let response = h
            .app
            .clone()
            .oneshot(form_request(
                "url=https%3A%2F%2Fwww.bilibili.com%2Fvideo%2FBV1xy411c7mD&format=m4a",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let download_url = json_body(response).await["download_url"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(download_url, "/download/Song%20%5BBV1xy411c7mD%5D.m4a");

        {
            let seen = h.extractor.seen.lock().unwrap();
            assert_eq!(seen[0].output_template.parent().unwrap(), h.download_dir);
        }

        let response = h
            .app
            .oneshot(Request::get(&download_url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename*=UTF-8''Song%20%5BBV1xy411c7mD%5D.m4a"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"audio");
    }

    #[tokio::test]
    async fn test_unknown_format_falls_back_to_mp3() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(form_request(
                "url=https%3A%2F%2Fwww.bilibili.com%2Fvideo%2FBV1xy411c7mD&format=flac",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["download_url"]
            .as_str()
            .unwrap()
            .ends_with(".mp3"));
        let seen = h.extractor.seen.lock().unwrap();
        assert!(matches!(
            seen[0].postprocessors[0],
            PostProcessor::ExtractAudio {
                codec: AudioFormat::Mp3,
                quality: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_is_500() {
        let h = harness(true);
        let response = h
            .app
            .oneshot(form_request(
                "url=https%3A%2F%2Fwww.bilibili.com%2Fvideo%2FBV1xy411c7mD",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Extraction failed:"));
        assert!(error.contains("Video unavailable"));
    }

    #[tokio::test]
    async fn test_download_serves_mp3_type() {
        let h = harness(false);
        std::fs::write(h.download_dir.join("a.MP3"), b"x").unwrap();
        let response = h
            .app
            .oneshot(Request::get("/download/a.MP3").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    }

    #[tokio::test]
    async fn test_download_streams_large_file_in_full() {
        let h = harness(false);
        // several read chunks' worth
        let audio: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(h.download_dir.join("long.m4a"), &audio).unwrap();
        let response = h
            .app
            .oneshot(Request::get("/download/long.m4a").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "200000");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), audio.len());
        assert_eq!(&bytes[..], &audio[..]);
    }

    #[tokio::test]
    async fn test_download_rejects_traversal_and_missing() {
        let h = harness(false);
        std::fs::create_dir(h.download_dir.join("sub")).unwrap();

        for uri in [
            "/download/..%2Fsecret.mp3",
            "/download/%2Fetc%2Fpasswd",
            "/download/missing.mp3",
            "/download/sub",
        ] {
            let response = h
                .app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_check_env() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(Request::get("/api/check-env").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["ffmpeg"], false);
        assert_eq!(body["yt_dlp"], true);
    }

    #[tokio::test]
    async fn test_index_page() {
        let h = harness(false);
        let response = h
            .app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("/extract"));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(FsPath::new("x.mp3")), "audio/mpeg");
        assert_eq!(content_type(FsPath::new("x.aac")), "audio/mp4");
        assert_eq!(content_type(FsPath::new("noext")), "audio/mp4");
    }
}
