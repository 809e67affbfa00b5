//! receiptscan REST API
//!
//! A stateless HTTP front for the receipt pipeline: post an image, get
//! recognised text and extracted fields back. Nothing is persisted.

pub mod config;
pub mod engines;
pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use cloud_bridge::{RekognitionClient, RekognitionConfig};
use receipt_pipeline::{Engine, PipelineConfig, TesseractEngine};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub use config::{Profile, ServerConfig};
use engines::{Recognizer, RekognitionRecognizer, TesseractRecognizer};
use error::ApiError;

/// Shared, read-only state for all handlers
pub struct AppState {
    pub pipeline: PipelineConfig,
    pub local: Arc<dyn Recognizer>,
    pub cloud: Option<Arc<dyn Recognizer>>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn recognizer(&self, engine: Engine) -> Result<Arc<dyn Recognizer>, ApiError> {
        match engine {
            Engine::Local => Ok(self.local.clone()),
            Engine::Cloud => self.cloud.clone().ok_or_else(|| {
                ApiError::Unavailable("cloud recognition is not configured".to_string())
            }),
        }
    }
}

/// Build the router
pub fn app(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/methods", get(routes::list_methods))
        .route("/api/scans", post(routes::create_scan))
        .route("/api/preprocess", post(routes::preprocess))
        .route("/api/fields", post(routes::fields))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Install the global subscriber; `RUST_LOG` wins over `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Load engines and serve until ctrl-c
pub async fn run(config: ServerConfig) -> Result<()> {
    let pipeline = match &config.pipeline_config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading pipeline config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let local: Arc<dyn Recognizer> = Arc::new(TesseractRecognizer::new(TesseractEngine::new(
        pipeline.ocr.clone(),
    )));

    let cloud: Option<Arc<dyn Recognizer>> = if config.enable_cloud {
        let rekognition = RekognitionConfig::from_env().with_pipeline(&pipeline.cloud);
        let client = RekognitionClient::new(rekognition).await;
        tracing::info!("cloud recognition enabled");
        Some(Arc::new(RekognitionRecognizer::new(client)))
    } else {
        None
    };

    let state = AppState {
        pipeline,
        local,
        cloud,
        max_body_bytes: config.max_body_bytes,
    };

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    tracing::info!(profile = %config.profile, "Server listening on {}", config.addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::{engine::general_purpose, Engine as _};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use receipt_pipeline::{PreparedScan, RecognizedText};
    use serde_json::Value;
    use std::io::Cursor;
    use tower::ServiceExt;

    const RECEIPT_TEXT: &str =
        "CORNER DELI\n1200 Market Street\nTel (415) 555-0199\nthanks@cornerdeli.com";

    struct FakeRecognizer(Engine);

    #[async_trait]
    impl Recognizer for FakeRecognizer {
        fn engine(&self) -> Engine {
            self.0
        }

        async fn recognize(&self, _prepared: &PreparedScan) -> anyhow::Result<RecognizedText> {
            Ok(RecognizedText::from_text(
                self.0,
                RECEIPT_TEXT.to_string(),
                Some(91.5),
            ))
        }
    }

    fn test_app(cloud: bool) -> Router {
        test_app_with_limit(cloud, 1024 * 1024)
    }

    fn test_app_with_limit(cloud: bool, max_body_bytes: usize) -> Router {
        let cloud: Option<Arc<dyn Recognizer>> = if cloud {
            Some(Arc::new(FakeRecognizer(Engine::Cloud)))
        } else {
            None
        };
        app(AppState {
            pipeline: PipelineConfig::default(),
            local: Arc::new(FakeRecognizer(Engine::Local)),
            cloud,
            max_body_bytes,
        })
    }

    fn receipt_png() -> Vec<u8> {
        let img = ImageBuffer::from_fn(80, 120, |x, y| {
            if (10..70).contains(&x) && y % 12 < 3 {
                Rgb([20u8, 20u8, 20u8])
            } else {
                Rgb([245u8, 245u8, 240u8])
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn blank_png() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(60, 80, Rgb([120u8, 120u8, 120u8]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app(false)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_list_methods() {
        let response = test_app(false)
            .oneshot(Request::get("/api/methods").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let methods = body.as_array().unwrap();
        assert_eq!(methods.len(), 6);
        assert!(methods.iter().any(|m| m["name"] == "edge_detection"));
    }

    #[tokio::test]
    async fn test_scan_returns_text_and_fields() {
        let response = test_app(false)
            .oneshot(post(
                "/api/scans?method=threshold&filename=deli.png",
                receipt_png(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["filename"], "deli.png");
        assert_eq!(body["method"], "threshold");
        assert_eq!(body["recognized"]["engine"], "local");
        assert_eq!(body["recognized"]["lines"].as_array().unwrap().len(), 4);
        assert_eq!(body["fields"]["phone"], "(415) 555-0199");
        assert_eq!(body["fields"]["email"], "thanks@cornerdeli.com");
        assert_eq!(body["content_hash"].as_str().unwrap().len(), 64);
        assert!(body.get("preprocessed_png").is_none());
    }

    #[tokio::test]
    async fn test_scan_without_preprocessing() {
        let response = test_app(false)
            .oneshot(post("/api/scans?method=none", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["method"].is_null());
    }

    #[tokio::test]
    async fn test_scan_can_include_image() {
        let response = test_app(false)
            .oneshot(post("/api/scans?include_image=true", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let png = general_purpose::STANDARD
            .decode(body["preprocessed_png"].as_str().unwrap())
            .unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[tokio::test]
    async fn test_cloud_engine_when_configured() {
        let response = test_app(true)
            .oneshot(post("/api/scans?engine=cloud", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["recognized"]["engine"], "cloud");
    }

    #[tokio::test]
    async fn test_cloud_engine_unavailable() {
        let response = test_app(false)
            .oneshot(post("/api/scans?engine=cloud", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("cloud"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_bad_request() {
        let response = test_app(false)
            .oneshot(post("/api/scans?method=sharpen", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_engine_is_bad_request() {
        let response = test_app(false)
            .oneshot(post("/api/scans?engine=abbyy", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_bad_request() {
        let response = test_app(false)
            .oneshot(post("/api/scans", "definitely not a png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_without_receipt_outline_is_bad_request() {
        let response = test_app(false)
            .oneshot(post("/api/scans?method=edge_detection", blank_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("contours"));
    }

    #[tokio::test]
    async fn test_preprocess_without_receipt_outline_is_bad_request() {
        let response = test_app(false)
            .oneshot(post("/api/preprocess?method=edge_detection", blank_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("contours"));
    }

    #[tokio::test]
    async fn test_empty_body_is_bad_request() {
        let response = test_app(false)
            .oneshot(post("/api/scans", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let response = test_app_with_limit(false, 64)
            .oneshot(post("/api/scans", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_preprocess_returns_png() {
        let response = test_app(false)
            .oneshot(post("/api/preprocess?method=median_blur", receipt_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 120));
    }

    #[tokio::test]
    async fn test_fields_from_text() {
        let response = test_app(false)
            .oneshot(post("/api/fields", RECEIPT_TEXT))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["phone"], "(415) 555-0199");
        assert_eq!(body["email"], "thanks@cornerdeli.com");
    }
}
