//! HTTP handlers

use crate::error::ApiError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use base64::{engine::general_purpose, Engine as _};
use receipt_pipeline::fields::extract_fields;
use receipt_pipeline::ocr::encode_png;
use receipt_pipeline::preprocess::preprocess_image_with;
use receipt_pipeline::types::parse_method_option;
use receipt_pipeline::{
    Engine, PipelineConfig, PipelineError, PreparedScan, PreprocessMethod, ReceiptFields,
    ScanResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn list_methods() -> Json<Vec<MethodInfo>> {
    Json(
        PreprocessMethod::ALL
            .iter()
            .map(|m| MethodInfo {
                name: m.name(),
                label: m.label(),
            })
            .collect(),
    )
}

pub async fn create_scan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanParams>,
    body: Bytes,
) -> Result<Json<ScanResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body must be an image".to_string()));
    }

    let method = resolve_method(params.method.as_deref(), &state.pipeline)?;
    let engine: Engine = match params.engine.as_deref() {
        Some(name) => name.parse()?,
        None => Engine::default(),
    };
    let recognizer = state.recognizer(engine)?;

    let config = state.pipeline.clone();
    let filename = params.filename.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        PreparedScan::prepare(&body, filename, method, &config)
    })
    .await??;

    let preprocessed_png = if params.include_image.unwrap_or(false) {
        Some(general_purpose::STANDARD.encode(prepared.png_bytes()?))
    } else {
        None
    };

    tracing::debug!(id = %prepared.id, engine = %recognizer.engine(), "recognizing");
    let recognized = recognizer.recognize(&prepared).await?;
    Ok(Json(ScanResponse {
        result: prepared.complete(recognized),
        preprocessed_png,
    }))
}

pub async fn preprocess(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreprocessParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body must be an image".to_string()));
    }

    let method = match params.method.as_deref() {
        Some(name) => name.parse()?,
        None => state.pipeline.preprocess.default_method,
    };
    let config = state.pipeline.preprocess.clone();
    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let decoded = image::load_from_memory(&body).map_err(PipelineError::from)?;
        let processed = preprocess_image_with(&decoded, method, &config)?;
        Ok(encode_png(&processed)?)
    })
    .await??;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

pub async fn fields(body: String) -> Json<ReceiptFields> {
    Json(extract_fields(&body))
}

fn resolve_method(
    name: Option<&str>,
    pipeline: &PipelineConfig,
) -> Result<Option<PreprocessMethod>, ApiError> {
    match name {
        Some(name) => Ok(parse_method_option(name)?),
        None => Ok(Some(pipeline.preprocess.default_method)),
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    /// Preprocessing method name, or `none`
    pub method: Option<String>,
    /// `local` or `cloud`
    pub engine: Option<String>,
    pub filename: Option<String>,
    /// Return the preprocessed image alongside the text
    pub include_image: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PreprocessParams {
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MethodInfo {
    pub name: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    #[serde(flatten)]
    pub result: ScanResult,
    /// Base64-encoded PNG of the image that was recognised
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocessed_png: Option<String>,
}
