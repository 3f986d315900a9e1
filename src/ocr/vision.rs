//! Wire format of a Vision-style `images:annotate` text detection call.
//!
//! Only the payloads live here; sending them (and authenticating, see
//! [`super::token_cache`]) is up to the caller's HTTP client.

use anyhow::{anyhow, bail, Context};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{OcrResponse, OcrWord, PageSize, Vertex};

pub const FEATURE_TEXT_DETECTION: &str = "TEXT_DETECTION";

#[derive(Debug, Deserialize)]
struct AnnotateBatch {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Request body for one image, content base64-encoded inline.
pub fn annotate_request(image: &[u8]) -> Value {
    let content = base64::engine::general_purpose::STANDARD.encode(image);
    json!({
        "requests": [{
            "image": { "content": content },
            "features": [{ "type": FEATURE_TEXT_DETECTION }]
        }]
    })
}

/// Parse the body of a single-image annotate response.
///
/// The first text annotation is the whole detected text; the rest are
/// words. The first page of `fullTextAnnotation` gives the image size.
/// A provider-reported error is returned as `Err`.
pub fn parse_annotate_response(body: &str) -> anyhow::Result<OcrResponse> {
    let batch: AnnotateBatch =
        serde_json::from_str(body).context("malformed annotate response")?;
    let response = batch
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("annotate response holds no result"))?;

    if let Some(status) = response.error {
        bail!("OCR provider error {}: {}", status.code, status.message);
    }

    let mut annotations = response.text_annotations.into_iter();
    let summary = annotations.next();
    let words: Vec<OcrWord> = annotations
        .map(|a| OcrWord {
            text: a.description,
            vertices: a.bounding_poly.map(|p| p.vertices).unwrap_or_default(),
        })
        .collect();

    let page = response
        .full_text_annotation
        .as_ref()
        .and_then(|full| full.pages.first())
        .and_then(|p| PageSize::new(p.width, p.height));

    let full_text = match (response.full_text_annotation, summary) {
        (Some(full), _) if !full.text.is_empty() => full.text,
        (_, Some(summary)) => summary.description,
        _ => String::new(),
    };

    Ok(OcrResponse {
        full_text,
        words,
        page,
    })
}
