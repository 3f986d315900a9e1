pub mod token_cache;
pub mod vision;

use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

/// One polygon corner as reported by the OCR provider.
///
/// Providers omit an axis when it is zero, so both default to `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single word-level annotation: raw text plus its (usually 4-point) polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

impl OcrWord {
    /// Axis-aligned word box given as `(x, y, width, height)`.
    pub fn from_rect(text: &str, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            text: text.to_string(),
            vertices: vec![
                Vertex::new(x, y),
                Vertex::new(x + w, y),
                Vertex::new(x + w, y + h),
                Vertex::new(x, y + h),
            ],
        }
    }
}

/// Pixel size of the image the OCR provider looked at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// `None` unless both sides are positive.
    pub fn new(width: f64, height: f64) -> Option<Self> {
        (width > 0.0 && height > 0.0).then_some(Self { width, height })
    }
}

/// Everything one OCR call returns for one image variant.
///
/// `words` carries no semantic grouping and no guaranteed order. `page` is
/// filled by providers that report the image size; the orchestrator fills it
/// from the variant bytes otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub words: Vec<OcrWord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageSize>,
}

impl OcrResponse {
    pub fn new(full_text: impl Into<String>, words: Vec<OcrWord>) -> Self {
        Self {
            full_text: full_text.into(),
            words,
            page: None,
        }
    }

    pub fn with_page(mut self, width: f64, height: f64) -> Self {
        self.page = PageSize::new(width, height);
        self
    }
}

/// Every OCR backend implements this.
///
/// One call per image variant. An `Err` is an external failure ("could not
/// look at all") and is propagated to the caller untouched; it is never
/// retried against the same bytes.
pub trait TextDetector {
    fn name(&self) -> &str;
    fn detect(&mut self, image: &[u8]) -> anyhow::Result<OcrResponse>;
}
