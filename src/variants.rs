//! Reference image pre-processor.
//!
//! Turns one source photo into an ordered list of named, PNG-encoded
//! variants for the orchestrator to try. Callers with their own
//! pre-processing can build [`ImageVariant`]s directly.

use std::io::Cursor;

use anyhow::Context;
use image::{codecs::png::PngEncoder, DynamicImage, GrayImage, ImageEncoder, ImageReader};
use imageproc::{contrast::equalize_histogram, filter::sharpen3x3};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::GaugeKind;
use crate::ocr::PageSize;

/// Mean luminance below which a display is treated as light-on-dark and inverted.
const DARK_BACKGROUND_MEAN: u64 = 140;

/// One pre-processed version of the source photo.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageVariant {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageVariant {
    /// Pixel size read from the encoded header; `None` if the bytes are not
    /// a recognised image.
    pub fn page_size(&self) -> Option<PageSize> {
        let (w, h) = ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()?;
        PageSize::new(w as f64, h as f64)
    }
}

/// A rectangle in relative coordinates (0.0 to 1.0 of width/height).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// How to derive one variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    pub crop: Option<RelativeRect>,
    #[serde(default)]
    pub sharpen: bool,
    /// Binarize at this luminance; `None` keeps the enhanced grayscale.
    pub threshold: Option<u8>,
}

impl VariantSpec {
    fn new(name: &str, crop: Option<RelativeRect>, sharpen: bool, threshold: Option<u8>) -> Self {
        Self {
            name: name.to_string(),
            crop,
            sharpen,
            threshold,
        }
    }
}

/// Default variant order per kind: whole photo, the display area, then a
/// tight binarized crop of the digits.
pub fn default_plan(kind: GaugeKind) -> Vec<VariantSpec> {
    let (main, tight) = match kind {
        GaugeKind::Horimetro => (
            RelativeRect::new(0.15, 0.25, 0.70, 0.50),
            RelativeRect::new(0.25, 0.35, 0.50, 0.30),
        ),
        GaugeKind::Abastecimento => (
            RelativeRect::new(0.10, 0.10, 0.80, 0.60),
            RelativeRect::new(0.20, 0.15, 0.60, 0.40),
        ),
        GaugeKind::Odometro => (
            RelativeRect::new(0.10, 0.30, 0.80, 0.60),
            RelativeRect::new(0.20, 0.45, 0.60, 0.35),
        ),
    };
    vec![
        VariantSpec::new("full-gray", None, false, None),
        VariantSpec::new("crop-main-gray", Some(main), true, None),
        VariantSpec::new("crop-tight-thresh", Some(tight), true, Some(128)),
    ]
}

/// Decode `source` and render every spec in `plan`, in order.
#[instrument(skip(source, plan), fields(bytes = source.len(), variants = plan.len()))]
pub fn build_variants(source: &[u8], plan: &[VariantSpec]) -> anyhow::Result<Vec<ImageVariant>> {
    let img = image::load_from_memory(source).context("cannot decode source image")?;
    plan.iter()
        .map(|spec| {
            let gray = render(&img, spec);
            let bytes = encode_png(&gray)
                .with_context(|| format!("cannot encode variant {}", spec.name))?;
            Ok(ImageVariant {
                name: spec.name.clone(),
                bytes,
            })
        })
        .collect()
}

/// Crop → grayscale → auto-invert dark backgrounds → histogram
/// equalisation → (optional sharpen) → (optional binary threshold).
fn render(img: &DynamicImage, spec: &VariantSpec) -> GrayImage {
    let mut gray = match spec.crop {
        Some(rect) => match crop_region(img, &rect) {
            Some(cropped) => cropped.to_luma8(),
            None => {
                warn!(variant = %spec.name, "crop is empty, using the full image");
                img.to_luma8()
            }
        },
        None => img.to_luma8(),
    };

    let mean: u64 = gray.pixels().map(|p| p[0] as u64).sum::<u64>()
        / (gray.width() as u64 * gray.height() as u64).max(1);
    if mean < DARK_BACKGROUND_MEAN {
        for p in gray.pixels_mut() {
            p[0] = 255 - p[0];
        }
    }

    gray = equalize_histogram(&gray);
    if spec.sharpen {
        gray = sharpen3x3(&gray);
    }
    if let Some(t) = spec.threshold {
        for p in gray.pixels_mut() {
            p[0] = if p[0] > t { 255 } else { 0 };
        }
    }
    gray
}

/// Convert `rect` to pixels, clamp to the image and crop. `None` when the
/// clamped area is empty.
fn crop_region(img: &DynamicImage, rect: &RelativeRect) -> Option<DynamicImage> {
    let (w, h) = (img.width(), img.height());
    let x0 = ((rect.x.max(0.0) * w as f32) as u32).min(w);
    let y0 = ((rect.y.max(0.0) * h as f32) as u32).min(h);
    let rw = ((rect.width.max(0.0) * w as f32) as u32).min(w - x0);
    let rh = ((rect.height.max(0.0) * h as f32) as u32).min(h - y0);
    if rw == 0 || rh == 0 {
        return None;
    }
    Some(img.crop_imm(x0, y0, rw, rh))
}

fn encode_png(gray: &GrayImage) -> anyhow::Result<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        gray.as_raw(),
        gray.width(),
        gray.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(png)
}
