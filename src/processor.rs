use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{GaugeConfigTable, GaugeKind, GaugeKindConfig};
use crate::engine::{extract_reading, Reading};
use crate::ocr::TextDetector;
use crate::token::Token;
use crate::trace::AttemptTrace;
use crate::variants::ImageVariant;

// ── Collaborators ────────────────────────────────────────────────────────────

/// Source of the last known hour-meter value for an asset.
pub trait ReferenceLookup {
    fn latest_hour_meter(&self, asset_id: &str) -> anyhow::Result<Option<f64>>;
}

/// Ask `lookup` for a continuity reference, but only for kinds that use one.
pub fn resolve_reference(
    config: &GaugeKindConfig,
    asset_id: &str,
    lookup: &dyn ReferenceLookup,
) -> anyhow::Result<Option<f64>> {
    if !config.uses_reference {
        return Ok(None);
    }
    lookup
        .latest_hour_meter(asset_id)
        .with_context(|| format!("reference lookup failed for asset {asset_id}"))
}

// ── Request / response ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReadingRequest {
    pub kind: GaugeKind,
    /// Pre-processed variants of one photo, in the order to try them.
    pub image_variants: Vec<ImageVariant>,
    pub reference_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub value: Option<f64>,
    pub best_input_label: String,
    pub used_tokens: Vec<Token>,
    pub variant_name: Option<String>,
    /// One entry per attempted variant, in attempt order.
    pub trace: Vec<AttemptTrace>,
}

// ── Orchestration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "variant")]
pub enum OrchestratorState {
    Pending,
    Attempting(usize),
    Succeeded,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The first reading with a value, else the last attempted one.
    /// `None` only when there were no variants to try.
    pub reading: Option<Reading>,
    pub attempts: Vec<AttemptTrace>,
}

impl Outcome {
    pub fn into_response(self) -> ReadingResponse {
        match self.reading {
            Some(reading) => ReadingResponse {
                value: reading.value,
                best_input_label: reading.best_input_label,
                used_tokens: reading.used_tokens,
                variant_name: Some(reading.variant_name),
                trace: self.attempts,
            },
            None => ReadingResponse {
                value: None,
                best_input_label: String::new(),
                used_tokens: Vec::new(),
                variant_name: None,
                trace: self.attempts,
            },
        }
    }
}

/// Drives the pipeline across image variants, strictly one after another.
///
/// OCR is called once per variant; the first variant with a value ends the
/// run so no further (billed) OCR calls are made. A variant is never
/// attempted twice.
pub struct VariantOrchestrator<'c> {
    config: &'c GaugeKindConfig,
    reference: Option<f64>,
    state: OrchestratorState,
}

impl<'c> VariantOrchestrator<'c> {
    pub fn new(config: &'c GaugeKindConfig, reference: Option<f64>) -> Self {
        Self {
            config,
            reference,
            state: OrchestratorState::Pending,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// An `Err` is an OCR failure and aborts the run; a reading without a
    /// value is a normal outcome.
    #[instrument(skip_all, fields(kind = %self.config.kind, variants = variants.len()))]
    pub fn run(
        &mut self,
        detector: &mut dyn TextDetector,
        variants: &[ImageVariant],
    ) -> anyhow::Result<Outcome> {
        let mut attempts: Vec<AttemptTrace> = Vec::new();
        let mut last: Option<Reading> = None;

        for (i, variant) in variants.iter().enumerate() {
            self.state = OrchestratorState::Attempting(i);
            let mut response = detector.detect(&variant.bytes).with_context(|| {
                format!("OCR via {} failed on variant {}", detector.name(), variant.name)
            })?;
            if response.page.is_none() {
                response.page = variant.page_size();
                if response.page.is_none() {
                    debug!(variant = %variant.name, "image size unknown, inferring page from tokens");
                }
            }

            let reading = extract_reading(self.config, &response, self.reference, &variant.name);
            attempts.push(reading.debug_trace.clone());

            if reading.is_success() {
                info!(
                    variant = %variant.name,
                    label = %reading.best_input_label,
                    attempt = i,
                    "gauge read"
                );
                self.state = OrchestratorState::Succeeded;
                return Ok(Outcome {
                    reading: Some(reading),
                    attempts,
                });
            }

            debug!(
                variant = %variant.name,
                reason = ?reading.debug_trace.reject,
                "variant produced no reading"
            );
            last = Some(reading);
        }

        warn!(attempts = attempts.len(), "all variants exhausted without a reading");
        self.state = OrchestratorState::Exhausted;
        Ok(Outcome {
            reading: last,
            attempts,
        })
    }
}

/// Read one gauge photo from its pre-processed variants.
///
/// `Ok` with `value: None` means the photo was looked at and nothing
/// plausible was found; `Err` means OCR could not be performed.
pub fn read_gauge(
    table: &GaugeConfigTable,
    request: &ReadingRequest,
    detector: &mut dyn TextDetector,
) -> anyhow::Result<ReadingResponse> {
    let config = table.get(request.kind);
    let mut orchestrator = VariantOrchestrator::new(config, request.reference_value);
    let outcome = orchestrator.run(detector, &request.image_variants)?;
    Ok(outcome.into_response())
}
