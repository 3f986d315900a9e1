use serde::Serialize;

use crate::config::{GaugeKind, GaugeKindConfig};
use crate::ocr::OcrResponse;
use crate::scorer::rank;
use crate::strategy::{strategy_for, StrategyContext};
use crate::token::{build_tokens, PageExtent, Token};
use crate::trace::{AttemptTrace, RejectReason};

/// Outcome of one variant attempt.
///
/// `value` is `None` when the photo was looked at but nothing plausible was
/// found; `debug_trace.reject` then says why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub value: Option<f64>,
    /// `"364,7"` style for tenths kinds, a bare integer for odometers; empty without a value.
    pub best_input_label: String,
    pub used_tokens: Vec<Token>,
    pub kind: GaugeKind,
    pub variant_name: String,
    pub debug_trace: AttemptTrace,
}

impl Reading {
    fn empty(kind: GaugeKind, trace: AttemptTrace) -> Self {
        Self {
            value: None,
            best_input_label: String::new(),
            used_tokens: Vec::new(),
            kind,
            variant_name: trace.variant_name.clone(),
            debug_trace: trace,
        }
    }

    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// Run the full token → reading pipeline on one OCR response.
///
/// Strategies run in the kind's configured order; the first whose ranked
/// candidates are non-empty decides the reading. `reference` is only
/// consulted by kinds that track a cumulative counter.
pub fn extract_reading(
    config: &GaugeKindConfig,
    response: &OcrResponse,
    reference: Option<f64>,
    variant_name: &str,
) -> Reading {
    let tokens = build_tokens(&response.words);
    let mut trace = AttemptTrace {
        variant_name: variant_name.to_string(),
        full_text: response.full_text.clone(),
        token_count: tokens.len(),
        ..AttemptTrace::default()
    };

    let page = PageExtent::resolve(response.page, &tokens);
    let ctx = StrategyContext::with_page(config, &tokens, &response.full_text, page);
    trace.digit_token_count = ctx.numeric.len();
    if ctx.numeric.is_empty() {
        trace.rejected(RejectReason::NoDigitTokens);
        return Reading::empty(config.kind, trace);
    }

    let mut last_reason = RejectReason::StructuralReject;
    for &kind in &config.strategies {
        let strategy = strategy_for(kind);
        let outcome = strategy.generate(&ctx);
        let mut debug = outcome.debug;
        let ranked = rank(outcome.candidates, config, reference, &mut debug);
        trace.strategies.push(debug);

        match ranked {
            Ok(ranked) => {
                if let Some(best) = ranked.into_iter().next() {
                    trace.chosen_method = Some(strategy.name().to_string());
                    return Reading {
                        value: Some(best.parsed.value),
                        best_input_label: best.parsed.label(),
                        used_tokens: best.candidate.used_tokens.into_iter().cloned().collect(),
                        kind: config.kind,
                        variant_name: variant_name.to_string(),
                        debug_trace: trace,
                    };
                }
            }
            Err(reason) => last_reason = worst(last_reason, reason),
        }
    }

    trace.rejected(last_reason);
    Reading::empty(config.kind, trace)
}

/// Keep the reason that got furthest through the pipeline.
fn worst(current: RejectReason, next: RejectReason) -> RejectReason {
    fn depth(r: RejectReason) -> u8 {
        match r {
            RejectReason::NoDigitTokens => 0,
            RejectReason::StructuralReject => 1,
            RejectReason::NormalizationReject => 2,
            RejectReason::RangeReject => 3,
        }
    }
    if depth(next) > depth(current) {
        next
    } else {
        current
    }
}
