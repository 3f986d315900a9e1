//! Plain-data diagnostics returned next to every reading.
//!
//! Nothing in here feeds back into a decision; it exists so callers can show
//! what was considered when a photo could not be read.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::strategy::CandidateSource;

/// Why an attempt produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The OCR response held no digit-bearing token.
    #[error("no digit tokens")]
    NoDigitTokens,
    /// Geometric filters removed every candidate.
    #[error("no candidate survived the geometric filters")]
    StructuralReject,
    /// The chosen digits could not be coerced to the kind's length.
    #[error("digits could not be normalized")]
    NormalizationReject,
    /// The parsed value fell outside the plausibility bounds.
    #[error("value outside plausibility bounds")]
    RangeReject,
}

/// A candidate dropped before or during scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedCandidate {
    pub digits: String,
    pub reason: String,
}

/// A candidate that reached the scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAlternative {
    pub digits: String,
    pub source: CandidateSource,
    pub decimal_attached: bool,
    pub geometry: f64,
    pub penalty: f64,
    pub score: f64,
    pub value: f64,
}

/// What one strategy saw and decided.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDebug {
    pub method: String,
    pub thresholds: BTreeMap<String, f64>,
    pub rejected: Vec<RejectedCandidate>,
    /// Best first, at most [`TOP_ALTERNATIVES`] entries.
    pub scored: Vec<ScoredAlternative>,
}

/// How many scored alternatives a strategy keeps in its trace.
pub const TOP_ALTERNATIVES: usize = 5;

impl StrategyDebug {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            ..Self::default()
        }
    }

    pub fn threshold(&mut self, name: &str, value: f64) {
        self.thresholds.insert(name.to_string(), value);
    }

    pub fn reject(&mut self, digits: impl Into<String>, reason: impl Into<String>) {
        self.rejected.push(RejectedCandidate {
            digits: digits.into(),
            reason: reason.into(),
        });
    }
}

/// Diagnostics for one image variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptTrace {
    pub variant_name: String,
    pub full_text: String,
    pub token_count: usize,
    pub digit_token_count: usize,
    pub strategies: Vec<StrategyDebug>,
    /// Method of the strategy that produced the value, if any.
    pub chosen_method: Option<String>,
    pub reject: Option<RejectReason>,
    pub note: Option<String>,
}

impl AttemptTrace {
    pub fn rejected(&mut self, reason: RejectReason) {
        self.reject = Some(reason);
        self.note = Some(reason.to_string());
    }
}
