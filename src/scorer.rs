use std::cmp::Ordering;

use crate::config::{ContinuityPolicy, GaugeKindConfig};
use crate::parser::{parse_digits, ParseError, ParsedValue};
use crate::strategy::Candidate;
use crate::trace::{RejectReason, ScoredAlternative, StrategyDebug, TOP_ALTERNATIVES};

#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub candidate: Candidate<'a>,
    pub parsed: ParsedValue,
    pub penalty: f64,
    pub score: f64,
}

/// Score deduction for a cumulative counter reading `value` when the last
/// known reading was `reference`.
///
/// Proportional to the distance, replaced by a flat penalty beyond the
/// implausible-jump threshold, plus a fixed penalty for going backward.
pub fn continuity_penalty(value: f64, reference: f64, policy: &ContinuityPolicy) -> f64 {
    let diff = (value - reference).abs();
    let mut penalty = if diff > policy.implausible_jump {
        policy.jump_penalty
    } else {
        diff * policy.per_unit
    };
    if value < reference {
        penalty += policy.backward;
    }
    penalty
}

/// Parse, score and order one strategy's candidates, best first.
///
/// `score = geometry / max_geometry - digit_weight * |digits - expected| -
/// continuity_penalty`. Candidates whose digits do not parse into a
/// plausible value are dropped and noted in `debug`. Equal scores go to the
/// higher candidate when the kind prefers upper rows, then to the taller
/// one, then to whichever was generated first.
///
/// Errors with the reason to report when nothing survives.
pub fn rank<'a>(
    candidates: Vec<Candidate<'a>>,
    config: &GaugeKindConfig,
    reference: Option<f64>,
    debug: &mut StrategyDebug,
) -> Result<Vec<ScoredCandidate<'a>>, RejectReason> {
    if candidates.is_empty() {
        return Err(RejectReason::StructuralReject);
    }

    let reference = reference.filter(|_| config.uses_reference);
    let mut failures: Vec<ParseError> = Vec::new();
    let mut parsed: Vec<(Candidate<'a>, ParsedValue)> = Vec::new();
    for candidate in candidates {
        match parse_digits(config, &candidate.digits_raw, candidate.separator_seen) {
            Ok(value) => parsed.push((candidate, value)),
            Err(e) => {
                debug.reject(candidate.digits_raw.clone(), e.to_string());
                failures.push(e);
            }
        }
    }
    if parsed.is_empty() {
        let reason = if failures.contains(&ParseError::OutOfRange) {
            RejectReason::RangeReject
        } else {
            RejectReason::NormalizationReject
        };
        return Err(reason);
    }

    let max_geometry = parsed.iter().map(|(c, _)| c.geometry).fold(0.0, f64::max);
    let mut scored: Vec<ScoredCandidate<'a>> = parsed
        .into_iter()
        .map(|(candidate, parsed)| {
            let relative = if max_geometry > 0.0 {
                candidate.geometry / max_geometry
            } else {
                0.0
            };
            let digit_gap = candidate.digit_count().abs_diff(config.expected_digits) as f64;
            let penalty = reference
                .map(|r| continuity_penalty(parsed.value, r, &config.continuity))
                .unwrap_or(0.0);
            let score = relative - config.digit_count_weight * digit_gap - penalty;
            ScoredCandidate {
                candidate,
                parsed,
                penalty,
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| compare(a, b, config.prefer_upper));

    debug.scored = scored
        .iter()
        .take(TOP_ALTERNATIVES)
        .map(|s| ScoredAlternative {
            digits: s.candidate.digits_raw.clone(),
            source: s.candidate.source,
            decimal_attached: s.candidate.decimal_attached,
            geometry: s.candidate.geometry,
            penalty: s.penalty,
            score: s.score,
            value: s.parsed.value,
        })
        .collect();

    Ok(scored)
}

fn compare(a: &ScoredCandidate<'_>, b: &ScoredCandidate<'_>, prefer_upper: bool) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| {
            if prefer_upper {
                a.candidate.cy.total_cmp(&b.candidate.cy)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| b.candidate.avg_h.total_cmp(&a.candidate.avg_h))
}
