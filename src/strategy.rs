pub mod abastecimento;
pub mod horimetro;
pub mod odometro;

use serde::Serialize;
use std::cmp::Ordering;

use crate::config::{GaugeKindConfig, StrategyKind};
use crate::decimal::{find_decimal, Anchor};
use crate::token::{PageExtent, Token};
use crate::trace::StrategyDebug;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    LongToken,
    Row,
    Token,
}

/// A provisional digit string assembled from one or more tokens.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub digits_raw: String,
    /// Tokens in reading order; an attached tenth comes last.
    pub used_tokens: Vec<&'a Token>,
    pub avg_h: f64,
    pub cy: f64,
    pub y_norm: f64,
    pub source: CandidateSource,
    pub decimal_attached: bool,
    /// A `.`/`,` was seen in a used token or anywhere in the OCR text.
    pub separator_seen: bool,
    /// Strategy-specific geometric merit; only compared within one strategy.
    pub geometry: f64,
}

impl<'a> Candidate<'a> {
    /// `tokens` must be non-empty and already in reading order.
    pub fn from_group(
        tokens: Vec<&'a Token>,
        source: CandidateSource,
        geometry: f64,
        ctx: &StrategyContext<'a>,
    ) -> Self {
        let n = tokens.len().max(1) as f64;
        let avg_h = tokens.iter().map(|t| t.h).sum::<f64>() / n;
        let cy = tokens.iter().map(|t| t.cy).sum::<f64>() / n;
        Self {
            digits_raw: tokens.iter().map(|t| t.digits.as_str()).collect(),
            separator_seen: ctx.text_separator || tokens.iter().any(|t| t.has_separator()),
            used_tokens: tokens,
            avg_h,
            cy,
            y_norm: ctx.page.y_norm(cy),
            source,
            decimal_attached: false,
            geometry,
        }
    }

    pub fn digit_count(&self) -> usize {
        self.digits_raw.len()
    }
}

/// Everything a strategy may look at for one OCR response.
pub struct StrategyContext<'a> {
    pub config: &'a GaugeKindConfig,
    /// Digit-bearing, letter-free tokens in input order.
    pub numeric: Vec<&'a Token>,
    /// `numeric` restricted to the kind's vertical band.
    pub banded: Vec<&'a Token>,
    pub page: PageExtent,
    /// Tallest glyph height among `banded`.
    pub max_height: f64,
    pub text_separator: bool,
}

impl<'a> StrategyContext<'a> {
    /// Context with the page extent inferred from `tokens`.
    pub fn new(config: &'a GaugeKindConfig, tokens: &'a [Token], full_text: &str) -> Self {
        Self::with_page(config, tokens, full_text, PageExtent::from_tokens(tokens))
    }

    pub fn with_page(
        config: &'a GaugeKindConfig,
        tokens: &'a [Token],
        full_text: &str,
        page: PageExtent,
    ) -> Self {
        let numeric: Vec<&Token> = tokens.iter().filter(|t| t.is_numeric()).collect();
        let banded: Vec<&Token> = numeric
            .iter()
            .copied()
            .filter(|t| config.vertical_band.contains(page.y_norm(t.cy)))
            .collect();
        let max_height = banded.iter().map(|t| t.h).fold(0.0, f64::max);
        Self {
            config,
            numeric,
            banded,
            page,
            max_height,
            text_separator: odometro::separator_in_text(full_text),
        }
    }

    /// Banded tokens at least `ratio` times as tall as the tallest one.
    pub fn big_tokens(&self, ratio: f64) -> Vec<&'a Token> {
        let min_h = self.max_height * ratio;
        self.banded.iter().copied().filter(|t| t.h >= min_h).collect()
    }

    /// Append a detached tenth when the candidate still looks like a bare
    /// integer group. Returns the gap to the attached digit.
    ///
    /// A group whose digit count is outside the integer range, or whose last
    /// token is a lone digit next to a longer one, already carries its tenth
    /// and is left alone.
    pub fn maybe_attach(&self, candidate: &mut Candidate<'a>) -> Option<f64> {
        let cfg = self.config;
        let integer_only = (cfg.min_digits..=cfg.max_digits).contains(&candidate.digit_count());
        let holds_tenth = candidate.used_tokens.len() > 1
            && candidate.used_tokens.last().is_some_and(|t| t.digit_len == 1);
        if !cfg.attach_decimal || cfg.fraction_digits == 0 || !integer_only || holds_tenth {
            return None;
        }
        let anchor = Anchor::from_tokens(&candidate.used_tokens)?;
        let found = find_decimal(
            &anchor,
            &candidate.used_tokens,
            &self.numeric,
            &cfg.decimal_window,
        )?;
        candidate.digits_raw.push_str(&found.token.digits);
        candidate.separator_seen |= found.token.has_separator();
        candidate.used_tokens.push(found.token);
        candidate.decimal_attached = true;
        Some(found.gap)
    }

    fn record_window(&self, debug: &mut StrategyDebug) {
        if self.config.attach_decimal {
            let w = &self.config.decimal_window;
            debug.threshold("decimal_vertical_ratio", w.vertical_ratio);
            debug.threshold("decimal_gap_ratio", w.gap_ratio);
        }
    }
}

pub struct StrategyOutcome<'a> {
    pub candidates: Vec<Candidate<'a>>,
    pub debug: StrategyDebug,
}

/// One way of turning tokens into candidates.
///
/// Kinds list their strategies in [`GaugeKindConfig::strategies`]; the
/// engine runs them in that order and stops at the first that yields a
/// plausible candidate.
pub trait CandidateStrategy {
    fn name(&self) -> &'static str;
    fn generate<'a>(&self, ctx: &StrategyContext<'a>) -> StrategyOutcome<'a>;
}

pub fn strategy_for(kind: StrategyKind) -> Box<dyn CandidateStrategy> {
    match kind {
        StrategyKind::LongToken => Box::new(LongToken),
        StrategyKind::CompactRow => Box::new(horimetro::CompactRow),
        StrategyKind::TallestRow => Box::new(abastecimento::TallestRow),
        StrategyKind::BandRow => Box::new(odometro::BandRow),
        StrategyKind::TokenAggregate => Box::new(TokenAggregate),
    }
}

// ── Shared strategies ────────────────────────────────────────────────────────

/// A single tall token already holding the whole integer group.
///
/// Only the tallest eligible token is proposed, the longest among equally
/// tall ones. Tokens tied on both stay in so the scorer can settle them by
/// continuity.
pub struct LongToken;

impl CandidateStrategy for LongToken {
    fn name(&self) -> &'static str {
        "long-token"
    }

    fn generate<'a>(&self, ctx: &StrategyContext<'a>) -> StrategyOutcome<'a> {
        let cfg = ctx.config;
        let min_h = ctx.max_height * cfg.big_token_height_ratio;

        let mut debug = StrategyDebug::new(self.name());
        debug.threshold("min_height", min_h);
        debug.threshold("min_digits", cfg.long_token_digits.min as f64);
        debug.threshold("max_digits", cfg.long_token_digits.max as f64);
        ctx.record_window(&mut debug);

        let mut eligible: Vec<&'a Token> = Vec::new();
        for &t in &ctx.banded {
            if !cfg.long_token_digits.contains(t.digit_len) {
                continue;
            }
            if t.h < min_h {
                debug.reject(t.digits.clone(), format!("height {:.1} < {:.1}", t.h, min_h));
                continue;
            }
            eligible.push(t);
        }

        let Some(best) = eligible.iter().copied().max_by(|a, b| tallest_then_longest(a, b)) else {
            return StrategyOutcome {
                candidates: Vec::new(),
                debug,
            };
        };

        let mut candidates = Vec::new();
        for t in eligible {
            if tallest_then_longest(t, best) != Ordering::Equal {
                debug.reject(
                    t.digits.clone(),
                    format!("outranked by {} (h {:.1})", best.digits, best.h),
                );
                continue;
            }
            let mut candidate = Candidate::from_group(vec![t], CandidateSource::LongToken, t.h, ctx);
            ctx.maybe_attach(&mut candidate);
            candidates.push(candidate);
        }

        StrategyOutcome { candidates, debug }
    }
}

fn tallest_then_longest(a: &Token, b: &Token) -> Ordering {
    a.h.total_cmp(&b.h).then(a.digit_len.cmp(&b.digit_len))
}

/// Every large banded token, concatenated left to right regardless of rows.
/// Recovers displays that a tilted photo splits across row clusters.
pub struct TokenAggregate;

impl CandidateStrategy for TokenAggregate {
    fn name(&self) -> &'static str {
        "token-aggregate"
    }

    fn generate<'a>(&self, ctx: &StrategyContext<'a>) -> StrategyOutcome<'a> {
        let cfg = ctx.config;
        let mut debug = StrategyDebug::new(self.name());
        debug.threshold("height_ratio", cfg.row_height_ratio);
        debug.threshold("min_digits", cfg.row_digits.min as f64);
        debug.threshold("max_digits", cfg.row_digits.max as f64);
        ctx.record_window(&mut debug);

        let mut big = ctx.big_tokens(cfg.row_height_ratio);
        if big.is_empty() {
            return StrategyOutcome {
                candidates: Vec::new(),
                debug,
            };
        }
        big.sort_by(|a, b| a.min_x.partial_cmp(&b.min_x).unwrap_or(Ordering::Equal));

        let digit_count: usize = big.iter().map(|t| t.digit_len).sum();
        if !cfg.row_digits.contains(digit_count) {
            let digits: String = big.iter().map(|t| t.digits.as_str()).collect();
            debug.reject(digits, format!("digit count {digit_count}"));
            return StrategyOutcome {
                candidates: Vec::new(),
                debug,
            };
        }

        let avg_h = big.iter().map(|t| t.h).sum::<f64>() / big.len() as f64;
        let mut candidate = Candidate::from_group(big, CandidateSource::Token, avg_h, ctx);
        ctx.maybe_attach(&mut candidate);
        StrategyOutcome {
            candidates: vec![candidate],
            debug,
        }
    }
}
