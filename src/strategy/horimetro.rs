use super::{Candidate, CandidateSource, CandidateStrategy, StrategyContext, StrategyOutcome};
use crate::rows::{cluster_rows, Row};
use crate::token::PageExtent;
use crate::trace::StrategyDebug;

/// Row fallback for hour-meters.
///
/// Rows of large tokens compete on `avg_h * (1 + digits) * (1 + y_norm *
/// bonus) / compactness`, so larger, lower and tighter rows win. Rows spread
/// along a dial (RPM numerals, odometer scale) fail the scale-dial filter.
pub struct CompactRow;

impl CandidateStrategy for CompactRow {
    fn name(&self) -> &'static str {
        "compact-row"
    }

    fn generate<'a>(&self, ctx: &StrategyContext<'a>) -> StrategyOutcome<'a> {
        let cfg = ctx.config;
        let mut debug = StrategyDebug::new(self.name());
        debug.threshold("height_ratio", cfg.row_height_ratio);
        debug.threshold("min_digits", cfg.row_digits.min as f64);
        debug.threshold("max_digits", cfg.row_digits.max as f64);
        debug.threshold("vertical_bonus", cfg.row_vertical_bonus);
        if let Some(dial) = &cfg.scale_dial {
            debug.threshold("max_compactness", dial.max_compactness);
            debug.threshold("max_span_ratio", dial.max_span_ratio);
        }
        ctx.record_window(&mut debug);

        let big = ctx.big_tokens(cfg.row_height_ratio);
        let mut candidates = Vec::new();
        for row in cluster_rows(&big) {
            let digits = row.digits();
            let n = digits.len();
            if !cfg.row_digits.contains(n) {
                debug.reject(digits, format!("digit count {n}"));
                continue;
            }
            if let Some(reason) = scale_dial_violation(ctx, &row) {
                debug.reject(digits, reason);
                continue;
            }

            let y_norm = ctx.page.y_norm(row.cy);
            let geometry = row_score(&row, y_norm, cfg.row_vertical_bonus);
            let mut candidate = Candidate::from_group(row.items, CandidateSource::Row, geometry, ctx);
            ctx.maybe_attach(&mut candidate);
            candidates.push(candidate);
        }

        StrategyOutcome { candidates, debug }
    }
}

fn row_score(row: &Row<'_>, y_norm: f64, vertical_bonus: f64) -> f64 {
    row.avg_h * (1.0 + row.digit_count() as f64) * (1.0 + y_norm * vertical_bonus)
        / row.compactness()
}

fn span_ratio(row: &Row<'_>, page: &PageExtent) -> f64 {
    row.span_x() / page.width
}

/// Why `row` looks like dial numerals rather than a digital display.
///
/// The span ratio needs the real image width; with an inferred extent it
/// would only measure the tokens against themselves, so compactness decides
/// alone.
fn scale_dial_violation(ctx: &StrategyContext<'_>, row: &Row<'_>) -> Option<String> {
    let dial = ctx.config.scale_dial.as_ref()?;
    let compactness = row.compactness();
    if compactness > dial.max_compactness {
        return Some(format!(
            "compactness {compactness:.2} > {:.2}",
            dial.max_compactness
        ));
    }
    if !ctx.page.measured {
        return None;
    }
    let spread = span_ratio(row, &ctx.page);
    if spread > dial.max_span_ratio {
        return Some(format!("span ratio {spread:.2} > {:.2}", dial.max_span_ratio));
    }
    None
}
