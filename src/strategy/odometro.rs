use super::{Candidate, CandidateSource, CandidateStrategy, StrategyContext, StrategyOutcome};
use crate::rows::cluster_rows;
use crate::trace::StrategyDebug;

/// Whether the OCR text anywhere contains a decimal separator.
///
/// Odometers print a separated tenth drum on many clusters; when one is
/// seen the parser drops the trailing digit.
pub fn separator_in_text(full_text: &str) -> bool {
    full_text.contains(['.', ','])
}

/// Rows inside the band, weighted by glyph height and length.
pub struct BandRow;

impl CandidateStrategy for BandRow {
    fn name(&self) -> &'static str {
        "band-row"
    }

    fn generate<'a>(&self, ctx: &StrategyContext<'a>) -> StrategyOutcome<'a> {
        let cfg = ctx.config;
        let mut debug = StrategyDebug::new(self.name());
        debug.threshold("height_ratio", cfg.row_height_ratio);
        debug.threshold("band_min", cfg.vertical_band.min);
        debug.threshold("min_digits", cfg.row_digits.min as f64);
        debug.threshold("max_digits", cfg.row_digits.max as f64);

        let big = ctx.big_tokens(cfg.row_height_ratio);
        let mut candidates = Vec::new();
        for row in cluster_rows(&big) {
            let digits = row.digits();
            let n = digits.len();
            if !cfg.row_digits.contains(n) {
                debug.reject(digits, format!("digit count {n}"));
                continue;
            }
            let geometry = row.avg_h * (1.0 + n as f64);
            candidates.push(Candidate::from_group(row.items, CandidateSource::Row, geometry, ctx));
        }

        StrategyOutcome { candidates, debug }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaugeKindConfig;
    use crate::strategy::tests::{digits_of, tok};

    #[test]
    fn detects_separators() {
        assert!(separator_in_text("012345,6"));
        assert!(separator_in_text("km 12.3"));
        assert!(!separator_in_text("012345 km"));
    }

    #[test]
    fn band_skips_scale_numerals_at_the_top() {
        let cfg = GaugeKindConfig::odometro();
        let tokens = vec![
            tok("20406080", 100.0, 10.0, 400.0, 60.0),
            tok("012", 200.0, 400.0, 90.0, 45.0),
            tok("345", 292.0, 400.0, 90.0, 45.0),
        ];
        let ctx = StrategyContext::new(&cfg, &tokens, "20406080 012 345");
        let out = BandRow.generate(&ctx);
        assert_eq!(digits_of(&out), vec!["012345"]);
        assert!(!out.candidates[0].separator_seen);
    }
}
