use super::{Candidate, CandidateSource, CandidateStrategy, StrategyContext, StrategyOutcome};
use crate::rows::cluster_rows;
use crate::trace::StrategyDebug;

/// Fuel pumps show the sale volume in the tallest digits; the totalizer
/// below it is smaller and already cut by the vertical band. Each row of
/// large banded tokens is a candidate whose merit is its mean glyph height.
/// Equal heights are settled by the scorer in favour of the higher row.
pub struct TallestRow;

impl CandidateStrategy for TallestRow {
    fn name(&self) -> &'static str {
        "tallest-row"
    }

    fn generate<'a>(&self, ctx: &StrategyContext<'a>) -> StrategyOutcome<'a> {
        let cfg = ctx.config;
        let mut debug = StrategyDebug::new(self.name());
        debug.threshold("height_ratio", cfg.row_height_ratio);
        debug.threshold("band_max", cfg.vertical_band.max);
        debug.threshold("min_digits", cfg.row_digits.min as f64);
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
            let geometry = row.avg_h;
            let mut candidate = Candidate::from_group(row.items, CandidateSource::Row, geometry, ctx);
            ctx.maybe_attach(&mut candidate);
            candidates.push(candidate);
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
    fn band_excludes_totalizer_near_the_bottom() {
        let cfg = GaugeKindConfig::abastecimento();
        let tokens = vec![
            tok("452", 100.0, 100.0, 120.0, 50.0),
            tok("1", 230.0, 100.0, 40.0, 50.0),
            tok("0098213", 100.0, 900.0, 200.0, 60.0),
        ];
        let ctx = StrategyContext::new(&cfg, &tokens, "");
        let out = TallestRow.generate(&ctx);
        // The single "1" shares the row with "452", so no attachment is needed.
        assert_eq!(digits_of(&out), vec!["4521"]);
        assert!(!out.candidates[0].decimal_attached);
    }

    #[test]
    fn attaches_a_smaller_tenth_left_out_of_the_row() {
        let cfg = GaugeKindConfig::abastecimento();
        let tokens = vec![
            tok("452", 100.0, 100.0, 120.0, 60.0),
            tok("1", 228.0, 125.0, 20.0, 30.0),
            tok("0", 0.0, 500.0, 10.0, 10.0),
        ];
        let ctx = StrategyContext::new(&cfg, &tokens, "");
        let out = TallestRow.generate(&ctx);
        assert_eq!(digits_of(&out), vec!["4521"]);
        assert!(out.candidates[0].decimal_attached);
    }

    #[test]
    fn short_rows_are_rejected() {
        let cfg = GaugeKindConfig::abastecimento();
        let tokens = vec![tok("45", 100.0, 100.0, 80.0, 50.0), tok("0", 0.0, 500.0, 10.0, 10.0)];
        let ctx = StrategyContext::new(&cfg, &tokens, "");
        let out = TallestRow.generate(&ctx);
        assert!(out.candidates.is_empty());
        assert_eq!(out.debug.rejected[0].reason, "digit count 2");
    }
}
