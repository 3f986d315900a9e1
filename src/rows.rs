use std::cmp::Ordering;

use crate::token::Token;

/// Smallest vertical distance two centers may differ by and still share a row.
pub const MIN_ROW_TOLERANCE: f64 = 12.0;
/// Fraction of the smaller glyph height added to the row tolerance.
pub const ROW_TOLERANCE_RATIO: f64 = 0.7;

/// Tokens judged to lie on one horizontal line, left to right.
///
/// `cy` and `avg_h` are running means over `items`.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    pub cy: f64,
    pub avg_h: f64,
    pub items: Vec<&'a Token>,
}

impl<'a> Row<'a> {
    fn start(token: &'a Token) -> Self {
        Self {
            cy: token.cy,
            avg_h: token.h,
            items: vec![token],
        }
    }

    fn push(&mut self, token: &'a Token) {
        let n = self.items.len() as f64;
        self.cy = (self.cy * n + token.cy) / (n + 1.0);
        self.avg_h = (self.avg_h * n + token.h) / (n + 1.0);
        self.items.push(token);
    }

    fn accepts(&self, token: &Token) -> bool {
        let tolerance = MIN_ROW_TOLERANCE.max(token.h.min(self.avg_h) * ROW_TOLERANCE_RATIO);
        (token.cy - self.cy).abs() <= tolerance
    }

    /// Concatenated digits in reading order.
    pub fn digits(&self) -> String {
        self.items.iter().map(|t| t.digits.as_str()).collect()
    }

    pub fn digit_count(&self) -> usize {
        self.items.iter().map(|t| t.digit_len).sum()
    }

    pub fn min_x(&self) -> f64 {
        self.items.iter().map(|t| t.min_x).fold(f64::INFINITY, f64::min)
    }

    pub fn max_x(&self) -> f64 {
        self.items.iter().map(|t| t.max_x).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Horizontal extent from the leftmost to the rightmost edge.
    pub fn span_x(&self) -> f64 {
        (self.max_x() - self.min_x()).max(1.0)
    }

    /// Span divided by the summed glyph widths.
    ///
    /// A tight digital display sits near 1; numerals spread along a dial
    /// scale grow far beyond that.
    pub fn compactness(&self) -> f64 {
        let widths: f64 = self.items.iter().map(|t| t.w).sum();
        self.span_x() / widths.max(1.0)
    }
}

/// Greedy top-to-bottom clustering by vertical center.
///
/// Tokens are visited in ascending `cy` (a stable sort, so equal centers keep
/// their input order) and join the first existing row within tolerance.
/// Every token lands in exactly one row.
pub fn cluster_rows<'a>(tokens: &[&'a Token]) -> Vec<Row<'a>> {
    let mut ordered: Vec<&'a Token> = tokens.to_vec();
    ordered.sort_by(|a, b| a.cy.partial_cmp(&b.cy).unwrap_or(Ordering::Equal));

    let mut rows: Vec<Row<'a>> = Vec::new();
    for token in ordered {
        match rows.iter_mut().find(|row| row.accepts(token)) {
            Some(row) => row.push(token),
            None => rows.push(Row::start(token)),
        }
    }

    for row in &mut rows {
        row.items
            .sort_by(|a, b| a.min_x.partial_cmp(&b.min_x).unwrap_or(Ordering::Equal));
    }
    rows
}
