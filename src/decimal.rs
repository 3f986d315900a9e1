use std::cmp::Ordering;

use crate::config::DecimalWindow;
use crate::token::Token;

/// Geometry of the main digit group a detached tenth must line up with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub max_x: f64,
    pub cy: f64,
    pub h: f64,
}

impl Anchor {
    /// Right edge, box center and mean glyph height of `group`.
    pub fn from_tokens(group: &[&Token]) -> Option<Self> {
        if group.is_empty() {
            return None;
        }
        let max_x = group.iter().map(|t| t.max_x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = group.iter().map(|t| t.min_y).fold(f64::INFINITY, f64::min);
        let max_y = group.iter().map(|t| t.max_y).fold(f64::NEG_INFINITY, f64::max);
        let h = group.iter().map(|t| t.h).sum::<f64>() / group.len() as f64;
        Some(Self {
            max_x,
            cy: (min_y + max_y) / 2.0,
            h,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecimalMatch<'a> {
    pub token: &'a Token,
    pub gap: f64,
}

/// Find an isolated single digit just right of `anchor`.
///
/// A match is numeric, exactly one digit long, not part of `group`,
/// vertically within the window's tolerance, and starts at or after the
/// anchor's right edge no further than the window's maximum gap. The closest
/// match wins; equal gaps keep the earlier token.
pub fn find_decimal<'a>(
    anchor: &Anchor,
    group: &[&Token],
    tokens: &[&'a Token],
    window: &DecimalWindow,
) -> Option<DecimalMatch<'a>> {
    let v_tol = window.vertical_tolerance(anchor.h);
    let max_gap = window.max_gap(anchor.h);

    tokens
        .iter()
        .copied()
        .filter(|t| t.is_numeric() && t.digit_len == 1)
        .filter(|t| !group.iter().any(|g| std::ptr::eq(*g, *t)))
        .filter(|t| (t.cy - anchor.cy).abs() <= v_tol)
        .filter_map(|t| {
            let gap = t.min_x - anchor.max_x;
            (gap >= 0.0 && gap <= max_gap).then_some(DecimalMatch { token: t, gap })
        })
        .min_by(|a, b| a.gap.partial_cmp(&b.gap).unwrap_or(Ordering::Equal))
}
