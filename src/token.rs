use serde::Serialize;

use crate::ocr::{OcrWord, PageSize};

/// Geometric view of one OCR word.
///
/// Built once per OCR response and never mutated afterwards. `digits` holds
/// every ASCII digit of `text` in order; width and height are floored at 1 so
/// ratios computed downstream never divide by zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub text: String,
    pub digits: String,
    pub digit_len: usize,
    pub has_alpha: bool,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub w: f64,
    pub h: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Token {
    /// Returns `None` for blank text or a word without any vertex.
    pub fn from_word(word: &OcrWord) -> Option<Self> {
        let text = word.text.trim();
        if text.is_empty() || word.vertices.is_empty() {
            return None;
        }

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in &word.vertices {
            min_x = min_x.min(v.x);
            max_x = max_x.max(v.x);
            min_y = min_y.min(v.y);
            max_y = max_y.max(v.y);
        }

        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        Some(Self {
            text: text.to_string(),
            digit_len: digits.len(),
            digits,
            has_alpha: text.chars().any(char::is_alphabetic),
            min_x,
            max_x,
            min_y,
            max_y,
            w: (max_x - min_x).max(1.0),
            h: (max_y - min_y).max(1.0),
            cx: (min_x + max_x) / 2.0,
            cy: (min_y + max_y) / 2.0,
        })
    }

    /// Digit-bearing and free of letters: the only tokens any stage reads digits from.
    pub fn is_numeric(&self) -> bool {
        self.digit_len > 0 && !self.has_alpha
    }

    /// Whether the raw text carries a `.` or `,` decimal separator.
    pub fn has_separator(&self) -> bool {
        self.text.contains(['.', ','])
    }
}

/// Build tokens for every usable word, preserving input order.
pub fn build_tokens(words: &[OcrWord]) -> Vec<Token> {
    words.iter().filter_map(Token::from_word).collect()
}

/// Extent of the photographed page that `yNorm` and span ratios are
/// measured against.
///
/// `measured` is set when the size came from the image itself. Otherwise it
/// is inferred from the tokens, assuming the content sits centred in the
/// frame with equal margins on both sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageExtent {
    pub width: f64,
    pub height: f64,
    pub measured: bool,
}

impl PageExtent {
    pub fn resolve(page: Option<PageSize>, tokens: &[Token]) -> Self {
        match page {
            Some(size) => Self::from(size),
            None => Self::from_tokens(tokens),
        }
    }

    pub fn from_tokens(tokens: &[Token]) -> Self {
        if tokens.is_empty() {
            return Self {
                width: 1.0,
                height: 1.0,
                measured: false,
            };
        }
        let min_x = tokens.iter().map(|t| t.min_x).fold(f64::INFINITY, f64::min);
        let max_x = tokens.iter().map(|t| t.max_x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = tokens.iter().map(|t| t.min_y).fold(f64::INFINITY, f64::min);
        let max_y = tokens.iter().map(|t| t.max_y).fold(f64::NEG_INFINITY, f64::max);
        Self {
            width: (max_x + min_x.max(0.0)).max(1.0),
            height: (max_y + min_y.max(0.0)).max(1.0),
            measured: false,
        }
    }

    /// Vertical position in `[0, 1]`, 0 at the top.
    pub fn y_norm(&self, cy: f64) -> f64 {
        (cy / self.height).clamp(0.0, 1.0)
    }
}

impl From<PageSize> for PageExtent {
    fn from(size: PageSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
            measured: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Vertex;

    #[test]
    fn builds_box_and_digits() {
        let word = OcrWord::from_rect("03,64h", 10.0, 20.0, 100.0, 40.0);
        let t = Token::from_word(&word).unwrap();
        assert_eq!(t.digits, "0364");
        assert_eq!(t.digit_len, 4);
        assert!(t.has_alpha);
        assert!(!t.is_numeric());
        assert!(t.has_separator());
        assert_eq!((t.min_x, t.max_x, t.min_y, t.max_y), (10.0, 110.0, 20.0, 60.0));
        assert_eq!((t.cx, t.cy), (60.0, 40.0));
    }

    #[test]
    fn degenerate_box_is_floored() {
        let word = OcrWord {
            text: "7".into(),
            vertices: vec![Vertex::new(5.0, 5.0)],
        };
        let t = Token::from_word(&word).unwrap();
        assert_eq!(t.w, 1.0);
        assert_eq!(t.h, 1.0);
    }

    #[test]
    fn blank_or_vertexless_words_are_dropped() {
        let words = vec![
            OcrWord::from_rect("  ", 0.0, 0.0, 10.0, 10.0),
            OcrWord {
                text: "123".into(),
                vertices: vec![],
            },
            OcrWord::from_rect("km", 0.0, 0.0, 10.0, 10.0),
        ];
        let tokens = build_tokens(&words);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].digit_len, 0);
        assert!(!tokens[0].is_numeric());
    }

    #[test]
    fn missing_axes_default_to_zero() {
        let word: OcrWord =
            serde_json::from_str(r#"{"text":"42","vertices":[{"x":10},{"x":30,"y":5},{"y":25},{}]}"#)
                .unwrap();
        let t = Token::from_word(&word).unwrap();
        assert_eq!((t.min_x, t.max_x, t.min_y, t.max_y), (0.0, 30.0, 0.0, 25.0));
    }

    #[test]
    fn inferred_extent_centres_the_content() {
        let tokens = build_tokens(&[OcrWord::from_rect("452", 100.0, 300.0, 120.0, 50.0)]);
        let page = PageExtent::from_tokens(&tokens);
        assert!(!page.measured);
        assert_eq!((page.width, page.height), (320.0, 650.0));
        assert!((page.y_norm(tokens[0].cy) - 0.5).abs() < 1e-9);
        assert_eq!(page.y_norm(1000.0), 1.0);
    }

    #[test]
    fn measured_size_wins_over_tokens() {
        let tokens = build_tokens(&[OcrWord::from_rect("1", 0.0, 150.0, 50.0, 50.0)]);
        let page = PageExtent::resolve(PageSize::new(400.0, 1000.0), &tokens);
        assert!(page.measured);
        assert_eq!(page.width, 400.0);
        assert!((page.y_norm(175.0) - 0.175).abs() < 1e-9);

        let fallback = PageExtent::resolve(None, &tokens);
        assert_eq!(fallback, PageExtent::from_tokens(&tokens));
        assert_eq!(PageExtent::from_tokens(&[]).height, 1.0);
    }
}
