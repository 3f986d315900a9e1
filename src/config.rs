use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// The three supported gauge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GaugeKind {
    /// Cumulative engine hour-meter: 4–6 integer digits plus one tenth.
    Horimetro,
    /// Volume of a single fueling in liters: 3 integer digits plus one tenth.
    Abastecimento,
    /// Cumulative distance, integer only.
    Odometro,
}

impl GaugeKind {
    pub const ALL: [GaugeKind; 3] = [
        GaugeKind::Horimetro,
        GaugeKind::Abastecimento,
        GaugeKind::Odometro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GaugeKind::Horimetro => "horimetro",
            GaugeKind::Abastecimento => "abastecimento",
            GaugeKind::Odometro => "odometro",
        }
    }
}

impl fmt::Display for GaugeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GaugeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horimetro" => Ok(GaugeKind::Horimetro),
            "abastecimento" => Ok(GaugeKind::Abastecimento),
            "odometro" => Ok(GaugeKind::Odometro),
            other => bail!("unknown gauge kind {other:?}"),
        }
    }
}

/// Candidate generation strategies, evaluated in the order a kind lists them.
/// The first one that yields a plausible candidate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// One tall token that already holds the whole digit group.
    LongToken,
    /// Rows of large tokens, rejecting spread-out dial scales (hour-meter).
    CompactRow,
    /// The row with the tallest glyphs inside the vertical band (fuel).
    TallestRow,
    /// Rows inside the vertical band, weighted by height and length (odometer).
    BandRow,
    /// All large tokens in the band, concatenated left to right.
    TokenAggregate,
}

/// Inclusive digit-count range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitRange {
    pub min: usize,
    pub max: usize,
}

impl DigitRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

/// Accepted normalized vertical positions (`0` = top of the photo).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalBand {
    pub min: f64,
    pub max: f64,
}

impl VerticalBand {
    pub const FULL: VerticalBand = VerticalBand { min: 0.0, max: 1.0 };

    pub fn contains(&self, y_norm: f64) -> bool {
        y_norm >= self.min && y_norm <= self.max
    }
}

/// Rejects rows that look like numerals printed along a dial (RPM, temperature).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleDialFilter {
    /// Largest accepted `span / sum(widths)`.
    pub max_compactness: f64,
    /// Largest accepted `span / page width`.
    pub max_span_ratio: f64,
}

/// Search window for a fractional digit OCR'd as its own token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimalWindow {
    pub min_vertical_tolerance: f64,
    /// Vertical tolerance as a multiple of the anchor height.
    pub vertical_ratio: f64,
    pub min_gap: f64,
    /// Largest horizontal gap as a multiple of the anchor height.
    pub gap_ratio: f64,
}

impl DecimalWindow {
    pub fn vertical_tolerance(&self, anchor_h: f64) -> f64 {
        self.min_vertical_tolerance.max(anchor_h * self.vertical_ratio)
    }

    pub fn max_gap(&self, anchor_h: f64) -> f64 {
        self.min_gap.max(anchor_h * self.gap_ratio)
    }
}

/// Penalties for a cumulative counter drifting from its last known value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuityPolicy {
    /// Score lost per unit of absolute difference.
    pub per_unit: f64,
    /// Extra penalty when the candidate is below the reference.
    pub backward: f64,
    /// Differences above this are implausible jumps.
    pub implausible_jump: f64,
    /// Flat penalty for an implausible jump (replaces the proportional one).
    pub jump_penalty: f64,
}

/// Every threshold the extraction engine uses for one gauge kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeKindConfig {
    pub kind: GaugeKind,
    /// Integer digits a display shows.
    pub min_digits: usize,
    pub max_digits: usize,
    pub fraction_digits: usize,
    /// Digit count the scorer favours.
    pub expected_digits: usize,
    pub plausible_min: f64,
    pub plausible_max: f64,
    pub vertical_band: VerticalBand,
    /// Digit counts a single long token may have.
    pub long_token_digits: DigitRange,
    /// Digit counts an aggregated row or token group may have.
    pub row_digits: DigitRange,
    /// Long-token bigness, relative to the tallest digit token.
    pub big_token_height_ratio: f64,
    /// Row-aggregation bigness, relative to the tallest digit token.
    pub row_height_ratio: f64,
    pub scale_dial: Option<ScaleDialFilter>,
    /// Weight of `y_norm` in the compact-row score (lower rows preferred).
    pub row_vertical_bonus: f64,
    /// Break score ties toward the higher candidate.
    pub prefer_upper: bool,
    pub digit_count_weight: f64,
    pub attach_decimal: bool,
    pub decimal_window: DecimalWindow,
    pub uses_reference: bool,
    pub continuity: ContinuityPolicy,
    pub strategies: Vec<StrategyKind>,
}

const DEFAULT_DECIMAL_WINDOW: DecimalWindow = DecimalWindow {
    min_vertical_tolerance: 10.0,
    vertical_ratio: 0.8,
    min_gap: 60.0,
    gap_ratio: 3.0,
};

const DEFAULT_CONTINUITY: ContinuityPolicy = ContinuityPolicy {
    per_unit: 0.001,
    backward: 0.25,
    implausible_jump: 2_000.0,
    jump_penalty: 10.0,
};

impl GaugeKindConfig {
    pub fn for_kind(kind: GaugeKind) -> Self {
        match kind {
            GaugeKind::Horimetro => Self::horimetro(),
            GaugeKind::Abastecimento => Self::abastecimento(),
            GaugeKind::Odometro => Self::odometro(),
        }
    }

    pub fn horimetro() -> Self {
        Self {
            kind: GaugeKind::Horimetro,
            min_digits: 4,
            max_digits: 6,
            fraction_digits: 1,
            expected_digits: 5,
            plausible_min: 0.0,
            plausible_max: 1_000_000.0,
            vertical_band: VerticalBand::FULL,
            long_token_digits: DigitRange::new(4, 6),
            row_digits: DigitRange::new(4, 7),
            big_token_height_ratio: 0.70,
            row_height_ratio: 0.68,
            scale_dial: Some(ScaleDialFilter {
                max_compactness: 3.4,
                max_span_ratio: 0.62,
            }),
            row_vertical_bonus: 0.35,
            prefer_upper: false,
            digit_count_weight: 0.05,
            attach_decimal: true,
            decimal_window: DEFAULT_DECIMAL_WINDOW,
            uses_reference: true,
            continuity: DEFAULT_CONTINUITY,
            strategies: vec![StrategyKind::LongToken, StrategyKind::CompactRow],
        }
    }

    pub fn abastecimento() -> Self {
        Self {
            kind: GaugeKind::Abastecimento,
            min_digits: 3,
            max_digits: 3,
            fraction_digits: 1,
            expected_digits: 4,
            plausible_min: 0.0,
            plausible_max: 1_200.0,
            // The pump totalizer sits below the sale readout.
            vertical_band: VerticalBand { min: 0.0, max: 0.80 },
            long_token_digits: DigitRange::new(3, 8),
            row_digits: DigitRange::new(3, 8),
            big_token_height_ratio: 0.70,
            row_height_ratio: 0.70,
            scale_dial: None,
            row_vertical_bonus: 0.0,
            prefer_upper: true,
            digit_count_weight: 0.05,
            attach_decimal: true,
            decimal_window: DEFAULT_DECIMAL_WINDOW,
            uses_reference: false,
            continuity: DEFAULT_CONTINUITY,
            strategies: vec![StrategyKind::TallestRow, StrategyKind::TokenAggregate],
        }
    }

    pub fn odometro() -> Self {
        Self {
            kind: GaugeKind::Odometro,
            min_digits: 4,
            max_digits: 8,
            fraction_digits: 0,
            expected_digits: 6,
            plausible_min: 0.0,
            plausible_max: 99_999_999.0,
            // Scale numerals crowd the top of the cluster.
            vertical_band: VerticalBand { min: 0.25, max: 1.0 },
            // Short clusters still show four drums; the band keeps scale
            // numerals out.
            long_token_digits: DigitRange::new(4, 9),
            row_digits: DigitRange::new(4, 9),
            big_token_height_ratio: 0.70,
            row_height_ratio: 0.66,
            scale_dial: None,
            row_vertical_bonus: 0.0,
            prefer_upper: false,
            digit_count_weight: 0.05,
            attach_decimal: false,
            decimal_window: DEFAULT_DECIMAL_WINDOW,
            uses_reference: false,
            continuity: DEFAULT_CONTINUITY,
            strategies: vec![
                StrategyKind::LongToken,
                StrategyKind::BandRow,
                StrategyKind::TokenAggregate,
            ],
        }
    }

    /// Total digits of a complete reading (integer plus fraction).
    pub fn full_digits(&self) -> usize {
        self.max_digits + self.fraction_digits
    }
}

/// The per-kind configuration table, defined once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfigTable {
    pub horimetro: GaugeKindConfig,
    pub abastecimento: GaugeKindConfig,
    pub odometro: GaugeKindConfig,
}

impl Default for GaugeConfigTable {
    fn default() -> Self {
        Self {
            horimetro: GaugeKindConfig::horimetro(),
            abastecimento: GaugeKindConfig::abastecimento(),
            odometro: GaugeKindConfig::odometro(),
        }
    }
}

impl GaugeConfigTable {
    pub fn get(&self, kind: GaugeKind) -> &GaugeKindConfig {
        match kind {
            GaugeKind::Horimetro => &self.horimetro,
            GaugeKind::Abastecimento => &self.abastecimento,
            GaugeKind::Odometro => &self.odometro,
        }
    }

    /// Apply a partial JSON document on top of the defaults.
    ///
    /// Only the keys present in `overrides` change; nested objects merge
    /// key by key, everything else is replaced.
    pub fn with_overrides(overrides: Value) -> anyhow::Result<Self> {
        let mut base = serde_json::to_value(Self::default())?;
        merge_json(&mut base, overrides);
        let table: Self =
            serde_json::from_value(base).context("invalid gauge configuration override")?;
        for kind in GaugeKind::ALL {
            if table.get(kind).kind != kind {
                bail!("section {kind} declares kind {}", table.get(kind).kind);
            }
        }
        Ok(table)
    }
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Read threshold overrides from a JSON file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<GaugeConfigTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let overrides: Value = serde_json::from_str(&text)
        .with_context(|| format!("parse error in {}", path.display()))?;
    GaugeConfigTable::with_overrides(overrides)
}

pub fn save_config(path: impl AsRef<Path>, table: &GaugeConfigTable) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("cannot create config directory")?;
    }
    let text = serde_json::to_string_pretty(table)?;
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
}
