//! Read hour-meter, fuel-dispenser and odometer values from OCR word boxes.
//!
//! The pipeline is: word boxes → [`token`]s → [`rows`] → per-kind
//! [`strategy`] candidates (with [`decimal`] attachment) → [`scorer`] →
//! [`parser`]. [`processor`] runs it over a photo's [`variants`] and stops at
//! the first reading.

pub mod config;
pub mod decimal;
pub mod engine;
pub mod ocr;
pub mod parser;
pub mod processor;
pub mod rows;
pub mod scorer;
pub mod strategy;
pub mod token;
pub mod trace;
pub mod variants;

pub use config::{load_config, save_config, GaugeConfigTable, GaugeKind, GaugeKindConfig};
pub use engine::{extract_reading, Reading};
pub use ocr::{OcrResponse, OcrWord, PageSize, TextDetector, Vertex};
pub use processor::{
    read_gauge, resolve_reference, OrchestratorState, ReadingRequest, ReadingResponse,
    ReferenceLookup, VariantOrchestrator,
};
pub use token::Token;
pub use trace::{AttemptTrace, RejectReason};
pub use variants::{build_variants, default_plan, ImageVariant};
