//! Tax computation (GST).
//!
//! Pure, deterministic functions that turn priced lines into jurisdictional
//! tax breakdowns and document totals. No IO, no persistence, no knowledge of
//! document status.

pub mod breakdown;
pub mod config;
pub mod engine;
pub mod jurisdiction;
pub mod line;
pub mod money;
pub mod rate;
pub mod words;

pub use breakdown::{compute_document_totals, compute_line_amounts, recompute_all_lines, TaxBreakdown};
pub use config::{ConfigError, TaxConfig};
pub use engine::TaxEngine;
pub use jurisdiction::{determine_jurisdiction_mode, JurisdictionCode, JurisdictionMode, STATE_CODES};
pub use line::{next_sequence, LineDraft, LineItem, LinePricing, ProductDefaults};
pub use money::round_currency;
pub use rate::TaxRate;
pub use words::amount_to_words;
