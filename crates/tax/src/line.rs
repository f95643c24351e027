//! Document lines and their pricing inputs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesdesk_core::{Entity, LineId, ValueObject};

use crate::breakdown::TaxBreakdown;
use crate::rate::TaxRate;

/// Sequence numbers step by ten so lines can be inserted between neighbours.
pub const SEQUENCE_STEP: u32 = 10;

/// Pricing inputs of a line: everything the tax computation reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub quantity: Decimal,
    /// Price per unit, in currency units with minor-unit precision.
    pub unit_price: Decimal,
    /// 0-100.
    pub discount_percent: Decimal,
    pub tax_rate: TaxRate,
}

impl ValueObject for LinePricing {}

/// One priced row of a document. `amounts` is always derived from `pricing`
/// and the document's jurisdiction mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineId,
    pub sequence: u32,
    pub description: String,
    pub hsn_code: Option<String>,
    pub uom: String,
    pub pricing: LinePricing,
    /// Cancelled lines stay on the document for audit but are excluded from totals.
    pub cancelled: bool,
    pub amounts: TaxBreakdown,
}

impl LineItem {
    pub fn is_active(&self) -> bool {
        !self.cancelled
    }
}

impl Entity for LineItem {
    type Id = LineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Raw line input as entered by a user. Any field may be left blank and is
/// filled from the product, then from configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub description: Option<String>,
    pub hsn_code: Option<String>,
    pub uom: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    /// Percentage as entered; must name a catalogue rate.
    pub tax_rate_percent: Option<Decimal>,
}

/// Catalogue defaults for the product a line refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDefaults {
    pub name: Option<String>,
    pub hsn_code: Option<String>,
    pub uom: Option<String>,
    pub selling_price: Option<Decimal>,
    pub default_tax_rate: Option<TaxRate>,
}

/// Sequence number for a line appended after `lines`.
pub fn next_sequence(lines: &[LineItem]) -> u32 {
    lines
        .iter()
        .map(|l| l.sequence)
        .max()
        .map_or(SEQUENCE_STEP, |max| max.saturating_add(SEQUENCE_STEP))
}

/// First non-blank string among the candidates.
pub(crate) fn first_present<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
