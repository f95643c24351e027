//! Tax rate catalogue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, DomainResult, ValueObject};

/// GST slab applicable to a line. Closed set: a percentage outside this
/// catalogue cannot be represented, so it is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxRate {
    Exempt,
    Gst5,
    Gst12,
    Gst18,
    Gst28,
}

impl ValueObject for TaxRate {}

impl TaxRate {
    pub const ALL: [TaxRate; 5] = [
        TaxRate::Exempt,
        TaxRate::Gst5,
        TaxRate::Gst12,
        TaxRate::Gst18,
        TaxRate::Gst28,
    ];

    /// Whole-rate percentage (18 for `Gst18`).
    pub fn percent(self) -> Decimal {
        Decimal::from(self.whole_percent())
    }

    fn whole_percent(self) -> u32 {
        match self {
            TaxRate::Exempt => 0,
            TaxRate::Gst5 => 5,
            TaxRate::Gst12 => 12,
            TaxRate::Gst18 => 18,
            TaxRate::Gst28 => 28,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaxRate::Exempt => "Exempt (0%)",
            TaxRate::Gst5 => "GST 5%",
            TaxRate::Gst12 => "GST 12%",
            TaxRate::Gst18 => "GST 18%",
            TaxRate::Gst28 => "GST 28%",
        }
    }

    /// Look a percentage up in the catalogue. `18`, `18.0` and `18.00` all match.
    pub fn from_percent(percent: Decimal) -> Option<TaxRate> {
        let normalized = percent.normalize();
        TaxRate::ALL.into_iter().find(|r| r.percent() == normalized)
    }

    /// Like [`TaxRate::from_percent`] but reports an unrecognised rate.
    pub fn parse_percent(percent: Decimal) -> DomainResult<TaxRate> {
        TaxRate::from_percent(percent).ok_or_else(|| {
            DomainError::invalid_input(format!("unrecognised tax rate: {percent}%"))
        })
    }
}

impl core::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.whole_percent())
    }
}
