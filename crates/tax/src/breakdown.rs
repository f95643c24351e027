//! Line and document tax computation.
//!
//! Everything here is pure and assumes validated input (see
//! [`crate::TaxEngine::validate_pricing`]). Rounding happens once per amount
//! on each line; document totals are sums of already-rounded line amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, DomainResult, ValueObject};

use crate::jurisdiction::JurisdictionMode;
use crate::line::{LineItem, LinePricing};
use crate::money::round_currency;

/// Taxable base, tax components and total for a line or a whole document.
///
/// `local_a`/`local_b` are the two same-jurisdiction halves (CGST/SGST),
/// `remote` the single cross-jurisdiction component (IGST).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub taxable_base: Decimal,
    pub local_a: Decimal,
    pub local_b: Decimal,
    pub remote: Decimal,
    pub total_tax: Decimal,
    pub total: Decimal,
}

impl ValueObject for TaxBreakdown {}

impl TaxBreakdown {
    fn checked_accumulate(self, other: &TaxBreakdown) -> Option<Self> {
        Some(Self {
            taxable_base: self.taxable_base.checked_add(other.taxable_base)?,
            local_a: self.local_a.checked_add(other.local_a)?,
            local_b: self.local_b.checked_add(other.local_b)?,
            remote: self.remote.checked_add(other.remote)?,
            total_tax: self.total_tax.checked_add(other.total_tax)?,
            total: self.total.checked_add(other.total)?,
        })
    }

    fn rounded(self) -> Self {
        Self {
            taxable_base: round_currency(self.taxable_base),
            local_a: round_currency(self.local_a),
            local_b: round_currency(self.local_b),
            remote: round_currency(self.remote),
            total_tax: round_currency(self.total_tax),
            total: round_currency(self.total),
        }
    }
}

/// quantity x unit price x (1 - discount/100), rounded to minor units.
pub fn taxable_base(pricing: &LinePricing) -> Decimal {
    let discount_factor = Decimal::ONE - pricing.discount_percent / Decimal::ONE_HUNDRED;
    round_currency(pricing.quantity * pricing.unit_price * discount_factor)
}

/// Compute one line's breakdown under `mode`.
///
/// Same-jurisdiction halves apply rate/200 to the base, each rounded on its
/// own; they are not derived by halving a rounded whole-rate amount.
pub fn compute_line_amounts(pricing: &LinePricing, mode: JurisdictionMode) -> TaxBreakdown {
    let base = taxable_base(pricing);
    let rate = pricing.tax_rate.percent();

    let (local_a, local_b, remote) = match mode {
        JurisdictionMode::Export => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        JurisdictionMode::CrossJurisdiction | JurisdictionMode::SpecialZone => {
            let remote = round_currency(base * rate / Decimal::ONE_HUNDRED);
            (Decimal::ZERO, Decimal::ZERO, remote)
        }
        JurisdictionMode::SameJurisdiction => {
            let half_rate = rate / Decimal::from(200);
            (
                round_currency(base * half_rate),
                round_currency(base * half_rate),
                Decimal::ZERO,
            )
        }
    };

    let total_tax = local_a + local_b + remote;
    let breakdown = TaxBreakdown {
        taxable_base: base,
        local_a,
        local_b,
        remote,
        total_tax,
        total: base + total_tax,
    };

    tracing::debug!(
        mode = %mode,
        rate = %pricing.tax_rate,
        base = %breakdown.taxable_base,
        total_tax = %breakdown.total_tax,
        "computed line amounts"
    );

    breakdown
}

/// Sum the breakdowns of active lines. Cancelled lines contribute nothing.
///
/// Every line can be in range on its own while their sum is not; that is
/// reported as `InvalidInput` rather than overflowing.
pub fn compute_document_totals(lines: &[LineItem]) -> DomainResult<TaxBreakdown> {
    lines
        .iter()
        .filter(|line| line.is_active())
        .try_fold(TaxBreakdown::default(), |acc, line| acc.checked_accumulate(&line.amounts))
        .map(TaxBreakdown::rounded)
        .ok_or_else(|| DomainError::invalid_input("document amount out of range"))
}

/// Recompute every line (cancelled ones included) under a new mode.
///
/// Returns a new collection so the caller can diff before persisting.
pub fn recompute_all_lines(lines: &[LineItem], mode: JurisdictionMode) -> Vec<LineItem> {
    tracing::debug!(mode = %mode, lines = lines.len(), "recomputing all lines");

    lines
        .iter()
        .map(|line| LineItem {
            amounts: compute_line_amounts(&line.pricing, mode),
            ..line.clone()
        })
        .collect()
}
