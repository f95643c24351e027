//! Configured entry point to the tax computation.

use rust_decimal::Decimal;

use salesdesk_core::{DomainError, DomainResult, LineId};

use crate::breakdown::{compute_line_amounts, TaxBreakdown};
use crate::config::TaxConfig;
use crate::jurisdiction::{determine_jurisdiction_mode, JurisdictionMode};
use crate::line::{first_present, LineDraft, LineItem, LinePricing, ProductDefaults};
use crate::money::is_minor_unit_precise;
use crate::rate::TaxRate;

const DEFAULT_DESCRIPTION: &str = "Product";
const DEFAULT_UOM: &str = "Units";

/// Validates raw line input against the configuration and prices lines.
///
/// The per-line computations live in [`crate::breakdown`] and cannot fail;
/// this type owns the precondition checks that guard them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxEngine {
    config: TaxConfig,
}

impl TaxEngine {
    pub fn new(config: TaxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TaxConfig {
        &self.config
    }

    /// Mode for a counterparty, compared against the configured seller code.
    pub fn determine_mode(
        &self,
        counterparty: Option<&str>,
        explicit_override: Option<JurisdictionMode>,
    ) -> JurisdictionMode {
        determine_jurisdiction_mode(
            self.config.seller_jurisdiction(),
            counterparty,
            explicit_override,
        )
    }

    /// Map an entered percentage to an approved catalogue rate.
    pub fn resolve_rate(&self, percent: Decimal) -> DomainResult<TaxRate> {
        let rate = TaxRate::parse_percent(percent)?;
        self.ensure_approved(rate)?;
        Ok(rate)
    }

    fn ensure_approved(&self, rate: TaxRate) -> DomainResult<()> {
        if self.config.is_approved(rate) {
            Ok(())
        } else {
            Err(DomainError::invalid_input(format!(
                "tax rate {rate} is not approved"
            )))
        }
    }

    /// Reject pricing the computation must never see.
    pub fn validate_pricing(&self, pricing: &LinePricing) -> DomainResult<()> {
        if pricing.quantity < Decimal::ZERO {
            return Err(DomainError::invalid_input("quantity must not be negative"));
        }
        if pricing.unit_price < Decimal::ZERO {
            return Err(DomainError::invalid_input("unit_price must not be negative"));
        }
        if !is_minor_unit_precise(pricing.unit_price) {
            return Err(DomainError::invalid_input(
                "unit_price has more precision than the currency's minor unit",
            ));
        }
        if pricing.discount_percent < Decimal::ZERO || pricing.discount_percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::invalid_input(
                "discount_percent must be between 0 and 100",
            ));
        }
        // headroom for the rate multiplication that follows
        let headroom = pricing
            .quantity
            .checked_mul(pricing.unit_price)
            .and_then(|gross| gross.checked_mul(Decimal::ONE_HUNDRED));
        if headroom.is_none() {
            return Err(DomainError::invalid_input("line amount out of range"));
        }
        self.ensure_approved(pricing.tax_rate)
    }

    /// Validate then compute.
    pub fn price(&self, pricing: &LinePricing, mode: JurisdictionMode) -> DomainResult<TaxBreakdown> {
        self.validate_pricing(pricing)?;
        Ok(compute_line_amounts(pricing, mode))
    }

    /// Turn a draft into a priced line, filling blanks from the product and
    /// then from configured defaults.
    pub fn prepare_line(
        &self,
        id: LineId,
        sequence: u32,
        draft: &LineDraft,
        product: Option<&ProductDefaults>,
        mode: JurisdictionMode,
    ) -> DomainResult<LineItem> {
        let tax_rate = match draft.tax_rate_percent {
            Some(percent) => self.resolve_rate(percent)?,
            None => product
                .and_then(|p| p.default_tax_rate)
                .unwrap_or(self.config.default_rate()),
        };

        let pricing = LinePricing {
            quantity: draft.quantity.unwrap_or(Decimal::ONE),
            unit_price: draft
                .unit_price
                .or(product.and_then(|p| p.selling_price))
                .unwrap_or(Decimal::ZERO),
            discount_percent: draft.discount_percent.unwrap_or(Decimal::ZERO),
            tax_rate,
        };
        let amounts = self.price(&pricing, mode)?;

        Ok(LineItem {
            id,
            sequence,
            description: first_present([
                draft.description.as_deref(),
                product.and_then(|p| p.name.as_deref()),
            ])
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            hsn_code: first_present([
                draft.hsn_code.as_deref(),
                product.and_then(|p| p.hsn_code.as_deref()),
            ]),
            uom: first_present([draft.uom.as_deref(), product.and_then(|p| p.uom.as_deref())])
                .unwrap_or_else(|| DEFAULT_UOM.to_string()),
            pricing,
            cancelled: false,
            amounts,
        })
    }
}
