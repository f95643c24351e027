use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits of the currency's minor unit (paise).
pub const CURRENCY_SCALE: u32 = 2;

/// Round to minor-unit precision, half away from zero.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// True when `amount` carries no digits below the minor unit.
pub fn is_minor_unit_precise(amount: Decimal) -> bool {
    amount.normalize().scale() <= CURRENCY_SCALE
}
