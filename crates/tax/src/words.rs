//! Amounts in words, Indian grouping (thousand, lakh, crore).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use salesdesk_core::{DomainError, DomainResult};

use crate::money::round_currency;

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

const HUNDRED: u128 = 100;
const THOUSAND: u128 = 1_000;
const LAKH: u128 = 100_000;
const CRORE: u128 = 10_000_000;

/// Spell a currency amount: `11800` becomes
/// "Eleven Thousand Eight Hundred Rupees Only".
///
/// The amount is rounded to paise first; zero is "Zero Rupees Only".
pub fn amount_to_words(amount: Decimal) -> DomainResult<String> {
    if amount < Decimal::ZERO {
        return Err(DomainError::invalid_input(format!(
            "cannot spell a negative amount: {amount}"
        )));
    }

    let rounded = round_currency(amount);
    let rupees = rounded.trunc();
    let paise = (rounded - rupees) * Decimal::ONE_HUNDRED;

    let rupees = rupees
        .to_u128()
        .ok_or_else(|| DomainError::invalid_input(format!("amount out of range: {amount}")))?;
    let paise = paise
        .to_u128()
        .ok_or_else(|| DomainError::invalid_input(format!("amount out of range: {amount}")))?;

    let mut words = if rupees == 0 {
        "Zero".to_string()
    } else {
        spell(rupees)
    };
    words.push_str(" Rupees");
    if paise > 0 {
        words.push_str(" and ");
        words.push_str(&spell(paise));
        words.push_str(" Paise");
    }
    words.push_str(" Only");
    Ok(words)
}

fn spell(n: u128) -> String {
    match n {
        0..20 => ONES[n as usize].to_string(),
        20..HUNDRED => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                unit => format!("{tens} {}", ONES[unit as usize]),
            }
        }
        HUNDRED..THOUSAND => grouped(n, HUNDRED, "Hundred"),
        THOUSAND..LAKH => grouped(n, THOUSAND, "Thousand"),
        LAKH..CRORE => grouped(n, LAKH, "Lakh"),
        _ => grouped(n, CRORE, "Crore"),
    }
}

fn grouped(n: u128, magnitude: u128, word: &str) -> String {
    let head = spell(n / magnitude);
    match n % magnitude {
        0 => format!("{head} {word}"),
        rest => format!("{head} {word} {}", spell(rest)),
    }
}
