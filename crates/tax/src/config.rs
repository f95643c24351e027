//! Tax configuration.
//!
//! Passed explicitly into [`crate::TaxEngine::new`]; nothing in this crate
//! reads process-wide state on its own.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::jurisdiction::JurisdictionCode;
use crate::rate::TaxRate;

pub const ENV_SELLER_JURISDICTION: &str = "SALESDESK_SELLER_JURISDICTION";
pub const ENV_APPROVED_RATES: &str = "SALESDESK_APPROVED_RATES";
pub const ENV_DEFAULT_RATE: &str = "SALESDESK_DEFAULT_RATE";

const DEFAULT_SELLER_JURISDICTION: &str = "HR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid seller jurisdiction code: {0:?}")]
    InvalidSellerJurisdiction(String),

    #[error("unrecognised tax rate in configuration: {0:?}")]
    InvalidRate(String),

    #[error("at least one tax rate must be approved")]
    NoApprovedRates,

    #[error("default tax rate {0} is not in the approved set")]
    DefaultRateNotApproved(TaxRate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxConfig {
    seller_jurisdiction: JurisdictionCode,
    approved_rates: Vec<TaxRate>,
    default_rate: TaxRate,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            seller_jurisdiction: JurisdictionCode::from_static(DEFAULT_SELLER_JURISDICTION),
            approved_rates: TaxRate::ALL.to_vec(),
            default_rate: TaxRate::Gst18,
        }
    }
}

impl TaxConfig {
    pub fn new(
        seller_jurisdiction: &str,
        approved_rates: impl IntoIterator<Item = TaxRate>,
        default_rate: TaxRate,
    ) -> Result<Self, ConfigError> {
        let seller_jurisdiction = JurisdictionCode::parse(seller_jurisdiction)
            .ok_or_else(|| ConfigError::InvalidSellerJurisdiction(seller_jurisdiction.to_string()))?;

        let mut approved_rates: Vec<TaxRate> = approved_rates.into_iter().collect();
        approved_rates.sort();
        approved_rates.dedup();

        if approved_rates.is_empty() {
            return Err(ConfigError::NoApprovedRates);
        }
        if !approved_rates.contains(&default_rate) {
            return Err(ConfigError::DefaultRateNotApproved(default_rate));
        }

        Ok(Self {
            seller_jurisdiction,
            approved_rates,
            default_rate,
        })
    }

    /// Defaults overlaid with `SALESDESK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`TaxConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let seller = lookup(ENV_SELLER_JURISDICTION)
            .unwrap_or_else(|| defaults.seller_jurisdiction.to_string());

        let approved_rates = match lookup(ENV_APPROVED_RATES) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_rate)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.approved_rates,
        };

        let default_rate = match lookup(ENV_DEFAULT_RATE) {
            Some(raw) => parse_rate(raw.trim())?,
            None => defaults.default_rate,
        };

        let config = Self::new(&seller, approved_rates, default_rate)?;
        tracing::info!(
            seller = %config.seller_jurisdiction,
            approved_rates = config.approved_rates.len(),
            default_rate = %config.default_rate,
            "loaded tax configuration"
        );
        Ok(config)
    }

    pub fn seller_jurisdiction(&self) -> &JurisdictionCode {
        &self.seller_jurisdiction
    }

    pub fn approved_rates(&self) -> &[TaxRate] {
        &self.approved_rates
    }

    pub fn default_rate(&self) -> TaxRate {
        self.default_rate
    }

    pub fn is_approved(&self, rate: TaxRate) -> bool {
        self.approved_rates.contains(&rate)
    }
}

fn parse_rate(raw: &str) -> Result<TaxRate, ConfigError> {
    raw.parse::<Decimal>()
        .ok()
        .and_then(TaxRate::from_percent)
        .ok_or_else(|| ConfigError::InvalidRate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = TaxConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, TaxConfig::default());
        assert_eq!(config.seller_jurisdiction().as_str(), "HR");
        assert_eq!(config.default_rate(), TaxRate::Gst18);
        assert_eq!(config.approved_rates().len(), 5);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = TaxConfig::from_lookup(lookup_from(&[
            (ENV_SELLER_JURISDICTION, "mh"),
            (ENV_APPROVED_RATES, "18, 5,18"),
            (ENV_DEFAULT_RATE, "5"),
        ]))
        .unwrap();

        assert_eq!(config.seller_jurisdiction().as_str(), "MH");
        assert_eq!(config.approved_rates(), &[TaxRate::Gst5, TaxRate::Gst18]);
        assert_eq!(config.default_rate(), TaxRate::Gst5);
        assert!(!config.is_approved(TaxRate::Gst28));
    }

    #[test]
    fn malformed_values_are_reported() {
        assert_eq!(
            TaxConfig::from_lookup(lookup_from(&[(ENV_APPROVED_RATES, "18,17.5")])),
            Err(ConfigError::InvalidRate("17.5".to_string()))
        );
        assert_eq!(
            TaxConfig::from_lookup(lookup_from(&[(ENV_SELLER_JURISDICTION, "Haryana")])),
            Err(ConfigError::InvalidSellerJurisdiction("Haryana".to_string()))
        );
        assert_eq!(
            TaxConfig::from_lookup(lookup_from(&[(ENV_SELLER_JURISDICTION, "ZZ")])),
            Err(ConfigError::InvalidSellerJurisdiction("ZZ".to_string()))
        );
        assert_eq!(
            TaxConfig::from_lookup(lookup_from(&[(ENV_APPROVED_RATES, " , ")])),
            Err(ConfigError::NoApprovedRates)
        );
    }

    #[test]
    fn default_rate_must_be_approved() {
        assert_eq!(
            TaxConfig::new("HR", [TaxRate::Gst5, TaxRate::Gst12], TaxRate::Gst18),
            Err(ConfigError::DefaultRateNotApproved(TaxRate::Gst18))
        );
    }
}
