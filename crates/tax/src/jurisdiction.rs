//! Jurisdiction codes and the mode that selects a tax split.

use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, DomainResult, ValueObject};

/// GST state and union-territory codes with their names.
pub const STATE_CODES: [(&str, &str); 34] = [
    ("AN", "Andaman and Nicobar Islands"),
    ("AP", "Andhra Pradesh"),
    ("AR", "Arunachal Pradesh"),
    ("AS", "Assam"),
    ("BR", "Bihar"),
    ("CG", "Chhattisgarh"),
    ("CH", "Chandigarh"),
    ("DL", "Delhi"),
    ("GA", "Goa"),
    ("GJ", "Gujarat"),
    ("HP", "Himachal Pradesh"),
    ("HR", "Haryana"),
    ("JH", "Jharkhand"),
    ("JK", "Jammu and Kashmir"),
    ("KA", "Karnataka"),
    ("KL", "Kerala"),
    ("LA", "Ladakh"),
    ("MH", "Maharashtra"),
    ("ML", "Meghalaya"),
    ("MN", "Manipur"),
    ("MP", "Madhya Pradesh"),
    ("MZ", "Mizoram"),
    ("NL", "Nagaland"),
    ("OD", "Odisha"),
    ("PB", "Punjab"),
    ("PY", "Puducherry"),
    ("RJ", "Rajasthan"),
    ("SK", "Sikkim"),
    ("TN", "Tamil Nadu"),
    ("TS", "Telangana"),
    ("TR", "Tripura"),
    ("UK", "Uttarakhand"),
    ("UP", "Uttar Pradesh"),
    ("WB", "West Bengal"),
];

/// A code from [`STATE_CODES`], upper-case normalised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JurisdictionCode(String);

impl ValueObject for JurisdictionCode {}

impl JurisdictionCode {
    /// Trim + upper-case, then look the code up in [`STATE_CODES`]. Anything
    /// outside the catalogue is not a code.
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        STATE_CODES
            .iter()
            .any(|(known, _)| *known == code)
            .then_some(Self(code))
    }

    /// State or territory name for this code.
    pub fn name(&self) -> &'static str {
        STATE_CODES
            .iter()
            .find(|(known, _)| *known == self.0)
            .map_or("", |(_, name)| name)
    }

    /// For compile-time constants already in normalised form.
    pub(crate) fn from_static(code: &'static str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JurisdictionCode {
    type Error = DomainError;

    fn try_from(value: String) -> DomainResult<Self> {
        JurisdictionCode::parse(&value)
            .ok_or_else(|| DomainError::invalid_input(format!("invalid jurisdiction code: {value:?}")))
    }
}

impl From<JurisdictionCode> for String {
    fn from(value: JurisdictionCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for JurisdictionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which tax split applies to a document's lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JurisdictionMode {
    /// Seller and counterparty in the same state: CGST + SGST.
    #[default]
    SameJurisdiction,
    /// Different states: IGST.
    CrossJurisdiction,
    /// Zero-rated export.
    Export,
    /// Special economic zone supply: IGST.
    SpecialZone,
}

impl JurisdictionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            JurisdictionMode::SameJurisdiction => "same-jurisdiction",
            JurisdictionMode::CrossJurisdiction => "cross-jurisdiction",
            JurisdictionMode::Export => "export",
            JurisdictionMode::SpecialZone => "special-zone",
        }
    }

    /// No tax is charged under this mode, whatever the line's rate.
    pub fn is_zero_rated(self) -> bool {
        matches!(self, JurisdictionMode::Export)
    }
}

impl core::fmt::Display for JurisdictionMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the mode for a seller/counterparty pair.
///
/// An override always wins. An absent or unknown counterparty code falls
/// back to same-jurisdiction so tax is charged rather than silently dropped.
pub fn determine_jurisdiction_mode(
    seller: &JurisdictionCode,
    counterparty: Option<&str>,
    explicit_override: Option<JurisdictionMode>,
) -> JurisdictionMode {
    if let Some(mode) = explicit_override {
        return mode;
    }

    match counterparty.and_then(JurisdictionCode::parse) {
        None => JurisdictionMode::SameJurisdiction,
        Some(code) if &code == seller => JurisdictionMode::SameJurisdiction,
        Some(_) => JurisdictionMode::CrossJurisdiction,
    }
}
