//! Document status lifecycle.
//!
//! `allowed_targets` is the single authoritative transition table; every
//! other check derives from it.

use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Sent,
    Confirmed,
    Locked,
    Cancelled,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Draft,
        DocumentStatus::Sent,
        DocumentStatus::Confirmed,
        DocumentStatus::Locked,
        DocumentStatus::Cancelled,
    ];

    pub fn allowed_targets(self) -> &'static [DocumentStatus] {
        use DocumentStatus::*;

        match self {
            Draft => &[Sent, Confirmed, Cancelled],
            Sent => &[Draft, Confirmed, Cancelled],
            Confirmed => &[Locked, Cancelled],
            Locked => &[],
            Cancelled => &[Draft],
        }
    }

    pub fn can_transition_to(self, requested: DocumentStatus) -> bool {
        self.allowed_targets().contains(&requested)
    }

    /// Locked and cancelled documents freeze all financial content.
    pub fn is_editable(self) -> bool {
        !matches!(self, DocumentStatus::Locked | DocumentStatus::Cancelled)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Confirmed => "confirmed",
            DocumentStatus::Locked => "locked",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    /// What the document is called at this stage.
    pub fn label(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "Quotation",
            DocumentStatus::Sent => "Quotation Sent",
            DocumentStatus::Confirmed => "Sales Order",
            DocumentStatus::Locked => "Locked",
            DocumentStatus::Cancelled => "Cancelled",
        }
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_transition(current: DocumentStatus, requested: DocumentStatus) -> bool {
    current.can_transition_to(requested)
}

/// [`can_transition`] as a rejection the caller can surface.
pub fn ensure_transition(current: DocumentStatus, requested: DocumentStatus) -> DomainResult<()> {
    if can_transition(current, requested) {
        Ok(())
    } else {
        tracing::warn!(from = %current, to = %requested, "rejected status transition");
        Err(DomainError::illegal_transition(current, requested))
    }
}
