//! Sales documents (quotation -> sales order), event-sourced.
//!
//! Owns the status lifecycle and the rule that every line or jurisdiction
//! change leaves line amounts and document totals consistent. Tax arithmetic
//! is delegated to `salesdesk-tax`; no IO, no HTTP, no storage.

pub mod document;
pub mod lifecycle;

pub use document::{
    apply_line_or_jurisdiction_change, ChangeDocument, CreateDocument, Document, DocumentChange,
    DocumentCommand, DocumentCreated, DocumentEvent, JurisdictionChanged, JurisdictionInputs,
    LineAdded, LineCancelled, LineEdit, LineEdited, LineRemoved, StatusChanged, TransitionStatus,
};
pub use lifecycle::{can_transition, ensure_transition, DocumentStatus};
