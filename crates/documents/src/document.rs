use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use salesdesk_core::{
    Aggregate, AggregateRoot, DocumentId, DomainError, DomainResult, Event, ExpectedVersion,
    LineId,
};
use salesdesk_tax::{
    amount_to_words, compute_document_totals, next_sequence, recompute_all_lines,
    JurisdictionCode, JurisdictionMode, LineDraft, LineItem, LinePricing, ProductDefaults,
    TaxBreakdown, TaxEngine,
};

use crate::lifecycle::{ensure_transition, DocumentStatus};

/// What the jurisdiction mode is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionInputs {
    /// Counterparty's state code; `None` when unknown.
    #[serde(default, deserialize_with = "unknown_code_as_none")]
    pub counterparty: Option<JurisdictionCode>,
    /// Export / special-zone (or any other) mode forced by the caller.
    pub mode_override: Option<JurisdictionMode>,
}

impl JurisdictionInputs {
    /// A malformed counterparty code is treated as unknown.
    pub fn new(counterparty: Option<&str>, mode_override: Option<JurisdictionMode>) -> Self {
        Self {
            counterparty: counterparty.and_then(JurisdictionCode::parse),
            mode_override,
        }
    }

    fn mode(&self, engine: &TaxEngine) -> JurisdictionMode {
        engine.determine_mode(
            self.counterparty.as_ref().map(JurisdictionCode::as_str),
            self.mode_override,
        )
    }
}

/// Same leniency as [`JurisdictionInputs::new`]: a code outside the catalogue
/// is read as unknown instead of failing the whole payload.
fn unknown_code_as_none<'de, D>(deserializer: D) -> Result<Option<JurisdictionCode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(JurisdictionCode::parse))
}

/// Partial update of a line. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub tax_rate_percent: Option<Decimal>,
}

impl LineEdit {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.discount_percent.is_none()
            && self.tax_rate_percent.is_none()
    }

    fn apply_to(&self, engine: &TaxEngine, pricing: &LinePricing) -> DomainResult<LinePricing> {
        let tax_rate = match self.tax_rate_percent {
            Some(percent) => engine.resolve_rate(percent)?,
            None => pricing.tax_rate,
        };
        Ok(LinePricing {
            quantity: self.quantity.unwrap_or(pricing.quantity),
            unit_price: self.unit_price.unwrap_or(pricing.unit_price),
            discount_percent: self.discount_percent.unwrap_or(pricing.discount_percent),
            tax_rate,
        })
    }
}

/// A mutation of a document's financial content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentChange {
    AddLine {
        line_id: LineId,
        draft: LineDraft,
        product: Option<ProductDefaults>,
    },
    EditLine {
        line_id: LineId,
        edit: LineEdit,
    },
    /// Keep the line for audit but exclude it from totals.
    CancelLine { line_id: LineId },
    RemoveLine { line_id: LineId },
    ChangeJurisdiction(JurisdictionInputs),
}

/// Aggregate root: Document (quotation -> sales order).
///
/// `totals` is always `compute_document_totals(lines)` and every line's
/// amounts are computed under `jurisdiction_mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    status: DocumentStatus,
    jurisdiction: JurisdictionInputs,
    jurisdiction_mode: JurisdictionMode,
    lines: Vec<LineItem>,
    totals: TaxBreakdown,
    version: u64,
    created: bool,
}

impl Document {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            status: DocumentStatus::Draft,
            jurisdiction: JurisdictionInputs::default(),
            jurisdiction_mode: JurisdictionMode::default(),
            lines: Vec::new(),
            totals: TaxBreakdown::default(),
            version: 0,
            created: false,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.id
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn jurisdiction(&self) -> &JurisdictionInputs {
        &self.jurisdiction
    }

    pub fn jurisdiction_mode(&self) -> JurisdictionMode {
        self.jurisdiction_mode
    }

    /// All lines in insertion order, cancelled ones included.
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn active_lines(&self) -> impl Iterator<Item = &LineItem> {
        self.lines.iter().filter(|l| l.is_active())
    }

    pub fn line(&self, line_id: LineId) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn totals(&self) -> &TaxBreakdown {
        &self.totals
    }

    /// Grand total spelled out for the printed document.
    pub fn total_in_words(&self) -> DomainResult<String> {
        amount_to_words(self.totals.total)
    }

    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }

    fn line_mut(&mut self, line_id: LineId) -> DomainResult<&mut LineItem> {
        self.lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(DomainError::not_found)
    }
}

impl AggregateRoot for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Apply a line or jurisdiction change and recompute what it invalidates.
///
/// A jurisdiction change that alters the mode recomputes every line; any
/// other change prices only the affected line. Totals are refreshed either
/// way. Locked and cancelled documents reject every change.
///
/// Returns the next state; `document` is untouched and the version is not
/// bumped (that is `apply`'s job when going through the aggregate).
pub fn apply_line_or_jurisdiction_change(
    engine: &TaxEngine,
    document: &Document,
    change: &DocumentChange,
) -> DomainResult<Document> {
    if !document.is_editable() {
        tracing::warn!(document_id = %document.id, status = %document.status, "rejected edit of frozen document");
        return Err(DomainError::locked(document.status));
    }

    let mut next = document.clone();
    let mode = next.jurisdiction_mode;

    match change {
        DocumentChange::AddLine {
            line_id,
            draft,
            product,
        } => {
            if next.line(*line_id).is_some() {
                return Err(DomainError::conflict(format!("line {line_id} already exists")));
            }
            let sequence = next_sequence(&next.lines);
            let line = engine.prepare_line(*line_id, sequence, draft, product.as_ref(), mode)?;
            next.lines.push(line);
        }
        DocumentChange::EditLine { line_id, edit } => {
            if edit.is_empty() {
                return Err(DomainError::invalid_input("line edit changes nothing"));
            }
            let line = next.line_mut(*line_id)?;
            if line.cancelled {
                return Err(DomainError::invariant("cannot edit a cancelled line"));
            }
            let pricing = edit.apply_to(engine, &line.pricing)?;
            line.amounts = engine.price(&pricing, mode)?;
            line.pricing = pricing;
            if let Some(description) = edit.description.as_deref().map(str::trim) {
                if description.is_empty() {
                    return Err(DomainError::invalid_input("description must not be blank"));
                }
                line.description = description.to_string();
            }
        }
        DocumentChange::CancelLine { line_id } => {
            let line = next.line_mut(*line_id)?;
            if line.cancelled {
                return Err(DomainError::invariant("line is already cancelled"));
            }
            line.cancelled = true;
        }
        DocumentChange::RemoveLine { line_id } => {
            let before = next.lines.len();
            next.lines.retain(|l| l.id != *line_id);
            if next.lines.len() == before {
                return Err(DomainError::not_found());
            }
        }
        DocumentChange::ChangeJurisdiction(inputs) => {
            let new_mode = inputs.mode(engine);
            next.jurisdiction = inputs.clone();
            if new_mode != mode {
                tracing::info!(
                    document_id = %next.id,
                    from = %mode,
                    to = %new_mode,
                    "jurisdiction mode changed"
                );
                next.jurisdiction_mode = new_mode;
                next.lines = recompute_all_lines(&next.lines, new_mode);
            }
        }
    }

    next.totals = compute_document_totals(&next.lines)?;
    tracing::debug!(
        document_id = %next.id,
        lines = next.lines.len(),
        total = %next.totals.total,
        "document totals refreshed"
    );
    Ok(next)
}

/// Command: CreateDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocument {
    pub document_id: DocumentId,
    pub jurisdiction: JurisdictionInputs,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeDocument (any line or jurisdiction change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDocument {
    pub document_id: DocumentId,
    pub change: DocumentChange,
    pub expected_version: ExpectedVersion,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionStatus {
    pub document_id: DocumentId,
    pub to: DocumentStatus,
    pub expected_version: ExpectedVersion,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCommand {
    CreateDocument(CreateDocument),
    ChangeDocument(ChangeDocument),
    TransitionStatus(TransitionStatus),
}

/// Event: DocumentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document_id: DocumentId,
    pub jurisdiction: JurisdictionInputs,
    pub jurisdiction_mode: JurisdictionMode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub document_id: DocumentId,
    pub line: LineItem,
    pub totals: TaxBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdited {
    pub document_id: DocumentId,
    pub line: LineItem,
    pub totals: TaxBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCancelled {
    pub document_id: DocumentId,
    pub line_id: LineId,
    pub totals: TaxBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub document_id: DocumentId,
    pub line_id: LineId,
    pub totals: TaxBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JurisdictionChanged. Carries every line because a mode change
/// reprices all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionChanged {
    pub document_id: DocumentId,
    pub jurisdiction: JurisdictionInputs,
    pub jurisdiction_mode: JurisdictionMode,
    pub lines: Vec<LineItem>,
    pub totals: TaxBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub document_id: DocumentId,
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    DocumentCreated(DocumentCreated),
    LineAdded(LineAdded),
    LineEdited(LineEdited),
    LineCancelled(LineCancelled),
    LineRemoved(LineRemoved),
    JurisdictionChanged(JurisdictionChanged),
    StatusChanged(StatusChanged),
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "documents.document.created",
            DocumentEvent::LineAdded(_) => "documents.document.line_added",
            DocumentEvent::LineEdited(_) => "documents.document.line_edited",
            DocumentEvent::LineCancelled(_) => "documents.document.line_cancelled",
            DocumentEvent::LineRemoved(_) => "documents.document.line_removed",
            DocumentEvent::JurisdictionChanged(_) => "documents.document.jurisdiction_changed",
            DocumentEvent::StatusChanged(_) => "documents.document.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated(e) => e.occurred_at,
            DocumentEvent::LineAdded(e) => e.occurred_at,
            DocumentEvent::LineEdited(e) => e.occurred_at,
            DocumentEvent::LineCancelled(e) => e.occurred_at,
            DocumentEvent::LineRemoved(e) => e.occurred_at,
            DocumentEvent::JurisdictionChanged(e) => e.occurred_at,
            DocumentEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Document {
    type Context = TaxEngine;
    type Command = DocumentCommand;
    type Event = DocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentEvent::DocumentCreated(e) => {
                self.id = e.document_id;
                self.status = DocumentStatus::Draft;
                self.jurisdiction = e.jurisdiction.clone();
                self.jurisdiction_mode = e.jurisdiction_mode;
                self.lines.clear();
                self.totals = TaxBreakdown::default();
                self.created = true;
            }
            DocumentEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
                self.totals = e.totals.clone();
            }
            DocumentEvent::LineEdited(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.id == e.line.id) {
                    *line = e.line.clone();
                }
                self.totals = e.totals.clone();
            }
            DocumentEvent::LineCancelled(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.id == e.line_id) {
                    line.cancelled = true;
                }
                self.totals = e.totals.clone();
            }
            DocumentEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.id != e.line_id);
                self.totals = e.totals.clone();
            }
            DocumentEvent::JurisdictionChanged(e) => {
                self.jurisdiction = e.jurisdiction.clone();
                self.jurisdiction_mode = e.jurisdiction_mode;
                self.lines = e.lines.clone();
                self.totals = e.totals.clone();
            }
            DocumentEvent::StatusChanged(e) => {
                self.status = e.to;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(
        &self,
        engine: &Self::Context,
        command: &Self::Command,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DocumentCommand::CreateDocument(cmd) => self.handle_create(engine, cmd),
            DocumentCommand::ChangeDocument(cmd) => self.handle_change(engine, cmd),
            DocumentCommand::TransitionStatus(cmd) => self.handle_transition(cmd),
        }
    }
}

impl Document {
    fn ensure_document_id(&self, document_id: DocumentId) -> Result<(), DomainError> {
        if self.id != document_id {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        Ok(())
    }

    fn ensure_writable(
        &self,
        document_id: DocumentId,
        expected_version: ExpectedVersion,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_document_id(document_id)?;
        expected_version.check(self.version)
    }

    fn handle_create(
        &self,
        engine: &TaxEngine,
        cmd: &CreateDocument,
    ) -> Result<Vec<DocumentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("document already exists"));
        }

        Ok(vec![DocumentEvent::DocumentCreated(DocumentCreated {
            document_id: cmd.document_id,
            jurisdiction: cmd.jurisdiction.clone(),
            jurisdiction_mode: cmd.jurisdiction.mode(engine),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change(
        &self,
        engine: &TaxEngine,
        cmd: &ChangeDocument,
    ) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_writable(cmd.document_id, cmd.expected_version)?;

        let next = apply_line_or_jurisdiction_change(engine, self, &cmd.change)?;
        let document_id = cmd.document_id;
        let totals = next.totals.clone();
        let occurred_at = cmd.occurred_at;

        let changed_line = |line_id: LineId| {
            next.line(line_id)
                .cloned()
                .ok_or_else(|| DomainError::invariant("changed line missing from next state"))
        };

        let event = match &cmd.change {
            DocumentChange::AddLine { line_id, .. } => DocumentEvent::LineAdded(LineAdded {
                document_id,
                line: changed_line(*line_id)?,
                totals,
                occurred_at,
            }),
            DocumentChange::EditLine { line_id, .. } => DocumentEvent::LineEdited(LineEdited {
                document_id,
                line: changed_line(*line_id)?,
                totals,
                occurred_at,
            }),
            DocumentChange::CancelLine { line_id } => DocumentEvent::LineCancelled(LineCancelled {
                document_id,
                line_id: *line_id,
                totals,
                occurred_at,
            }),
            DocumentChange::RemoveLine { line_id } => DocumentEvent::LineRemoved(LineRemoved {
                document_id,
                line_id: *line_id,
                totals,
                occurred_at,
            }),
            DocumentChange::ChangeJurisdiction(_) => {
                DocumentEvent::JurisdictionChanged(JurisdictionChanged {
                    document_id,
                    jurisdiction: next.jurisdiction.clone(),
                    jurisdiction_mode: next.jurisdiction_mode,
                    lines: next.lines.clone(),
                    totals,
                    occurred_at,
                })
            }
        };

        Ok(vec![event])
    }

    fn handle_transition(&self, cmd: &TransitionStatus) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_writable(cmd.document_id, cmd.expected_version)?;
        ensure_transition(self.status, cmd.to)?;

        tracing::info!(
            document_id = %self.id,
            from = %self.status,
            to = %cmd.to,
            "document status transition"
        );

        Ok(vec![DocumentEvent::StatusChanged(StatusChanged {
            document_id: cmd.document_id,
            from: self.status,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use salesdesk_tax::{TaxConfig, TaxRate};

    fn test_engine() -> TaxEngine {
        TaxEngine::new(TaxConfig::default())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn draft(quantity: Decimal, unit_price: Decimal, rate: Decimal) -> LineDraft {
        LineDraft {
            description: Some("Stretch wrapping machine".to_string()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
            tax_rate_percent: Some(rate),
            ..LineDraft::default()
        }
    }

    fn execute(engine: &TaxEngine, document: &mut Document, command: DocumentCommand) {
        let events = document.handle(engine, &command).unwrap();
        for event in &events {
            document.apply(event);
        }
    }

    fn created_document(engine: &TaxEngine, counterparty: Option<&str>) -> Document {
        let document_id = DocumentId::new();
        let mut document = Document::empty(document_id);
        execute(
            engine,
            &mut document,
            DocumentCommand::CreateDocument(CreateDocument {
                document_id,
                jurisdiction: JurisdictionInputs::new(counterparty, None),
                occurred_at: test_time(),
            }),
        );
        document
    }

    fn change(document: &Document, change: DocumentChange) -> DocumentCommand {
        DocumentCommand::ChangeDocument(ChangeDocument {
            document_id: document.document_id(),
            change,
            expected_version: ExpectedVersion::Any,
            occurred_at: test_time(),
        })
    }

    fn transition(document: &Document, to: DocumentStatus) -> DocumentCommand {
        DocumentCommand::TransitionStatus(TransitionStatus {
            document_id: document.document_id(),
            to,
            expected_version: ExpectedVersion::Any,
            occurred_at: test_time(),
        })
    }

    fn add_line(engine: &TaxEngine, document: &mut Document, line: LineDraft) -> LineId {
        let line_id = LineId::new();
        let command = change(
            document,
            DocumentChange::AddLine {
                line_id,
                draft: line,
                product: None,
            },
        );
        execute(engine, document, command);
        line_id
    }

    #[test]
    fn create_document_derives_mode_and_starts_in_draft() {
        let engine = test_engine();
        let document = created_document(&engine, Some("MH"));

        assert_eq!(document.status(), DocumentStatus::Draft);
        assert_eq!(document.jurisdiction_mode(), JurisdictionMode::CrossJurisdiction);
        assert_eq!(document.version(), 1);
        assert_eq!(document.totals(), &TaxBreakdown::default());
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let engine = test_engine();
        let document = created_document(&engine, None);
        let err = document
            .handle(
                &engine,
                &DocumentCommand::CreateDocument(CreateDocument {
                    document_id: document.document_id(),
                    jurisdiction: JurisdictionInputs::default(),
                    occurred_at: test_time(),
                }),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn changes_to_uncreated_document_are_not_found() {
        let engine = test_engine();
        let document = Document::empty(DocumentId::new());
        let err = document
            .handle(&engine, &transition(&document, DocumentStatus::Sent))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn added_lines_get_sequences_and_refresh_totals() {
        let engine = test_engine();
        let mut document = created_document(&engine, Some("HR"));

        add_line(&engine, &mut document, draft(dec!(10), dec!(1000), dec!(18)));
        add_line(&engine, &mut document, draft(dec!(5), dec!(1000), dec!(18)));

        let sequences: Vec<u32> = document.lines().iter().map(|l| l.sequence).collect();
        assert_eq!(sequences, vec![10, 20]);
        assert_eq!(document.totals().local_a, dec!(1350));
        assert_eq!(document.totals().local_b, dec!(1350));
        assert_eq!(document.totals().total, dec!(17700));
        assert_eq!(
            document.total_in_words().unwrap(),
            "Seventeen Thousand Seven Hundred Rupees Only"
        );
    }

    #[test]
    fn cancelled_line_is_retained_but_excluded_from_totals() {
        let engine = test_engine();
        let mut document = created_document(&engine, Some("HR"));

        add_line(&engine, &mut document, draft(dec!(10), dec!(1000), dec!(18)));
        add_line(&engine, &mut document, draft(dec!(5), dec!(1000), dec!(18)));
        let exempt = add_line(&engine, &mut document, draft(dec!(2), dec!(1000), dec!(0)));
        assert_eq!(document.totals().total, dec!(19700));

        let command = change(&document, DocumentChange::CancelLine { line_id: exempt });
        execute(&engine, &mut document, command);

        assert_eq!(document.lines().len(), 3);
        assert_eq!(document.active_lines().count(), 2);
        assert_eq!(document.line(exempt).unwrap().amounts.total, dec!(2000));
        assert_eq!(document.totals().total, dec!(17700));
    }

    #[test]
    fn editing_a_line_reprices_only_that_line() {
        let engine = test_engine();
        let mut document = created_document(&engine, Some("HR"));
        let first = add_line(&engine, &mut document, draft(dec!(10), dec!(1000), dec!(18)));
        let second = add_line(&engine, &mut document, draft(dec!(1), dec!(500), dec!(5)));
        let untouched = document.line(second).cloned().unwrap();

        let command = change(
            &document,
            DocumentChange::EditLine {
                line_id: first,
                edit: LineEdit {
                    discount_percent: Some(dec!(10)),
                    ..LineEdit::default()
                },
            },
        );
        execute(&engine, &mut document, command);

        let edited = document.line(first).unwrap();
        assert_eq!(edited.amounts.taxable_base, dec!(9000));
        assert_eq!(edited.amounts.local_a, dec!(810));
        assert_eq!(document.line(second).unwrap(), &untouched);
        assert_eq!(document.totals(), &compute_document_totals(document.lines()).unwrap());
    }

    #[test]
    fn jurisdiction_change_reprices_every_line() {
        let engine = test_engine();
        let mut document = created_document(&engine, Some("HR"));
        add_line(&engine, &mut document, draft(dec!(10), dec!(1000), dec!(18)));
        assert_eq!(document.totals().local_a, dec!(900));

        let command = change(
            &document,
            DocumentChange::ChangeJurisdiction(JurisdictionInputs::new(Some("KA"), None)),
        );
        execute(&engine, &mut document, command);

        assert_eq!(document.jurisdiction_mode(), JurisdictionMode::CrossJurisdiction);
        assert_eq!(document.totals().local_a, Decimal::ZERO);
        assert_eq!(document.totals().remote, dec!(1800));
        assert_eq!(document.totals().total, dec!(11800));

        let command = change(
            &document,
            DocumentChange::ChangeJurisdiction(JurisdictionInputs::new(
                Some("KA"),
                Some(JurisdictionMode::Export),
            )),
        );
        execute(&engine, &mut document, command);

        assert_eq!(document.jurisdiction_mode(), JurisdictionMode::Export);
        assert_eq!(document.totals().total_tax, Decimal::ZERO);
        assert_eq!(document.totals().total, dec!(10000));
    }

    #[test]
    fn jurisdiction_inputs_read_unknown_codes_as_unknown() {
        let built = JurisdictionInputs::new(Some("ZZ"), None);
        let parsed: JurisdictionInputs =
            serde_json::from_str(r#"{"counterparty":"ZZ","mode_override":null}"#).unwrap();
        assert_eq!(parsed, built);
        assert_eq!(parsed.counterparty, None);

        let parsed: JurisdictionInputs = serde_json::from_str(r#"{"counterparty":"mh"}"#).unwrap();
        assert_eq!(parsed, JurisdictionInputs::new(Some("MH"), None));

        let parsed: JurisdictionInputs = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, JurisdictionInputs::default());

        assert_eq!(
            JurisdictionInputs::new(Some("ZZ"), None).mode(&test_engine()),
            JurisdictionMode::SameJurisdiction
        );
    }

    #[test]
    fn draft_cannot_jump_to_locked() {
        let engine = test_engine();
        let document = created_document(&engine, None);

        let err = document
            .handle(&engine, &transition(&document, DocumentStatus::Locked))
            .unwrap_err();
        assert_eq!(err, DomainError::illegal_transition("draft", "locked"));
    }

    #[test]
    fn locked_document_rejects_edits_and_transitions() {
        let engine = test_engine();
        let mut document = created_document(&engine, None);
        let line_id = add_line(&engine, &mut document, draft(dec!(1), dec!(100), dec!(18)));

        let command = transition(&document, DocumentStatus::Confirmed);
        execute(&engine, &mut document, command);
        let command = transition(&document, DocumentStatus::Locked);
        execute(&engine, &mut document, command);
        assert_eq!(document.status(), DocumentStatus::Locked);

        let err = document
            .handle(&engine, &change(&document, DocumentChange::RemoveLine { line_id }))
            .unwrap_err();
        assert_eq!(err, DomainError::locked("locked"));

        for target in DocumentStatus::ALL {
            let err = document
                .handle(&engine, &transition(&document, target))
                .unwrap_err();
            assert!(matches!(err, DomainError::IllegalTransition { .. }));
        }
    }

    #[test]
    fn reopening_a_cancelled_document_re_enables_edits() {
        let engine = test_engine();
        let mut document = created_document(&engine, None);

        let command = transition(&document, DocumentStatus::Cancelled);
        execute(&engine, &mut document, command);

        let add = DocumentChange::AddLine {
            line_id: LineId::new(),
            draft: draft(dec!(1), dec!(100), dec!(18)),
            product: None,
        };
        let err = document
            .handle(&engine, &change(&document, add.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::DocumentLocked { .. }));

        let command = transition(&document, DocumentStatus::Draft);
        execute(&engine, &mut document, command);
        let command = change(&document, add);
        execute(&engine, &mut document, command);
        assert_eq!(document.totals().total, dec!(118));
    }

    #[test]
    fn invalid_line_input_is_rejected_without_events() {
        let engine = test_engine();
        let document = created_document(&engine, None);

        for bad in [
            draft(dec!(-1), dec!(100), dec!(18)),
            draft(dec!(1), dec!(100), dec!(17)),
            LineDraft {
                discount_percent: Some(dec!(120)),
                ..draft(dec!(1), dec!(100), dec!(18))
            },
        ] {
            let command = change(
                &document,
                DocumentChange::AddLine {
                    line_id: LineId::new(),
                    draft: bad,
                    product: None,
                },
            );
            let err = document.handle(&engine, &command).unwrap_err();
            assert!(matches!(err, DomainError::InvalidInput(_)), "{err:?}");
        }
    }

    #[test]
    fn cancelled_lines_cannot_be_edited_or_cancelled_again() {
        let engine = test_engine();
        let mut document = created_document(&engine, None);
        let line_id = add_line(&engine, &mut document, draft(dec!(1), dec!(100), dec!(18)));
        let command = change(&document, DocumentChange::CancelLine { line_id });
        execute(&engine, &mut document, command);

        let edit = DocumentChange::EditLine {
            line_id,
            edit: LineEdit {
                quantity: Some(dec!(2)),
                ..LineEdit::default()
            },
        };
        assert!(matches!(
            apply_line_or_jurisdiction_change(&engine, &document, &edit),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            apply_line_or_jurisdiction_change(&engine, &document, &DocumentChange::CancelLine { line_id }),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn lines_that_overflow_the_document_total_are_rejected() {
        let engine = test_engine();
        let mut document = created_document(&engine, Some("HR"));
        let max_price = Decimal::from_i128_with_scale(7 * 10i128.pow(26), 0);

        let mut rejected = None;
        for _ in 0..200 {
            let command = change(
                &document,
                DocumentChange::AddLine {
                    line_id: LineId::new(),
                    draft: draft(Decimal::ONE, max_price, dec!(28)),
                    product: None,
                },
            );
            match document.handle(&engine, &command) {
                Ok(events) => events.iter().for_each(|e| document.apply(e)),
                Err(err) => {
                    rejected = Some(err);
                    break;
                }
            }
        }

        match rejected {
            Some(DomainError::InvalidInput(msg)) => assert!(msg.contains("out of range")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(!document.lines().is_empty());
        assert_eq!(document.totals(), &compute_document_totals(document.lines()).unwrap());
    }

    #[test]
    fn unknown_lines_are_not_found() {
        let engine = test_engine();
        let document = created_document(&engine, None);
        let result = apply_line_or_jurisdiction_change(
            &engine,
            &document,
            &DocumentChange::RemoveLine { line_id: LineId::new() },
        );
        assert_eq!(result, Err(DomainError::NotFound));
    }

    #[test]
    fn stale_writer_is_rejected() {
        let engine = test_engine();
        let mut document = created_document(&engine, None);
        add_line(&engine, &mut document, draft(dec!(1), dec!(100), dec!(18)));
        assert_eq!(document.version(), 2);

        let stale = DocumentCommand::TransitionStatus(TransitionStatus {
            document_id: document.document_id(),
            to: DocumentStatus::Sent,
            expected_version: ExpectedVersion::Exact(1),
            occurred_at: test_time(),
        });
        assert!(matches!(
            document.handle(&engine, &stale),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let engine = test_engine();
        let document = created_document(&engine, Some("HR"));
        let before = document.clone();

        let command = change(
            &document,
            DocumentChange::AddLine {
                line_id: LineId::new(),
                draft: draft(dec!(3), dec!(250), dec!(12)),
                product: None,
            },
        );
        let events1 = document.handle(&engine, &command).unwrap();
        let events2 = document.handle(&engine, &command).unwrap();

        assert_eq!(document, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn replaying_events_needs_no_engine() {
        let engine = test_engine();
        let document_id = DocumentId::new();
        let mut live = Document::empty(document_id);
        let mut history = Vec::new();

        let placeholder = Document::empty(document_id);
        let commands = vec![
            DocumentCommand::CreateDocument(CreateDocument {
                document_id,
                jurisdiction: JurisdictionInputs::new(Some("HR"), None),
                occurred_at: test_time(),
            }),
            change(
                &placeholder,
                DocumentChange::AddLine {
                    line_id: LineId::new(),
                    draft: draft(dec!(10), dec!(1000), dec!(18)),
                    product: None,
                },
            ),
            change(
                &placeholder,
                DocumentChange::ChangeJurisdiction(JurisdictionInputs::new(Some("DL"), None)),
            ),
            transition(&placeholder, DocumentStatus::Confirmed),
        ];
        for command in commands {
            let emitted = live.handle(&engine, &command).unwrap();
            for e in &emitted {
                live.apply(e);
            }
            history.extend(emitted);
        }

        let mut replayed = Document::empty(document_id);
        for e in &history {
            replayed.apply(e);
        }

        assert_eq!(replayed, live);
        assert_eq!(replayed.version(), 4);
        assert_eq!(replayed.jurisdiction_mode(), JurisdictionMode::CrossJurisdiction);
        assert_eq!(replayed.totals().remote, dec!(1800));
        assert_eq!(
            history[2].event_type(),
            "documents.document.jurisdiction_changed"
        );
    }

    fn arb_change(existing: usize) -> impl Strategy<Value = (u8, usize, i64, i64, u8)> {
        (0u8..5, 0..existing.max(1), 0i64..50, 0i64..100_000, 0u8..5)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any accepted sequence of changes, totals equal the
        /// sum of active lines and every line is priced under the current mode.
        #[test]
        fn totals_track_lines_through_any_change_sequence(
            steps in prop::collection::vec(arb_change(8), 1..24)
        ) {
            let engine = test_engine();
            let mut document = created_document(&engine, Some("HR"));
            let codes = ["HR", "MH", "KA", "DL", "HR"];

            for (kind, pick, qty, price_minor, extra) in steps {
                let ids: Vec<LineId> = document.lines().iter().map(|l| l.id).collect();
                let target = ids.get(pick % ids.len().max(1)).copied();
                let rate = TaxRate::ALL[usize::from(extra) % TaxRate::ALL.len()].percent();

                let change_ = match (kind, target) {
                    (0, _) | (_, None) => DocumentChange::AddLine {
                        line_id: LineId::new(),
                        draft: draft(Decimal::from(qty), Decimal::new(price_minor, 2), rate),
                        product: None,
                    },
                    (1, Some(line_id)) => DocumentChange::EditLine {
                        line_id,
                        edit: LineEdit { quantity: Some(Decimal::from(qty)), ..LineEdit::default() },
                    },
                    (2, Some(line_id)) => DocumentChange::CancelLine { line_id },
                    (3, Some(line_id)) => DocumentChange::RemoveLine { line_id },
                    (_, Some(_)) => DocumentChange::ChangeJurisdiction(JurisdictionInputs::new(
                        Some(codes[usize::from(extra) % codes.len()]),
                        None,
                    )),
                };

                // Rejections (e.g. editing a cancelled line) leave state untouched.
                if let Ok(events) = document.handle(&engine, &change(&document, change_)) {
                    for e in &events {
                        document.apply(e);
                    }
                }

                prop_assert_eq!(document.totals(), &compute_document_totals(document.lines()).unwrap());
                for line in document.lines() {
                    prop_assert_eq!(
                        &line.amounts,
                        &salesdesk_tax::compute_line_amounts(&line.pricing, document.jurisdiction_mode())
                    );
                }
            }
        }
    }
}
