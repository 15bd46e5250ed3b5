//! Session persistence seam.
//!
//! The service layer owns locking and workflow execution; a store only has to
//! hold records by session id and report conflicts and misses. The in-memory
//! adapter lives with the API crate; anything keyed by session id with
//! exclusive replace semantics can back this trait.

use serde::Serialize;

use super::domain::{ApplicantRecord, LoanStatus, SessionId};

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session {0} already exists")]
    Conflict(String),
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Record storage keyed by session id. `insert` rejects duplicates and
/// `update` rejects missing sessions, so lost-create and lost-update bugs
/// surface as errors instead of silent overwrites.
pub trait SessionStore: Send + Sync {
    fn insert(&self, record: ApplicantRecord) -> Result<(), SessionStoreError>;
    fn update(&self, record: ApplicantRecord) -> Result<(), SessionStoreError>;
    fn fetch(&self, session_id: &SessionId) -> Result<ApplicantRecord, SessionStoreError>;
    fn delete(&self, session_id: &SessionId) -> Result<(), SessionStoreError>;
    fn list(&self) -> Result<Vec<ApplicantRecord>, SessionStoreError>;
}

/// Read-only projection of one session, as returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusView {
    pub session_id: SessionId,
    pub phone: String,
    pub customer_name: Option<String>,
    pub loan_status: LoanStatus,
    pub requested_loan_amount: Option<f64>,
    pub requested_tenure_months: Option<u32>,
    pub negotiated_interest_rate: Option<f64>,
    pub calculated_emi: Option<f64>,
    pub credit_score: Option<u16>,
    pub salary_slip_required: bool,
    pub salary_slip_uploaded: bool,
    pub rejection_reason: Option<String>,
    pub sanction_document_ref: Option<String>,
    pub workflow_complete: bool,
    pub conversation_turns: usize,
}

impl From<&ApplicantRecord> for SessionStatusView {
    fn from(record: &ApplicantRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            phone: record.phone.clone(),
            customer_name: record.customer_name.clone(),
            loan_status: record.loan_status,
            requested_loan_amount: record.requested_loan_amount,
            requested_tenure_months: record.requested_tenure_months,
            negotiated_interest_rate: record.negotiated_interest_rate,
            calculated_emi: record.calculated_emi,
            credit_score: record.credit_score,
            salary_slip_required: record.salary_slip_required,
            salary_slip_uploaded: record.salary_slip_uploaded,
            rejection_reason: record
                .rejection_reason
                .as_ref()
                .map(|reason| reason.summary()),
            sanction_document_ref: record
                .sanction_document_ref
                .as_ref()
                .map(|document| document.0.clone()),
            workflow_complete: record.workflow_complete,
            conversation_turns: record.conversation.len(),
        }
    }
}

/// One line of the session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub phone: String,
    pub customer_name: Option<String>,
    pub loan_status: LoanStatus,
    pub workflow_complete: bool,
}

impl From<&ApplicantRecord> for SessionSummary {
    fn from(record: &ApplicantRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            phone: record.phone.clone(),
            customer_name: record.customer_name.clone(),
            loan_status: record.loan_status,
            workflow_complete: record.workflow_complete,
        }
    }
}
