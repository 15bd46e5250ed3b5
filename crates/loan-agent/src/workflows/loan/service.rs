//! Session-level facade over the workflow engine.
//!
//! Owns session id allocation, per-session exclusivity, and the
//! copy-mutate-commit discipline: every interaction drives a working copy of
//! the record and commits it to the store only after the engine finishes, so
//! a failing stage never leaves a half-written session behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use mime::Mime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{ApplicantRecord, DocumentRef, LoanStatus, SessionId};
use super::engine::{WorkflowEngine, WorkflowError};
use super::repository::{SessionStore, SessionStoreError, SessionStatusView, SessionSummary};

/// One inbound chat interaction. A missing `session_id` opens a new session.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub phone: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// What the caller must do next to move the application forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAction {
    UploadSalarySlip,
    DownloadSanctionLetter,
}

/// Outcome of one chat or upload interaction.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: SessionId,
    pub reply: String,
    pub loan_status: LoanStatus,
    pub required_action: Option<RequiredAction>,
}

/// A rendered sanction letter served back to the caller.
#[derive(Debug, Clone)]
pub struct SanctionDocument {
    pub reference: DocumentRef,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("no income figure could be read from the uploaded document")]
    UnreadableDocument,
    #[error("no sanction letter is available for session {0}")]
    SanctionLetterUnavailable(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(SessionStoreError),
}

fn map_store(err: SessionStoreError) -> SessionServiceError {
    match err {
        SessionStoreError::NotFound(id) => SessionServiceError::NotFound(id),
        other => SessionServiceError::Store(other),
    }
}

/// Drives loan sessions against a store, one invocation in flight per
/// session id at a time.
pub struct LoanSessionService<S> {
    store: S,
    engine: WorkflowEngine,
    next_session: AtomicU64,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl<S: SessionStore> LoanSessionService<S> {
    pub fn new(store: S, engine: WorkflowEngine) -> Self {
        Self {
            store,
            engine,
            next_session: AtomicU64::new(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Append the customer message and drive the workflow until it yields.
    pub fn chat(&self, turn: ChatTurn) -> Result<ChatReply, SessionServiceError> {
        match turn.session_id {
            Some(session_id) => self.continue_session(session_id, turn.message),
            None => self.open_session(turn.phone, turn.message),
        }
    }

    fn open_session(
        &self,
        phone: String,
        message: String,
    ) -> Result<ChatReply, SessionServiceError> {
        let session_id = self.allocate_session_id();
        let lock = self.session_lock(&session_id);
        let _guard = acquire(&lock);

        info!(session = %session_id.0, "opening loan session");
        let mut record = ApplicantRecord::new(session_id, &phone);
        record.push_customer(message);
        self.engine.drive(&mut record)?;

        let reply = Self::reply_for(&record);
        self.store.insert(record).map_err(map_store)?;
        Ok(reply)
    }

    fn continue_session(
        &self,
        session_id: SessionId,
        message: String,
    ) -> Result<ChatReply, SessionServiceError> {
        let lock = self.session_lock(&session_id);
        let _guard = acquire(&lock);

        let mut record = self.store.fetch(&session_id).map_err(map_store)?;
        debug!(
            session = %session_id.0,
            status = record.loan_status.label(),
            "continuing loan session"
        );
        record.push_customer(message);
        self.engine.drive(&mut record)?;

        let reply = Self::reply_for(&record);
        self.store.update(record).map_err(map_store)?;
        Ok(reply)
    }

    /// Handle an uploaded salary slip and re-drive underwriting. An
    /// unreadable document is reported without touching the stored record.
    pub fn submit_salary_slip(
        &self,
        session_id: SessionId,
        bytes: &[u8],
        mime: &Mime,
    ) -> Result<ChatReply, SessionServiceError> {
        let lock = self.session_lock(&session_id);
        let _guard = acquire(&lock);

        let mut record = self.store.fetch(&session_id).map_err(map_store)?;
        let income = self
            .engine
            .read_salary_slip(bytes, mime)?
            .ok_or(SessionServiceError::UnreadableDocument)?;

        info!(session = %session_id.0, income, "salary slip accepted");
        self.engine.resume_underwriting(&mut record, income)?;

        let reply = Self::reply_for(&record);
        self.store.update(record).map_err(map_store)?;
        Ok(reply)
    }

    /// Serve the rendered sanction letter for an approved session. Absent
    /// until the sanction stage has issued one.
    pub fn sanction_letter(
        &self,
        session_id: &SessionId,
    ) -> Result<SanctionDocument, SessionServiceError> {
        let record = self.store.fetch(session_id).map_err(map_store)?;
        let reference = record.sanction_document_ref.clone().ok_or_else(|| {
            SessionServiceError::SanctionLetterUnavailable(session_id.0.clone())
        })?;
        let bytes = self
            .engine
            .fetch_sanction_letter(&reference)?
            .ok_or_else(|| {
                SessionServiceError::SanctionLetterUnavailable(session_id.0.clone())
            })?;
        Ok(SanctionDocument { reference, bytes })
    }

    pub fn status(&self, session_id: &SessionId) -> Result<SessionStatusView, SessionServiceError> {
        let record = self.store.fetch(session_id).map_err(map_store)?;
        Ok(SessionStatusView::from(&record))
    }

    pub fn delete(&self, session_id: &SessionId) -> Result<(), SessionServiceError> {
        let lock = self.session_lock(session_id);
        let _guard = acquire(&lock);

        self.store.delete(session_id).map_err(map_store)?;
        info!(session = %session_id.0, "loan session deleted");

        let mut locks = acquire(&self.locks);
        locks.remove(session_id);
        Ok(())
    }

    pub fn sessions(&self) -> Result<Vec<SessionSummary>, SessionServiceError> {
        let records = self.store.list().map_err(map_store)?;
        Ok(records.iter().map(SessionSummary::from).collect())
    }

    fn allocate_session_id(&self) -> SessionId {
        let seq = self.next_session.fetch_add(1, Ordering::Relaxed);
        SessionId(format!("loan-{seq:06}"))
    }

    fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = acquire(&self.locks);
        locks.entry(session_id.clone()).or_default().clone()
    }

    fn reply_for(record: &ApplicantRecord) -> ChatReply {
        let required_action = match record.loan_status {
            LoanStatus::AwaitingSalarySlip => Some(RequiredAction::UploadSalarySlip),
            LoanStatus::Approved if record.sanction_document_generated => {
                Some(RequiredAction::DownloadSanctionLetter)
            }
            _ => None,
        };
        ChatReply {
            session_id: record.session_id.clone(),
            reply: record.latest_reply().unwrap_or_default().to_string(),
            loan_status: record.loan_status,
            required_action,
        }
    }
}

/// Lock acquisition that shrugs off poisoning: a panic mid-interaction must
/// not wedge the session forever.
fn acquire<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
