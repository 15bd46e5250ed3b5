//! Trait seams for every external system the workflow touches.
//!
//! The decision core only sees these interfaces; adapters in the API crate
//! (or tests) supply concrete lookups, reply generation, document rendering,
//! and slip reading. No call is retried here; retry and timeout policy
//! belongs to the adapter behind the seam.

use std::sync::Arc;

use mime::Mime;
use serde::{Deserialize, Serialize};

use super::domain::DocumentRef;
use super::prompts::ReplyPrompt;

/// Identity snapshot held by the KYC directory, keyed by phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Profile enrichment looked up by resolved customer name. A profile may
/// carry a cached bureau score; when it does not, underwriting fetches one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: u32,
    pub age: u8,
    pub city: String,
    pub current_loan_details: String,
    pub credit_score: Option<u16>,
    pub pre_approved_limit: f64,
}

/// A standing pre-approved offer; when present its rate is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreApprovedOffer {
    pub phone: String,
    pub offer_amount: f64,
    pub interest_rate: f64,
    pub tenure_months: u32,
}

/// Everything the sanction renderer needs to produce the approval artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionLetter {
    pub reference: String,
    pub customer_id: u32,
    pub customer_name: String,
    pub address: String,
    pub phone: String,
    pub loan_amount: f64,
    pub interest_rate_pct: f64,
    pub tenure_months: u32,
    pub monthly_emi: f64,
    pub total_interest: f64,
    pub total_repayment: f64,
}

/// Failure contacting an external collaborator. Lookup misses are not errors;
/// those surface as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {detail}")]
    Unavailable {
        service: &'static str,
        detail: String,
    },
}

/// KYC directory: phone number to verified identity.
pub trait IdentityDirectory: Send + Sync {
    fn verify_customer(&self, phone: &str) -> Result<Option<CustomerIdentity>, CollaboratorError>;
}

/// Customer master data, keyed by name.
pub trait CustomerDirectory: Send + Sync {
    fn profile_by_name(&self, name: &str) -> Result<Option<CustomerProfile>, CollaboratorError>;
}

/// Credit bureau; scores range 300–900 when present.
pub trait CreditBureau: Send + Sync {
    fn credit_score(&self, phone: &str) -> Result<Option<u16>, CollaboratorError>;
}

/// Pre-approved offer desk.
pub trait OfferDesk: Send + Sync {
    fn offer_for(&self, phone: &str) -> Result<Option<PreApprovedOffer>, CollaboratorError>;
}

/// Conversational reply generation. Output may be non-deterministic and is
/// never allowed to influence branching; on failure the engine falls back to
/// the prompt's deterministic template.
pub trait ReplyWriter: Send + Sync {
    fn compose(&self, prompt: &ReplyPrompt) -> Result<String, CollaboratorError>;
}

/// Renders the formal approval artifact and serves it back for download.
/// Assumed synchronous; failure is reported to the caller rather than
/// swallowed.
pub trait SanctionRenderer: Send + Sync {
    fn render(&self, letter: &SanctionLetter) -> Result<DocumentRef, CollaboratorError>;

    /// Retrieve a previously rendered artifact. `Ok(None)` means no document
    /// exists behind the handle any more.
    fn fetch(&self, document: &DocumentRef) -> Result<Option<Vec<u8>>, CollaboratorError>;
}

/// OCR/PDF text extraction over an uploaded salary slip. Returning `Ok(None)`
/// (nothing extractable) is a normal, expected outcome.
pub trait SlipReader: Send + Sync {
    fn monthly_income(&self, bytes: &[u8], mime: &Mime)
        -> Result<Option<f64>, CollaboratorError>;
}

/// Bundle of collaborator handles injected into the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityDirectory>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub bureau: Arc<dyn CreditBureau>,
    pub offers: Arc<dyn OfferDesk>,
    pub writer: Arc<dyn ReplyWriter>,
    pub renderer: Arc<dyn SanctionRenderer>,
    pub slips: Arc<dyn SlipReader>,
}
