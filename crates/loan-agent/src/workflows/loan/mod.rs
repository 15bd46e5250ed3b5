//! Conversational personal-loan origination pipeline.
//!
//! A single mutable applicant record is threaded through a fixed sequence of
//! stages (intake, negotiation, verification, underwriting, sanction); the
//! engine chains stages within one interaction while the record is
//! data-complete and yields whenever more customer input or a document is
//! needed. External systems sit behind the trait seams in [`collaborators`].

pub mod collaborators;
pub mod domain;
pub mod emi;
pub mod engine;
pub mod extract;
pub mod prompts;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use collaborators::{
    CollaboratorError, Collaborators, CreditBureau, CustomerDirectory, CustomerIdentity,
    CustomerProfile, IdentityDirectory, OfferDesk, PreApprovedOffer, ReplyWriter,
    SanctionLetter, SanctionRenderer, SlipReader,
};
pub use domain::{
    format_inr, ApplicantRecord, ConversationEntry, DocumentRef, LoanStatus, MessageRole,
    RejectionReason, SessionId,
};
pub use emi::{monthly_installment, EmiError};
pub use engine::{Stage, UnderwritingPolicy, WorkflowEngine, WorkflowError};
pub use extract::{loan_details, salary_figure, LoanDetails};
pub use prompts::{MissingDetail, ReplyPrompt};
pub use repository::{
    SessionStatusView, SessionStore, SessionStoreError, SessionSummary,
};
pub use router::loan_router;
pub use service::{
    ChatReply, ChatTurn, LoanSessionService, RequiredAction, SanctionDocument,
    SessionServiceError,
};
