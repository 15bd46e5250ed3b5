use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for conversation sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Opaque handle to a rendered sanction document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

/// Who produced a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Customer,
    Assistant,
}

/// One turn of the conversation log. Insertion order is significant and the
/// log is never reordered or deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: MessageRole,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Forward-only status of a loan application session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Initial,
    Negotiating,
    Verifying,
    Underwriting,
    AwaitingSalarySlip,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Initial => "initial",
            LoanStatus::Negotiating => "negotiating",
            LoanStatus::Verifying => "verifying",
            LoanStatus::Underwriting => "underwriting",
            LoanStatus::AwaitingSalarySlip => "awaiting_salary_slip",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Rejected)
    }
}

/// Structured grounds for a terminal rejection, so adverse outcomes carry
/// data rather than prose. The prose is rendered by [`RejectionReason::summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    CreditScoreBelowMinimum { score: u16, minimum: u16 },
    CreditHistoryUnavailable,
    EmiExceedsSalaryShare { emi: f64, monthly_salary: f64, cap_pct: f64 },
    /// `cap` is the hard ceiling itself (the limit multiple already applied),
    /// so the summary can quote the figure the request actually exceeded.
    AmountExceedsLimitMultiple { requested: f64, cap: f64 },
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::CreditScoreBelowMinimum { score, minimum } => format!(
                "Credit score ({score}/900) is below the minimum requirement of {minimum}"
            ),
            RejectionReason::CreditHistoryUnavailable => {
                "No credit history could be found for the registered phone number".to_string()
            }
            RejectionReason::EmiExceedsSalaryShare {
                emi,
                monthly_salary,
                cap_pct,
            } => format!(
                "Monthly EMI (₹{}) exceeds {:.0}% of your monthly salary (₹{})",
                format_inr(*emi),
                cap_pct,
                format_inr(*monthly_salary)
            ),
            RejectionReason::AmountExceedsLimitMultiple { requested, cap } => format!(
                "Requested amount (₹{}) exceeds 2x your pre-approved limit (₹{})",
                format_inr(*requested),
                format_inr(*cap)
            ),
        }
    }
}

/// The single mutable application record threaded through every stage.
///
/// Owned exclusively by the in-flight workflow invocation for its session;
/// the service layer serializes access per session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub session_id: SessionId,
    pub phone: String,

    pub customer_id: Option<u32>,
    pub customer_name: Option<String>,
    pub age: Option<u8>,
    pub city: Option<String>,
    pub verified_phone: Option<String>,
    pub verified_address: Option<String>,
    pub current_loan_details: Option<String>,

    pub requested_loan_amount: Option<f64>,
    pub requested_tenure_months: Option<u32>,
    pub negotiated_interest_rate: Option<f64>,
    pub calculated_emi: Option<f64>,

    pub credit_score: Option<u16>,
    pub pre_approved_limit: Option<f64>,

    pub kyc_verified: bool,
    pub salary_slip_required: bool,
    pub salary_slip_uploaded: bool,
    pub monthly_salary: Option<f64>,

    pub loan_status: LoanStatus,
    pub rejection_reason: Option<RejectionReason>,
    pub sanction_document_generated: bool,
    pub sanction_document_ref: Option<DocumentRef>,

    pub conversation: Vec<ConversationEntry>,
    pub workflow_complete: bool,
}

impl ApplicantRecord {
    /// Fresh record for a new session: every optional field unset, status
    /// `initial`, nothing spoken yet.
    pub fn new(session_id: SessionId, phone: impl Into<String>) -> Self {
        Self {
            session_id,
            phone: phone.into(),
            customer_id: None,
            customer_name: None,
            age: None,
            city: None,
            verified_phone: None,
            verified_address: None,
            current_loan_details: None,
            requested_loan_amount: None,
            requested_tenure_months: None,
            negotiated_interest_rate: None,
            calculated_emi: None,
            credit_score: None,
            pre_approved_limit: None,
            kyc_verified: false,
            salary_slip_required: false,
            salary_slip_uploaded: false,
            monthly_salary: None,
            loan_status: LoanStatus::Initial,
            rejection_reason: None,
            sanction_document_generated: false,
            sanction_document_ref: None,
            conversation: Vec::new(),
            workflow_complete: false,
        }
    }

    pub fn push_customer(&mut self, body: impl Into<String>) {
        self.conversation.push(ConversationEntry {
            role: MessageRole::Customer,
            body: body.into(),
            at: Utc::now(),
        });
    }

    pub fn push_assistant(&mut self, body: impl Into<String>) {
        self.conversation.push(ConversationEntry {
            role: MessageRole::Assistant,
            body: body.into(),
            at: Utc::now(),
        });
    }

    pub fn last_customer_message(&self) -> Option<&str> {
        self.conversation
            .iter()
            .rev()
            .find(|entry| entry.role == MessageRole::Customer)
            .map(|entry| entry.body.as_str())
    }

    pub fn latest_reply(&self) -> Option<&str> {
        self.conversation
            .iter()
            .rev()
            .find(|entry| entry.role == MessageRole::Assistant)
            .map(|entry| entry.body.as_str())
    }

    /// Friendly salutation when identity has been confirmed, neutral otherwise.
    pub fn salutation(&self) -> &str {
        self.customer_name.as_deref().unwrap_or("there")
    }

    /// Mark the workflow complete. Monotonic: once set it stays set.
    pub fn complete(&mut self) {
        self.workflow_complete = true;
    }
}

/// Format a rupee amount with Indian digit grouping (12,34,567), dropping
/// fractional paise the way customer-facing copy does.
pub fn format_inr(amount: f64) -> String {
    let negative = amount < 0.0;
    let rounded = amount.abs().round() as u64;
    let digits = rounded.to_string();

    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut parts = Vec::new();
        let head_bytes = head.as_bytes();
        let mut idx = head_bytes.len();
        while idx > 2 {
            parts.push(&head[idx - 2..idx]);
            idx -= 2;
        }
        parts.push(&head[..idx]);
        parts.reverse();
        format!("{},{}", parts.join(","), tail)
    };

    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}
