//! Reply contexts handed to the text-generation collaborator.
//!
//! Each prompt carries the structured fields a generator needs plus a
//! deterministic fallback template. Generated prose is presentation only:
//! branching never reads it, and a generator outage silently degrades to the
//! fallback so the conversation keeps moving.

use tracing::warn;

use super::collaborators::ReplyWriter;
use super::domain::{format_inr, ApplicantRecord, LoanStatus};

/// Which negotiation field is still missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDetail {
    Amount,
    Tenure,
    Both,
}

impl MissingDetail {
    fn noun(self) -> &'static str {
        match self {
            MissingDetail::Amount => "loan amount",
            MissingDetail::Tenure => "tenure",
            MissingDetail::Both => "loan amount and tenure",
        }
    }
}

/// Structured context for one generated reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPrompt {
    Greeting {
        name: String,
        city: Option<String>,
        current_loans: Option<String>,
    },
    MissingDetail {
        missing: MissingDetail,
        pre_approved_limit: Option<f64>,
        last_message: String,
    },
    OfferPresentation {
        name: String,
        amount: f64,
        tenure_months: u32,
        rate_pct: f64,
        emi: f64,
    },
    KycConfirmation {
        name: String,
        verified: bool,
    },
    InstantApproval {
        name: String,
        credit_score: u16,
        amount: f64,
        pre_approved_limit: f64,
    },
    SalaryVerifiedApproval {
        name: String,
        monthly_salary: f64,
        emi: f64,
        emi_pct: f64,
    },
}

impl ReplyPrompt {
    /// Free-form instructions for an LLM-backed writer.
    pub fn instructions(&self) -> String {
        match self {
            ReplyPrompt::Greeting {
                name,
                city,
                current_loans,
            } => format!(
                "You are a friendly loan officer at a bank in India.\n\
                 Customer: {name}\nCity: {}\nExisting loans: {}\n\n\
                 Write a warm, professional greeting (2-3 sentences): welcome \
                 them by name, say you can help with personal loans, and ask \
                 what loan amount they need.",
                city.as_deref().unwrap_or("N/A"),
                current_loans.as_deref().unwrap_or("None"),
            ),
            ReplyPrompt::MissingDetail {
                missing,
                pre_approved_limit,
                last_message,
            } => format!(
                "You are a sales agent helping with a personal loan.\n\
                 Pre-approved limit: {}\nMissing information: {}\n\
                 Customer said: \"{last_message}\"\n\n\
                 Generate a brief, friendly response that acknowledges what \
                 they said and asks for the missing {}.",
                pre_approved_limit
                    .map(|limit| format!("₹{}", format_inr(limit)))
                    .unwrap_or_else(|| "unknown".to_string()),
                missing.noun(),
                missing.noun(),
            ),
            ReplyPrompt::OfferPresentation {
                name,
                amount,
                tenure_months,
                rate_pct,
                emi,
            } => format!(
                "You are a sales agent presenting a personal loan offer.\n\
                 Customer: {name}\nAmount: ₹{}\nTenure: {tenure_months} months\n\
                 Rate: {rate_pct}% p.a.\nEMI: ₹{}\n\n\
                 Present the offer enthusiastically in 2-3 sentences and say \
                 you are moving to verification.",
                format_inr(*amount),
                format_inr(*emi),
            ),
            ReplyPrompt::KycConfirmation { name, verified } => format!(
                "You are a verification agent at a bank.\nCustomer: {name}\n\
                 KYC status: {}\n\n\
                 Generate a brief message (2-3 sentences) confirming the KYC \
                 check against our records and saying the credit check is next.",
                if *verified { "Verified" } else { "Failed" },
            ),
            ReplyPrompt::InstantApproval {
                name,
                credit_score,
                amount,
                pre_approved_limit,
            } => format!(
                "You are an underwriting agent approving a loan.\n\
                 Customer: {name}\nCredit score: {credit_score}/900\n\
                 Amount: ₹{}\nPre-approved limit: ₹{}\n\n\
                 Status: INSTANT APPROVAL (within pre-approved limit). \
                 Congratulate them in 2-3 sentences and say the sanction \
                 letter is being generated.",
                format_inr(*amount),
                format_inr(*pre_approved_limit),
            ),
            ReplyPrompt::SalaryVerifiedApproval {
                name,
                monthly_salary,
                emi,
                emi_pct,
            } => format!(
                "You are an underwriting agent approving a loan after salary \
                 verification.\nCustomer: {name}\nMonthly salary: ₹{}\n\
                 Monthly EMI: ₹{} ({emi_pct:.1}% of salary)\n\n\
                 Status: APPROVED. Confirm the salary verification and say \
                 the sanction letter is being generated (2-3 sentences).",
                format_inr(*monthly_salary),
                format_inr(*emi),
            ),
        }
    }

    /// Deterministic template used when the writer is unavailable.
    pub fn fallback(&self) -> String {
        match self {
            ReplyPrompt::Greeting { name, .. } => format!(
                "Welcome, {name}! I can help you with a personal loan today. \
                 What loan amount do you have in mind?"
            ),
            ReplyPrompt::MissingDetail {
                missing,
                pre_approved_limit,
                ..
            } => {
                let limit_note = pre_approved_limit
                    .map(|limit| {
                        format!(" You are pre-approved up to ₹{}.", format_inr(limit))
                    })
                    .unwrap_or_default();
                format!(
                    "Thanks! To put together your offer I still need your {}.{}",
                    missing.noun(),
                    limit_note
                )
            }
            ReplyPrompt::OfferPresentation {
                amount,
                tenure_months,
                rate_pct,
                emi,
                ..
            } => format!(
                "Here is your offer: ₹{} over {tenure_months} months at \
                 {rate_pct}% p.a., which works out to a monthly EMI of ₹{}. \
                 Let me verify your details next.",
                format_inr(*amount),
                format_inr(*emi),
            ),
            ReplyPrompt::KycConfirmation { name, verified } => {
                if *verified {
                    format!(
                        "Thank you, {name}. Your KYC details are verified against \
                         our records. Proceeding with the credit check now."
                    )
                } else {
                    format!(
                        "Thank you, {name}. We could not fully verify your KYC \
                         details, but we will proceed with the credit check."
                    )
                }
            }
            ReplyPrompt::InstantApproval { name, .. } => format!(
                "Great news, {name}: your loan is approved instantly within \
                 your pre-approved limit! Your sanction letter is being \
                 generated."
            ),
            ReplyPrompt::SalaryVerifiedApproval { name, emi_pct, .. } => format!(
                "Salary verification complete, {name}. Your EMI is {emi_pct:.1}% \
                 of your monthly salary, well within our affordability norms. \
                 Your loan is approved and the sanction letter is being \
                 generated."
            ),
        }
    }
}

/// Compose through the writer, degrading to the deterministic fallback on
/// failure. Generated text never feeds back into branching.
pub fn compose_or_fallback(writer: &dyn ReplyWriter, prompt: &ReplyPrompt) -> String {
    match writer.compose(prompt) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => prompt.fallback(),
        Err(err) => {
            warn!(error = %err, "reply writer unavailable, using fallback template");
            prompt.fallback()
        }
    }
}

/// Static apology when the phone number is unknown to the KYC directory.
pub const IDENTITY_NOT_FOUND: &str =
    "I'm sorry, I couldn't find your details in our system. Please contact customer support.";

/// Final human-readable summary for a settled or paused application. These
/// are deliberately templated, not generated: the closing message restates
/// decision data and must never drift from it.
pub fn closing_message(record: &ApplicantRecord) -> Option<String> {
    match record.loan_status {
        LoanStatus::Approved => Some(approved_summary(record)),
        LoanStatus::Rejected => Some(rejection_summary(record)),
        LoanStatus::AwaitingSalarySlip => Some(document_request(record)),
        _ => None,
    }
}

fn approved_summary(record: &ApplicantRecord) -> String {
    let amount = record.requested_loan_amount.unwrap_or_default();
    let tenure = record.requested_tenure_months.unwrap_or_default();
    let rate = record.negotiated_interest_rate.unwrap_or_default();
    let emi = record.calculated_emi.unwrap_or_default();

    format!(
        "Congratulations {}!\n\nYour personal loan has been APPROVED.\n\n\
         Loan amount: ₹{}\nTenure: {tenure} months\nInterest rate: {rate}% p.a.\n\
         Monthly EMI: ₹{}\n\nYour sanction letter is ready for download. \
         Thank you for choosing our services!",
        record.salutation(),
        format_inr(amount),
        format_inr(emi),
    )
}

fn rejection_summary(record: &ApplicantRecord) -> String {
    let reason = record
        .rejection_reason
        .as_ref()
        .map(|reason| reason.summary())
        .unwrap_or_else(|| "Application did not meet our lending criteria".to_string());
    let score_note = record
        .credit_score
        .map(|score| format!("{score}/900"))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "Dear {},\n\nWe regret to inform you that we cannot approve your loan \
         application at this time.\n\nReason: {reason}\n\nWhat you can do:\n\
         - Improve your credit score (current: {score_note})\n\
         - Apply for a smaller loan amount\n- Clear existing loan dues\n\
         - Reapply after 3 months\n\nThank you for your interest.",
        record.salutation(),
    )
}

fn document_request(record: &ApplicantRecord) -> String {
    let amount = record.requested_loan_amount.unwrap_or_default();
    let emi = record.calculated_emi.unwrap_or_default();
    let ratio_note = match (record.requested_loan_amount, record.pre_approved_limit) {
        (Some(amount), Some(limit)) if limit > 0.0 => {
            format!(
                "- Your requested loan is {:.1}x your pre-approved limit\n",
                amount / limit
            )
        }
        _ => String::new(),
    };

    format!(
        "Document required.\n\nTo proceed with your loan of ₹{}, we need to \
         verify your income. Please upload your latest salary slip.\n\n\
         Why we need this:\n{ratio_note}- We need to ensure your EMI (₹{}) \
         stays within 50% of your salary\n\nAccepted formats: PDF, JPG, PNG. \
         Once uploaded, approval is instant!",
        format_inr(amount),
        format_inr(emi),
    )
}
