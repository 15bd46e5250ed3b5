//! Stage handlers and the routing trampoline for a loan application.
//!
//! Each inbound interaction drives the record from its entry stage and keeps
//! chaining while the active stage leaves the record in a data-complete
//! intermediate state. The chain yields when the conversation needs more
//! customer input or the application has settled. Branching reads structured
//! record fields only; generated prose never participates in a decision.

use mime::Mime;
use tracing::{debug, info, warn};

use super::collaborators::{Collaborators, SanctionLetter};
use super::domain::{ApplicantRecord, DocumentRef, LoanStatus, RejectionReason};
use super::emi::{self, EmiError};
use super::extract;
use super::prompts::{self, MissingDetail, ReplyPrompt};

/// Thresholds and rate bands applied by underwriting and negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct UnderwritingPolicy {
    /// Scores below this are rejected outright.
    pub minimum_credit_score: u16,
    /// Loan-to-limit ratio at or under which approval is instant.
    pub instant_limit_multiple: f64,
    /// Loan-to-limit ratio above which the application is declined.
    pub maximum_limit_multiple: f64,
    /// Highest tolerable EMI as a percentage of verified monthly salary.
    pub emi_salary_cap_pct: f64,
    /// Default annual rates by tenure band, applied when no standing offer
    /// carries an authoritative rate.
    pub short_tenure_rate_pct: f64,
    pub mid_tenure_rate_pct: f64,
    pub long_tenure_rate_pct: f64,
    pub short_tenure_cutoff_months: u32,
    pub mid_tenure_cutoff_months: u32,
    /// Hard cap on chained stage hops within one interaction.
    pub max_chain_depth: usize,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            minimum_credit_score: 700,
            instant_limit_multiple: 1.0,
            maximum_limit_multiple: 2.0,
            emi_salary_cap_pct: 50.0,
            short_tenure_rate_pct: 10.5,
            mid_tenure_rate_pct: 11.5,
            long_tenure_rate_pct: 12.5,
            short_tenure_cutoff_months: 12,
            mid_tenure_cutoff_months: 24,
            max_chain_depth: 8,
        }
    }
}

impl UnderwritingPolicy {
    /// Tenure-banded default annual rate.
    pub fn default_rate(&self, tenure_months: u32) -> f64 {
        if tenure_months <= self.short_tenure_cutoff_months {
            self.short_tenure_rate_pct
        } else if tenure_months <= self.mid_tenure_cutoff_months {
            self.mid_tenure_rate_pct
        } else {
            self.long_tenure_rate_pct
        }
    }
}

/// Failure while driving a workflow invocation.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Collaborator(#[from] super::collaborators::CollaboratorError),
    #[error("stage chain exceeded {limit} hops for session {session}")]
    ChainOverflow { session: String, limit: usize },
    #[error("workflow precondition violated: {0}")]
    Precondition(String),
}

impl From<EmiError> for WorkflowError {
    fn from(err: EmiError) -> Self {
        WorkflowError::Precondition(err.to_string())
    }
}

/// Pipeline stages, in routing order. `Closing` renders the settled-state
/// summary and always yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Intake,
    Negotiation,
    Verification,
    Underwriting,
    Sanction,
    Closing,
}

impl Stage {
    /// Entry stage for an inbound interaction, derived from the status the
    /// record was left in. Settled and paused records re-enter through
    /// `Closing`, which restates the standing outcome.
    pub fn entry(record: &ApplicantRecord) -> Stage {
        match record.loan_status {
            LoanStatus::Initial => Stage::Intake,
            LoanStatus::Negotiating => Stage::Negotiation,
            LoanStatus::Verifying => Stage::Verification,
            LoanStatus::Underwriting => Stage::Underwriting,
            LoanStatus::AwaitingSalarySlip | LoanStatus::Approved | LoanStatus::Rejected => {
                Stage::Closing
            }
        }
    }
}

/// Chain-vs-yield decision after a stage completes.
enum Route {
    Chain(Stage),
    Yield,
}

/// Drives one applicant record through the stage pipeline.
pub struct WorkflowEngine {
    collaborators: Collaborators,
    policy: UnderwritingPolicy,
}

impl WorkflowEngine {
    pub fn new(collaborators: Collaborators, policy: UnderwritingPolicy) -> Self {
        Self {
            collaborators,
            policy,
        }
    }

    pub fn policy(&self) -> &UnderwritingPolicy {
        &self.policy
    }

    /// Run the record from its entry stage until a stage yields. Bounded by
    /// `max_chain_depth` so a routing mistake surfaces as an error instead of
    /// a spin.
    pub fn drive(&self, record: &mut ApplicantRecord) -> Result<(), WorkflowError> {
        let mut stage = Stage::entry(record);
        for _ in 0..=self.policy.max_chain_depth {
            debug!(
                session = %record.session_id.0,
                stage = ?stage,
                status = record.loan_status.label(),
                "running stage"
            );
            match self.run_stage(stage, record)? {
                Route::Chain(next) => stage = next,
                Route::Yield => return Ok(()),
            }
        }
        Err(WorkflowError::ChainOverflow {
            session: record.session_id.0.clone(),
            limit: self.policy.max_chain_depth,
        })
    }

    /// Pull a monthly income figure out of an uploaded salary slip. A result
    /// of `Ok(None)` means the document was unreadable; the record is not
    /// touched and the caller decides how to report it.
    pub fn read_salary_slip(
        &self,
        bytes: &[u8],
        mime: &Mime,
    ) -> Result<Option<f64>, WorkflowError> {
        Ok(self.collaborators.slips.monthly_income(bytes, mime)?)
    }

    /// Fetch the rendered sanction artifact behind a document handle.
    /// `Ok(None)` means the artifact no longer exists.
    pub fn fetch_sanction_letter(
        &self,
        document: &DocumentRef,
    ) -> Result<Option<Vec<u8>>, WorkflowError> {
        Ok(self.collaborators.renderer.fetch(document)?)
    }

    /// Record a verified salary figure and re-run underwriting, which now has
    /// the data to settle branch it previously paused on.
    pub fn resume_underwriting(
        &self,
        record: &mut ApplicantRecord,
        monthly_income: f64,
    ) -> Result<(), WorkflowError> {
        if record.loan_status != LoanStatus::AwaitingSalarySlip {
            return Err(WorkflowError::Precondition(format!(
                "salary slip submitted while session {} is {}",
                record.session_id.0,
                record.loan_status.label()
            )));
        }
        if monthly_income <= 0.0 {
            return Err(WorkflowError::Precondition(format!(
                "extracted monthly income must be positive, got {monthly_income}"
            )));
        }

        record.salary_slip_uploaded = true;
        record.monthly_salary = Some(monthly_income);
        record.loan_status = LoanStatus::Underwriting;
        self.drive(record)
    }

    fn run_stage(
        &self,
        stage: Stage,
        record: &mut ApplicantRecord,
    ) -> Result<Route, WorkflowError> {
        match stage {
            Stage::Intake => self.intake(record),
            Stage::Negotiation => self.negotiation(record),
            Stage::Verification => self.verification(record),
            Stage::Underwriting => self.underwriting(record),
            Stage::Sanction => self.sanction(record),
            Stage::Closing => Ok(Self::closing(record)),
        }
    }

    /// Resolve the caller's identity and enrich the record from the customer
    /// directory, then greet and hand over to negotiation.
    fn intake(&self, record: &mut ApplicantRecord) -> Result<Route, WorkflowError> {
        let Some(identity) = self.collaborators.identity.verify_customer(&record.phone)? else {
            info!(session = %record.session_id.0, "phone not found in identity directory");
            record.push_assistant(prompts::IDENTITY_NOT_FOUND);
            record.complete();
            return Ok(Route::Yield);
        };

        record.customer_name = Some(identity.name.clone());
        record.verified_phone = Some(identity.phone);
        record.verified_address = Some(identity.address);

        // Profile enrichment is best-effort: a directory outage degrades to
        // an un-enriched record rather than failing the interaction.
        match self.collaborators.customers.profile_by_name(&identity.name) {
            Ok(Some(profile)) => {
                record.customer_id = Some(profile.customer_id);
                record.age = Some(profile.age);
                record.city = Some(profile.city);
                record.current_loan_details = Some(profile.current_loan_details);
                if record.credit_score.is_none() {
                    record.credit_score = profile.credit_score;
                }
                record.pre_approved_limit = Some(profile.pre_approved_limit);
            }
            Ok(None) => {
                debug!(session = %record.session_id.0, "no customer profile on file");
            }
            Err(err) => {
                warn!(session = %record.session_id.0, error = %err, "profile lookup failed");
            }
        }

        let greeting = prompts::compose_or_fallback(
            self.collaborators.writer.as_ref(),
            &ReplyPrompt::Greeting {
                name: identity.name,
                city: record.city.clone(),
                current_loans: record.current_loan_details.clone(),
            },
        );
        record.push_assistant(greeting);
        record.loan_status = LoanStatus::Negotiating;

        Ok(Route::Chain(Stage::Negotiation))
    }

    /// Fill loan amount and tenure from the latest message, then price the
    /// loan and present the offer. Fields fill once; later messages never
    /// overwrite them.
    fn negotiation(&self, record: &mut ApplicantRecord) -> Result<Route, WorkflowError> {
        let message = record.last_customer_message().unwrap_or("").to_string();
        let details = extract::loan_details(&message);

        let amount = record.requested_loan_amount.or(details.amount);
        let tenure = record.requested_tenure_months.or(details.tenure_months);

        let (Some(amount), Some(tenure)) = (amount, tenure) else {
            let missing = match (amount, tenure) {
                (None, None) => MissingDetail::Both,
                (None, Some(_)) => MissingDetail::Amount,
                (Some(_), None) => MissingDetail::Tenure,
                (Some(_), Some(_)) => unreachable!("both fields present"),
            };
            record.requested_loan_amount = amount;
            record.requested_tenure_months = tenure;

            let question = prompts::compose_or_fallback(
                self.collaborators.writer.as_ref(),
                &ReplyPrompt::MissingDetail {
                    missing,
                    pre_approved_limit: record.pre_approved_limit,
                    last_message: message,
                },
            );
            record.push_assistant(question);
            return Ok(Route::Yield);
        };

        // Offer desk is consulted before any field is committed, so a lookup
        // failure leaves the record exactly as it entered the stage.
        let offer = self.collaborators.offers.offer_for(&record.phone)?;
        let rate = offer
            .map(|offer| offer.interest_rate)
            .unwrap_or_else(|| self.policy.default_rate(tenure));
        let installment = emi::monthly_installment(amount, rate, tenure)?;

        record.requested_loan_amount = Some(amount);
        record.requested_tenure_months = Some(tenure);
        record.negotiated_interest_rate = Some(rate);
        record.calculated_emi = Some(installment);

        let reply = prompts::compose_or_fallback(
            self.collaborators.writer.as_ref(),
            &ReplyPrompt::OfferPresentation {
                name: record.salutation().to_string(),
                amount,
                tenure_months: tenure,
                rate_pct: rate,
                emi: installment,
            },
        );
        record.push_assistant(reply);
        record.loan_status = LoanStatus::Verifying;

        Ok(Route::Chain(Stage::Verification))
    }

    /// Confirmation gate over the identity fields captured at intake; no
    /// independent lookup happens here.
    fn verification(&self, record: &mut ApplicantRecord) -> Result<Route, WorkflowError> {
        record.kyc_verified =
            record.verified_phone.is_some() && record.verified_address.is_some();

        let reply = prompts::compose_or_fallback(
            self.collaborators.writer.as_ref(),
            &ReplyPrompt::KycConfirmation {
                name: record.salutation().to_string(),
                verified: record.kyc_verified,
            },
        );
        record.push_assistant(reply);
        record.loan_status = LoanStatus::Underwriting;

        Ok(Route::Chain(Stage::Underwriting))
    }

    /// The decision core. Branches strictly on credit score, loan-to-limit
    /// ratio, and (when present) the EMI share of verified salary.
    fn underwriting(&self, record: &mut ApplicantRecord) -> Result<Route, WorkflowError> {
        let score = match record.credit_score {
            Some(score) => score,
            None => match self.collaborators.bureau.credit_score(&record.phone)? {
                Some(score) => {
                    record.credit_score = Some(score);
                    score
                }
                None => {
                    info!(session = %record.session_id.0, "no credit history on file");
                    Self::reject(record, RejectionReason::CreditHistoryUnavailable);
                    return Ok(Route::Chain(Stage::Closing));
                }
            },
        };
        if !(300..=900).contains(&score) {
            return Err(WorkflowError::Precondition(format!(
                "credit score {score} outside the 300-900 bureau range"
            )));
        }

        if score < self.policy.minimum_credit_score {
            info!(session = %record.session_id.0, score, "credit score below minimum");
            Self::reject(
                record,
                RejectionReason::CreditScoreBelowMinimum {
                    score,
                    minimum: self.policy.minimum_credit_score,
                },
            );
            return Ok(Route::Chain(Stage::Closing));
        }

        let amount = record
            .requested_loan_amount
            .ok_or_else(|| precondition("underwriting entered without a loan amount"))?;
        let installment = record
            .calculated_emi
            .ok_or_else(|| precondition("underwriting entered without a computed EMI"))?;
        let limit = record
            .pre_approved_limit
            .filter(|limit| *limit > 0.0)
            .ok_or_else(|| precondition("underwriting entered without a pre-approved limit"))?;

        let ratio = amount / limit;

        if ratio <= self.policy.instant_limit_multiple {
            info!(session = %record.session_id.0, ratio, "instant approval within limit");
            let reply = prompts::compose_or_fallback(
                self.collaborators.writer.as_ref(),
                &ReplyPrompt::InstantApproval {
                    name: record.salutation().to_string(),
                    credit_score: score,
                    amount,
                    pre_approved_limit: limit,
                },
            );
            record.push_assistant(reply);
            record.loan_status = LoanStatus::Approved;
            return Ok(Route::Chain(Stage::Sanction));
        }

        if ratio <= self.policy.maximum_limit_multiple {
            if record.salary_slip_uploaded {
                let salary = record
                    .monthly_salary
                    .filter(|salary| *salary > 0.0)
                    .ok_or_else(|| {
                        precondition("salary slip marked uploaded without a salary figure")
                    })?;
                let emi_pct = installment / salary * 100.0;

                if emi_pct <= self.policy.emi_salary_cap_pct {
                    info!(session = %record.session_id.0, emi_pct, "approved on verified salary");
                    let reply = prompts::compose_or_fallback(
                        self.collaborators.writer.as_ref(),
                        &ReplyPrompt::SalaryVerifiedApproval {
                            name: record.salutation().to_string(),
                            monthly_salary: salary,
                            emi: installment,
                            emi_pct,
                        },
                    );
                    record.push_assistant(reply);
                    record.loan_status = LoanStatus::Approved;
                    return Ok(Route::Chain(Stage::Sanction));
                }

                info!(session = %record.session_id.0, emi_pct, "EMI share over cap");
                Self::reject(
                    record,
                    RejectionReason::EmiExceedsSalaryShare {
                        emi: installment,
                        monthly_salary: salary,
                        cap_pct: self.policy.emi_salary_cap_pct,
                    },
                );
                return Ok(Route::Chain(Stage::Closing));
            }

            info!(session = %record.session_id.0, ratio, "pausing for salary verification");
            record.loan_status = LoanStatus::AwaitingSalarySlip;
            record.salary_slip_required = true;
            // Paused, not settled: the workflow stays open for the upload.
            return Ok(Route::Chain(Stage::Closing));
        }

        info!(session = %record.session_id.0, ratio, "requested amount over the limit multiple");
        Self::reject(
            record,
            RejectionReason::AmountExceedsLimitMultiple {
                requested: amount,
                cap: limit * self.policy.maximum_limit_multiple,
            },
        );
        Ok(Route::Chain(Stage::Closing))
    }

    /// Render the formal approval artifact. The renderer is called before any
    /// mutation so a rendering failure leaves the record approved-but-pending.
    fn sanction(&self, record: &mut ApplicantRecord) -> Result<Route, WorkflowError> {
        let amount = record
            .requested_loan_amount
            .ok_or_else(|| precondition("sanction entered without a loan amount"))?;
        let tenure = record
            .requested_tenure_months
            .ok_or_else(|| precondition("sanction entered without a tenure"))?;
        let rate = record
            .negotiated_interest_rate
            .ok_or_else(|| precondition("sanction entered without a negotiated rate"))?;
        let installment = record
            .calculated_emi
            .ok_or_else(|| precondition("sanction entered without a computed EMI"))?;
        let name = record
            .customer_name
            .clone()
            .ok_or_else(|| precondition("sanction entered without a verified identity"))?;

        let total_repayment = installment * f64::from(tenure);
        let letter = SanctionLetter {
            reference: record.session_id.0.clone(),
            customer_id: record.customer_id.unwrap_or_default(),
            customer_name: name,
            address: record.verified_address.clone().unwrap_or_default(),
            phone: record.phone.clone(),
            loan_amount: amount,
            interest_rate_pct: rate,
            tenure_months: tenure,
            monthly_emi: installment,
            total_interest: total_repayment - amount,
            total_repayment,
        };
        let document = self.collaborators.renderer.render(&letter)?;

        info!(session = %record.session_id.0, document = %document.0, "sanction letter issued");
        record.sanction_document_ref = Some(document);
        record.sanction_document_generated = true;
        record.loan_status = LoanStatus::Approved;
        record.complete();

        Ok(Route::Chain(Stage::Closing))
    }

    /// Restate the standing outcome for a settled or paused record. Always
    /// yields; a record in an intermediate state adds nothing here.
    fn closing(record: &mut ApplicantRecord) -> Route {
        if let Some(message) = prompts::closing_message(record) {
            record.push_assistant(message);
        }
        Route::Yield
    }

    fn reject(record: &mut ApplicantRecord, reason: RejectionReason) {
        record.loan_status = LoanStatus::Rejected;
        record.rejection_reason = Some(reason);
        record.complete();
    }
}

fn precondition(detail: &str) -> WorkflowError {
    WorkflowError::Precondition(detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_table_bands_by_tenure() {
        let policy = UnderwritingPolicy::default();
        assert_eq!(policy.default_rate(6), 10.5);
        assert_eq!(policy.default_rate(12), 10.5);
        assert_eq!(policy.default_rate(13), 11.5);
        assert_eq!(policy.default_rate(24), 11.5);
        assert_eq!(policy.default_rate(36), 12.5);
    }

    #[test]
    fn entry_stage_follows_status() {
        use super::super::domain::SessionId;

        let mut record = ApplicantRecord::new(SessionId("loan-000001".into()), "+911111");
        assert_eq!(Stage::entry(&record), Stage::Intake);

        record.loan_status = LoanStatus::Negotiating;
        assert_eq!(Stage::entry(&record), Stage::Negotiation);

        record.loan_status = LoanStatus::AwaitingSalarySlip;
        assert_eq!(Stage::entry(&record), Stage::Closing);

        record.loan_status = LoanStatus::Rejected;
        assert_eq!(Stage::entry(&record), Stage::Closing);
    }
}
