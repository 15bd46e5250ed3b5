use chrono::Local;
use metrics_exporter_prometheus::PrometheusHandle;
use mime::Mime;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use loan_agent::workflows::loan::{
    format_inr, salary_figure, ApplicantRecord, CollaboratorError, Collaborators, CreditBureau,
    CustomerDirectory, CustomerIdentity, CustomerProfile, DocumentRef, IdentityDirectory,
    OfferDesk, PreApprovedOffer, ReplyPrompt, ReplyWriter, SanctionLetter, SanctionRenderer,
    SessionId, SessionStore, SessionStoreError, SlipReader,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionStore {
    records: Arc<Mutex<HashMap<SessionId, ApplicantRecord>>>,
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, record: ApplicantRecord) -> Result<(), SessionStoreError> {
        let mut guard = self.records.lock().expect("session mutex poisoned");
        if guard.contains_key(&record.session_id) {
            return Err(SessionStoreError::Conflict(record.session_id.0.clone()));
        }
        guard.insert(record.session_id.clone(), record);
        Ok(())
    }

    fn update(&self, record: ApplicantRecord) -> Result<(), SessionStoreError> {
        let mut guard = self.records.lock().expect("session mutex poisoned");
        if !guard.contains_key(&record.session_id) {
            return Err(SessionStoreError::NotFound(record.session_id.0.clone()));
        }
        guard.insert(record.session_id.clone(), record);
        Ok(())
    }

    fn fetch(&self, session_id: &SessionId) -> Result<ApplicantRecord, SessionStoreError> {
        let guard = self.records.lock().expect("session mutex poisoned");
        guard
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionStoreError::NotFound(session_id.0.clone()))
    }

    fn delete(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let mut guard = self.records.lock().expect("session mutex poisoned");
        guard
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| SessionStoreError::NotFound(session_id.0.clone()))
    }

    fn list(&self) -> Result<Vec<ApplicantRecord>, SessionStoreError> {
        let guard = self.records.lock().expect("session mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Static lookup data standing in for the CRM, customer master, credit
/// bureau, and offer systems. Replace with HTTP-backed adapters when those
/// services come online.
pub(crate) struct FixtureDirectory {
    identities: HashMap<String, CustomerIdentity>,
    profiles: HashMap<String, CustomerProfile>,
    scores: HashMap<String, u16>,
    offers: HashMap<String, PreApprovedOffer>,
}

impl FixtureDirectory {
    pub(crate) fn seeded() -> Self {
        let mut identities = HashMap::new();
        let mut profiles = HashMap::new();
        let mut scores = HashMap::new();
        let mut offers = HashMap::new();

        let seed = [
            (
                "+917835414968",
                "Amit Sharma",
                "14 Lake View Road, Pune, Maharashtra",
                1_001,
                34,
                "Pune",
                "Car loan, ₹8,500/month",
                752_u16,
                300_000.0,
            ),
            (
                "+919812066233",
                "Priya Nair",
                "18 Residency Road, Bengaluru, Karnataka",
                1_002,
                29,
                "Bengaluru",
                "None",
                781,
                500_000.0,
            ),
            (
                "+919900115672",
                "Rahul Verma",
                "7 Civil Lines, Jaipur, Rajasthan",
                1_003,
                41,
                "Jaipur",
                "Home loan, ₹22,000/month",
                648,
                200_000.0,
            ),
        ];

        for (phone, name, address, customer_id, age, city, loans, score, limit) in seed {
            identities.insert(
                phone.to_string(),
                CustomerIdentity {
                    name: name.to_string(),
                    phone: phone.to_string(),
                    address: address.to_string(),
                },
            );
            profiles.insert(
                name.to_string(),
                CustomerProfile {
                    customer_id,
                    age,
                    city: city.to_string(),
                    current_loan_details: loans.to_string(),
                    credit_score: None,
                    pre_approved_limit: limit,
                },
            );
            scores.insert(phone.to_string(), score);
        }

        offers.insert(
            "+919812066233".to_string(),
            PreApprovedOffer {
                phone: "+919812066233".to_string(),
                offer_amount: 400_000.0,
                interest_rate: 10.25,
                tenure_months: 24,
            },
        );

        Self {
            identities,
            profiles,
            scores,
            offers,
        }
    }
}

impl IdentityDirectory for FixtureDirectory {
    fn verify_customer(&self, phone: &str) -> Result<Option<CustomerIdentity>, CollaboratorError> {
        Ok(self.identities.get(phone).cloned())
    }
}

impl CustomerDirectory for FixtureDirectory {
    fn profile_by_name(&self, name: &str) -> Result<Option<CustomerProfile>, CollaboratorError> {
        Ok(self.profiles.get(name).cloned())
    }
}

impl CreditBureau for FixtureDirectory {
    fn credit_score(&self, phone: &str) -> Result<Option<u16>, CollaboratorError> {
        Ok(self.scores.get(phone).copied())
    }
}

impl OfferDesk for FixtureDirectory {
    fn offer_for(&self, phone: &str) -> Result<Option<PreApprovedOffer>, CollaboratorError> {
        Ok(self.offers.get(phone).cloned())
    }
}

/// Deterministic reply writer: renders each prompt's built-in template. An
/// LLM-backed writer can be swapped in behind the same trait without touching
/// the workflow.
pub(crate) struct TemplateReplyWriter;

impl ReplyWriter for TemplateReplyWriter {
    fn compose(&self, prompt: &ReplyPrompt) -> Result<String, CollaboratorError> {
        Ok(prompt.fallback())
    }
}

/// Spools sanction letters as plain-text files under the configured
/// directory.
pub(crate) struct FileSanctionRenderer {
    dir: PathBuf,
}

impl FileSanctionRenderer {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl SanctionRenderer for FileSanctionRenderer {
    fn render(&self, letter: &SanctionLetter) -> Result<DocumentRef, CollaboratorError> {
        let unavailable = |detail: String| CollaboratorError::Unavailable {
            service: "sanction renderer",
            detail,
        };

        fs::create_dir_all(&self.dir).map_err(|err| unavailable(err.to_string()))?;

        let body = format!(
            "PERSONAL LOAN SANCTION LETTER\n\
             Reference: {reference}\n\
             Date: {date}\n\n\
             Customer: {name} (ID {customer_id})\n\
             Phone: {phone}\n\
             Address: {address}\n\n\
             Sanctioned amount: ₹{amount}\n\
             Tenure: {tenure} months\n\
             Interest rate: {rate}% p.a.\n\
             Monthly EMI: ₹{emi}\n\
             Total interest: ₹{interest}\n\
             Total repayment: ₹{repayment}\n\n\
             This sanction is valid for 30 days from the date of issue.\n",
            reference = letter.reference,
            date = Local::now().date_naive(),
            name = letter.customer_name,
            customer_id = letter.customer_id,
            phone = letter.phone,
            address = letter.address,
            amount = format_inr(letter.loan_amount),
            tenure = letter.tenure_months,
            rate = letter.interest_rate_pct,
            emi = format_inr(letter.monthly_emi),
            interest = format_inr(letter.total_interest),
            repayment = format_inr(letter.total_repayment),
        );

        let path = self.dir.join(format!("{}.txt", letter.reference));
        fs::write(&path, body).map_err(|err| unavailable(err.to_string()))?;

        Ok(DocumentRef(path.to_string_lossy().into_owned()))
    }

    fn fetch(&self, document: &DocumentRef) -> Result<Option<Vec<u8>>, CollaboratorError> {
        match fs::read(&document.0) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CollaboratorError::Unavailable {
                service: "sanction renderer",
                detail: err.to_string(),
            }),
        }
    }
}

/// Treats uploaded slips as text and harvests the dominant pay figure. A real
/// OCR/PDF pipeline slots in behind the same trait.
pub(crate) struct TextSlipReader;

impl SlipReader for TextSlipReader {
    fn monthly_income(
        &self,
        bytes: &[u8],
        _mime: &Mime,
    ) -> Result<Option<f64>, CollaboratorError> {
        let text = String::from_utf8_lossy(bytes);
        Ok(salary_figure(&text))
    }
}

pub(crate) fn build_collaborators(sanction_dir: PathBuf) -> Collaborators {
    let directory = Arc::new(FixtureDirectory::seeded());
    Collaborators {
        identity: directory.clone(),
        customers: directory.clone(),
        bureau: directory.clone(),
        offers: directory,
        writer: Arc::new(TemplateReplyWriter),
        renderer: Arc::new(FileSanctionRenderer::new(sanction_dir)),
        slips: Arc::new(TextSlipReader),
    }
}
