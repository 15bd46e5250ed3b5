use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use mime::Mime;
use serde_json::Value;

use crate::workflows::loan::collaborators::{
    CollaboratorError, Collaborators, CreditBureau, CustomerDirectory, CustomerIdentity,
    CustomerProfile, IdentityDirectory, OfferDesk, PreApprovedOffer, ReplyWriter,
    SanctionLetter, SanctionRenderer, SlipReader,
};
use crate::workflows::loan::domain::{ApplicantRecord, DocumentRef, SessionId};
use crate::workflows::loan::engine::{UnderwritingPolicy, WorkflowEngine};
use crate::workflows::loan::extract;
use crate::workflows::loan::prompts::ReplyPrompt;
use crate::workflows::loan::repository::{SessionStore, SessionStoreError};
use crate::workflows::loan::service::LoanSessionService;

pub(super) const PHONE: &str = "+917835414968";
pub(super) const NAME: &str = "Amit Sharma";

pub(super) fn identity() -> CustomerIdentity {
    CustomerIdentity {
        name: NAME.to_string(),
        phone: PHONE.to_string(),
        address: "42 MG Road, Pune, Maharashtra".to_string(),
    }
}

pub(super) fn profile() -> CustomerProfile {
    CustomerProfile {
        customer_id: 1_001,
        age: 34,
        city: "Pune".to_string(),
        current_loan_details: "Car loan, ₹8,500/month".to_string(),
        credit_score: None,
        pre_approved_limit: 150_000.0,
    }
}

/// Collaborator wiring for one test scenario. Defaults describe a customer in
/// good standing with a bureau score of 750 and no standing offer.
pub(super) struct Fixture {
    pub(super) identity: Option<CustomerIdentity>,
    pub(super) profile: Option<CustomerProfile>,
    pub(super) bureau_score: Option<u16>,
    pub(super) offer: Option<PreApprovedOffer>,
    pub(super) bureau_offline: bool,
    pub(super) offers_offline: bool,
    pub(super) writer_failing: bool,
    pub(super) renderer_failing: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            identity: Some(identity()),
            profile: Some(profile()),
            bureau_score: Some(750),
            offer: None,
            bureau_offline: false,
            offers_offline: false,
            writer_failing: false,
            renderer_failing: false,
        }
    }
}

impl Fixture {
    pub(super) fn engine(&self) -> WorkflowEngine {
        WorkflowEngine::new(self.collaborators(), UnderwritingPolicy::default())
    }

    pub(super) fn service(&self) -> (Arc<LoanSessionService<MemoryStore>>, MemoryStore) {
        let store = MemoryStore::default();
        let service = Arc::new(LoanSessionService::new(store.clone(), self.engine()));
        (service, store)
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            identity: Arc::new(StaticIdentities(self.identity.clone())),
            customers: Arc::new(StaticProfiles(self.profile.clone())),
            bureau: if self.bureau_offline {
                Arc::new(OfflineBureau)
            } else {
                Arc::new(StaticBureau(self.bureau_score))
            },
            offers: if self.offers_offline {
                Arc::new(OfflineOffers)
            } else {
                Arc::new(StaticOffers(self.offer.clone()))
            },
            writer: if self.writer_failing {
                Arc::new(FailingWriter)
            } else {
                Arc::new(TemplateWriter)
            },
            renderer: if self.renderer_failing {
                Arc::new(FailingRenderer)
            } else {
                Arc::new(StubRenderer::default())
            },
            slips: Arc::new(TextSlipReader),
        }
    }
}

pub(super) fn new_record() -> ApplicantRecord {
    ApplicantRecord::new(SessionId("loan-000001".to_string()), PHONE)
}

/// Append a customer message and drive the engine once.
pub(super) fn converse(engine: &WorkflowEngine, record: &mut ApplicantRecord, message: &str) {
    record.push_customer(message);
    engine.drive(record).expect("workflow drives cleanly");
}

pub(super) fn pdf_mime() -> Mime {
    "application/pdf".parse().expect("valid mime")
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    records: Arc<Mutex<HashMap<SessionId, ApplicantRecord>>>,
}

impl SessionStore for MemoryStore {
    fn insert(&self, record: ApplicantRecord) -> Result<(), SessionStoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if guard.contains_key(&record.session_id) {
            return Err(SessionStoreError::Conflict(record.session_id.0.clone()));
        }
        guard.insert(record.session_id.clone(), record);
        Ok(())
    }

    fn update(&self, record: ApplicantRecord) -> Result<(), SessionStoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        if !guard.contains_key(&record.session_id) {
            return Err(SessionStoreError::NotFound(record.session_id.0.clone()));
        }
        guard.insert(record.session_id.clone(), record);
        Ok(())
    }

    fn fetch(&self, session_id: &SessionId) -> Result<ApplicantRecord, SessionStoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        guard
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionStoreError::NotFound(session_id.0.clone()))
    }

    fn delete(&self, session_id: &SessionId) -> Result<(), SessionStoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| SessionStoreError::NotFound(session_id.0.clone()))
    }

    fn list(&self) -> Result<Vec<ApplicantRecord>, SessionStoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

struct StaticIdentities(Option<CustomerIdentity>);

impl IdentityDirectory for StaticIdentities {
    fn verify_customer(&self, phone: &str) -> Result<Option<CustomerIdentity>, CollaboratorError> {
        Ok(self.0.clone().filter(|identity| identity.phone == phone))
    }
}

struct StaticProfiles(Option<CustomerProfile>);

impl CustomerDirectory for StaticProfiles {
    fn profile_by_name(&self, name: &str) -> Result<Option<CustomerProfile>, CollaboratorError> {
        if name == NAME {
            Ok(self.0.clone())
        } else {
            Ok(None)
        }
    }
}

struct StaticBureau(Option<u16>);

impl CreditBureau for StaticBureau {
    fn credit_score(&self, _phone: &str) -> Result<Option<u16>, CollaboratorError> {
        Ok(self.0)
    }
}

struct OfflineBureau;

impl CreditBureau for OfflineBureau {
    fn credit_score(&self, _phone: &str) -> Result<Option<u16>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "credit bureau",
            detail: "connection refused".to_string(),
        })
    }
}

struct StaticOffers(Option<PreApprovedOffer>);

impl OfferDesk for StaticOffers {
    fn offer_for(&self, _phone: &str) -> Result<Option<PreApprovedOffer>, CollaboratorError> {
        Ok(self.0.clone())
    }
}

struct OfflineOffers;

impl OfferDesk for OfflineOffers {
    fn offer_for(&self, _phone: &str) -> Result<Option<PreApprovedOffer>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "offer desk",
            detail: "timed out".to_string(),
        })
    }
}

/// Deterministic writer used in most tests: echoes the fallback template.
struct TemplateWriter;

impl ReplyWriter for TemplateWriter {
    fn compose(&self, prompt: &ReplyPrompt) -> Result<String, CollaboratorError> {
        Ok(prompt.fallback())
    }
}

struct FailingWriter;

impl ReplyWriter for FailingWriter {
    fn compose(&self, _prompt: &ReplyPrompt) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "reply writer",
            detail: "model endpoint down".to_string(),
        })
    }
}

/// Keeps rendered letters in memory so download tests can fetch them back.
#[derive(Default)]
struct StubRenderer {
    rendered: Mutex<HashMap<String, Vec<u8>>>,
}

impl SanctionRenderer for StubRenderer {
    fn render(&self, letter: &SanctionLetter) -> Result<DocumentRef, CollaboratorError> {
        let document = DocumentRef(format!("sanctions/{}.pdf", letter.reference));
        let body = format!(
            "Sanctioned ₹{} over {} months for {}",
            letter.loan_amount, letter.tenure_months, letter.customer_name
        );
        self.rendered
            .lock()
            .expect("renderer mutex poisoned")
            .insert(document.0.clone(), body.into_bytes());
        Ok(document)
    }

    fn fetch(&self, document: &DocumentRef) -> Result<Option<Vec<u8>>, CollaboratorError> {
        Ok(self
            .rendered
            .lock()
            .expect("renderer mutex poisoned")
            .get(&document.0)
            .cloned())
    }
}

struct FailingRenderer;

impl SanctionRenderer for FailingRenderer {
    fn render(&self, _letter: &SanctionLetter) -> Result<DocumentRef, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "document renderer",
            detail: "render queue full".to_string(),
        })
    }

    fn fetch(&self, _document: &DocumentRef) -> Result<Option<Vec<u8>>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            service: "document renderer",
            detail: "render queue full".to_string(),
        })
    }
}

/// Reads slips as UTF-8 text and harvests the largest plausible figure.
struct TextSlipReader;

impl SlipReader for TextSlipReader {
    fn monthly_income(
        &self,
        bytes: &[u8],
        _mime: &Mime,
    ) -> Result<Option<f64>, CollaboratorError> {
        let text = String::from_utf8_lossy(bytes);
        Ok(extract::salary_figure(&text))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
