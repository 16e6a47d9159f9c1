use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;

use crate::config::RegistrationSettings;
use crate::jurisdiction::JurisdictionDirectory;
use crate::workflows::registration::domain::{
    EmailCollection, Partner, PartnerId, Registrant, RegistrantId, RegistrantUid, RegistrantUpdate,
};
use crate::workflows::registration::pdf::{PdfError, PdfForm, PdfRenderer, PdfStore};
use crate::workflows::registration::repository::{
    Email, EmailTemplate, ErrorReporter, MailError, Mailer, PartnerDirectory, QueueError,
    RegistrantRepository, ReminderJob, ReminderQueue, RepositoryError,
};
use crate::workflows::registration::service::{
    RegistrationCollaborators, RegistrationService, StartRegistration,
};
use crate::workflows::registration::{registration_router, RegistrantStatus};

pub(super) const PARTNER: PartnerId = PartnerId(1);
pub(super) const OPTIONAL_EMAIL_PARTNER: PartnerId = PartnerId(2);
pub(super) const WHITELABEL_PARTNER: PartnerId = PartnerId(3);
pub(super) const NO_EMAIL_PARTNER: PartnerId = PartnerId(4);

pub(super) type TestService = RegistrationService<MemoryRepository, MemoryMailer>;

pub(super) fn directory() -> Arc<JurisdictionDirectory> {
    Arc::new(JurisdictionDirectory::standard())
}

pub(super) fn settings() -> RegistrationSettings {
    RegistrationSettings {
        pdf_root: PathBuf::from("pdfs"),
        ..RegistrationSettings::default()
    }
}

fn questions(text: &str) -> BTreeMap<String, String> {
    let mut questions = BTreeMap::new();
    questions.insert("en".to_string(), text.to_string());
    questions
}

pub(super) fn partners() -> MemoryPartners {
    let partners = MemoryPartners::default();
    partners.add(Partner {
        id: PARTNER,
        organization: "Civic Hall".to_string(),
        primary: true,
        survey_question_1: questions("How did you hear about us?"),
        survey_question_2: questions("First time voting?"),
        ..Partner::default()
    });
    partners.add(Partner {
        id: OPTIONAL_EMAIL_PARTNER,
        organization: "Campus Votes".to_string(),
        collect_email_address: EmailCollection::Optional,
        ..Partner::default()
    });
    partners.add(Partner {
        id: WHITELABEL_PARTNER,
        organization: "League of Neighbors".to_string(),
        whitelabeled: true,
        from_email: Some("hello@neighbors.example".to_string()),
        ..Partner::default()
    });
    partners.add(Partner {
        id: NO_EMAIL_PARTNER,
        organization: "Door to Door".to_string(),
        collect_email_address: EmailCollection::Disabled,
        ..Partner::default()
    });
    partners
}

/// Every collaborator behind the service, kept around for assertions.
#[derive(Clone, Default)]
pub(super) struct Harness {
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) mailer: Arc<MemoryMailer>,
    pub(super) partners: Arc<MemoryPartners>,
    pub(super) reminders: Arc<MemoryQueue>,
    pub(super) renderer: Arc<CountingRenderer>,
    pub(super) store: Arc<MemoryPdfStore>,
    pub(super) reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub(super) fn collaborators(&self) -> RegistrationCollaborators {
        RegistrationCollaborators {
            partners: self.partners.clone(),
            reminders: self.reminders.clone(),
            pdf_renderer: self.renderer.clone(),
            pdf_store: self.store.clone(),
            errors: self.reporter.clone(),
        }
    }

    pub(super) fn stored(&self, uid: &RegistrantUid) -> Registrant {
        self.repository
            .fetch_by_uid(uid)
            .expect("fetch succeeds")
            .expect("registrant present")
    }
}

pub(super) fn build_service() -> (TestService, Harness) {
    build_service_with(settings())
}

pub(super) fn build_service_with(settings: RegistrationSettings) -> (TestService, Harness) {
    let harness = Harness {
        partners: Arc::new(partners()),
        ..Harness::default()
    };
    let service = RegistrationService::new(
        harness.repository.clone(),
        harness.mailer.clone(),
        harness.collaborators(),
        directory(),
        settings,
    );
    (service, harness)
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    registration_router(Arc::new(service))
}

pub(super) fn start_request() -> StartRegistration {
    StartRegistration {
        partner_id: Some(PARTNER),
        ..StartRegistration::default()
    }
}

pub(super) fn step_1() -> RegistrantUpdate {
    RegistrantUpdate {
        date_of_birth: Some("5/3/1978".to_string()),
        email_address: Some("pat@example.com".to_string()),
        home_zip_code: Some("78701".to_string()),
        us_citizen: Some(true),
        has_state_license: Some(true),
        first_registration: Some(true),
        ..RegistrantUpdate::default()
    }
}

pub(super) fn step_2() -> RegistrantUpdate {
    RegistrantUpdate {
        name_title: Some("Mr.".to_string()),
        first_name: Some("Pat".to_string()),
        last_name: Some("Doe".to_string()),
        home_address: Some("123 Congress Ave".to_string()),
        home_city: Some("Austin".to_string()),
        ..RegistrantUpdate::default()
    }
}

pub(super) fn step_3() -> RegistrantUpdate {
    RegistrantUpdate {
        state_id_number: Some("d1234567".to_string()),
        ..RegistrantUpdate::default()
    }
}

pub(super) fn step_4() -> RegistrantUpdate {
    RegistrantUpdate {
        opt_in_email: Some(true),
        opt_in_sms: Some(false),
        ..RegistrantUpdate::default()
    }
}

pub(super) fn step_5() -> RegistrantUpdate {
    RegistrantUpdate {
        attest_true: Some(true),
        ..RegistrantUpdate::default()
    }
}

/// Date of birth for someone who turns `years` this calendar year.
pub(super) fn born_years_ago(years: i32) -> String {
    format!("1/1/{}", Utc::now().year() - years)
}

/// Start a registration and push it through the first `through` form steps.
pub(super) fn registrant_at_step(service: &TestService, through: u8) -> Registrant {
    let mut registrant = service.start(start_request()).expect("start succeeds");
    let updates = [step_1(), step_2(), step_3(), step_4(), step_5()];
    for (index, update) in updates.into_iter().enumerate().take(usize::from(through)) {
        let outcome = service
            .submit_step(&registrant.uid, index as u8 + 1, update)
            .expect("step saves");
        registrant = outcome.registrant;
    }
    registrant
}

/// Store a record directly, bypassing the lifecycle.
pub(super) fn seed_registrant(
    harness: &Harness,
    status: RegistrantStatus,
    updated_at: DateTime<Utc>,
) -> Registrant {
    let id = harness.repository.next_id().expect("id");
    let mut registrant = Registrant::new(id, Some(PARTNER), "en", updated_at);
    registrant.uid = RegistrantUid(format!("seeded-{}", id.0));
    registrant.status = status;
    registrant.email_address = Some(format!("voter{}@example.com", id.0));
    registrant.state_id_number = Some("D7654321".to_string());
    harness
        .repository
        .insert(registrant)
        .expect("insert succeeds")
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    next: AtomicU64,
    pub(super) records: Mutex<BTreeMap<RegistrantId, Registrant>>,
    touch_after_read: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryRepository {
    pub(super) fn all(&self) -> Vec<Registrant> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Stamp every record handed out by the next `stale_batch` with `at`, as a concurrent step
    /// submission would.
    pub(super) fn touch_after_stale_read(&self, at: DateTime<Utc>) {
        *self.touch_after_read.lock().expect("touch mutex poisoned") = Some(at);
    }
}

impl RegistrantRepository for MemoryRepository {
    fn next_id(&self) -> Result<RegistrantId, RepositoryError> {
        Ok(RegistrantId(self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn insert(&self, registrant: Registrant) -> Result<Registrant, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&registrant.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(registrant.id, registrant.clone());
        Ok(registrant)
    }

    fn update(&self, registrant: Registrant) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(&registrant.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(registrant.id, registrant);
        Ok(())
    }

    fn update_if_unchanged(
        &self,
        registrant: Registrant,
        read_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get_mut(&registrant.id) {
            Some(slot) if slot.updated_at == read_at => {
                *slot = registrant;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: RegistrantId) -> Result<Option<Registrant>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn fetch_by_uid(&self, uid: &RegistrantUid) -> Result<Option<Registrant>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().find(|registrant| &registrant.uid == uid).cloned())
    }

    fn stale_batch(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<RegistrantId>,
        limit: usize,
    ) -> Result<Vec<Registrant>, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let batch: Vec<Registrant> = guard
            .values()
            .filter(|registrant| after.map(|after| registrant.id > after).unwrap_or(true))
            .filter(|registrant| {
                !registrant.abandoned
                    && registrant.status != RegistrantStatus::Complete
                    && registrant.updated_at < cutoff
            })
            .take(limit)
            .cloned()
            .collect();
        let touch = self.touch_after_read.lock().expect("touch mutex poisoned").take();
        if let Some(at) = touch {
            for registrant in &batch {
                if let Some(stored) = guard.get_mut(&registrant.id) {
                    stored.updated_at = at;
                }
            }
        }
        Ok(batch)
    }

    fn list(&self, limit: usize) -> Result<Vec<Registrant>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().take(limit).cloned().collect())
    }
}

pub(super) struct ConflictRepository;

impl RegistrantRepository for ConflictRepository {
    fn next_id(&self) -> Result<RegistrantId, RepositoryError> {
        Ok(RegistrantId(1))
    }

    fn insert(&self, _registrant: Registrant) -> Result<Registrant, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(&self, _registrant: Registrant) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, _id: RegistrantId) -> Result<Option<Registrant>, RepositoryError> {
        Ok(None)
    }

    fn fetch_by_uid(&self, _uid: &RegistrantUid) -> Result<Option<Registrant>, RepositoryError> {
        Ok(None)
    }

    fn stale_batch(
        &self,
        _cutoff: DateTime<Utc>,
        _after: Option<RegistrantId>,
        _limit: usize,
    ) -> Result<Vec<Registrant>, RepositoryError> {
        Ok(Vec::new())
    }

    fn list(&self, _limit: usize) -> Result<Vec<Registrant>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableRepository;

impl RegistrantRepository for UnavailableRepository {
    fn next_id(&self) -> Result<RegistrantId, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _registrant: Registrant) -> Result<Registrant, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _registrant: Registrant) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: RegistrantId) -> Result<Option<Registrant>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_by_uid(&self, _uid: &RegistrantUid) -> Result<Option<Registrant>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn stale_batch(
        &self,
        _cutoff: DateTime<Utc>,
        _after: Option<RegistrantId>,
        _limit: usize,
    ) -> Result<Vec<Registrant>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _limit: usize) -> Result<Vec<Registrant>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryPartners {
    partners: Mutex<HashMap<PartnerId, Partner>>,
}

impl MemoryPartners {
    pub(super) fn add(&self, partner: Partner) {
        self.partners
            .lock()
            .expect("partner mutex poisoned")
            .insert(partner.id, partner);
    }
}

impl PartnerDirectory for MemoryPartners {
    fn fetch(&self, id: PartnerId) -> Option<Partner> {
        self.partners
            .lock()
            .expect("partner mutex poisoned")
            .get(&id)
            .cloned()
    }
}

#[derive(Default)]
pub(super) struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub(super) fn sent(&self) -> Vec<Email> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }

    pub(super) fn sent_with(&self, template: EmailTemplate) -> Vec<Email> {
        self.sent()
            .into_iter()
            .filter(|email| email.template == template)
            .collect()
    }

    pub(super) fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Mailer for MemoryMailer {
    fn deliver(&self, email: Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("smtp relay down".to_string()));
        }
        self.sent.lock().expect("mailer mutex poisoned").push(email);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryQueue {
    jobs: Mutex<Vec<ReminderJob>>,
}

impl MemoryQueue {
    pub(super) fn jobs(&self) -> Vec<ReminderJob> {
        self.jobs.lock().expect("queue mutex poisoned").clone()
    }
}

impl ReminderQueue for MemoryQueue {
    fn enqueue(&self, job: ReminderJob) -> Result<(), QueueError> {
        self.jobs.lock().expect("queue mutex poisoned").push(job);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct CountingRenderer {
    renders: AtomicUsize,
}

impl CountingRenderer {
    pub(super) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl PdfRenderer for CountingRenderer {
    fn render(&self, form: &PdfForm) -> Result<Vec<u8>, PdfError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(format!("%PDF {} {}", form.barcode, form.full_name).into_bytes())
    }
}

#[derive(Default)]
pub(super) struct MemoryPdfStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryPdfStore {
    pub(super) fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .expect("store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl PdfStore for MemoryPdfStore {
    fn exists(&self, path: &Path) -> Result<bool, PdfError> {
        Ok(self
            .files
            .lock()
            .expect("store mutex poisoned")
            .contains_key(path))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PdfError> {
        self.files
            .lock()
            .expect("store mutex poisoned")
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, PdfError> {
        Ok(self
            .files
            .lock()
            .expect("store mutex poisoned")
            .get(path)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct RecordingReporter {
    reports: Mutex<Vec<(&'static str, RegistrantId, String)>>,
}

impl RecordingReporter {
    pub(super) fn reports(&self) -> Vec<(&'static str, RegistrantId, String)> {
        self.reports.lock().expect("reporter mutex poisoned").clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, worker: &'static str, registrant_id: RegistrantId, error: &dyn std::error::Error) {
        self.reports
            .lock()
            .expect("reporter mutex poisoned")
            .push((worker, registrant_id, error.to_string()));
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
