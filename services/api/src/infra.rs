use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use voter_registration::config::RegistrationSettings;
use voter_registration::error::AppError;
use voter_registration::jurisdiction::JurisdictionDirectory;
use voter_registration::workflows::registration::{
    Email, LogErrorReporter, MailError, Mailer, Partner, PartnerDirectory, PartnerId, PdfError,
    PdfForm, PdfRenderer, PdfStore, QueueError, Registrant, RegistrantId, RegistrantRepository,
    RegistrantUid, RegistrationCollaborators, RegistrationService, ReminderJob, ReminderQueue,
    RepositoryError,
};

pub(crate) type ApiService = RegistrationService<InMemoryRegistrantRepository, TracingMailer>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn registration_service(
    settings: RegistrationSettings,
    partners: StaticPartnerDirectory,
    reminders: UnboundedSender<ReminderJob>,
) -> Arc<ApiService> {
    let collaborators = RegistrationCollaborators {
        partners: Arc::new(partners),
        reminders: Arc::new(ChannelReminderQueue { sender: reminders }),
        pdf_renderer: Arc::new(PlainTextPdfRenderer),
        pdf_store: Arc::new(FsPdfStore),
        errors: Arc::new(LogErrorReporter),
    };
    Arc::new(RegistrationService::new(
        Arc::new(InMemoryRegistrantRepository::default()),
        Arc::new(TracingMailer),
        collaborators,
        Arc::new(JurisdictionDirectory::standard()),
        settings,
    ))
}

#[derive(Default)]
pub(crate) struct InMemoryRegistrantRepository {
    records: Mutex<BTreeMap<RegistrantId, Registrant>>,
    last_id: Mutex<u64>,
}

impl RegistrantRepository for InMemoryRegistrantRepository {
    fn next_id(&self) -> Result<RegistrantId, RepositoryError> {
        let mut last_id = self.last_id.lock().expect("id mutex poisoned");
        *last_id += 1;
        Ok(RegistrantId(*last_id))
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
        match guard.get_mut(&registrant.id) {
            Some(slot) => {
                *slot = registrant;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
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
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|registrant| after.map_or(true, |after| registrant.id > after))
            .filter(|registrant| {
                !registrant.abandoned && !registrant.is_complete() && registrant.updated_at < cutoff
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn list(&self, limit: usize) -> Result<Vec<Registrant>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().take(limit).cloned().collect())
    }
}

/// Partner accounts read once at startup.
#[derive(Debug, Clone, Default)]
pub(crate) struct StaticPartnerDirectory {
    partners: HashMap<PartnerId, Partner>,
}

impl StaticPartnerDirectory {
    /// Load partners from a JSON array, or fall back to a single primary partner with id 1.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let partners = match path {
            Some(path) => {
                let raw = fs::read(path)?;
                serde_json::from_slice::<Vec<Partner>>(&raw)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            }
            None => vec![Partner {
                id: PartnerId(1),
                organization: "Rock the Vote".to_string(),
                primary: true,
                ..Partner::default()
            }],
        };
        Ok(Self::from_partners(partners))
    }

    pub(crate) fn from_partners(partners: impl IntoIterator<Item = Partner>) -> Self {
        Self {
            partners: partners
                .into_iter()
                .map(|partner| (partner.id, partner))
                .collect(),
        }
    }
}

impl PartnerDirectory for StaticPartnerDirectory {
    fn fetch(&self, id: PartnerId) -> Option<Partner> {
        self.partners.get(&id).cloned()
    }
}

/// Mail transport that only records deliveries in the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingMailer;

impl Mailer for TracingMailer {
    fn deliver(&self, email: Email) -> Result<(), MailError> {
        info!(
            template = email.template.label(),
            to = %email.to,
            from = %email.from,
            locale = %email.locale,
            "email delivered"
        );
        Ok(())
    }
}

/// Hands reminder jobs to the in-process worker spawned by the server.
pub(crate) struct ChannelReminderQueue {
    sender: UnboundedSender<ReminderJob>,
}

impl ReminderQueue for ChannelReminderQueue {
    fn enqueue(&self, job: ReminderJob) -> Result<(), QueueError> {
        self.sender
            .send(job)
            .map_err(|_| QueueError::Unavailable("reminder worker stopped".to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FsPdfStore;

fn storage_error(path: &Path, source: io::Error) -> PdfError {
    PdfError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

impl PdfStore for FsPdfStore {
    fn exists(&self, path: &Path) -> Result<bool, PdfError> {
        path.try_exists().map_err(|err| storage_error(path, err))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PdfError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| storage_error(parent, err))?;
        }
        fs::write(path, bytes).map_err(|err| storage_error(path, err))
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, PdfError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_error(path, err)),
        }
    }
}

/// Single-page PDF listing the form answers in Helvetica. Characters outside ASCII print as `?`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PlainTextPdfRenderer;

impl PdfRenderer for PlainTextPdfRenderer {
    fn render(&self, form: &PdfForm) -> Result<Vec<u8>, PdfError> {
        let mut content = String::from("BT /F1 11 Tf 14 TL 56 760 Td\n");
        for line in form_lines(form) {
            content.push_str(&format!("({}) Tj T*\n", escape_pdf_text(&line)));
        }
        content.push_str("ET");

        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ),
        ];

        let mut bytes = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            offsets.push(bytes.len());
            bytes.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, object).as_bytes());
        }

        let xref_offset = bytes.len();
        bytes.extend_from_slice(
            format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
        );
        for offset in offsets {
            bytes.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        bytes.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        Ok(bytes)
    }
}

fn form_lines(form: &PdfForm) -> Vec<String> {
    let citizen = if form.us_citizen { "Yes" } else { "No" };
    vec![
        "National Mail Voter Registration Form".to_string(),
        format!("State: {}", form.state_name),
        format!("Barcode: {}", form.barcode),
        format!("U.S. citizen: {citizen}"),
        format!("Name: {}", form.full_name),
        format!("Previous name: {}", form.prev_full_name),
        format!("Date of birth: {}", form.date_of_birth),
        format!("Home address: {}", form.home_address),
        format!("Mailing address: {}", form.mailing_address),
        format!("Previous address: {}", form.prev_address),
        format!("Phone: {}", form.phone),
        format!("ID number: {}", form.state_id_number),
        format!("Party: {}", form.party),
        format!("Race or ethnic group: {}", form.race),
        format!("Registration deadline: {}", form.registration_deadline),
        form.instructions.clone(),
    ]
}

fn escape_pdf_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }
    escaped
}
