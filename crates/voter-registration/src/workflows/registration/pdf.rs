use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::jurisdiction::JurisdictionDirectory;

use super::derived;
use super::domain::Registrant;

/// Printable content of the national mail-in form for one registrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfForm {
    pub locale: String,
    pub state_name: String,
    pub barcode: String,
    pub us_citizen: bool,
    pub full_name: String,
    pub prev_full_name: String,
    pub date_of_birth: String,
    pub home_address: String,
    pub mailing_address: String,
    pub prev_address: String,
    pub phone: String,
    pub state_id_number: String,
    pub party: String,
    pub race: String,
    pub registration_deadline: String,
    pub instructions: String,
}

impl PdfForm {
    pub fn from_registrant(registrant: &Registrant, directory: &JurisdictionDirectory) -> Option<Self> {
        let code = registrant.home_state.as_ref()?;
        let state = directory.state(code)?;
        let localization = directory
            .localization(code, &registrant.locale)
            .or_else(|| directory.en_localization(code));

        let race = registrant
            .race
            .as_deref()
            .and_then(|race| {
                let catalog = directory.catalog();
                // A declined race prints as blank on the paper form.
                if catalog.declined_race(&registrant.locale) == Some(race) {
                    return None;
                }
                catalog.english_race(&registrant.locale, race).map(str::to_string)
            })
            .unwrap_or_default();

        Some(Self {
            locale: registrant.locale.clone(),
            state_name: state.name.clone(),
            barcode: registrant.barcode.clone().unwrap_or_default(),
            us_citizen: registrant.us_citizen == Some(true),
            full_name: registrant.full_name(),
            prev_full_name: registrant.prev_full_name(),
            date_of_birth: registrant.pdf_date_of_birth(),
            home_address: address_line(&[
                &registrant.home_address,
                &registrant.home_unit,
                &registrant.home_city,
                &Some(code.to_string()),
                &registrant.home_zip_code,
            ]),
            mailing_address: address_line(&[
                &registrant.mailing_address,
                &registrant.mailing_unit,
                &registrant.mailing_city,
                &registrant.mailing_state.as_ref().map(ToString::to_string),
                &registrant.mailing_zip_code,
            ]),
            prev_address: address_line(&[
                &registrant.prev_address,
                &registrant.prev_unit,
                &registrant.prev_city,
                &registrant.prev_state.as_ref().map(ToString::to_string),
                &registrant.prev_zip_code,
            ]),
            phone: registrant.phone.clone().unwrap_or_default(),
            state_id_number: registrant.state_id_number.clone().unwrap_or_default(),
            party: derived::official_party_name(registrant, directory)
                .filter(|_| state.requires_party)
                .unwrap_or_default(),
            race,
            registration_deadline: localization
                .map(|l| l.registration_deadline.clone())
                .unwrap_or_default(),
            instructions: localization
                .map(|l| l.pdf_instructions.clone())
                .unwrap_or_default(),
        })
    }
}

fn address_line(parts: &[&Option<String>]) -> String {
    parts
        .iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

pub trait PdfRenderer: Send + Sync {
    fn render(&self, form: &PdfForm) -> Result<Vec<u8>, PdfError>;
}

pub trait PdfStore: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool, PdfError>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PdfError>;
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, PdfError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("pdf rendering failed: {0}")]
    Render(String),
    #[error("pdf storage failed for {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders and files generated forms under `{root}/{bucket}/{uid}.pdf`.
#[derive(Clone)]
pub struct PdfArchive {
    root: PathBuf,
    renderer: Arc<dyn PdfRenderer>,
    store: Arc<dyn PdfStore>,
}

impl PdfArchive {
    pub fn new(root: impl Into<PathBuf>, renderer: Arc<dyn PdfRenderer>, store: Arc<dyn PdfStore>) -> Self {
        Self {
            root: root.into(),
            renderer,
            store,
        }
    }

    pub fn content_type() -> mime::Mime {
        mime::APPLICATION_PDF
    }

    pub fn path_for(&self, registrant: &Registrant) -> PathBuf {
        self.root
            .join(derived::bucket_code(registrant.created_at))
            .join(format!("{}.pdf", registrant.uid))
    }

    /// Render and store the form. Returns `false` without rendering when the record lacks a
    /// locale or home state; an existing file is kept unless `force` is set.
    pub fn generate(
        &self,
        registrant: &mut Registrant,
        directory: &JurisdictionDirectory,
        force: bool,
    ) -> Result<bool, PdfError> {
        if registrant.locale.trim().is_empty() || registrant.home_state.is_none() {
            return Ok(false);
        }
        let Some(form) = PdfForm::from_registrant(registrant, directory) else {
            return Ok(false);
        };

        let path = self.path_for(registrant);
        if force || !self.store.exists(&path)? {
            let bytes = self.renderer.render(&form)?;
            self.store.write(&path, &bytes)?;
            tracing::debug!(uid = %registrant.uid, path = %path.display(), "pdf written");
        }
        registrant.pdf_ready = true;
        Ok(true)
    }

    pub fn fetch(&self, registrant: &Registrant) -> Result<Option<Vec<u8>>, PdfError> {
        if !registrant.pdf_ready {
            return Ok(None);
        }
        self.store.read(&self.path_for(registrant))
    }
}
