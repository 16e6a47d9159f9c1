use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RegistrationSettings;
use crate::jurisdiction::{JurisdictionDirectory, ENGLISH};

use super::completion::{CompletionError, CompletionSequence, ReminderDelivery};
use super::derived;
use super::domain::{
    is_blank, Partner, PartnerId, Registrant, RegistrantId, RegistrantStatus, RegistrantUid,
    RegistrantUpdate, TellFriendRequest,
};
use super::export::{self, RegistrantExportError};
use super::lifecycle::{self, EntryAction, LifecycleError, LifecycleEvent, TransitionOutcome};
use super::pdf::{PdfArchive, PdfError, PdfRenderer, PdfStore};
use super::repository::{
    Email, EmailTemplate, ErrorReporter, Mailer, PartnerDirectory, RegistrantRepository,
    RepositoryError, ReminderQueue,
};
use super::sweep::{self, SweepSummary};
use super::validation::{RegistrantValidator, ValidationErrors};

/// Collaborators owned outside the registration core.
#[derive(Clone)]
pub struct RegistrationCollaborators {
    pub partners: Arc<dyn PartnerDirectory>,
    pub reminders: Arc<dyn ReminderQueue>,
    pub pdf_renderer: Arc<dyn PdfRenderer>,
    pub pdf_store: Arc<dyn PdfStore>,
    pub errors: Arc<dyn ErrorReporter>,
}

/// Opening request for a new interactive registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartRegistration {
    pub partner_id: Option<PartnerId>,
    pub locale: Option<String>,
    pub tracking_source: Option<String>,
    pub tracking_id: Option<String>,
    pub short_form: bool,
}

/// Bulk-import payload: every attribute at once plus the hand-off flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRegistration {
    #[serde(default)]
    pub partner_id: Option<PartnerId>,
    #[serde(default)]
    pub finish_with_state: bool,
    #[serde(flatten)]
    pub attributes: RegistrantUpdate,
}

/// Record after a step submission plus the transition that produced it.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub registrant: Registrant,
    pub transition: TransitionOutcome,
    pub rejected: bool,
}

/// Service composing the lifecycle table, the validator and the completion side effects.
pub struct RegistrationService<R, M> {
    repository: Arc<R>,
    mailer: Arc<M>,
    partners: Arc<dyn PartnerDirectory>,
    errors: Arc<dyn ErrorReporter>,
    validator: RegistrantValidator,
    completion: CompletionSequence,
    settings: RegistrationSettings,
}

impl<R, M> RegistrationService<R, M>
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    pub fn new(
        repository: Arc<R>,
        mailer: Arc<M>,
        collaborators: RegistrationCollaborators,
        directory: Arc<JurisdictionDirectory>,
        settings: RegistrationSettings,
    ) -> Self {
        let validator = RegistrantValidator::new(directory.clone(), settings.enabled_locales.clone());
        let pdf = PdfArchive::new(
            settings.pdf_root.clone(),
            collaborators.pdf_renderer,
            collaborators.pdf_store,
        );
        let shared_mailer: Arc<dyn Mailer> = mailer.clone();
        let completion = CompletionSequence::new(
            directory,
            pdf,
            shared_mailer,
            collaborators.reminders,
            settings.clone(),
        );

        Self {
            repository,
            mailer,
            partners: collaborators.partners,
            errors: collaborators.errors,
            validator,
            completion,
            settings,
        }
    }

    pub fn settings(&self) -> &RegistrationSettings {
        &self.settings
    }

    pub fn directory(&self) -> &JurisdictionDirectory {
        self.validator.directory()
    }

    pub fn validator(&self) -> &RegistrantValidator {
        &self.validator
    }

    pub fn pdf(&self) -> &PdfArchive {
        self.completion.pdf()
    }

    fn partner_for(&self, registrant: &Registrant) -> Option<Partner> {
        registrant.partner_id.and_then(|id| self.partners.fetch(id))
    }

    /// Create an `initial` record that the step-1 form will fill in.
    pub fn start(&self, request: StartRegistration) -> Result<Registrant, RegistrationServiceError> {
        let now = Utc::now();
        let id = self.repository.next_id()?;
        let locale = request
            .locale
            .filter(|locale| self.settings.locale_enabled(locale))
            .unwrap_or_else(|| ENGLISH.to_string());

        let mut registrant = Registrant::new(id, request.partner_id, locale, now);
        registrant.uid = derived::generate_uid(None, None, now);
        registrant.tracking_source = request.tracking_source;
        registrant.tracking_id = request.tracking_id;
        registrant.short_form = request.short_form;
        if let Some(partner) = self.partner_for(&registrant) {
            registrant.collect_email_address = partner.collect_email_address;
        }

        let stored = self.repository.insert(registrant)?;
        info!(registrant_id = %stored.id, uid = %stored.uid, "registration started");
        Ok(stored)
    }

    /// Apply one form step: advance, validate, then save or reject. Nothing is persisted when
    /// validation fails.
    pub fn submit_step(
        &self,
        uid: &RegistrantUid,
        step: u8,
        update: RegistrantUpdate,
    ) -> Result<StepOutcome, RegistrationServiceError> {
        let now = Utc::now();
        let mut registrant = self.find_by_param_strict(uid)?;
        let event =
            LifecycleEvent::advance_to(step).ok_or(RegistrationServiceError::InvalidStep(step))?;
        if !lifecycle::permitted(event, &registrant) {
            return Err(LifecycleError::NotPermitted {
                event,
                from: registrant.status,
            }
            .into());
        }

        let questions = [
            update.answers_without_question(1),
            update.answers_without_question(2),
        ];
        update.apply(&mut registrant, self.directory());
        let advanced = lifecycle::fire(event, &mut registrant)?;

        self.validator.validate(&mut registrant)?;
        self.before_save(&mut registrant, questions);

        let saved = lifecycle::fire(LifecycleEvent::SaveOrReject, &mut registrant)?;
        let rejected = saved.to == RegistrantStatus::Rejected;
        if !rejected {
            self.run_entry_action(advanced.entry, &mut registrant, now)?;
        }

        let tell_friend = registrant.tell_friend.take();
        registrant.updated_at = now;
        self.repository.update(registrant.clone())?;

        if let Some(request) = tell_friend {
            self.deliver_tell_friend_emails(&registrant, &request);
        }

        info!(
            registrant_id = %registrant.id,
            uid = %registrant.uid,
            status = %registrant.status,
            "registration step saved"
        );
        Ok(StepOutcome {
            registrant,
            transition: advanced,
            rejected,
        })
    }

    /// Finish a step-5 record and run the completion sequence.
    pub fn complete(&self, uid: &RegistrantUid) -> Result<Registrant, RegistrationServiceError> {
        let now = Utc::now();
        let mut registrant = self.find_by_param_strict(uid)?;
        let outcome = lifecycle::fire(LifecycleEvent::Complete, &mut registrant)?;

        self.validator.validate(&mut registrant)?;
        self.run_entry_action(outcome.entry, &mut registrant, now)?;

        registrant.updated_at = now;
        self.repository.update(registrant.clone())?;
        Ok(registrant)
    }

    /// Re-render a completed record's form, replacing the stored copy.
    pub fn regenerate_pdf(&self, uid: &RegistrantUid) -> Result<Registrant, RegistrationServiceError> {
        let mut registrant = self.find_by_param_strict(uid)?;
        if !registrant.is_complete() {
            return Err(RegistrationServiceError::NotComplete(uid.clone()));
        }
        let generated = self
            .completion
            .pdf()
            .generate(&mut registrant, self.directory(), true)?;
        self.repository.update(registrant.clone())?;
        info!(registrant_id = %registrant.id, uid = %registrant.uid, generated, "pdf regenerated");
        Ok(registrant)
    }

    /// Park an under-age registrant and remember to remind them later.
    pub fn request_reminder(&self, uid: &RegistrantUid) -> Result<Registrant, RegistrationServiceError> {
        let mut registrant = self.find_by_param_strict(uid)?;
        lifecycle::fire(LifecycleEvent::RequestReminder, &mut registrant)?;
        registrant.updated_at = Utc::now();
        self.repository.update(registrant.clone())?;
        Ok(registrant)
    }

    /// Bulk import. Records the state will finish start at `step_2`, everything else at
    /// `step_5`; both run the API completion sequence once stored.
    pub fn import(&self, payload: ApiRegistration) -> Result<Registrant, RegistrationServiceError> {
        let now = Utc::now();
        let ApiRegistration {
            partner_id,
            finish_with_state,
            attributes,
        } = payload;

        let id = self.repository.next_id()?;
        let locale = attributes
            .locale
            .clone()
            .unwrap_or_else(|| ENGLISH.to_string());
        let mut registrant = Registrant::new(id, partner_id, locale, now);
        registrant.building_via_api_call = true;
        registrant.finish_with_state = finish_with_state;
        let partner = self.partner_for(&registrant);
        if let Some(partner) = &partner {
            registrant.collect_email_address = partner.collect_email_address;
        }

        let questions = [
            attributes.answers_without_question(1),
            attributes.answers_without_question(2),
        ];
        attributes.apply(&mut registrant, self.directory());
        registrant.finish_with_state = finish_with_state;
        registrant.uid = derived::generate_uid(
            registrant.email_address.as_deref(),
            registrant.home_zip_code.as_deref(),
            now,
        );
        let seeded = if finish_with_state {
            RegistrantStatus::Step2
        } else {
            RegistrantStatus::Step5
        };
        lifecycle::seed(&mut registrant, seeded);
        registrant.barcode = Some(derived::pdf_barcode(id.0, &self.settings.barcode_prefix));

        self.validator.validate(&mut registrant)?;
        self.before_save(&mut registrant, questions);

        let mut stored = self.repository.insert(registrant)?;
        self.completion
            .complete_via_api(&mut stored, partner.as_ref(), now)?;
        stored.updated_at = now;
        self.repository.update(stored.clone())?;

        info!(
            registrant_id = %stored.id,
            uid = %stored.uid,
            finish_with_state = stored.finish_with_state,
            "registration imported"
        );
        Ok(stored)
    }

    /// Look up by public id. Abandoned records surface as a distinct error carrying the record.
    pub fn find_by_param(
        &self,
        uid: &RegistrantUid,
    ) -> Result<Option<Registrant>, RegistrationServiceError> {
        match self.repository.fetch_by_uid(uid)? {
            Some(registrant) if registrant.abandoned => {
                Err(RegistrationServiceError::Abandoned(Box::new(registrant)))
            }
            found => Ok(found),
        }
    }

    pub fn find_by_param_strict(&self, uid: &RegistrantUid) -> Result<Registrant, RegistrationServiceError> {
        self.find_by_param(uid)?
            .ok_or_else(|| RegistrationServiceError::NotFound(uid.clone()))
    }

    /// Reminder job body. Failures are reported and swallowed; `None` means the job failed.
    pub fn deliver_reminder(&self, id: RegistrantId) -> Option<ReminderDelivery> {
        match self.try_deliver_reminder(id, Utc::now()) {
            Ok(delivery) => Some(delivery),
            Err(error) => {
                self.errors.report("deliver_reminder_email", id, &error);
                None
            }
        }
    }

    fn try_deliver_reminder(
        &self,
        id: RegistrantId,
        now: DateTime<Utc>,
    ) -> Result<ReminderDelivery, RegistrationServiceError> {
        let mut registrant = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        let partner = self.partner_for(&registrant);

        let delivery = self
            .completion
            .send_reminder(&mut registrant, partner.as_ref())
            .map_err(CompletionError::from)?;

        if let ReminderDelivery::Sent { remaining } = delivery {
            registrant.updated_at = now;
            self.repository.update(registrant.clone())?;
            if remaining > 0 {
                self.completion
                    .enqueue_reminder(&registrant, now)
                    .map_err(CompletionError::from)?;
            }
        }
        Ok(delivery)
    }

    pub fn sweep_stale(&self) -> Result<SweepSummary, RegistrationServiceError> {
        self.sweep_stale_at(Utc::now())
    }

    pub fn sweep_stale_at(&self, now: DateTime<Utc>) -> Result<SweepSummary, RegistrationServiceError> {
        let cutoff = now - self.settings.stale_timeout();
        let summary = sweep::abandon_stale_records(
            self.repository.as_ref(),
            self.partners.as_ref(),
            &self.completion,
            cutoff,
            self.settings.sweep_batch_size,
            now,
        )?;
        info!(
            examined = summary.examined,
            abandoned = summary.abandoned,
            completed_with_state = summary.completed_with_state,
            thank_you_sent = summary.thank_you_sent,
            skipped = summary.skipped,
            "staleness sweep finished"
        );
        Ok(summary)
    }

    /// Write up to `limit` records as CSV, returning the number of data rows.
    pub fn export_csv<W: Write>(&self, writer: W, limit: usize) -> Result<usize, RegistrationServiceError> {
        let registrants = self.repository.list(limit)?;
        let partners: Vec<Option<Partner>> = registrants
            .iter()
            .map(|registrant| self.partner_for(registrant))
            .collect();
        let rows = registrants.iter().zip(partners.iter().map(Option::as_ref));
        let written = export::write_csv(writer, rows, self.directory())?;
        Ok(written)
    }

    fn run_entry_action(
        &self,
        entry: Option<EntryAction>,
        registrant: &mut Registrant,
        now: DateTime<Utc>,
    ) -> Result<(), RegistrationServiceError> {
        match entry {
            Some(EntryAction::GenerateBarcode) => {
                registrant.barcode = Some(derived::pdf_barcode(
                    registrant.id.0,
                    &self.settings.barcode_prefix,
                ));
            }
            Some(EntryAction::CompleteRegistration) => {
                let partner = self.partner_for(registrant);
                self.completion.complete(registrant, partner.as_ref(), now)?;
            }
            None => {}
        }
        Ok(())
    }

    fn before_save(&self, registrant: &mut Registrant, answers_without_question: [bool; 2]) {
        let partner = self.partner_for(registrant);
        for (index, missing) in answers_without_question.into_iter().enumerate() {
            if !missing {
                continue;
            }
            let number = index as u8 + 1;
            let question = partner
                .as_ref()
                .and_then(|partner| partner.survey_question(number, &registrant.locale))
                .map(str::to_string);
            match number {
                1 => registrant.original_survey_question_1 = question,
                _ => registrant.original_survey_question_2 = question,
            }
        }

        let online = registrant
            .home_state
            .as_ref()
            .map(|code| self.directory().online_reg_enabled(code, &registrant.locale))
            .unwrap_or(false);
        if !online {
            registrant.finish_with_state = false;
        }
    }

    /// One message per comma-separated recipient; failures are logged and dropped.
    fn deliver_tell_friend_emails(&self, registrant: &Registrant, request: &TellFriendRequest) {
        let Some(recipients) = request.tell_recipients.as_deref() else {
            return;
        };
        let partner = self.partner_for(registrant);
        let from = if is_blank(&request.tell_email) {
            self.completion.sender(partner.as_ref())
        } else {
            request.tell_email.clone().unwrap_or_default()
        };

        for recipient in recipients.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let email = Email {
                template: EmailTemplate::TellFriend,
                to: recipient.to_string(),
                from: from.clone(),
                locale: registrant.locale.clone(),
                registrant_uid: None,
                subject: request.tell_subject.clone(),
                body: request.tell_message.clone(),
            };
            if let Err(error) = self.mailer.deliver(email) {
                warn!(
                    registrant_id = %registrant.id,
                    recipient,
                    error = %error,
                    "tell-a-friend email not delivered"
                );
            }
        }
    }
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("registration {} was abandoned", .0.uid)]
    Abandoned(Box<Registrant>),
    #[error("registration {0} not found")]
    NotFound(RegistrantUid),
    #[error("unknown form step {0}")]
    InvalidStep(u8),
    #[error("registration {0} is not complete")]
    NotComplete(RegistrantUid),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Export(#[from] RegistrantExportError),
}

impl From<PdfError> for RegistrationServiceError {
    fn from(value: PdfError) -> Self {
        Self::Completion(CompletionError::Pdf(value))
    }
}
