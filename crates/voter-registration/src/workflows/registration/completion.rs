use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::RegistrationSettings;
use crate::jurisdiction::JurisdictionDirectory;

use super::domain::{Partner, Registrant};
use super::lifecycle;
use super::pdf::{PdfArchive, PdfError};
use super::repository::{Email, EmailTemplate, MailError, Mailer, QueueError, ReminderJob, ReminderQueue};

/// Reminders owed after a completed registration.
pub const REMINDER_EMAILS_TO_SEND: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error(transparent)]
    Pdf(#[from] PdfError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result of one reminder job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDelivery {
    Sent { remaining: u8 },
    /// Nothing owed or no usable address; duplicate executions land here.
    Skipped,
}

/// Irreversible side effects run when a registrant reaches `complete`.
#[derive(Clone)]
pub struct CompletionSequence {
    directory: Arc<JurisdictionDirectory>,
    pdf: PdfArchive,
    mailer: Arc<dyn Mailer>,
    reminders: Arc<dyn ReminderQueue>,
    settings: RegistrationSettings,
}

impl CompletionSequence {
    pub fn new(
        directory: Arc<JurisdictionDirectory>,
        pdf: PdfArchive,
        mailer: Arc<dyn Mailer>,
        reminders: Arc<dyn ReminderQueue>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            directory,
            pdf,
            mailer,
            reminders,
            settings,
        }
    }

    pub fn pdf(&self) -> &PdfArchive {
        &self.pdf
    }

    /// Interactive completion: form, redaction, then confirmation and reminders when the
    /// registrant can receive email.
    pub fn complete(
        &self,
        registrant: &mut Registrant,
        partner: Option<&Partner>,
        now: DateTime<Utc>,
    ) -> Result<(), CompletionError> {
        if !registrant.finish_with_state {
            self.pdf.generate(registrant, &self.directory, false)?;
        }
        registrant.redact_sensitive_data();
        self.deliver(EmailTemplate::Confirmation, registrant, partner)?;
        self.enqueue_reminder_emails(registrant, now)?;
        info!(registrant_id = %registrant.id, uid = %registrant.uid, "registration completed");
        Ok(())
    }

    /// Bulk-import completion. Emails go out only when the caller asked for them, and the
    /// record is moved to `complete` at the end.
    pub fn complete_via_api(
        &self,
        registrant: &mut Registrant,
        partner: Option<&Partner>,
        now: DateTime<Utc>,
    ) -> Result<(), CompletionError> {
        if !registrant.finish_with_state {
            self.pdf.generate(registrant, &self.directory, false)?;
        }
        registrant.redact_sensitive_data();

        if registrant.send_confirmation_reminder_emails == Some(true) {
            self.deliver(EmailTemplate::Confirmation, registrant, partner)?;
            self.enqueue_reminder_emails(registrant, now)?;
        }

        lifecycle::force_complete(registrant);
        info!(registrant_id = %registrant.id, uid = %registrant.uid, "registration completed via api");
        Ok(())
    }

    pub fn enqueue_reminder_emails(
        &self,
        registrant: &mut Registrant,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        if registrant.send_emails() {
            registrant.reminders_left = REMINDER_EMAILS_TO_SEND;
            self.enqueue_reminder(registrant, now)
        } else {
            registrant.reminders_left = 0;
            Ok(())
        }
    }

    pub fn enqueue_reminder(&self, registrant: &Registrant, now: DateTime<Utc>) -> Result<(), QueueError> {
        let run_at = now + self.settings.reminder_delay(registrant.reminders_left);
        self.reminders.enqueue(ReminderJob {
            registrant_id: registrant.id,
            run_at,
        })
    }

    /// Send one reminder if any are still owed. The caller persists the decrement before
    /// scheduling the next one.
    pub fn send_reminder(
        &self,
        registrant: &mut Registrant,
        partner: Option<&Partner>,
    ) -> Result<ReminderDelivery, MailError> {
        if registrant.reminders_left == 0 || !registrant.send_emails() {
            return Ok(ReminderDelivery::Skipped);
        }
        self.deliver(EmailTemplate::Reminder, registrant, partner)?;
        registrant.reminders_left -= 1;
        Ok(ReminderDelivery::Sent {
            remaining: registrant.reminders_left,
        })
    }

    /// Send `template` to the registrant when they can receive email; otherwise a no-op.
    pub fn deliver(
        &self,
        template: EmailTemplate,
        registrant: &Registrant,
        partner: Option<&Partner>,
    ) -> Result<(), MailError> {
        let Some(email) = self.email_for(template, registrant, partner) else {
            return Ok(());
        };
        self.mailer.deliver(email)
    }

    fn email_for(
        &self,
        template: EmailTemplate,
        registrant: &Registrant,
        partner: Option<&Partner>,
    ) -> Option<Email> {
        if !registrant.send_emails() {
            return None;
        }
        let to = registrant.email_address.clone()?;
        Some(Email {
            template,
            to,
            from: self.sender(partner),
            locale: registrant.locale.clone(),
            registrant_uid: Some(registrant.uid.clone()),
            subject: None,
            body: None,
        })
    }

    pub fn sender(&self, partner: Option<&Partner>) -> String {
        partner
            .map(|partner| partner.sender_address(&self.settings.from_address).to_string())
            .unwrap_or_else(|| self.settings.from_address.clone())
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}
