use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Partner, PartnerId, Registrant, RegistrantId, RegistrantUid};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait RegistrantRepository: Send + Sync {
    /// Reserve the next numeric id; ids are never reused.
    fn next_id(&self) -> Result<RegistrantId, RepositoryError>;
    fn insert(&self, registrant: Registrant) -> Result<Registrant, RepositoryError>;
    fn update(&self, registrant: Registrant) -> Result<(), RepositoryError>;
    /// Write `registrant` only if the stored copy still carries `read_at` as its `updated_at`.
    /// Returns `false` when another writer got there first.
    ///
    /// The default is a fetch-then-update; stores that can compare and write under one lock
    /// should override it.
    fn update_if_unchanged(
        &self,
        registrant: Registrant,
        read_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        match self.fetch(registrant.id)? {
            Some(current) if current.updated_at == read_at => {
                self.update(registrant)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound),
        }
    }
    fn fetch(&self, id: RegistrantId) -> Result<Option<Registrant>, RepositoryError>;
    fn fetch_by_uid(&self, uid: &RegistrantUid) -> Result<Option<Registrant>, RepositoryError>;
    /// Non-abandoned, non-complete records last touched before `cutoff`, ordered by id and
    /// starting strictly after `after`.
    fn stale_batch(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<RegistrantId>,
        limit: usize,
    ) -> Result<Vec<Registrant>, RepositoryError>;
    fn list(&self, limit: usize) -> Result<Vec<Registrant>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Partner accounts are owned elsewhere; the registration flow only reads them.
pub trait PartnerDirectory: Send + Sync {
    fn fetch(&self, id: PartnerId) -> Option<Partner>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    Confirmation,
    Reminder,
    ThankYouExternal,
    TellFriend,
}

impl EmailTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            EmailTemplate::Confirmation => "confirmation",
            EmailTemplate::Reminder => "reminder",
            EmailTemplate::ThankYouExternal => "thank_you_external",
            EmailTemplate::TellFriend => "tell_friend",
        }
    }
}

/// Outbound message handed to the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub template: EmailTemplate,
    pub to: String,
    pub from: String,
    pub locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant_uid: Option<RegistrantUid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

pub trait Mailer: Send + Sync {
    fn deliver(&self, email: Email) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// A deferred reminder delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    pub registrant_id: RegistrantId,
    pub run_at: DateTime<Utc>,
}

/// At-least-once job queue; jobs cannot be withdrawn once enqueued.
pub trait ReminderQueue: Send + Sync {
    fn enqueue(&self, job: ReminderJob) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue unavailable: {0}")]
    Unavailable(String),
}

/// Error-tracking sink for failures that are swallowed rather than raised.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, worker: &'static str, registrant_id: RegistrantId, error: &dyn std::error::Error);
}

/// Reporter that only logs; used when no tracker is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn report(&self, worker: &'static str, registrant_id: RegistrantId, error: &dyn std::error::Error) {
        tracing::error!(worker, registrant_id = %registrant_id, error = %error, "background worker error");
    }
}
