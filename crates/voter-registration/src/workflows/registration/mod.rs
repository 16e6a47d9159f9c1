//! Registrant lifecycle: a five-step intake form driven by a transition table, a conditional
//! rule set evaluated on every save, derived fields recomputed after each validation pass, and
//! the completion side effects (mail-in PDF, confirmation, reminders) that run once a record
//! reaches `complete`. Stale records are abandoned by a periodic sweep.

pub mod completion;
pub mod derived;
pub mod domain;
pub mod export;
pub mod lifecycle;
pub mod pdf;
pub mod repository;
pub mod router;
pub mod service;
pub(crate) mod sweep;
pub mod validation;

#[cfg(test)]
mod tests;

pub use completion::{CompletionError, CompletionSequence, ReminderDelivery, REMINDER_EMAILS_TO_SEND};
pub use derived::DateOfBirthError;
pub use domain::{
    EmailCollection, Partner, PartnerId, Registrant, RegistrantId, RegistrantStatus,
    RegistrantStatusView, RegistrantUid, RegistrantUpdate, TellFriendRequest,
};
pub use export::{write_csv, RegistrantExportError, CSV_HEADER};
pub use lifecycle::{EntryAction, LifecycleError, LifecycleEvent, TransitionOutcome, TRANSITIONS};
pub use pdf::{PdfArchive, PdfError, PdfForm, PdfRenderer, PdfStore};
pub use repository::{
    Email, EmailTemplate, ErrorReporter, LogErrorReporter, MailError, Mailer, PartnerDirectory,
    QueueError, RegistrantRepository, ReminderJob, ReminderQueue, RepositoryError,
};
pub use router::registration_router;
pub use service::{
    ApiRegistration, RegistrationCollaborators, RegistrationService, RegistrationServiceError,
    StartRegistration, StepOutcome,
};
pub use sweep::SweepSummary;
pub use validation::{RegistrantValidator, ValidationErrors, ValidationMessage};
