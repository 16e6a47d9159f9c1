use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::completion::CompletionSequence;
use super::domain::{Registrant, RegistrantId};
use super::lifecycle;
use super::repository::{EmailTemplate, PartnerDirectory, RegistrantRepository, RepositoryError};

/// Counters reported after one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub abandoned: usize,
    pub completed_with_state: usize,
    pub thank_you_sent: usize,
    /// Records written to by a step submission after the batch was read.
    pub skipped: usize,
}

/// Abandon every record idle since before `cutoff`, walking the store in id-ordered batches.
pub(crate) fn abandon_stale_records<R>(
    repository: &R,
    partners: &dyn PartnerDirectory,
    completion: &CompletionSequence,
    cutoff: DateTime<Utc>,
    batch_size: usize,
    now: DateTime<Utc>,
) -> Result<SweepSummary, RepositoryError>
where
    R: RegistrantRepository + ?Sized,
{
    let batch_size = batch_size.max(1);
    let mut summary = SweepSummary::default();
    let mut after: Option<RegistrantId> = None;

    loop {
        let batch = repository.stale_batch(cutoff, after, batch_size)?;
        let exhausted = batch.len() < batch_size;

        for mut registrant in batch {
            after = Some(registrant.id);
            summary.examined += 1;
            let read_at = registrant.updated_at;
            finish_or_abandon(&mut registrant, partners, completion, &mut summary);
            registrant.updated_at = now;
            let id = registrant.id;
            if repository.update_if_unchanged(registrant, read_at)? {
                summary.abandoned += 1;
                info!(registrant_id = %id, abandoned_at = %now, "registrant abandoned");
            } else {
                summary.skipped += 1;
                info!(registrant_id = %id, "registrant touched during sweep; left active");
            }
        }

        if exhausted {
            break;
        }
    }

    Ok(summary)
}

fn finish_or_abandon(
    registrant: &mut Registrant,
    partners: &dyn PartnerDirectory,
    completion: &CompletionSequence,
    summary: &mut SweepSummary,
) {
    if registrant.finish_with_state {
        lifecycle::force_complete(registrant);
        summary.completed_with_state += 1;

        if !registrant.thank_you_sent {
            let partner = registrant.partner_id.and_then(|id| partners.fetch(id));
            if registrant.send_emails() {
                match completion.deliver(EmailTemplate::ThankYouExternal, registrant, partner.as_ref()) {
                    Ok(()) => summary.thank_you_sent += 1,
                    Err(error) => warn!(
                        registrant_id = %registrant.id,
                        error = %error,
                        "thank-you email for state registration not delivered"
                    ),
                }
            }
            // Marked even on failure: the attempt is best-effort and never repeated.
            registrant.thank_you_sent = true;
        }
    }
    registrant.abandon();
}
