//! Step state machine. Legality of every transition is decided by [`TRANSITIONS`]; callers
//! never assign a status directly outside the administrative paths at the bottom.

use std::fmt;

use serde::Serialize;

use super::domain::{Registrant, RegistrantStatus};

use RegistrantStatus::{Complete, Initial, Rejected, Step1, Step2, Step3, Step4, Step5, Under18};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    AdvanceToStep1,
    AdvanceToStep2,
    AdvanceToStep3,
    AdvanceToStep4,
    AdvanceToStep5,
    SaveOrReject,
    Complete,
    RequestReminder,
}

impl LifecycleEvent {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleEvent::AdvanceToStep1 => "advance_to_step_1",
            LifecycleEvent::AdvanceToStep2 => "advance_to_step_2",
            LifecycleEvent::AdvanceToStep3 => "advance_to_step_3",
            LifecycleEvent::AdvanceToStep4 => "advance_to_step_4",
            LifecycleEvent::AdvanceToStep5 => "advance_to_step_5",
            LifecycleEvent::SaveOrReject => "save_or_reject",
            LifecycleEvent::Complete => "complete",
            LifecycleEvent::RequestReminder => "request_reminder",
        }
    }

    /// The advance event for form step `n` (1..=5).
    pub fn advance_to(step: u8) -> Option<Self> {
        match step {
            1 => Some(LifecycleEvent::AdvanceToStep1),
            2 => Some(LifecycleEvent::AdvanceToStep2),
            3 => Some(LifecycleEvent::AdvanceToStep3),
            4 => Some(LifecycleEvent::AdvanceToStep4),
            5 => Some(LifecycleEvent::AdvanceToStep5),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    Ineligible,
}

impl Guard {
    fn holds(self, registrant: &Registrant) -> bool {
        match self {
            Guard::Always => true,
            Guard::Ineligible => registrant.ineligible(),
        }
    }
}

/// Side effect owed by the caller once the new status is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    GenerateBarcode,
    CompleteRegistration,
}

impl EntryAction {
    fn on_entry(status: RegistrantStatus) -> Option<Self> {
        match status {
            Step2 => Some(EntryAction::GenerateBarcode),
            Complete => Some(EntryAction::CompleteRegistration),
            _ => None,
        }
    }
}

pub struct Transition {
    pub event: LifecycleEvent,
    pub from: &'static [RegistrantStatus],
    pub to: RegistrantStatus,
    pub guard: Guard,
}

const fn row(
    event: LifecycleEvent,
    from: &'static [RegistrantStatus],
    to: RegistrantStatus,
    guard: Guard,
) -> Transition {
    Transition {
        event,
        from,
        to,
        guard,
    }
}

/// Ordered transition table; the first row whose event, source and guard all match wins.
pub const TRANSITIONS: &[Transition] = &[
    row(
        LifecycleEvent::AdvanceToStep1,
        &[Initial, Step1, Step2, Step3, Step4, Rejected],
        Step1,
        Guard::Always,
    ),
    row(
        LifecycleEvent::AdvanceToStep2,
        &[Step1, Step2, Step3, Step4, Rejected],
        Step2,
        Guard::Always,
    ),
    row(
        LifecycleEvent::AdvanceToStep3,
        &[Step2, Step3, Step4, Rejected],
        Step3,
        Guard::Always,
    ),
    row(
        LifecycleEvent::AdvanceToStep4,
        &[Step3, Step4, Rejected],
        Step4,
        Guard::Always,
    ),
    row(
        LifecycleEvent::AdvanceToStep5,
        &[Step4, Rejected],
        Step5,
        Guard::Always,
    ),
    row(
        LifecycleEvent::SaveOrReject,
        &RegistrantStatus::STEPS,
        Rejected,
        Guard::Ineligible,
    ),
    row(LifecycleEvent::SaveOrReject, &[Step1], Step1, Guard::Always),
    row(LifecycleEvent::SaveOrReject, &[Step2], Step2, Guard::Always),
    row(LifecycleEvent::SaveOrReject, &[Step3], Step3, Guard::Always),
    row(LifecycleEvent::SaveOrReject, &[Step4], Step4, Guard::Always),
    row(LifecycleEvent::SaveOrReject, &[Step5], Step5, Guard::Always),
    row(LifecycleEvent::Complete, &[Step5], Complete, Guard::Always),
    row(
        LifecycleEvent::RequestReminder,
        &[Rejected, Step1],
        Under18,
        Guard::Always,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub event: LifecycleEvent,
    pub from: RegistrantStatus,
    pub to: RegistrantStatus,
    /// Set only when the status actually changed into a state with an entry hook, or when a
    /// step is re-entered through its advance event.
    pub entry: Option<EntryAction>,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {event} from {from}")]
    NotPermitted {
        event: LifecycleEvent,
        from: RegistrantStatus,
    },
}

fn matching(event: LifecycleEvent, registrant: &Registrant) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|transition| {
        transition.event == event
            && transition.from.contains(&registrant.status)
            && transition.guard.holds(registrant)
    })
}

/// Whether `event` could fire against the registrant as it stands.
pub fn permitted(event: LifecycleEvent, registrant: &Registrant) -> bool {
    matching(event, registrant).is_some()
}

/// Apply `event`, returning what changed. The registrant is untouched on error.
pub fn fire(
    event: LifecycleEvent,
    registrant: &mut Registrant,
) -> Result<TransitionOutcome, LifecycleError> {
    let from = registrant.status;
    let transition = matching(event, registrant)
        .ok_or(LifecycleError::NotPermitted { event, from })?;

    registrant.status = transition.to;

    // Self-transitions from save_or_reject are no-ops; advance events re-run entry hooks.
    let entry = if event == LifecycleEvent::SaveOrReject && transition.to == from {
        None
    } else {
        EntryAction::on_entry(transition.to)
    };

    Ok(TransitionOutcome {
        event,
        from,
        to: transition.to,
        entry,
    })
}

/// Administrative completion used by the staleness sweep for records the state finishes.
pub(crate) fn force_complete(registrant: &mut Registrant) {
    registrant.status = Complete;
}

/// Administrative seeding used by bulk imports that skip the interactive steps.
pub(crate) fn seed(registrant: &mut Registrant, status: RegistrantStatus) {
    registrant.status = status;
}
