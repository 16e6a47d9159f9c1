use crate::workflows::registration::domain::{Registrant, RegistrantStatus};
use crate::workflows::registration::lifecycle::{fire, permitted, EntryAction, LifecycleEvent};

fn eligible_at(status: RegistrantStatus) -> Registrant {
    Registrant {
        status,
        us_citizen: Some(true),
        ..Registrant::default()
    }
}

#[test]
fn save_or_reject_is_a_quiet_self_transition_for_eligible_records() {
    for step in 1..=5u8 {
        let status = RegistrantStatus::form_step(step).expect("step");
        let mut registrant = eligible_at(status);
        let outcome = fire(LifecycleEvent::SaveOrReject, &mut registrant).expect("saves");
        assert_eq!(outcome.to, status);
        assert!(!outcome.changed());
        assert_eq!(outcome.entry, None);
    }
}

#[test]
fn save_or_reject_rejects_any_ineligible_step() {
    for status in [RegistrantStatus::Step1, RegistrantStatus::Step3] {
        let mut registrant = eligible_at(status);
        registrant.ineligible_non_citizen = true;
        let outcome = fire(LifecycleEvent::SaveOrReject, &mut registrant).expect("rejects");
        assert_eq!(outcome.to, RegistrantStatus::Rejected);
        assert_eq!(registrant.status, RegistrantStatus::Rejected);
    }
}

#[test]
fn under_age_is_ignored_when_the_registrant_acknowledged_it() {
    let mut registrant = eligible_at(RegistrantStatus::Step1);
    registrant.ineligible_age = true;
    registrant.under_18_ok = true;
    let outcome = fire(LifecycleEvent::SaveOrReject, &mut registrant).expect("saves");
    assert_eq!(outcome.to, RegistrantStatus::Step1);
}

#[test]
fn rejected_records_can_re_enter_any_step() {
    for step in 1..=5u8 {
        let event = LifecycleEvent::advance_to(step).expect("event");
        assert!(permitted(event, &eligible_at(RegistrantStatus::Rejected)), "{event}");
    }
}

#[test]
fn entering_step_2_owes_a_barcode_even_on_re_entry() {
    let mut registrant = eligible_at(RegistrantStatus::Step2);
    let outcome = fire(LifecycleEvent::AdvanceToStep2, &mut registrant).expect("re-enter");
    assert!(!outcome.changed());
    assert_eq!(outcome.entry, Some(EntryAction::GenerateBarcode));

    let mut registrant = eligible_at(RegistrantStatus::Step3);
    let outcome = fire(LifecycleEvent::AdvanceToStep3, &mut registrant).expect("re-enter");
    assert_eq!(outcome.entry, None);
}

#[test]
fn reminders_are_requested_from_step_1_or_rejected_only() {
    for status in [RegistrantStatus::Step1, RegistrantStatus::Rejected] {
        let mut registrant = eligible_at(status);
        let outcome = fire(LifecycleEvent::RequestReminder, &mut registrant).expect("parks");
        assert_eq!(outcome.to, RegistrantStatus::Under18);
    }
    for status in [
        RegistrantStatus::Initial,
        RegistrantStatus::Step2,
        RegistrantStatus::Complete,
        RegistrantStatus::Under18,
    ] {
        assert!(!permitted(LifecycleEvent::RequestReminder, &eligible_at(status)), "{status}");
    }
}

#[test]
fn terminal_states_accept_no_advance() {
    for status in [RegistrantStatus::Complete, RegistrantStatus::Under18] {
        for step in 1..=5u8 {
            let event = LifecycleEvent::advance_to(step).expect("event");
            assert!(!permitted(event, &eligible_at(status)), "{event} from {status}");
        }
    }
}
