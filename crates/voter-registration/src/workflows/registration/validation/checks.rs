use std::sync::LazyLock;

use regex::Regex;

use crate::jurisdiction::CatalogList;

use super::super::derived;
use super::super::domain::Registrant;
use super::rules::{Check, Choices, Field, Pattern, Predicate};
use super::{RuleContext, ValidationMessage};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_.%+\-']+@(?:[A-Z0-9\-]+\.)+[A-Z]{2,}$").expect("email pattern")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ [:punct:]]*\d{3}[ [:punct:]]*\d{3}[ [:punct:]]*\d{4}\D*").expect("phone pattern")
});

static STATE_ID_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(none|\d{4}|[-*A-Z0-9]{7,42})$").expect("state id pattern")
});

static PDF_SAFE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[a-zA-Z0-9\s+.\-!@#$%^&*_=()\[\]{};':"\\/,<>?|]*$"#).expect("pdf-safe pattern")
});

static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("zip pattern"));

impl Pattern {
    fn regex(self) -> &'static Regex {
        match self {
            Pattern::Email => &EMAIL,
            Pattern::Phone => &PHONE,
            Pattern::StateIdNumber => &STATE_ID_NUMBER,
            Pattern::PdfSafe => &PDF_SAFE,
        }
    }

    fn failure(self) -> ValidationMessage {
        match self {
            Pattern::PdfSafe => ValidationMessage::InvalidForPdf,
            _ => ValidationMessage::Invalid,
        }
    }
}

pub(crate) fn matches_zip_format(zip: &str) -> bool {
    ZIP_CODE.is_match(zip.trim())
}

impl Predicate {
    pub(crate) fn holds(self, context: &RuleContext<'_>) -> bool {
        let registrant = context.registrant;
        match self {
            Predicate::AtLeastStep(step) => registrant.at_least_step(step),
            Predicate::CustomStep2 => context.custom_step_2,
            Predicate::UsesShortForm => registrant.short_form && !context.custom_step_2,
            Predicate::NeedsMailingAddress => {
                registrant.at_least_step(2) && registrant.has_mailing_address
            }
            Predicate::NeedsPrevName => registrant.at_least_step(2) && registrant.change_of_name,
            Predicate::NeedsPrevAddress => {
                registrant.at_least_step(2) && registrant.change_of_address
            }
            Predicate::BuildingViaApi => registrant.building_via_api_call,
            Predicate::FinishWithState => registrant.finish_with_state,
            Predicate::TellingFriends => registrant.tell_friend.is_some(),
            Predicate::Complete => registrant.is_complete(),
            Predicate::HasPhone => registrant.has_phone(),
            Predicate::EmailNotRequired => !registrant.requires_email_address(),
        }
    }
}

impl Choices {
    fn includes(self, context: &RuleContext<'_>, value: &str) -> bool {
        let catalog = context.directory.catalog();
        match self {
            Choices::Titles => catalog.all_values(CatalogList::Titles).contains(&value),
            Choices::Suffixes => catalog.all_values(CatalogList::Suffixes).contains(&value),
            Choices::Locales => context.enabled_locales.iter().any(|locale| locale == value),
        }
    }

    /// Blank passes the inclusion check except for the locale, which is never optional.
    fn allows_blank(self) -> bool {
        !matches!(self, Choices::Locales)
    }
}

/// Evaluate one check, returning the message to record when it fails.
pub(crate) fn run(check: Check, field: Field, context: &RuleContext<'_>) -> Option<ValidationMessage> {
    let registrant = context.registrant;
    let value = field.value(registrant);

    match check {
        Check::Presence => value.is_blank().then_some(ValidationMessage::Blank),
        Check::Boolean => value.flag().is_none().then_some(ValidationMessage::Inclusion),
        Check::MustBeTrue => (value.flag() != Some(true)).then_some(ValidationMessage::MustBeTrue),
        Check::Acceptance => (value.flag() == Some(false)).then_some(ValidationMessage::Accepted),
        Check::Format(pattern) => match value.text() {
            Some(text) if !pattern.regex().is_match(text) => Some(pattern.failure()),
            _ => None,
        },
        Check::Inclusion(choices) => match value.text() {
            Some(text) => (!choices.includes(context, text)).then_some(ValidationMessage::Inclusion),
            None if choices.allows_blank() => None,
            None => Some(ValidationMessage::Inclusion),
        },
        Check::ZipCode => match value.text() {
            None => Some(ValidationMessage::Blank),
            Some(zip) if !matches_zip_format(zip) => Some(ValidationMessage::Invalid),
            Some(zip) if !context.directory.valid_zip_code(zip) => {
                Some(ValidationMessage::InvalidZip)
            }
            Some(_) => None,
        },
        Check::DateOfBirth => date_of_birth(registrant),
        Check::Race => race(context),
        Check::Party => party(context),
        Check::PhoneIfSmsOptIn => {
            let opted_in = registrant.opt_in_sms == Some(true) || registrant.partner_opt_in_sms;
            (opted_in && !registrant.has_phone()).then_some(ValidationMessage::RequiredIfOptIn)
        }
    }
}

fn date_of_birth(registrant: &Registrant) -> Option<ValidationMessage> {
    match (&registrant.date_of_birth, &registrant.raw_date_of_birth) {
        (Some(_), _) => None,
        (None, Some(_)) => Some(ValidationMessage::Format),
        (None, None) => Some(ValidationMessage::Blank),
    }
}

fn race(context: &RuleContext<'_>) -> Option<ValidationMessage> {
    let registrant = context.registrant;
    if !context.home_state().map(|state| state.requires_race).unwrap_or(false) {
        return None;
    }
    let race = registrant.race.as_deref().map(str::trim).unwrap_or_default();
    if race.is_empty() {
        return Some(ValidationMessage::Blank);
    }
    let catalog = context.directory.catalog();
    let known = catalog
        .english_race(&registrant.locale, race)
        .map(|english| {
            catalog
                .values(CatalogList::Races, crate::jurisdiction::ENGLISH)
                .contains(&english)
        })
        .unwrap_or(false);
    (!known).then_some(ValidationMessage::Inclusion)
}

fn party(context: &RuleContext<'_>) -> Option<ValidationMessage> {
    let registrant = context.registrant;
    if !context.home_state().map(|state| state.requires_party).unwrap_or(false) {
        return None;
    }
    if registrant.party.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return Some(ValidationMessage::Blank);
    }
    let english_parties = derived::english_state_parties(registrant, context.directory).unwrap_or_default();
    let known = derived::english_party_name(registrant, context.directory)
        .map(|name| english_parties.contains(&name))
        .unwrap_or(false);
    (!known).then_some(ValidationMessage::Inclusion)
}
