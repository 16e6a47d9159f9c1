//! Conditional validation. Rules live in a flat table gated by predicates over the record's
//! step and flags; a pass runs the before hooks, evaluates every applicable rule, collects
//! every failure, then runs the after hooks regardless of the outcome.

mod checks;
mod rules;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::jurisdiction::{GeoState, JurisdictionDirectory};

use super::derived;
use super::domain::{is_blank, Registrant, RegistrantStatus};

use rules::RULES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMessage {
    Blank,
    Invalid,
    InvalidZip,
    InvalidForPdf,
    Inclusion,
    /// Date of birth present but unparseable.
    Format,
    RequiredIfOptIn,
    Accepted,
    MustBeTrue,
}

impl ValidationMessage {
    pub const fn text(self) -> &'static str {
        match self {
            ValidationMessage::Blank => "can't be blank",
            ValidationMessage::Invalid => "is invalid",
            ValidationMessage::InvalidZip => "is not a valid zip code",
            ValidationMessage::InvalidForPdf => "contains characters that cannot be printed on the form",
            ValidationMessage::Inclusion => "is not included in the list",
            ValidationMessage::Format => "must be in the format mm/dd/yyyy",
            ValidationMessage::RequiredIfOptIn => "is required if you want to receive text messages",
            ValidationMessage::Accepted => "must be accepted",
            ValidationMessage::MustBeTrue => "Required value is '1' or 'true'",
        }
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Every failing check of one pass, keyed by field. Serializes as `{field: [message, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<&'static str, Vec<ValidationMessage>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: ValidationMessage) {
        let messages = self.errors.entry(field).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn on(&self, field: &str) -> &[ValidationMessage] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.errors.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "validation failed for {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.errors.len()))?;
        for (field, messages) in &self.errors {
            let texts: Vec<&str> = messages.iter().map(|message| message.text()).collect();
            map.serialize_entry(field, &texts)?;
        }
        map.end()
    }
}

pub(crate) struct RuleContext<'a> {
    pub registrant: &'a Registrant,
    pub directory: &'a JurisdictionDirectory,
    pub enabled_locales: &'a [String],
    pub custom_step_2: bool,
}

impl RuleContext<'_> {
    pub(crate) fn home_state(&self) -> Option<&GeoState> {
        self.registrant
            .home_state
            .as_ref()
            .and_then(|code| self.directory.state(code))
    }
}

/// Runs the rule table against registrants using shared jurisdiction data.
#[derive(Debug, Clone)]
pub struct RegistrantValidator {
    directory: Arc<JurisdictionDirectory>,
    enabled_locales: Vec<String>,
}

impl RegistrantValidator {
    pub fn new(directory: Arc<JurisdictionDirectory>, enabled_locales: Vec<String>) -> Self {
        Self {
            directory,
            enabled_locales,
        }
    }

    pub fn directory(&self) -> &JurisdictionDirectory {
        &self.directory
    }

    /// The home state ships its own step-2 form for the registrant's locale.
    pub fn custom_step_2(&self, registrant: &Registrant) -> bool {
        if registrant.javascript_disabled {
            return false;
        }
        registrant
            .home_state
            .as_ref()
            .and_then(|code| self.directory.state(code))
            .map(|state| state.online_reg_enabled(&registrant.locale) && state.custom_step_2)
            .unwrap_or(false)
    }

    pub fn uses_short_form(&self, registrant: &Registrant) -> bool {
        registrant.short_form && !self.custom_step_2(registrant)
    }

    /// Full validation pass. Mutates the registrant through the before and after hooks even
    /// when the pass fails.
    pub fn validate(&self, registrant: &mut Registrant) -> Result<(), ValidationErrors> {
        self.before_validation(registrant);
        let errors = self.collect_errors(registrant);
        self.after_validation(registrant, &errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn collect_errors(&self, registrant: &Registrant) -> ValidationErrors {
        let context = RuleContext {
            registrant,
            directory: &self.directory,
            enabled_locales: &self.enabled_locales,
            custom_step_2: self.custom_step_2(registrant),
        };

        let mut errors = ValidationErrors::default();
        for rule in RULES {
            let applies = rule.when.iter().all(|predicate| predicate.holds(&context))
                && !rule.unless.iter().any(|predicate| predicate.holds(&context));
            if !applies {
                continue;
            }
            if let Some(message) = checks::run(rule.check, rule.field, &context) {
                errors.add(rule.field.name(), message);
            }
        }
        errors
    }

    fn before_validation(&self, registrant: &mut Registrant) {
        self.clear_superfluous_fields(registrant);
        reformat_state_id_number(registrant);
        reformat_phone(registrant);
        set_opt_in_email(registrant);
        fill_tell_friend_defaults(registrant);
    }

    fn after_validation(&self, registrant: &mut Registrant, errors: &ValidationErrors) {
        derived::calculate_age(registrant, !errors.contains("date_of_birth"));
        derived::set_official_party_name(registrant, &self.directory);
        derived::check_ineligible(registrant, &self.directory);
    }

    /// Drop answers whose governing flag is off so they never reach storage or fail a check.
    fn clear_superfluous_fields(&self, registrant: &mut Registrant) {
        if !registrant.has_mailing_address {
            registrant.mailing_address = None;
            registrant.mailing_unit = None;
            registrant.mailing_city = None;
            registrant.mailing_state = None;
            registrant.mailing_zip_code = None;
        }
        if !registrant.change_of_name {
            registrant.prev_name_title = None;
            registrant.prev_first_name = None;
            registrant.prev_middle_name = None;
            registrant.prev_last_name = None;
            registrant.prev_name_suffix = None;
        }
        if !registrant.change_of_address {
            registrant.prev_address = None;
            registrant.prev_unit = None;
            registrant.prev_city = None;
            registrant.prev_state = None;
            registrant.prev_zip_code = None;
        }
        let requires_party = registrant
            .home_state
            .as_ref()
            .and_then(|code| self.directory.state(code))
            .map(|state| state.requires_party)
            .unwrap_or(false);
        if !requires_party {
            registrant.party = None;
        }
    }
}

fn reformat_state_id_number(registrant: &mut Registrant) {
    if let Some(id) = registrant.state_id_number.as_mut() {
        *id = id.to_uppercase();
    }
}

/// Ten-digit phones are shown as `NNN-NNN-NNNN`; anything else is left for the format check.
fn reformat_phone(registrant: &mut Registrant) {
    let Some(phone) = registrant.phone.as_deref() else {
        return;
    };
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        registrant.phone = Some(format!("{}-{}-{}", &digits[0..3], &digits[3..6], &digits[6..10]));
    }
}

fn set_opt_in_email(registrant: &mut Registrant) {
    if !registrant.requires_email_address() && is_blank(&registrant.email_address) {
        registrant.opt_in_email = Some(false);
    }
}

fn fill_tell_friend_defaults(registrant: &mut Registrant) {
    let full_name = format!(
        "{} {}",
        registrant.first_name.as_deref().unwrap_or_default(),
        registrant.last_name.as_deref().unwrap_or_default()
    )
    .trim()
    .to_string();
    let email = registrant
        .send_emails()
        .then(|| registrant.email_address.clone())
        .flatten();
    let subject = match registrant.status {
        RegistrantStatus::Complete => Some("I just registered to vote and you should too"),
        RegistrantStatus::Under18 => Some("Make sure you register to vote"),
        _ => None,
    };

    let Some(tell) = registrant.tell_friend.as_mut() else {
        return;
    };
    if is_blank(&tell.tell_from) && !full_name.is_empty() {
        tell.tell_from = Some(full_name);
    }
    if is_blank(&tell.tell_email) {
        tell.tell_email = email;
    }
    if is_blank(&tell.tell_subject) {
        tell.tell_subject = subject.map(str::to_string);
    }
}
