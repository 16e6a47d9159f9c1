use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::jurisdiction::{JurisdictionDirectory, StateCode};

use super::derived;

/// Repository-assigned sequence number; feeds the barcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrantId(pub u64);

impl fmt::Display for RegistrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque public identifier handed out in URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrantUid(pub String);

impl fmt::Display for RegistrantUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(pub u64);

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a registrant sits in the intake flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrantStatus {
    #[default]
    Initial,
    #[serde(rename = "step_1")]
    Step1,
    #[serde(rename = "step_2")]
    Step2,
    #[serde(rename = "step_3")]
    Step3,
    #[serde(rename = "step_4")]
    Step4,
    #[serde(rename = "step_5")]
    Step5,
    Complete,
    #[serde(rename = "under_18")]
    Under18,
    Rejected,
}

impl RegistrantStatus {
    /// The ordered form steps; `under_18` and `rejected` sit outside the ordering.
    pub const STEPS: [RegistrantStatus; 7] = [
        RegistrantStatus::Initial,
        RegistrantStatus::Step1,
        RegistrantStatus::Step2,
        RegistrantStatus::Step3,
        RegistrantStatus::Step4,
        RegistrantStatus::Step5,
        RegistrantStatus::Complete,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RegistrantStatus::Initial => "initial",
            RegistrantStatus::Step1 => "step_1",
            RegistrantStatus::Step2 => "step_2",
            RegistrantStatus::Step3 => "step_3",
            RegistrantStatus::Step4 => "step_4",
            RegistrantStatus::Step5 => "step_5",
            RegistrantStatus::Complete => "complete",
            RegistrantStatus::Under18 => "under_18",
            RegistrantStatus::Rejected => "rejected",
        }
    }

    pub const fn humanized(self) -> &'static str {
        match self {
            RegistrantStatus::Initial => "Initial",
            RegistrantStatus::Step1 => "Step 1",
            RegistrantStatus::Step2 => "Step 2",
            RegistrantStatus::Step3 => "Step 3",
            RegistrantStatus::Step4 => "Step 4",
            RegistrantStatus::Step5 => "Step 5",
            RegistrantStatus::Complete => "Complete",
            RegistrantStatus::Under18 => "Under 18",
            RegistrantStatus::Rejected => "Rejected",
        }
    }

    pub fn step_index(self) -> Option<u8> {
        Self::STEPS
            .iter()
            .position(|step| *step == self)
            .map(|index| index as u8)
    }

    /// Form step `n` (1..=5) as a status.
    pub fn form_step(n: u8) -> Option<Self> {
        match n {
            1..=5 => Some(Self::STEPS[usize::from(n)]),
            _ => None,
        }
    }
}

impl fmt::Display for RegistrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Partner-level switch controlling whether an email address is collected at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCollection {
    #[default]
    Required,
    Optional,
    Disabled,
}

/// Ephemeral tell-a-friend request; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TellFriendRequest {
    #[serde(default)]
    pub tell_from: Option<String>,
    #[serde(default)]
    pub tell_email: Option<String>,
    #[serde(default)]
    pub tell_recipients: Option<String>,
    #[serde(default)]
    pub tell_subject: Option<String>,
    #[serde(default)]
    pub tell_message: Option<String>,
}

/// Organization distributing the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub organization: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub whitelabeled: bool,
    #[serde(default)]
    pub government: bool,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub collect_email_address: EmailCollection,
    /// Survey question text keyed by locale.
    #[serde(default)]
    pub survey_question_1: BTreeMap<String, String>,
    #[serde(default)]
    pub survey_question_2: BTreeMap<String, String>,
}

impl Partner {
    pub fn survey_question(&self, number: u8, locale: &str) -> Option<&str> {
        let questions = match number {
            1 => &self.survey_question_1,
            2 => &self.survey_question_2,
            _ => return None,
        };
        questions.get(locale).map(String::as_str)
    }

    /// Whitelabeled non-primary partners send from their own address when they have one.
    pub fn sender_address<'a>(&'a self, default_from: &'a str) -> &'a str {
        match &self.from_email {
            Some(address) if !self.primary && self.whitelabeled && !address.trim().is_empty() => {
                address
            }
            _ => default_from,
        }
    }
}

/// One person's in-progress or completed registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registrant {
    pub id: RegistrantId,
    pub uid: RegistrantUid,
    pub partner_id: Option<PartnerId>,
    pub status: RegistrantStatus,
    pub locale: String,

    pub date_of_birth: Option<NaiveDate>,
    /// Unparseable input kept for redisplay.
    pub raw_date_of_birth: Option<String>,
    pub email_address: Option<String>,
    pub first_registration: bool,
    pub us_citizen: Option<bool>,
    pub has_state_license: Option<bool>,

    pub name_title: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub name_suffix: Option<String>,

    pub home_address: Option<String>,
    pub home_unit: Option<String>,
    pub home_city: Option<String>,
    pub home_state: Option<StateCode>,
    pub home_zip_code: Option<String>,

    pub has_mailing_address: bool,
    pub mailing_address: Option<String>,
    pub mailing_unit: Option<String>,
    pub mailing_city: Option<String>,
    pub mailing_state: Option<StateCode>,
    pub mailing_zip_code: Option<String>,

    pub change_of_name: bool,
    pub prev_name_title: Option<String>,
    pub prev_first_name: Option<String>,
    pub prev_middle_name: Option<String>,
    pub prev_last_name: Option<String>,
    pub prev_name_suffix: Option<String>,

    pub change_of_address: bool,
    pub prev_address: Option<String>,
    pub prev_unit: Option<String>,
    pub prev_city: Option<String>,
    pub prev_state: Option<StateCode>,
    pub prev_zip_code: Option<String>,

    pub party: Option<String>,
    pub race: Option<String>,
    pub phone: Option<String>,
    pub phone_type: Option<String>,
    pub state_id_number: Option<String>,

    pub opt_in_email: Option<bool>,
    pub opt_in_sms: Option<bool>,
    pub partner_opt_in_email: bool,
    pub partner_opt_in_sms: bool,
    pub volunteer: bool,
    pub partner_volunteer: bool,

    pub original_survey_question_1: Option<String>,
    pub survey_answer_1: Option<String>,
    pub original_survey_question_2: Option<String>,
    pub survey_answer_2: Option<String>,

    pub tracking_source: Option<String>,
    pub tracking_id: Option<String>,

    pub short_form: bool,
    pub javascript_disabled: bool,
    pub finish_with_state: bool,
    pub building_via_api_call: bool,
    pub send_confirmation_reminder_emails: Option<bool>,
    pub under_18_ok: bool,
    pub collect_email_address: EmailCollection,

    pub age: Option<i32>,
    pub official_party_name: Option<String>,
    pub barcode: Option<String>,
    pub ineligible_non_participating_state: bool,
    pub ineligible_age: bool,
    pub ineligible_non_citizen: bool,

    pub abandoned: bool,
    /// Persisted so a re-run of the staleness sweep never re-sends the external thank-you.
    pub thank_you_sent: bool,
    pub reminders_left: u8,
    pub pdf_ready: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    pub attest_true: Option<bool>,
    #[serde(skip)]
    pub tell_friend: Option<TellFriendRequest>,
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

impl Registrant {
    pub fn new(
        id: RegistrantId,
        partner_id: Option<PartnerId>,
        locale: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            partner_id,
            locale: locale.into(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    pub fn at_least_step(&self, step: u8) -> bool {
        self.status
            .step_index()
            .map(|index| index >= step)
            .unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.status == RegistrantStatus::Complete
    }

    pub fn has_phone(&self) -> bool {
        !is_blank(&self.phone)
    }

    pub fn collects_email_address(&self) -> bool {
        self.collect_email_address != EmailCollection::Disabled
    }

    /// Only partners that switch email collection off let step 1 pass without an address.
    pub fn requires_email_address(&self) -> bool {
        self.collects_email_address()
    }

    /// A usable address exists and the partner has not switched email off.
    pub fn send_emails(&self) -> bool {
        !is_blank(&self.email_address) && self.collects_email_address()
    }

    /// Parse and store a textual date of birth, keeping the raw text when it does not parse.
    pub fn set_date_of_birth(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.date_of_birth = None;
            self.raw_date_of_birth = None;
            return;
        }
        match derived::parse_date_of_birth(trimmed) {
            Ok(date) => {
                self.date_of_birth = Some(date);
                self.raw_date_of_birth = None;
            }
            Err(_) => {
                self.date_of_birth = None;
                self.raw_date_of_birth = Some(raw.to_string());
            }
        }
    }

    /// Store the home zip and re-derive the home state, keeping the previous state when the
    /// zip is not recognized.
    pub fn set_home_zip_code(&mut self, zip: Option<String>, directory: &JurisdictionDirectory) {
        if let Some(state) = zip
            .as_deref()
            .and_then(|zip| directory.state_for_zip(zip))
        {
            self.home_state = Some(state.code.clone());
        }
        self.home_zip_code = zip;
    }

    /// Text shown back in the date-of-birth input.
    pub fn form_date_of_birth(&self) -> Option<String> {
        if let Some(raw) = &self.raw_date_of_birth {
            return Some(raw.clone());
        }
        self.date_of_birth
            .map(|dob| dob.format("%-m-%-d-%Y").to_string())
    }

    /// Date of birth as printed on the paper form.
    pub fn pdf_date_of_birth(&self) -> String {
        match (&self.date_of_birth, &self.raw_date_of_birth) {
            (Some(dob), _) => dob.format("%m/%d/%Y").to_string(),
            (None, Some(raw)) => raw.clone(),
            (None, None) => String::new(),
        }
    }

    pub fn full_name(&self) -> String {
        join_present(&[
            &self.name_title,
            &self.first_name,
            &self.middle_name,
            &self.last_name,
            &self.name_suffix,
        ])
    }

    pub fn prev_full_name(&self) -> String {
        join_present(&[
            &self.prev_name_title,
            &self.prev_first_name,
            &self.prev_middle_name,
            &self.prev_last_name,
            &self.prev_name_suffix,
        ])
    }

    pub fn phone_and_type(&self) -> String {
        match (&self.phone, &self.phone_type) {
            (Some(phone), kind) if !phone.trim().is_empty() => {
                format!("{} ({})", phone, kind.as_deref().unwrap_or(""))
            }
            _ => "Not given".to_string(),
        }
    }

    pub fn ineligible(&self) -> bool {
        self.ineligible_non_participating_state
            || (self.ineligible_age && !self.under_18_ok)
            || self.ineligible_non_citizen
    }

    pub fn eligible(&self) -> bool {
        !self.ineligible()
    }

    /// Report code for the first failing eligibility check.
    pub fn ineligible_reason(&self) -> Option<&'static str> {
        if self.ineligible_non_citizen {
            Some("Not a US citizen")
        } else if self.ineligible_non_participating_state {
            Some("State doesn't participate")
        } else if self.ineligible_age {
            Some("Not old enough to register")
        } else {
            None
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.is_complete().then_some(self.updated_at)
    }

    pub fn extended_status(&self) -> String {
        match self.status {
            RegistrantStatus::Complete => "complete".to_string(),
            status if status.label().starts_with("step") => {
                format!("abandoned after {}", status.label().replace('_', " "))
            }
            _ => "abandoned".to_string(),
        }
    }

    pub fn redact_sensitive_data(&mut self) {
        self.state_id_number = None;
    }

    pub fn abandon(&mut self) {
        self.abandoned = true;
        self.redact_sensitive_data();
    }

    pub fn status_view(&self) -> RegistrantStatusView {
        RegistrantStatusView {
            uid: self.uid.clone(),
            status: self.status.label(),
            extended_status: self.extended_status(),
            barcode: self.barcode.clone(),
            age: self.age,
            eligible: self.eligible(),
            ineligible_reason: self.ineligible_reason(),
            official_party_name: self.official_party_name.clone(),
            pdf_ready: self.pdf_ready,
            form_date_of_birth: self.form_date_of_birth(),
        }
    }
}

fn join_present(parts: &[&Option<String>]) -> String {
    parts
        .iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sanitized representation of a registrant's progress for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrantStatusView {
    pub uid: RegistrantUid,
    pub status: &'static str,
    pub extended_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ineligible_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official_party_name: Option<String>,
    pub pdf_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_date_of_birth: Option<String>,
}

/// Mass-assignment payload for a form step or an API import. Absent values leave the record
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrantUpdate {
    pub locale: Option<String>,
    pub date_of_birth: Option<String>,
    pub email_address: Option<String>,
    pub first_registration: Option<bool>,
    pub us_citizen: Option<bool>,
    pub has_state_license: Option<bool>,
    pub name_title: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub name_suffix: Option<String>,
    pub home_address: Option<String>,
    pub home_unit: Option<String>,
    pub home_city: Option<String>,
    pub home_zip_code: Option<String>,
    pub has_mailing_address: Option<bool>,
    pub mailing_address: Option<String>,
    pub mailing_unit: Option<String>,
    pub mailing_city: Option<String>,
    pub mailing_state: Option<String>,
    pub mailing_zip_code: Option<String>,
    pub change_of_name: Option<bool>,
    pub prev_name_title: Option<String>,
    pub prev_first_name: Option<String>,
    pub prev_middle_name: Option<String>,
    pub prev_last_name: Option<String>,
    pub prev_name_suffix: Option<String>,
    pub change_of_address: Option<bool>,
    pub prev_address: Option<String>,
    pub prev_unit: Option<String>,
    pub prev_city: Option<String>,
    pub prev_state: Option<String>,
    pub prev_zip_code: Option<String>,
    pub party: Option<String>,
    pub race: Option<String>,
    pub phone: Option<String>,
    pub phone_type: Option<String>,
    pub state_id_number: Option<String>,
    pub opt_in_email: Option<bool>,
    pub opt_in_sms: Option<bool>,
    pub partner_opt_in_email: Option<bool>,
    pub partner_opt_in_sms: Option<bool>,
    pub volunteer: Option<bool>,
    pub partner_volunteer: Option<bool>,
    pub survey_question_1: Option<String>,
    pub survey_answer_1: Option<String>,
    pub survey_question_2: Option<String>,
    pub survey_answer_2: Option<String>,
    pub tracking_source: Option<String>,
    pub tracking_id: Option<String>,
    pub short_form: Option<bool>,
    pub javascript_disabled: Option<bool>,
    pub finish_with_state: Option<bool>,
    pub send_confirmation_reminder_emails: Option<bool>,
    pub under_18_ok: Option<bool>,
    pub attest_true: Option<bool>,
    pub tell_friend: Option<TellFriendRequest>,
}

macro_rules! assign {
    ($target:ident, $source:ident, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = $source.$field {
                $target.$field = Some(value);
            }
        )*
    };
}

macro_rules! assign_flags {
    ($target:ident, $source:ident, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(value) = $source.$field {
                $target.$field = value;
            }
        )*
    };
}

impl RegistrantUpdate {
    /// Copy every provided attribute onto the registrant.
    pub fn apply(self, registrant: &mut Registrant, directory: &JurisdictionDirectory) {
        if let Some(locale) = self.locale {
            registrant.locale = locale;
        }
        if let Some(raw) = self.date_of_birth.as_deref() {
            registrant.set_date_of_birth(raw);
        }
        if self.home_zip_code.is_some() {
            registrant.set_home_zip_code(self.home_zip_code, directory);
        }
        if let Some(raw) = self.mailing_state.as_deref() {
            registrant.mailing_state = StateCode::parse(raw);
        }
        if let Some(raw) = self.prev_state.as_deref() {
            registrant.prev_state = StateCode::parse(raw);
        }
        if let Some(question) = self.survey_question_1 {
            registrant.original_survey_question_1 = Some(question);
        }
        if let Some(question) = self.survey_question_2 {
            registrant.original_survey_question_2 = Some(question);
        }

        assign!(
            registrant,
            self,
            [
                email_address,
                us_citizen,
                has_state_license,
                name_title,
                first_name,
                middle_name,
                last_name,
                name_suffix,
                home_address,
                home_unit,
                home_city,
                mailing_address,
                mailing_unit,
                mailing_city,
                mailing_zip_code,
                prev_name_title,
                prev_first_name,
                prev_middle_name,
                prev_last_name,
                prev_name_suffix,
                prev_address,
                prev_unit,
                prev_city,
                prev_zip_code,
                party,
                race,
                phone,
                phone_type,
                state_id_number,
                opt_in_email,
                opt_in_sms,
                survey_answer_1,
                survey_answer_2,
                tracking_source,
                tracking_id,
                send_confirmation_reminder_emails,
                attest_true,
                tell_friend,
            ]
        );
        assign_flags!(
            registrant,
            self,
            [
                first_registration,
                has_mailing_address,
                change_of_name,
                change_of_address,
                partner_opt_in_email,
                partner_opt_in_sms,
                volunteer,
                partner_volunteer,
                short_form,
                javascript_disabled,
                finish_with_state,
                under_18_ok,
            ]
        );
    }

    /// Whether the payload touches a survey answer without supplying the question text.
    pub(crate) fn answers_without_question(&self, number: u8) -> bool {
        match number {
            1 => self.survey_answer_1.is_some() && self.survey_question_1.is_none(),
            2 => self.survey_answer_2.is_some() && self.survey_question_2.is_none(),
            _ => false,
        }
    }
}
