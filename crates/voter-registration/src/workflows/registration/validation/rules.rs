use std::borrow::Cow;

use super::super::domain::Registrant;

/// Attribute a rule reads and reports against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    PartnerId,
    HasStateLicense,
    Locale,
    EmailAddress,
    HomeZipCode,
    HomeState,
    DateOfBirth,
    UsCitizen,
    NameTitle,
    FirstName,
    MiddleName,
    LastName,
    NameSuffix,
    Race,
    HomeAddress,
    HomeUnit,
    HomeCity,
    Party,
    Phone,
    PhoneType,
    MailingAddress,
    MailingUnit,
    MailingCity,
    MailingState,
    MailingZipCode,
    StateIdNumber,
    PrevNameTitle,
    PrevFirstName,
    PrevMiddleName,
    PrevLastName,
    PrevAddress,
    PrevUnit,
    PrevCity,
    PrevState,
    PrevZipCode,
    AttestTrue,
    TellFrom,
    TellEmail,
    TellRecipients,
    TellSubject,
    TellMessage,
    OptInEmail,
    OptInSms,
    SendConfirmationReminderEmails,
}

pub(crate) enum FieldValue<'a> {
    Text(Option<Cow<'a, str>>),
    Flag(Option<bool>),
    Present(bool),
}

impl FieldValue<'_> {
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.as_deref().map(|t| t.trim().is_empty()).unwrap_or(true),
            FieldValue::Flag(flag) => flag.is_none(),
            FieldValue::Present(present) => !present,
        }
    }

    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(Some(text)) if !text.trim().is_empty() => Some(text.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(flag) => *flag,
            _ => None,
        }
    }
}

fn text(value: &Option<String>) -> FieldValue<'_> {
    FieldValue::Text(value.as_deref().map(Cow::Borrowed))
}

impl Field {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Field::PartnerId => "partner_id",
            Field::HasStateLicense => "has_state_license",
            Field::Locale => "locale",
            Field::EmailAddress => "email_address",
            Field::HomeZipCode => "home_zip_code",
            Field::HomeState => "home_state",
            Field::DateOfBirth => "date_of_birth",
            Field::UsCitizen => "us_citizen",
            Field::NameTitle => "name_title",
            Field::FirstName => "first_name",
            Field::MiddleName => "middle_name",
            Field::LastName => "last_name",
            Field::NameSuffix => "name_suffix",
            Field::Race => "race",
            Field::HomeAddress => "home_address",
            Field::HomeUnit => "home_unit",
            Field::HomeCity => "home_city",
            Field::Party => "party",
            Field::Phone => "phone",
            Field::PhoneType => "phone_type",
            Field::MailingAddress => "mailing_address",
            Field::MailingUnit => "mailing_unit",
            Field::MailingCity => "mailing_city",
            Field::MailingState => "mailing_state",
            Field::MailingZipCode => "mailing_zip_code",
            Field::StateIdNumber => "state_id_number",
            Field::PrevNameTitle => "prev_name_title",
            Field::PrevFirstName => "prev_first_name",
            Field::PrevMiddleName => "prev_middle_name",
            Field::PrevLastName => "prev_last_name",
            Field::PrevAddress => "prev_address",
            Field::PrevUnit => "prev_unit",
            Field::PrevCity => "prev_city",
            Field::PrevState => "prev_state",
            Field::PrevZipCode => "prev_zip_code",
            Field::AttestTrue => "attest_true",
            Field::TellFrom => "tell_from",
            Field::TellEmail => "tell_email",
            Field::TellRecipients => "tell_recipients",
            Field::TellSubject => "tell_subject",
            Field::TellMessage => "tell_message",
            Field::OptInEmail => "opt_in_email",
            Field::OptInSms => "opt_in_sms",
            Field::SendConfirmationReminderEmails => "send_confirmation_reminder_emails",
        }
    }

    pub(crate) fn value(self, registrant: &Registrant) -> FieldValue<'_> {
        let tell = registrant.tell_friend.as_ref();
        match self {
            Field::PartnerId => FieldValue::Present(registrant.partner_id.is_some()),
            Field::HasStateLicense => FieldValue::Flag(registrant.has_state_license),
            Field::Locale => FieldValue::Text(Some(Cow::Borrowed(registrant.locale.as_str()))),
            Field::EmailAddress => text(&registrant.email_address),
            Field::HomeZipCode => text(&registrant.home_zip_code),
            Field::HomeState => FieldValue::Text(
                registrant
                    .home_state
                    .as_ref()
                    .map(|code| Cow::Borrowed(code.as_str())),
            ),
            Field::DateOfBirth => FieldValue::Text(
                registrant
                    .date_of_birth
                    .map(|dob| Cow::Owned(dob.to_string()))
                    .or_else(|| registrant.raw_date_of_birth.as_deref().map(Cow::Borrowed)),
            ),
            Field::UsCitizen => FieldValue::Flag(registrant.us_citizen),
            Field::NameTitle => text(&registrant.name_title),
            Field::FirstName => text(&registrant.first_name),
            Field::MiddleName => text(&registrant.middle_name),
            Field::LastName => text(&registrant.last_name),
            Field::NameSuffix => text(&registrant.name_suffix),
            Field::Race => text(&registrant.race),
            Field::HomeAddress => text(&registrant.home_address),
            Field::HomeUnit => text(&registrant.home_unit),
            Field::HomeCity => text(&registrant.home_city),
            Field::Party => text(&registrant.party),
            Field::Phone => text(&registrant.phone),
            Field::PhoneType => text(&registrant.phone_type),
            Field::MailingAddress => text(&registrant.mailing_address),
            Field::MailingUnit => text(&registrant.mailing_unit),
            Field::MailingCity => text(&registrant.mailing_city),
            Field::MailingState => FieldValue::Text(
                registrant
                    .mailing_state
                    .as_ref()
                    .map(|code| Cow::Borrowed(code.as_str())),
            ),
            Field::MailingZipCode => text(&registrant.mailing_zip_code),
            Field::StateIdNumber => text(&registrant.state_id_number),
            Field::PrevNameTitle => text(&registrant.prev_name_title),
            Field::PrevFirstName => text(&registrant.prev_first_name),
            Field::PrevMiddleName => text(&registrant.prev_middle_name),
            Field::PrevLastName => text(&registrant.prev_last_name),
            Field::PrevAddress => text(&registrant.prev_address),
            Field::PrevUnit => text(&registrant.prev_unit),
            Field::PrevCity => text(&registrant.prev_city),
            Field::PrevState => FieldValue::Text(
                registrant
                    .prev_state
                    .as_ref()
                    .map(|code| Cow::Borrowed(code.as_str())),
            ),
            Field::PrevZipCode => text(&registrant.prev_zip_code),
            Field::AttestTrue => FieldValue::Flag(registrant.attest_true),
            Field::TellFrom => FieldValue::Text(
                tell.and_then(|t| t.tell_from.as_deref())
                    .map(Cow::Borrowed),
            ),
            Field::TellEmail => FieldValue::Text(
                tell.and_then(|t| t.tell_email.as_deref())
                    .map(Cow::Borrowed),
            ),
            Field::TellRecipients => FieldValue::Text(
                tell.and_then(|t| t.tell_recipients.as_deref())
                    .map(Cow::Borrowed),
            ),
            Field::TellSubject => FieldValue::Text(
                tell.and_then(|t| t.tell_subject.as_deref())
                    .map(Cow::Borrowed),
            ),
            Field::TellMessage => FieldValue::Text(
                tell.and_then(|t| t.tell_message.as_deref())
                    .map(Cow::Borrowed),
            ),
            Field::OptInEmail => FieldValue::Flag(registrant.opt_in_email),
            Field::OptInSms => FieldValue::Flag(registrant.opt_in_sms),
            Field::SendConfirmationReminderEmails => {
                FieldValue::Flag(registrant.send_confirmation_reminder_emails)
            }
        }
    }
}

/// Condition over the record's step and flags gating a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Predicate {
    AtLeastStep(u8),
    CustomStep2,
    UsesShortForm,
    NeedsMailingAddress,
    NeedsPrevName,
    NeedsPrevAddress,
    BuildingViaApi,
    FinishWithState,
    TellingFriends,
    Complete,
    HasPhone,
    EmailNotRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pattern {
    Email,
    Phone,
    StateIdNumber,
    PdfSafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Choices {
    Titles,
    Suffixes,
    Locales,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Check {
    Presence,
    /// Must be answered either way.
    Boolean,
    MustBeTrue,
    /// Fails only on an explicit `false`.
    Acceptance,
    Format(Pattern),
    Inclusion(Choices),
    ZipCode,
    DateOfBirth,
    Race,
    Party,
    PhoneIfSmsOptIn,
}

pub(crate) struct Rule {
    pub field: Field,
    pub when: &'static [Predicate],
    pub unless: &'static [Predicate],
    pub check: Check,
}

const fn rule(
    field: Field,
    when: &'static [Predicate],
    unless: &'static [Predicate],
    check: Check,
) -> Rule {
    Rule {
        field,
        when,
        unless,
        check,
    }
}

use Predicate::*;

const STEP_1: &[Predicate] = &[AtLeastStep(1)];
const STEP_2: &[Predicate] = &[AtLeastStep(2)];
const STEP_3: &[Predicate] = &[AtLeastStep(3)];
const STEP_5: &[Predicate] = &[AtLeastStep(5)];
const STEP_2_CUSTOM: &[Predicate] = &[AtLeastStep(2), CustomStep2];
const STEP_3_CUSTOM: &[Predicate] = &[AtLeastStep(3), CustomStep2];
const STEP_2_SHORT_FORM: &[Predicate] = &[AtLeastStep(2), UsesShortForm];
const STEP_2_WITH_PHONE: &[Predicate] = &[AtLeastStep(2), HasPhone];
const STEP_2_CUSTOM_WITH_PHONE: &[Predicate] = &[AtLeastStep(2), CustomStep2, HasPhone];
const STEP_2_SHORT_FORM_WITH_PHONE: &[Predicate] = &[AtLeastStep(2), UsesShortForm, HasPhone];
const API: &[Predicate] = &[BuildingViaApi];
const API_FINISH_WITH_STATE: &[Predicate] = &[BuildingViaApi, FinishWithState];
const NO_EXCEPTIONS: &[Predicate] = &[];
const ALWAYS: &[Predicate] = &[];
const STATE_HANDLES_STEP_2: &[Predicate] = &[FinishWithState, CustomStep2];
const API_OR_CUSTOM: &[Predicate] = &[BuildingViaApi, CustomStep2];

/// Every conditional rule, evaluated in order on each pass.
pub(crate) const RULES: &[Rule] = &[
    // step 1: eligibility and contact
    rule(Field::PartnerId, STEP_1, NO_EXCEPTIONS, Check::Presence),
    rule(Field::HasStateLicense, STEP_1, API, Check::Boolean),
    rule(Field::Locale, STEP_1, NO_EXCEPTIONS, Check::Inclusion(Choices::Locales)),
    rule(Field::EmailAddress, STEP_1, &[EmailNotRequired], Check::Presence),
    rule(Field::EmailAddress, STEP_1, NO_EXCEPTIONS, Check::Format(Pattern::Email)),
    rule(Field::HomeZipCode, STEP_1, NO_EXCEPTIONS, Check::ZipCode),
    rule(Field::HomeState, STEP_1, NO_EXCEPTIONS, Check::Presence),
    rule(Field::DateOfBirth, STEP_1, NO_EXCEPTIONS, Check::DateOfBirth),
    rule(Field::UsCitizen, STEP_1, API, Check::Boolean),
    // step 2: name, address, party
    rule(Field::NameTitle, STEP_2, NO_EXCEPTIONS, Check::Presence),
    rule(Field::NameTitle, STEP_2, NO_EXCEPTIONS, Check::Inclusion(Choices::Titles)),
    rule(Field::FirstName, STEP_2, API, Check::Presence),
    rule(Field::LastName, STEP_2, NO_EXCEPTIONS, Check::Presence),
    rule(Field::NameSuffix, STEP_2, NO_EXCEPTIONS, Check::Inclusion(Choices::Suffixes)),
    rule(Field::Race, STEP_2, STATE_HANDLES_STEP_2, Check::Race),
    rule(Field::HomeAddress, STEP_2, STATE_HANDLES_STEP_2, Check::Presence),
    rule(Field::HomeCity, STEP_2, STATE_HANDLES_STEP_2, Check::Presence),
    rule(Field::Party, STEP_2, API_OR_CUSTOM, Check::Party),
    rule(Field::Phone, STEP_2, NO_EXCEPTIONS, Check::Format(Pattern::Phone)),
    rule(Field::PhoneType, STEP_2_WITH_PHONE, NO_EXCEPTIONS, Check::Presence),
    // step 2 when the state ships its own form
    rule(Field::Phone, STEP_2_CUSTOM, NO_EXCEPTIONS, Check::Format(Pattern::Phone)),
    rule(Field::PhoneType, STEP_2_CUSTOM_WITH_PHONE, NO_EXCEPTIONS, Check::Presence),
    rule(Field::Phone, STEP_2_CUSTOM, NO_EXCEPTIONS, Check::PhoneIfSmsOptIn),
    // mailing address
    rule(Field::MailingAddress, &[NeedsMailingAddress], NO_EXCEPTIONS, Check::Presence),
    rule(Field::MailingCity, &[NeedsMailingAddress], NO_EXCEPTIONS, Check::Presence),
    rule(Field::MailingState, &[NeedsMailingAddress], NO_EXCEPTIONS, Check::Presence),
    rule(Field::MailingZipCode, &[NeedsMailingAddress], NO_EXCEPTIONS, Check::ZipCode),
    // step 3: identification
    rule(Field::StateIdNumber, STEP_3, &[Complete], Check::Presence),
    rule(Field::StateIdNumber, STEP_3, NO_EXCEPTIONS, Check::Format(Pattern::StateIdNumber)),
    rule(Field::Phone, STEP_3, NO_EXCEPTIONS, Check::PhoneIfSmsOptIn),
    // short form folds step 3 into step 2
    rule(Field::StateIdNumber, STEP_2_SHORT_FORM, &[Complete], Check::Presence),
    rule(
        Field::StateIdNumber,
        STEP_2_SHORT_FORM,
        NO_EXCEPTIONS,
        Check::Format(Pattern::StateIdNumber),
    ),
    rule(Field::Phone, STEP_2_SHORT_FORM, NO_EXCEPTIONS, Check::Format(Pattern::Phone)),
    rule(Field::PhoneType, STEP_2_SHORT_FORM_WITH_PHONE, NO_EXCEPTIONS, Check::Presence),
    rule(Field::Phone, STEP_2_SHORT_FORM, NO_EXCEPTIONS, Check::PhoneIfSmsOptIn),
    // custom step 2 defers address, race and party to step 3
    rule(Field::HomeAddress, STEP_3_CUSTOM, NO_EXCEPTIONS, Check::Presence),
    rule(Field::HomeCity, STEP_3_CUSTOM, NO_EXCEPTIONS, Check::Presence),
    rule(Field::Race, STEP_3_CUSTOM, NO_EXCEPTIONS, Check::Race),
    rule(Field::Party, STEP_3_CUSTOM, API, Check::Party),
    // previous name and address
    rule(Field::PrevNameTitle, &[NeedsPrevName], NO_EXCEPTIONS, Check::Presence),
    rule(Field::PrevFirstName, &[NeedsPrevName], NO_EXCEPTIONS, Check::Presence),
    rule(Field::PrevLastName, &[NeedsPrevName], NO_EXCEPTIONS, Check::Presence),
    rule(Field::PrevAddress, &[NeedsPrevAddress], NO_EXCEPTIONS, Check::Presence),
    rule(Field::PrevCity, &[NeedsPrevAddress], NO_EXCEPTIONS, Check::Presence),
    rule(Field::PrevState, &[NeedsPrevAddress], NO_EXCEPTIONS, Check::Presence),
    rule(Field::PrevZipCode, &[NeedsPrevAddress], NO_EXCEPTIONS, Check::ZipCode),
    // step 5
    rule(Field::AttestTrue, STEP_5, NO_EXCEPTIONS, Check::Acceptance),
    // tell a friend
    rule(Field::TellFrom, &[TellingFriends], NO_EXCEPTIONS, Check::Presence),
    rule(Field::TellEmail, &[TellingFriends], NO_EXCEPTIONS, Check::Presence),
    rule(Field::TellEmail, &[TellingFriends], NO_EXCEPTIONS, Check::Format(Pattern::Email)),
    rule(Field::TellRecipients, &[TellingFriends], NO_EXCEPTIONS, Check::Presence),
    rule(Field::TellSubject, &[TellingFriends], NO_EXCEPTIONS, Check::Presence),
    rule(Field::TellMessage, &[TellingFriends], NO_EXCEPTIONS, Check::Presence),
    // bulk import
    rule(Field::OptInEmail, API, NO_EXCEPTIONS, Check::Boolean),
    rule(Field::OptInSms, API, NO_EXCEPTIONS, Check::Boolean),
    rule(Field::UsCitizen, API, NO_EXCEPTIONS, Check::MustBeTrue),
    rule(
        Field::SendConfirmationReminderEmails,
        API_FINISH_WITH_STATE,
        NO_EXCEPTIONS,
        Check::Presence,
    ),
    // characters the paper form can print
    rule(Field::HomeZipCode, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::FirstName, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::MiddleName, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::LastName, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::HomeAddress, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::HomeUnit, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::HomeCity, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::MailingAddress, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::MailingUnit, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::MailingCity, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::MailingZipCode, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevFirstName, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevMiddleName, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevLastName, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevAddress, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevUnit, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevCity, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
    rule(Field::PrevZipCode, ALWAYS, NO_EXCEPTIONS, Check::Format(Pattern::PdfSafe)),
];
