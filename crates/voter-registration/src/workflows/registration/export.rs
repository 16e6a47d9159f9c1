//! Partner-facing CSV export. Column order is consumed by downstream tooling and must not
//! change.

use std::io::Write;

use crate::jurisdiction::JurisdictionDirectory;

use super::domain::{is_blank, Partner, Registrant};

pub const CSV_HEADER: [&str; 42] = [
    "Status",
    "Tracking Source",
    "Tracking ID",
    "Language",
    "Date of birth",
    "Email address",
    "First registration?",
    "US citizen?",
    "Salutation",
    "First name",
    "Middle name",
    "Last name",
    "Name suffix",
    "Home address",
    "Home unit",
    "Home city",
    "Home state",
    "Home zip code",
    "Has mailing address?",
    "Mailing address",
    "Mailing unit",
    "Mailing city",
    "Mailing state",
    "Mailing zip code",
    "Party",
    "Race",
    "Phone",
    "Phone type",
    "Opt-in to RTV email?",
    "Opt-in to RTV sms?",
    "Opt-in to Partner email?",
    "Opt-in to Partner sms?",
    "Survey question 1",
    "Survey answer 1",
    "Survey question 2",
    "Survey answer 2",
    "Volunteer for RTV",
    "Volunteer for partner",
    "Ineligible reason",
    "Started registration",
    "Finish with State",
    "Built via API",
];

#[derive(Debug)]
pub enum RegistrantExportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for RegistrantExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrantExportError::Io(err) => write!(f, "failed to write registrant export: {}", err),
            RegistrantExportError::Csv(err) => write!(f, "invalid registrant CSV output: {}", err),
        }
    }
}

impl std::error::Error for RegistrantExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistrantExportError::Io(err) => Some(err),
            RegistrantExportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RegistrantExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RegistrantExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

fn yes_no(value: bool) -> String {
    let label = if value { "Yes" } else { "No" };
    label.to_string()
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Recorded question text, falling back to the partner's wording for the registrant's locale.
fn survey_question(
    recorded: &Option<String>,
    number: u8,
    registrant: &Registrant,
    partner: Option<&Partner>,
) -> String {
    if !is_blank(recorded) {
        return cell(recorded);
    }
    partner
        .and_then(|partner| partner.survey_question(number, &registrant.locale))
        .unwrap_or_default()
        .to_string()
}

/// One export row, aligned with [`CSV_HEADER`].
pub fn to_csv_record(
    registrant: &Registrant,
    partner: Option<&Partner>,
    directory: &JurisdictionDirectory,
) -> Vec<String> {
    vec![
        registrant.status.humanized().to_string(),
        cell(&registrant.tracking_source),
        cell(&registrant.tracking_id),
        directory.catalog().language_name(&registrant.locale).to_string(),
        registrant.pdf_date_of_birth(),
        cell(&registrant.email_address),
        yes_no(registrant.first_registration),
        yes_no(registrant.us_citizen == Some(true)),
        cell(&registrant.name_title),
        cell(&registrant.first_name),
        cell(&registrant.middle_name),
        cell(&registrant.last_name),
        cell(&registrant.name_suffix),
        cell(&registrant.home_address),
        cell(&registrant.home_unit),
        cell(&registrant.home_city),
        registrant
            .home_state
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        cell(&registrant.home_zip_code),
        yes_no(registrant.has_mailing_address),
        cell(&registrant.mailing_address),
        cell(&registrant.mailing_unit),
        cell(&registrant.mailing_city),
        registrant
            .mailing_state
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        cell(&registrant.mailing_zip_code),
        cell(&registrant.party),
        cell(&registrant.race),
        cell(&registrant.phone),
        cell(&registrant.phone_type),
        yes_no(registrant.opt_in_email == Some(true)),
        yes_no(registrant.opt_in_sms == Some(true)),
        yes_no(registrant.partner_opt_in_email),
        yes_no(registrant.partner_opt_in_sms),
        survey_question(&registrant.original_survey_question_1, 1, registrant, partner),
        cell(&registrant.survey_answer_1),
        survey_question(&registrant.original_survey_question_2, 2, registrant, partner),
        cell(&registrant.survey_answer_2),
        yes_no(registrant.volunteer),
        yes_no(registrant.partner_volunteer),
        registrant.ineligible_reason().unwrap_or_default().to_string(),
        registrant.created_at.format("%m/%d/%Y").to_string(),
        yes_no(registrant.finish_with_state),
        yes_no(registrant.building_via_api_call),
    ]
}

/// Write the header and one row per `(registrant, partner)` pair.
pub fn write_csv<'a, W, I>(
    writer: W,
    rows: I,
    directory: &JurisdictionDirectory,
) -> Result<usize, RegistrantExportError>
where
    W: Write,
    I: IntoIterator<Item = (&'a Registrant, Option<&'a Partner>)>,
{
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    let mut written = 0;
    for (registrant, partner) in rows {
        csv_writer.write_record(to_csv_record(registrant, partner, directory))?;
        written += 1;
    }
    csv_writer.flush()?;
    Ok(written)
}
