//! Values computed from a registrant's raw form data.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::jurisdiction::{JurisdictionDirectory, ENGLISH, NO_PARTY_LABEL};

use super::domain::{is_blank, Registrant, RegistrantStatus, RegistrantUid};

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").expect("month/day/year pattern")
});

static YEAR_MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})[/-](\d{1,2})[/-](\d{1,2})$").expect("year/month/day pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateOfBirthError {
    #[error("date of birth '{0}' is not in M/D/YYYY or YYYY-M-D form")]
    UnrecognizedFormat(String),
    #[error("date of birth '{0}' is not a real calendar date")]
    ImpossibleDate(String),
}

/// Parse `M/D/YYYY`, `M-D-YYYY`, `YYYY/M/D` or `YYYY-M-D`.
pub fn parse_date_of_birth(raw: &str) -> Result<NaiveDate, DateOfBirthError> {
    let trimmed = raw.trim();
    let (year, month, day) = if let Some(caps) = MONTH_DAY_YEAR.captures(trimmed) {
        (caps[3].parse::<i32>(), caps[1].parse::<u32>(), caps[2].parse::<u32>())
    } else if let Some(caps) = YEAR_MONTH_DAY.captures(trimmed) {
        (caps[1].parse::<i32>(), caps[2].parse::<u32>(), caps[3].parse::<u32>())
    } else {
        return Err(DateOfBirthError::UnrecognizedFormat(raw.to_string()));
    };

    let parsed = match (year, month, day) {
        (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day),
        _ => None,
    };
    parsed.ok_or_else(|| DateOfBirthError::ImpossibleDate(raw.to_string()))
}

/// Whole years between `dob` and `as_of`, counting a birthday only once it has happened.
pub fn age_on(dob: NaiveDate, as_of: NaiveDate) -> i32 {
    let mut years = as_of.year() - dob.year();
    if (dob.month(), dob.day()) > (as_of.month(), as_of.day()) {
        years -= 1;
    }
    years
}

/// Lock the age in at signup: measured against the record's creation date, never "now".
pub fn calculate_age(registrant: &mut Registrant, date_of_birth_valid: bool) {
    registrant.age = match registrant.date_of_birth {
        Some(dob) if date_of_birth_valid => Some(age_on(dob, registrant.created_at.date_naive())),
        _ => None,
    };
}

/// OCR-scannable tracking token printed on the PDF.
pub fn pdf_barcode(id: u64, prefix: &str) -> String {
    let code = format!("{:0>6}", to_base36(id));
    format!("*{prefix}-{code}*").to_uppercase()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut encoded = Vec::new();
    while value > 0 {
        encoded.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    encoded.reverse();
    String::from_utf8(encoded).unwrap_or_default()
}

/// Hour-granularity directory bucket for generated files.
pub fn bucket_code(created_at: DateTime<Utc>) -> String {
    created_at.format("%Y%m%d%H").to_string()
}

/// Fresh opaque identifier salted with the clock and a random nonce.
pub fn generate_uid(
    email_address: Option<&str>,
    home_zip_code: Option<&str>,
    now: DateTime<Utc>,
) -> RegistrantUid {
    let nonce: u32 = rand::random::<u32>() % 1_000_000;
    let seed = format!(
        "{} -- {} -- {} -- {}",
        now.timestamp_micros(),
        nonce,
        email_address.unwrap_or_default(),
        home_zip_code.unwrap_or_default()
    );
    RegistrantUid(hex::encode(Sha256::digest(seed.as_bytes())))
}

/// Party choices in the registrant's locale, `None` when the state does not register party.
pub fn state_parties(registrant: &Registrant, directory: &JurisdictionDirectory) -> Option<Vec<String>> {
    let state = directory.state(registrant.home_state.as_ref()?)?;
    if !state.requires_party {
        return None;
    }
    Some(
        directory
            .localization(&state.code, &registrant.locale)
            .map(|localization| localization.party_choices().into_iter().map(str::to_string).collect())
            .unwrap_or_default(),
    )
}

pub fn english_state_parties(
    registrant: &Registrant,
    directory: &JurisdictionDirectory,
) -> Option<Vec<String>> {
    let state = directory.state(registrant.home_state.as_ref()?)?;
    if !state.requires_party {
        return None;
    }
    Some(
        directory
            .en_localization(&state.code)
            .map(|localization| localization.party_choices().into_iter().map(str::to_string).collect())
            .unwrap_or_default(),
    )
}

/// The party choice translated back into the English list, used for inclusion checks.
pub fn english_party_name(registrant: &Registrant, directory: &JurisdictionDirectory) -> Option<String> {
    let party = registrant.party.as_deref()?;
    let english = english_state_parties(registrant, directory).unwrap_or_default();
    if registrant.locale == ENGLISH || english.iter().any(|choice| choice == party) {
        return Some(party.to_string());
    }
    let index = state_parties(registrant, directory)?
        .iter()
        .position(|choice| choice == party)?;
    english.get(index).cloned()
}

/// Canonical English party label for reporting, with the no-party sentinel mapped to "None".
pub fn official_party_name(registrant: &Registrant, directory: &JurisdictionDirectory) -> Option<String> {
    if is_blank(&registrant.party) {
        return Some(NO_PARTY_LABEL.to_string());
    }
    let party = registrant.party.as_deref()?;
    let state = registrant.home_state.as_ref()?;
    let english = directory.en_localization(state)?;

    if english.parties.iter().any(|choice| choice == party) {
        return Some(party.to_string());
    }
    if registrant.locale == ENGLISH {
        if party == english.no_party {
            return Some(NO_PARTY_LABEL.to_string());
        }
        return Some(party.to_string());
    }

    let localized = directory.localization(state, &registrant.locale)?;
    if party == localized.no_party {
        return Some(NO_PARTY_LABEL.to_string());
    }
    match localized.parties.iter().position(|choice| choice == party) {
        Some(index) => english.parties.get(index).cloned(),
        None => {
            warn!(
                registrant_id = %registrant.id,
                locale = %registrant.locale,
                party,
                "unknown party; no english equivalent"
            );
            None
        }
    }
}

pub fn set_official_party_name(registrant: &mut Registrant, directory: &JurisdictionDirectory) {
    if matches!(
        registrant.status,
        RegistrantStatus::Step5 | RegistrantStatus::Complete
    ) {
        registrant.official_party_name = official_party_name(registrant, directory);
    }
}

/// Refresh the three ineligibility flags from the current record.
pub fn check_ineligible(registrant: &mut Registrant, directory: &JurisdictionDirectory) {
    registrant.ineligible_non_participating_state = registrant
        .home_state
        .as_ref()
        .and_then(|code| directory.state(code))
        .map(|state| !state.participating)
        .unwrap_or(false);
    registrant.ineligible_age = registrant.age.map(|age| age < 18).unwrap_or(false);
    registrant.ineligible_non_citizen = registrant.us_citizen != Some(true);
}
