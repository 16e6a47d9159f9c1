//! Read-only per-state reference data: participation, required fields, party lists, and
//! translated tooltips. Everything is resolved through keyed tables built once at startup.

mod catalog;
mod seed;

pub use catalog::{CatalogList, LocaleCatalog, LocaleCatalogBuilder, ENGLISH, NO_PARTY_LABEL};

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Two-letter postal abbreviation, always upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateCode(String);

impl StateCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self(trimmed.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A jurisdiction and the registration rules it imposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoState {
    pub code: StateCode,
    pub name: String,
    pub participating: bool,
    pub requires_race: bool,
    pub requires_party: bool,
    /// Locales for which the state's own online registration system is available.
    pub online_reg_locales: Vec<String>,
    /// The state ships its own step-2 form.
    pub custom_step_2: bool,
    /// Inclusive ranges of three-digit zip prefixes.
    pub zip_prefix_ranges: Vec<(u16, u16)>,
}

impl GeoState {
    pub fn online_reg_enabled(&self, locale: &str) -> bool {
        self.online_reg_locales.iter().any(|enabled| enabled == locale)
    }
}

/// Translated, state-specific copy and option lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLocalization {
    pub state: StateCode,
    pub locale: String,
    pub parties: Vec<String>,
    pub no_party: String,
    pub id_number_tooltip: String,
    pub race_tooltip: String,
    pub party_tooltip: String,
    pub not_participating_tooltip: String,
    pub sub_18: String,
    pub registration_deadline: String,
    pub pdf_instructions: String,
    pub email_instructions: String,
    pub allows_ovr: bool,
}

impl StateLocalization {
    /// Party choices offered on the form, with the no-party option last.
    pub fn party_choices(&self) -> Vec<&str> {
        self.parties
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.no_party.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JurisdictionDirectory {
    states: BTreeMap<StateCode, GeoState>,
    zip_prefixes: HashMap<u16, StateCode>,
    localizations: HashMap<(StateCode, String), StateLocalization>,
    catalog: LocaleCatalog,
}

impl JurisdictionDirectory {
    pub fn new(
        states: Vec<GeoState>,
        localizations: Vec<StateLocalization>,
        catalog: LocaleCatalog,
    ) -> Self {
        let mut zip_prefixes = HashMap::new();
        for state in &states {
            for (start, end) in &state.zip_prefix_ranges {
                for prefix in *start..=*end {
                    zip_prefixes.insert(prefix, state.code.clone());
                }
            }
        }

        let localizations = localizations
            .into_iter()
            .map(|localization| {
                (
                    (localization.state.clone(), localization.locale.clone()),
                    localization,
                )
            })
            .collect();

        let states = states
            .into_iter()
            .map(|state| (state.code.clone(), state))
            .collect();

        Self {
            states,
            zip_prefixes,
            localizations,
            catalog,
        }
    }

    /// Directory seeded with the bundled state tables and the standard locale catalog.
    pub fn standard() -> Self {
        let (states, localizations) = seed::standard_states();
        Self::new(states, localizations, LocaleCatalog::standard())
    }

    pub fn catalog(&self) -> &LocaleCatalog {
        &self.catalog
    }

    pub fn state(&self, code: &StateCode) -> Option<&GeoState> {
        self.states.get(code)
    }

    pub fn states(&self) -> impl Iterator<Item = &GeoState> {
        self.states.values()
    }

    pub fn state_for_zip(&self, zip: &str) -> Option<&GeoState> {
        let prefix = zip.trim().get(0..3)?;
        if !prefix.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let prefix: u16 = prefix.parse().ok()?;
        self.zip_prefixes
            .get(&prefix)
            .and_then(|code| self.states.get(code))
    }

    pub fn valid_zip_code(&self, zip: &str) -> bool {
        self.state_for_zip(zip).is_some()
    }

    pub fn localization(&self, code: &StateCode, locale: &str) -> Option<&StateLocalization> {
        self.localizations.get(&(code.clone(), locale.to_string()))
    }

    pub fn en_localization(&self, code: &StateCode) -> Option<&StateLocalization> {
        self.localization(code, ENGLISH)
    }

    pub fn online_reg_enabled(&self, code: &StateCode, locale: &str) -> bool {
        self.state(code)
            .map(|state| state.online_reg_enabled(locale))
            .unwrap_or(false)
    }
}
