use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Translated option lists rendered on the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogList {
    Titles,
    Suffixes,
    Races,
    PhoneTypes,
}

#[derive(Debug, Clone, Default)]
struct LocaleEntries {
    language_name: String,
    lists: BTreeMap<CatalogList, Vec<(String, String)>>,
}

/// Keyed per-locale option tables. Every list keeps the same key order across locales so a
/// translated value can be mapped back to English by key or by position.
#[derive(Debug, Clone, Default)]
pub struct LocaleCatalog {
    locales: BTreeMap<String, LocaleEntries>,
}

pub const ENGLISH: &str = "en";
pub const NO_PARTY_LABEL: &str = "None";

impl LocaleCatalog {
    pub fn builder() -> LocaleCatalogBuilder {
        LocaleCatalogBuilder::default()
    }

    pub fn standard() -> Self {
        Self::builder()
            .locale("en", "English")
            .list(
                "en",
                CatalogList::Titles,
                &[("mr", "Mr."), ("mrs", "Mrs."), ("miss", "Miss"), ("ms", "Ms.")],
            )
            .list(
                "en",
                CatalogList::Suffixes,
                &[("jr", "Jr."), ("sr", "Sr."), ("ii", "II"), ("iii", "III"), ("iv", "IV")],
            )
            .list(
                "en",
                CatalogList::Races,
                &[
                    ("american_indian", "American Indian / Alaskan Native"),
                    ("asian", "Asian / Pacific Islander"),
                    ("black", "Black (not Hispanic)"),
                    ("hispanic", "Hispanic"),
                    ("multi_racial", "Multi-racial"),
                    ("white", "White (not Hispanic)"),
                    ("other", "Other"),
                    ("decline", "Decline to State"),
                ],
            )
            .list(
                "en",
                CatalogList::PhoneTypes,
                &[("mobile", "Mobile"), ("home", "Home"), ("work", "Work"), ("other", "Other")],
            )
            .locale("es", "Spanish")
            .list(
                "es",
                CatalogList::Titles,
                &[("mr", "Sr."), ("mrs", "Sra."), ("miss", "Srta."), ("ms", "Sa.")],
            )
            .list(
                "es",
                CatalogList::Suffixes,
                &[("jr", "Jr."), ("sr", "Sr."), ("ii", "II"), ("iii", "III"), ("iv", "IV")],
            )
            .list(
                "es",
                CatalogList::Races,
                &[
                    ("american_indian", "Indio Americano / Nativo de Alaska"),
                    ("asian", "Asiático / Isleño del Pacífico"),
                    ("black", "Negro (no hispano)"),
                    ("hispanic", "Hispano"),
                    ("multi_racial", "Multirracial"),
                    ("white", "Blanco (no hispano)"),
                    ("other", "Otro"),
                    ("decline", "Prefiero no declarar"),
                ],
            )
            .list(
                "es",
                CatalogList::PhoneTypes,
                &[("mobile", "Móvil"), ("home", "Casa"), ("work", "Trabajo"), ("other", "Otro")],
            )
            .build()
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }

    fn entries(&self, list: CatalogList, locale: &str) -> &[(String, String)] {
        self.locales
            .get(locale)
            .or_else(|| self.locales.get(ENGLISH))
            .and_then(|entries| entries.lists.get(&list))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Display values for one locale, falling back to English for unknown locales.
    pub fn values(&self, list: CatalogList, locale: &str) -> Vec<&str> {
        self.entries(list, locale)
            .iter()
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Every display value of a list across all configured locales.
    pub fn all_values(&self, list: CatalogList) -> Vec<&str> {
        self.locales
            .values()
            .filter_map(|entries| entries.lists.get(&list))
            .flat_map(|values| values.iter().map(|(_, value)| value.as_str()))
            .collect()
    }

    pub fn key_for(&self, list: CatalogList, locale: &str, value: &str) -> Option<&str> {
        self.entries(list, locale)
            .iter()
            .find(|(_, candidate)| candidate == value)
            .map(|(key, _)| key.as_str())
    }

    pub fn english_value(&self, list: CatalogList, key: &str) -> Option<&str> {
        self.entries(list, ENGLISH)
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Map a (possibly translated) race back to its English label.
    pub fn english_race<'a>(&'a self, locale: &str, race: &'a str) -> Option<&'a str> {
        let english = self.values(CatalogList::Races, ENGLISH);
        if locale == ENGLISH || english.contains(&race) {
            return Some(race);
        }
        let index = self
            .values(CatalogList::Races, locale)
            .iter()
            .position(|candidate| *candidate == race)?;
        english.get(index).copied()
    }

    /// The "decline to state" style entry closing the race list.
    pub fn declined_race(&self, locale: &str) -> Option<&str> {
        self.entries(CatalogList::Races, locale)
            .last()
            .map(|(_, value)| value.as_str())
    }

    pub fn language_name<'a>(&'a self, locale: &'a str) -> &'a str {
        self.locales
            .get(locale)
            .map(|entries| entries.language_name.as_str())
            .unwrap_or(locale)
    }
}

#[derive(Debug, Default)]
pub struct LocaleCatalogBuilder {
    locales: BTreeMap<String, LocaleEntries>,
}

impl LocaleCatalogBuilder {
    pub fn locale(mut self, locale: &str, language_name: &str) -> Self {
        self.locales
            .entry(locale.to_string())
            .or_default()
            .language_name = language_name.to_string();
        self
    }

    pub fn list(mut self, locale: &str, list: CatalogList, entries: &[(&str, &str)]) -> Self {
        let values = entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        self.locales
            .entry(locale.to_string())
            .or_default()
            .lists
            .insert(list, values);
        self
    }

    pub fn build(self) -> LocaleCatalog {
        LocaleCatalog {
            locales: self.locales,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_spanish_title_to_english_by_key() {
        let catalog = LocaleCatalog::standard();
        let key = catalog
            .key_for(CatalogList::Titles, "es", "Srta.")
            .expect("title key");
        assert_eq!(key, "miss");
        assert_eq!(catalog.english_value(CatalogList::Titles, key), Some("Miss"));
    }

    #[test]
    fn english_race_translates_by_position() {
        let catalog = LocaleCatalog::standard();
        assert_eq!(catalog.english_race("es", "Hispano"), Some("Hispanic"));
        assert_eq!(catalog.english_race("es", "Hispanic"), Some("Hispanic"));
        assert_eq!(catalog.english_race("es", "Marciano"), None);
        assert_eq!(catalog.english_race("en", "anything"), Some("anything"));
    }

    #[test]
    fn all_titles_span_every_locale() {
        let catalog = LocaleCatalog::standard();
        let titles = catalog.all_values(CatalogList::Titles);
        assert!(titles.contains(&"Mr."));
        assert!(titles.contains(&"Sra."));
    }

    #[test]
    fn unknown_locale_falls_back_to_english_lists() {
        let catalog = LocaleCatalog::standard();
        assert_eq!(catalog.values(CatalogList::PhoneTypes, "fr")[0], "Mobile");
        assert_eq!(catalog.language_name("fr"), "fr");
        assert_eq!(catalog.language_name("es"), "Spanish");
    }
}
