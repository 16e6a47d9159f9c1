use super::{GeoState, StateCode, StateLocalization};

struct StateSeed {
    code: &'static str,
    name: &'static str,
    participating: bool,
    requires_race: bool,
    requires_party: bool,
    online_reg_locales: &'static [&'static str],
    custom_step_2: bool,
    zip_prefix_ranges: &'static [(u16, u16)],
    deadline: &'static str,
    parties_en: &'static [&'static str],
    no_party_en: &'static str,
    parties_es: &'static [&'static str],
    no_party_es: &'static str,
}

const STATES: &[StateSeed] = &[
    StateSeed {
        code: "AL",
        name: "Alabama",
        participating: true,
        requires_race: true,
        requires_party: false,
        online_reg_locales: &[],
        custom_step_2: false,
        zip_prefix_ranges: &[(350, 369)],
        deadline: "Postmarked 14 days before the election",
        parties_en: &[],
        no_party_en: "",
        parties_es: &[],
        no_party_es: "",
    },
    StateSeed {
        code: "CA",
        name: "California",
        participating: true,
        requires_race: false,
        requires_party: true,
        online_reg_locales: &["en", "es"],
        custom_step_2: true,
        zip_prefix_ranges: &[(900, 961)],
        deadline: "Postmarked 15 days before the election",
        parties_en: &[
            "American Independent",
            "Democratic",
            "Green",
            "Libertarian",
            "Peace and Freedom",
            "Republican",
        ],
        no_party_en: "Decline to State",
        parties_es: &[
            "Independiente Americano",
            "Demócrata",
            "Verde",
            "Libertario",
            "Paz y Libertad",
            "Republicano",
        ],
        no_party_es: "Me niego a declarar",
    },
    StateSeed {
        code: "FL",
        name: "Florida",
        participating: true,
        requires_race: true,
        requires_party: true,
        online_reg_locales: &[],
        custom_step_2: false,
        zip_prefix_ranges: &[(320, 349)],
        deadline: "Postmarked 29 days before the election",
        parties_en: &["Democratic", "Green", "Libertarian", "Reform", "Republican"],
        no_party_en: "No Party Affiliation",
        parties_es: &["Demócrata", "Verde", "Libertario", "Reforma", "Republicano"],
        no_party_es: "Sin afiliación partidista",
    },
    StateSeed {
        code: "MA",
        name: "Massachusetts",
        participating: true,
        requires_race: false,
        requires_party: true,
        online_reg_locales: &["en"],
        custom_step_2: false,
        zip_prefix_ranges: &[(10, 27)],
        deadline: "Postmarked 20 days before the election",
        parties_en: &["Democratic", "Green-Rainbow", "Libertarian", "Republican"],
        no_party_en: "Unenrolled",
        parties_es: &["Demócrata", "Verde-Arcoíris", "Libertario", "Republicano"],
        no_party_es: "No inscrito",
    },
    StateSeed {
        code: "ND",
        name: "North Dakota",
        participating: false,
        requires_race: false,
        requires_party: false,
        online_reg_locales: &[],
        custom_step_2: false,
        zip_prefix_ranges: &[(580, 588)],
        deadline: "North Dakota does not require registration",
        parties_en: &[],
        no_party_en: "",
        parties_es: &[],
        no_party_es: "",
    },
    StateSeed {
        code: "NY",
        name: "New York",
        participating: true,
        requires_race: false,
        requires_party: true,
        online_reg_locales: &[],
        custom_step_2: false,
        zip_prefix_ranges: &[(100, 149)],
        deadline: "Postmarked 25 days before the election",
        parties_en: &["Conservative", "Democratic", "Green", "Republican", "Working Families"],
        no_party_en: "No party",
        parties_es: &["Conservador", "Demócrata", "Verde", "Republicano", "Familias Trabajadoras"],
        no_party_es: "Ningún partido",
    },
    StateSeed {
        code: "PA",
        name: "Pennsylvania",
        participating: true,
        requires_race: false,
        requires_party: true,
        online_reg_locales: &["en"],
        custom_step_2: true,
        zip_prefix_ranges: &[(150, 196)],
        deadline: "Received 15 days before the election",
        parties_en: &["Democratic", "Green", "Libertarian", "Republican"],
        no_party_en: "No Affiliation",
        parties_es: &["Demócrata", "Verde", "Libertario", "Republicano"],
        no_party_es: "Sin afiliación",
    },
    StateSeed {
        code: "TX",
        name: "Texas",
        participating: true,
        requires_race: false,
        requires_party: false,
        online_reg_locales: &[],
        custom_step_2: false,
        zip_prefix_ranges: &[(750, 799), (885, 885)],
        deadline: "Postmarked 30 days before the election",
        parties_en: &[],
        no_party_en: "",
        parties_es: &[],
        no_party_es: "",
    },
];

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

pub(super) fn standard_states() -> (Vec<GeoState>, Vec<StateLocalization>) {
    let mut states = Vec::with_capacity(STATES.len());
    let mut localizations = Vec::with_capacity(STATES.len() * 2);

    for seed in STATES {
        let Some(code) = StateCode::parse(seed.code) else {
            continue;
        };

        states.push(GeoState {
            code: code.clone(),
            name: seed.name.to_string(),
            participating: seed.participating,
            requires_race: seed.requires_race,
            requires_party: seed.requires_party,
            online_reg_locales: to_strings(seed.online_reg_locales),
            custom_step_2: seed.custom_step_2,
            zip_prefix_ranges: seed.zip_prefix_ranges.to_vec(),
        });

        localizations.push(StateLocalization {
            state: code.clone(),
            locale: "en".to_string(),
            parties: to_strings(seed.parties_en),
            no_party: seed.no_party_en.to_string(),
            id_number_tooltip: format!(
                "{} accepts a driver's license number, state ID number, or the last four digits of your SSN.",
                seed.name
            ),
            race_tooltip: "Race is collected for Voting Rights Act reporting.".to_string(),
            party_tooltip: "Choosing a party lets you vote in that party's primary.".to_string(),
            not_participating_tooltip: format!(
                "{} does not accept the national mail-in voter registration form.",
                seed.name
            ),
            sub_18: "You must be 18 by the next general election.".to_string(),
            registration_deadline: seed.deadline.to_string(),
            pdf_instructions: format!("Mail your signed form to your {} county election office.", seed.name),
            email_instructions: "Print, sign, and mail the attached form.".to_string(),
            allows_ovr: !seed.online_reg_locales.is_empty(),
        });

        localizations.push(StateLocalization {
            state: code,
            locale: "es".to_string(),
            parties: to_strings(seed.parties_es),
            no_party: seed.no_party_es.to_string(),
            id_number_tooltip: format!(
                "{} acepta su número de licencia de conducir, identificación estatal o los últimos cuatro dígitos de su SSN.",
                seed.name
            ),
            race_tooltip: "La raza se recopila para los informes de la Ley de Derecho al Voto.".to_string(),
            party_tooltip: "Elegir un partido le permite votar en sus primarias.".to_string(),
            not_participating_tooltip: format!(
                "{} no acepta el formulario nacional de inscripción por correo.",
                seed.name
            ),
            sub_18: "Debe tener 18 años para la próxima elección general.".to_string(),
            registration_deadline: seed.deadline.to_string(),
            pdf_instructions: format!(
                "Envíe su formulario firmado a la oficina electoral de su condado en {}.",
                seed.name
            ),
            email_instructions: "Imprima, firme y envíe el formulario adjunto.".to_string(),
            allows_ovr: seed.online_reg_locales.contains(&"es"),
        });
    }

    (states, localizations)
}
