use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::common::*;
use crate::jurisdiction::StateCode;
use crate::workflows::registration::domain::{Registrant, RegistrantId, RegistrantUid};
use crate::workflows::registration::pdf::{PdfArchive, PdfForm};

fn archive() -> (PdfArchive, Arc<CountingRenderer>, Arc<MemoryPdfStore>) {
    let renderer = Arc::new(CountingRenderer::default());
    let store = Arc::new(MemoryPdfStore::default());
    let archive = PdfArchive::new("pdfs", renderer.clone(), store.clone());
    (archive, renderer, store)
}

fn printable() -> Registrant {
    let created = Utc.with_ymd_and_hms(2024, 3, 9, 7, 30, 0).single().expect("valid time");
    let mut registrant = Registrant::new(RegistrantId(42), None, "es", created);
    registrant.uid = RegistrantUid("abc123".to_string());
    registrant.home_state = StateCode::parse("AL");
    registrant.first_name = Some("Ana".to_string());
    registrant.last_name = Some("Lopez".to_string());
    registrant.home_address = Some("1 Dexter Ave".to_string());
    registrant.home_city = Some("Montgomery".to_string());
    registrant.home_zip_code = Some("36104".to_string());
    registrant.race = Some("Hispano".to_string());
    registrant.barcode = Some("*RTV-00001A*".to_string());
    registrant
}

#[test]
fn files_are_bucketed_by_creation_hour() {
    let (archive, _, _) = archive();
    assert_eq!(
        archive.path_for(&printable()),
        PathBuf::from("pdfs").join("2024030907").join("abc123.pdf")
    );
    assert_eq!(PdfArchive::content_type().essence_str(), "application/pdf");
}

#[test]
fn form_prints_english_race_and_joined_address() {
    let form = PdfForm::from_registrant(&printable(), &directory()).expect("printable");
    assert_eq!(form.state_name, "Alabama");
    assert_eq!(form.race, "Hispanic");
    assert_eq!(form.full_name, "Ana Lopez");
    assert_eq!(form.home_address, "1 Dexter Ave, Montgomery, AL, 36104");
    assert_eq!(form.party, "");
}

#[test]
fn declined_race_prints_blank() {
    let mut registrant = printable();
    registrant.race = Some("Prefiero no declarar".to_string());
    let form = PdfForm::from_registrant(&registrant, &directory()).expect("printable");
    assert_eq!(form.race, "");
}

#[test]
fn generation_needs_a_home_state() {
    let (archive, renderer, _) = archive();
    let mut registrant = printable();
    registrant.home_state = None;

    assert!(!archive.generate(&mut registrant, &directory(), false).expect("no error"));
    assert!(!registrant.pdf_ready);
    assert_eq!(renderer.renders(), 0);
}

#[test]
fn existing_files_are_reused_unless_forced() {
    let (archive, renderer, store) = archive();
    let directory = directory();
    let mut registrant = printable();

    assert!(archive.generate(&mut registrant, &directory, false).expect("generates"));
    assert!(archive.generate(&mut registrant, &directory, false).expect("generates"));
    assert_eq!(renderer.renders(), 1);

    assert!(archive.generate(&mut registrant, &directory, true).expect("regenerates"));
    assert_eq!(renderer.renders(), 2);
    assert_eq!(store.paths().len(), 1);
    assert!(registrant.pdf_ready);

    let bytes = archive.fetch(&registrant).expect("read").expect("stored");
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn fetch_ignores_records_without_a_pdf() {
    let (archive, _, _) = archive();
    assert_eq!(archive.fetch(&printable()).expect("read"), None);
}
