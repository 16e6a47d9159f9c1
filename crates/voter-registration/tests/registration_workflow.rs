//! End-to-end registration flows driven through the public service facade and HTTP router.

mod common {
    use std::collections::{BTreeMap, HashMap};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};

    use voter_registration::config::RegistrationSettings;
    use voter_registration::jurisdiction::JurisdictionDirectory;
    use voter_registration::workflows::registration::{
        Email, ErrorReporter, MailError, Mailer, Partner, PartnerDirectory, PartnerId, PdfError,
        PdfForm, PdfRenderer, PdfStore, QueueError, Registrant, RegistrantId, RegistrantRepository,
        RegistrantUid, RegistrationCollaborators, RegistrationService, ReminderJob, ReminderQueue,
        RepositoryError,
    };

    pub(super) const PARTNER: PartnerId = PartnerId(7);

    #[derive(Default)]
    pub(super) struct Store {
        records: Mutex<BTreeMap<RegistrantId, Registrant>>,
        next: Mutex<u64>,
    }

    impl Store {
        pub(super) fn by_uid(&self, uid: &RegistrantUid) -> Registrant {
            self.fetch_by_uid(uid)
                .expect("lookup")
                .expect("record present")
        }
    }

    impl RegistrantRepository for Store {
        fn next_id(&self) -> Result<RegistrantId, RepositoryError> {
            let mut next = self.next.lock().expect("lock");
            *next += 1;
            Ok(RegistrantId(*next))
        }

        fn insert(&self, registrant: Registrant) -> Result<Registrant, RepositoryError> {
            let mut records = self.records.lock().expect("lock");
            if records.contains_key(&registrant.id) {
                return Err(RepositoryError::Conflict);
            }
            records.insert(registrant.id, registrant.clone());
            Ok(registrant)
        }

        fn update(&self, registrant: Registrant) -> Result<(), RepositoryError> {
            let mut records = self.records.lock().expect("lock");
            match records.get_mut(&registrant.id) {
                Some(slot) => {
                    *slot = registrant;
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        fn fetch(&self, id: RegistrantId) -> Result<Option<Registrant>, RepositoryError> {
            Ok(self.records.lock().expect("lock").get(&id).cloned())
        }

        fn fetch_by_uid(&self, uid: &RegistrantUid) -> Result<Option<Registrant>, RepositoryError> {
            let records = self.records.lock().expect("lock");
            Ok(records.values().find(|record| &record.uid == uid).cloned())
        }

        fn stale_batch(
            &self,
            cutoff: DateTime<Utc>,
            after: Option<RegistrantId>,
            limit: usize,
        ) -> Result<Vec<Registrant>, RepositoryError> {
            let records = self.records.lock().expect("lock");
            Ok(records
                .values()
                .filter(|record| after.map_or(true, |after| record.id > after))
                .filter(|record| !record.abandoned && !record.is_complete())
                .filter(|record| record.updated_at < cutoff)
                .take(limit)
                .cloned()
                .collect())
        }

        fn list(&self, limit: usize) -> Result<Vec<Registrant>, RepositoryError> {
            let records = self.records.lock().expect("lock");
            Ok(records.values().take(limit).cloned().collect())
        }
    }

    #[derive(Default)]
    pub(super) struct Outbox {
        sent: Mutex<Vec<Email>>,
    }

    impl Outbox {
        pub(super) fn sent(&self) -> Vec<Email> {
            self.sent.lock().expect("lock").clone()
        }
    }

    impl Mailer for Outbox {
        fn deliver(&self, email: Email) -> Result<(), MailError> {
            self.sent.lock().expect("lock").push(email);
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct Jobs {
        jobs: Mutex<Vec<ReminderJob>>,
    }

    impl Jobs {
        pub(super) fn jobs(&self) -> Vec<ReminderJob> {
            self.jobs.lock().expect("lock").clone()
        }
    }

    impl ReminderQueue for Jobs {
        fn enqueue(&self, job: ReminderJob) -> Result<(), QueueError> {
            self.jobs.lock().expect("lock").push(job);
            Ok(())
        }
    }

    struct Partners;

    impl PartnerDirectory for Partners {
        fn fetch(&self, id: PartnerId) -> Option<Partner> {
            (id == PARTNER).then(|| Partner {
                id,
                organization: "League of Neighbors".to_string(),
                primary: true,
                ..Partner::default()
            })
        }
    }

    struct TextRenderer;

    impl PdfRenderer for TextRenderer {
        fn render(&self, form: &PdfForm) -> Result<Vec<u8>, PdfError> {
            Ok(format!("%PDF {} {}", form.barcode, form.full_name).into_bytes())
        }
    }

    #[derive(Default)]
    struct Files {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    }

    impl PdfStore for Files {
        fn exists(&self, path: &Path) -> Result<bool, PdfError> {
            Ok(self.files.lock().expect("lock").contains_key(path))
        }

        fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PdfError> {
            self.files
                .lock()
                .expect("lock")
                .insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }

        fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, PdfError> {
            Ok(self.files.lock().expect("lock").get(path).cloned())
        }
    }

    struct QuietReporter;

    impl ErrorReporter for QuietReporter {
        fn report(&self, _worker: &'static str, _id: RegistrantId, _error: &dyn std::error::Error) {}
    }

    pub(super) type Service = RegistrationService<Store, Outbox>;

    pub(super) fn build_service() -> (Arc<Service>, Arc<Store>, Arc<Outbox>, Arc<Jobs>) {
        let store = Arc::new(Store::default());
        let outbox = Arc::new(Outbox::default());
        let jobs = Arc::new(Jobs::default());
        let collaborators = RegistrationCollaborators {
            partners: Arc::new(Partners),
            reminders: jobs.clone(),
            pdf_renderer: Arc::new(TextRenderer),
            pdf_store: Arc::new(Files::default()),
            errors: Arc::new(QuietReporter),
        };
        let settings = RegistrationSettings {
            pdf_root: PathBuf::from("pdf"),
            ..RegistrationSettings::default()
        };
        let service = Arc::new(RegistrationService::new(
            store.clone(),
            outbox.clone(),
            collaborators,
            Arc::new(JurisdictionDirectory::standard()),
            settings,
        ));
        (service, store, outbox, jobs)
    }
}

mod web_flow {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::common::*;
    use voter_registration::workflows::registration::{
        registration_router, EmailTemplate, RegistrantStatus, RegistrantUid,
    };

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(payload) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&payload).expect("serialize payload"))
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router dispatch");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }

    fn json(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("json")
    }

    #[tokio::test]
    async fn registrant_walks_every_step_and_downloads_the_form() {
        let (service, store, outbox, jobs) = build_service();
        let router = registration_router(service);

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/registrants",
            Some(json!({ "partner_id": 7, "locale": "en", "tracking_source": "flyer" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uid = json(&body)["uid"].as_str().expect("uid").to_string();

        let steps = [
            json!({
                "date_of_birth": "04/15/1990",
                "email_address": "sam@example.com",
                "home_zip_code": "10001",
                "us_citizen": true,
                "has_state_license": true,
                "first_registration": false,
            }),
            json!({
                "name_title": "Ms.",
                "first_name": "Sam",
                "last_name": "Ortiz",
                "home_address": "350 Fifth Ave",
                "home_city": "New York",
                "party": "Working Families",
            }),
            json!({ "state_id_number": "NONE" }),
            json!({ "opt_in_email": true, "opt_in_sms": false }),
            json!({ "attest_true": true }),
        ];
        for (index, payload) in steps.into_iter().enumerate() {
            let uri = format!("/api/v1/registrants/{uid}/steps/{}", index + 1);
            let (status, body) = send(&router, "PUT", &uri, Some(payload)).await;
            assert_eq!(status, StatusCode::OK, "step {} body {:?}", index + 1, json(&body));
            assert_eq!(json(&body)["status"], json!(format!("step_{}", index + 1)));
        }

        let stored = store.by_uid(&RegistrantUid(uid.clone()));
        assert_eq!(stored.home_state.as_ref().map(|code| code.as_str()), Some("NY"));
        assert!(stored.barcode.is_some());
        assert_eq!(stored.official_party_name.as_deref(), Some("Working Families"));

        let (status, body) = send(&router, "POST", &format!("/api/v1/registrants/{uid}/complete"), None).await;
        assert_eq!(status, StatusCode::OK);
        let completed = json(&body);
        assert_eq!(completed["status"], json!("complete"));
        assert_eq!(completed["pdf_ready"], json!(true));

        let stored = store.by_uid(&RegistrantUid(uid.clone()));
        assert_eq!(stored.status, RegistrantStatus::Complete);
        assert_eq!(stored.state_id_number, None);
        assert_eq!(outbox.sent()[0].template, EmailTemplate::Confirmation);
        assert_eq!(jobs.jobs().len(), 1);

        let (status, body) = send(&router, "GET", &format!("/api/v1/registrants/{uid}/pdf"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"%PDF"));

        let (status, body) = send(&router, "GET", "/api/v1/registrants/export", None).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).expect("utf-8");
        let row = text.lines().nth(1).expect("one row");
        assert!(row.starts_with("Complete,flyer"));
    }

    #[tokio::test]
    async fn minors_are_held_at_step_one() {
        let (service, _, _, _) = build_service();
        let router = registration_router(service);

        let (_, body) = send(&router, "POST", "/api/v1/registrants", Some(json!({ "partner_id": 7 }))).await;
        let uid = json(&body)["uid"].as_str().expect("uid").to_string();

        let (status, body) = send(
            &router,
            "PUT",
            &format!("/api/v1/registrants/{uid}/steps/1"),
            Some(json!({
                "date_of_birth": "2020-01-01",
                "email_address": "kid@example.com",
                "home_zip_code": "10001",
                "us_citizen": true,
                "has_state_license": false,
                "first_registration": true,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let view = json(&body);
        assert_eq!(view["eligible"], json!(false));
        assert_eq!(view["ineligible_reason"], json!("Not old enough to register"));
    }
}

mod lifecycle {
    use chrono::{Duration, Utc};

    use super::common::*;
    use voter_registration::workflows::registration::{
        ApiRegistration, RegistrantRepository, RegistrantStatus, RegistrantUpdate,
        RegistrationServiceError, StartRegistration,
    };

    #[test]
    fn idle_registrations_are_abandoned_by_the_sweep() {
        let (service, store, _, _) = build_service();
        let registrant = service
            .start(StartRegistration {
                partner_id: Some(PARTNER),
                ..StartRegistration::default()
            })
            .expect("start");

        let summary = service
            .sweep_stale_at(Utc::now() + Duration::hours(1))
            .expect("sweep");
        assert_eq!(summary.abandoned, 1);
        assert!(store.by_uid(&registrant.uid).abandoned);

        match service.find_by_param(&registrant.uid) {
            Err(RegistrationServiceError::Abandoned(record)) => {
                assert_eq!(record.status, RegistrantStatus::Initial);
            }
            other => panic!("expected abandoned registrant, got {other:?}"),
        }
    }

    #[test]
    fn api_imports_arrive_complete() {
        let (service, store, outbox, _) = build_service();
        let payload = ApiRegistration {
            partner_id: Some(PARTNER),
            finish_with_state: false,
            attributes: RegistrantUpdate {
                date_of_birth: Some("1961-11-02".to_string()),
                email_address: Some("jo@example.com".to_string()),
                home_zip_code: Some("15213".to_string()),
                us_citizen: Some(true),
                has_state_license: Some(true),
                first_registration: Some(true),
                name_title: Some("Ms.".to_string()),
                first_name: Some("Jo".to_string()),
                last_name: Some("Park".to_string()),
                home_address: Some("1 Forbes Ave".to_string()),
                home_city: Some("Pittsburgh".to_string()),
                state_id_number: Some("1234".to_string()),
                opt_in_email: Some(false),
                opt_in_sms: Some(false),
                ..RegistrantUpdate::default()
            },
        };

        let imported = service.import(payload).expect("import");

        let stored = store.fetch(imported.id).expect("fetch").expect("present");
        assert_eq!(stored.status, RegistrantStatus::Complete);
        assert!(stored.building_via_api_call);
        assert!(stored.pdf_ready);
        assert!(outbox.sent().is_empty());
    }
}
