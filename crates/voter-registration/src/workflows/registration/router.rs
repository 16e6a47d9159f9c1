use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{RegistrantUid, RegistrantUpdate};
use super::pdf::PdfArchive;
use super::repository::{Mailer, RegistrantRepository, RepositoryError};
use super::service::{
    ApiRegistration, RegistrationService, RegistrationServiceError, StartRegistration,
};

const DEFAULT_EXPORT_LIMIT: usize = 1_000;

/// Router builder exposing the registrant intake endpoints.
pub fn registration_router<R, M>(service: Arc<RegistrationService<R, M>>) -> Router
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route("/api/v1/registrants", post(start_handler::<R, M>))
        .route("/api/v1/registrants/export", get(export_handler::<R, M>))
        .route("/api/v1/registrants/:uid", get(status_handler::<R, M>))
        .route(
            "/api/v1/registrants/:uid/steps/:step",
            put(step_handler::<R, M>),
        )
        .route(
            "/api/v1/registrants/:uid/complete",
            post(complete_handler::<R, M>),
        )
        .route(
            "/api/v1/registrants/:uid/reminder",
            post(reminder_handler::<R, M>),
        )
        .route(
            "/api/v1/registrants/:uid/pdf",
            get(pdf_handler::<R, M>).post(regenerate_pdf_handler::<R, M>),
        )
        .route("/api/v1/registrations", post(import_handler::<R, M>))
        .with_state(service)
}

pub(crate) async fn start_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    axum::Json(request): axum::Json<StartRegistration>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.start(request) {
        Ok(registrant) => (StatusCode::CREATED, axum::Json(registrant.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn step_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Path((uid, step)): Path<(String, u8)>,
    axum::Json(update): axum::Json<RegistrantUpdate>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.submit_step(&RegistrantUid(uid), step, update) {
        Ok(outcome) => {
            let view = outcome.registrant.status_view();
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn complete_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Path(uid): Path<String>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.complete(&RegistrantUid(uid)) {
        Ok(registrant) => (StatusCode::OK, axum::Json(registrant.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reminder_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Path(uid): Path<String>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.request_reminder(&RegistrantUid(uid)) {
        Ok(registrant) => (StatusCode::OK, axum::Json(registrant.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Path(uid): Path<String>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.find_by_param_strict(&RegistrantUid(uid)) {
        Ok(registrant) => (StatusCode::OK, axum::Json(registrant.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pdf_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Path(uid): Path<String>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    let registrant = match service.find_by_param_strict(&RegistrantUid(uid)) {
        Ok(registrant) => registrant,
        Err(error) => return error_response(error),
    };

    match service.pdf().fetch(&registrant) {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PdfArchive::content_type().to_string())],
            bytes,
        )
            .into_response(),
        Ok(None) => {
            let payload = json!({
                "uid": registrant.uid,
                "error": "pdf not ready",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error.into()),
    }
}

pub(crate) async fn regenerate_pdf_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Path(uid): Path<String>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.regenerate_pdf(&RegistrantUid(uid)) {
        Ok(registrant) => {
            let payload = json!({
                "uid": registrant.uid,
                "pdf_ready": registrant.pdf_ready,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExportQuery {
    limit: Option<usize>,
}

pub(crate) async fn export_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    Query(query): Query<ExportQuery>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    let mut buffer = Vec::new();
    match service.export_csv(&mut buffer, query.limit.unwrap_or(DEFAULT_EXPORT_LIMIT)) {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string())],
            buffer,
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn import_handler<R, M>(
    State(service): State<Arc<RegistrationService<R, M>>>,
    axum::Json(payload): axum::Json<ApiRegistration>,
) -> Response
where
    R: RegistrantRepository + 'static,
    M: Mailer + 'static,
{
    match service.import(payload) {
        Ok(registrant) => (StatusCode::CREATED, axum::Json(registrant.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: RegistrationServiceError) -> Response {
    match error {
        RegistrationServiceError::Validation(errors) => {
            let payload = json!({ "errors": errors });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        RegistrationServiceError::Lifecycle(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        RegistrationServiceError::Abandoned(registrant) => {
            let payload = json!({
                "uid": registrant.uid,
                "error": "registration abandoned",
            });
            (StatusCode::GONE, axum::Json(payload)).into_response()
        }
        RegistrationServiceError::NotFound(uid) => {
            let payload = json!({
                "uid": uid,
                "error": "registration not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        RegistrationServiceError::InvalidStep(step) => {
            let payload = json!({ "error": format!("unknown form step {step}") });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        RegistrationServiceError::NotComplete(uid) => {
            let payload = json!({
                "uid": uid,
                "error": "registration not complete",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        RegistrationServiceError::Repository(RepositoryError::Conflict) => {
            let payload = json!({ "error": "registration already exists" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            tracing::error!(error = %other, "registration request failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
