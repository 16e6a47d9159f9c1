use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::registration::{RegistrantExportError, RegistrationServiceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Registration(RegistrationServiceError),
    Export(RegistrantExportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Registration(err) => write!(f, "registration error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Registration(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Registration(RegistrationServiceError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Registration(
                RegistrationServiceError::Lifecycle(_) | RegistrationServiceError::NotComplete(_),
            ) => StatusCode::CONFLICT,
            AppError::Registration(RegistrationServiceError::Abandoned(_)) => StatusCode::GONE,
            AppError::Registration(RegistrationServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Registration(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RegistrationServiceError> for AppError {
    fn from(value: RegistrationServiceError) -> Self {
        Self::Registration(value)
    }
}

impl From<RegistrantExportError> for AppError {
    fn from(value: RegistrantExportError) -> Self {
        Self::Export(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::registration::{LifecycleError, LifecycleEvent, RegistrantStatus, RegistrantUid};

    #[test]
    fn registration_errors_map_to_client_statuses() {
        let not_found: AppError =
            RegistrationServiceError::NotFound(RegistrantUid("missing".to_string())).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let illegal: AppError = RegistrationServiceError::from(LifecycleError::NotPermitted {
            event: LifecycleEvent::Complete,
            from: RegistrantStatus::Step2,
        })
        .into();
        assert_eq!(illegal.into_response().status(), StatusCode::CONFLICT);

        let pending: AppError =
            RegistrationServiceError::NotComplete(RegistrantUid("pending".to_string())).into();
        assert_eq!(pending.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn io_errors_are_internal() {
        let error: AppError = std::io::Error::other("disk full").into();
        assert!(error.to_string().contains("disk full"));
        assert_eq!(error.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
