//! Failure taxonomy shared by registration and login, and its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::auth::{dto::MissingFields, repo::StoreError, repo_types::UniqueField};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    Validation {
        message: String,
        missing_fields: Option<MissingFields>,
    },

    /// Found by the lookup before insert.
    #[error("User already exists")]
    Conflict(UniqueField),

    /// Rejected by the store's unique constraint at insert time.
    #[error("This {0} is already in use")]
    InUse(UniqueField),

    /// Deliberately blind to which of email/password was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation {
            message: message.into(),
            missing_fields: None,
        }
    }

    pub fn missing(message: impl Into<String>, missing_fields: MissingFields) -> Self {
        AuthError::Validation {
            message: message.into(),
            missing_fields: Some(missing_fields),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. }
            | AuthError::Conflict(_)
            | AuthError::InUse(_)
            | AuthError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error for the client. `operation` names the failing call
    /// ("registration", "login") in the generic 500 message; internal details
    /// are only attached when `expose_details` is set.
    pub fn into_http(self, operation: &str, expose_details: bool) -> Response {
        let status = self.status();
        let summary = self.to_string();
        let body = match self {
            AuthError::Validation {
                message,
                missing_fields,
            } => ErrorBody {
                message,
                missing_fields,
                ..Default::default()
            },
            AuthError::Conflict(field) | AuthError::InUse(field) => ErrorBody {
                message: summary,
                field: Some(field),
                ..Default::default()
            },
            AuthError::InvalidCredentials => ErrorBody {
                message: "Invalid credentials".into(),
                ..Default::default()
            },
            AuthError::Internal(e) => {
                error!(error = ?e, operation, "request failed");
                ErrorBody {
                    message: format!("Server error during {operation}"),
                    error: expose_details.then(|| ErrorDetail {
                        message: format!("{e:#}"),
                    }),
                    ..Default::default()
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(field) => AuthError::InUse(field),
            other => AuthError::Internal(anyhow::Error::new(other).context("account store")),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<MissingFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<UniqueField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
}
