use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quire_core::{ErrorKind, StructuredError};
use quire_versioning::VersioningError;

/// API error type
///
/// Each variant picks the HTTP status; the body is always the
/// [`StructuredError`] the client rebuilds its error from.
#[derive(Debug)]
pub enum ApiError {
    /// Unknown changeset or file (404)
    NotFound(StructuredError),

    /// Operation not allowed in the changeset's current state (409)
    Conflict(StructuredError),

    /// Malformed request (400)
    BadRequest(StructuredError),

    /// Well-formed request whose content fails validation (422)
    ValidationFailed(StructuredError),

    /// Internal server error (500)
    Internal(StructuredError),
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> &StructuredError {
        match self {
            ApiError::NotFound(err)
            | ApiError::Conflict(err)
            | ApiError::BadRequest(err)
            | ApiError::ValidationFailed(err)
            | ApiError::Internal(err) => err,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::NotFound(err)
            | ApiError::Conflict(err)
            | ApiError::BadRequest(err)
            | ApiError::ValidationFailed(err)
            | ApiError::Internal(err) => err,
        };

        (status, Json(body)).into_response()
    }
}

impl From<VersioningError> for ApiError {
    fn from(err: VersioningError) -> Self {
        let body = err.to_structured();

        match body.kind {
            ErrorKind::ChangesetNotFound | ErrorKind::FileNotFound => ApiError::NotFound(body),
            ErrorKind::AssociationState
            | ErrorKind::ChangesetNotFinalized
            | ErrorKind::AlreadyCommitted => ApiError::Conflict(body),
            ErrorKind::WriteWithoutChangeset | ErrorKind::InvalidPath => {
                ApiError::BadRequest(body)
            }
            ErrorKind::EmptyChangeset | ErrorKind::ManifestMismatch => {
                ApiError::ValidationFailed(body)
            }
            ErrorKind::Internal => ApiError::Internal(body),
        }
    }
}
