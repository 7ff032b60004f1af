//! Service-level error taxonomy shared by selection and admin use cases.

use crate::model::quote::{QuoteId, QuoteValidationError};
use crate::repo::quote_repo::RepoError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, QuoteServiceError>;

/// Stable error code handed to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationError,
    NoQuotesAvailable,
    StorageUnavailable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::ValidationError => "validation_error",
            Self::NoQuotesAvailable => "no_quotes_available",
            Self::StorageUnavailable => "storage_unavailable",
        }
    }
}

#[derive(Debug)]
pub enum QuoteServiceError {
    /// Referenced quote does not exist.
    NotFound(QuoteId),
    /// Input failed field validation; nothing was written.
    Validation(QuoteValidationError),
    /// Selection ran against an empty collection.
    NoQuotesAvailable,
    /// Repository failure, propagated unchanged.
    StorageUnavailable(RepoError),
}

impl QuoteServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::NoQuotesAvailable => ErrorKind::NoQuotesAvailable,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }

    /// Only storage failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl Display for QuoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "quote not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NoQuotesAvailable => write!(f, "no quotes available for selection"),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl Error for QuoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StorageUnavailable(err) => Some(err),
            Self::NotFound(_) | Self::NoQuotesAvailable => None,
        }
    }
}

impl From<RepoError> for QuoteServiceError {
    fn from(value: RepoError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<QuoteValidationError> for QuoteServiceError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}
