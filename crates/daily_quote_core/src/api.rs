//! Operation surface consumed by a transport layer.
//!
//! # Responsibility
//! - Bundle the selection policy and admin service behind one facade.
//! - Wrap successful results in the `{ success, data, pagination? }` shape.
//!
//! # Invariants
//! - Errors are propagated unchanged; [`ApiResponse::from_error`] renders
//!   them for callers that need a failure envelope.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::model::quote::{NewQuote, Quote, QuoteId, QuoteUpdate};
use crate::repo::quote_repo::QuoteRepository;
use crate::service::admin_service::{Pagination, QuoteAdminService, QuoteListQuery};
use crate::service::error::{ErrorKind, QuoteServiceError, ServiceResult};
use crate::service::selection::SelectionPolicy;
use rand::rngs::StdRng;
use serde::Serialize;

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// Payload for a successful delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedQuote {
    pub id: QuoteId,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            pagination: None,
            message: None,
            error: None,
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn from_error(err: &QuoteServiceError) -> Self {
        Self {
            success: false,
            data: None,
            pagination: None,
            message: None,
            error: Some(ApiError {
                code: err.kind(),
                message: err.to_string(),
                retryable: err.is_retryable(),
            }),
        }
    }
}

/// Facade over the selection policy and admin service sharing one store.
pub struct QuoteApi<R: QuoteRepository + Clone, C: Clock + Clone = SystemClock> {
    selection: SelectionPolicy<R, C>,
    admin: QuoteAdminService<R, C>,
}

impl<R: QuoteRepository + Clone, C: Clock + Clone> QuoteApi<R, C> {
    pub fn new(repo: R, clock: C, config: EngineConfig) -> Self {
        Self {
            admin: QuoteAdminService::new(repo.clone(), clock.clone(), config.clone()),
            selection: SelectionPolicy::new(repo, clock, config),
        }
    }

    /// Like [`Self::new`] with a caller-supplied random source.
    pub fn with_rng(repo: R, clock: C, config: EngineConfig, rng: StdRng) -> Self {
        Self {
            admin: QuoteAdminService::new(repo.clone(), clock.clone(), config.clone()),
            selection: SelectionPolicy::with_rng(repo, clock, config, rng),
        }
    }

    pub fn selection(&self) -> &SelectionPolicy<R, C> {
        &self.selection
    }

    pub fn admin(&self) -> &QuoteAdminService<R, C> {
        &self.admin
    }

    pub fn get_today(&self) -> ServiceResult<ApiResponse<Quote>> {
        self.selection.get_or_select_today().map(ApiResponse::ok)
    }

    pub fn admin_list(&self, query: &QuoteListQuery) -> ServiceResult<ApiResponse<Vec<Quote>>> {
        let page = self.admin.list(query)?;
        Ok(ApiResponse::paginated(page.items, page.pagination))
    }

    pub fn admin_get(&self, id: QuoteId) -> ServiceResult<ApiResponse<Quote>> {
        self.admin.get_by_id(id).map(ApiResponse::ok)
    }

    pub fn admin_create(&self, fields: &NewQuote) -> ServiceResult<ApiResponse<Quote>> {
        Ok(ApiResponse::ok(self.admin.create(fields)?).with_message("Quote created"))
    }

    pub fn admin_update(
        &self,
        id: QuoteId,
        changes: &QuoteUpdate,
    ) -> ServiceResult<ApiResponse<Quote>> {
        Ok(ApiResponse::ok(self.admin.update(id, changes)?).with_message("Quote updated"))
    }

    pub fn admin_set_today(&self, id: QuoteId) -> ServiceResult<ApiResponse<Quote>> {
        Ok(ApiResponse::ok(self.admin.set_as_today(id)?).with_message("Quote set as today's quote"))
    }

    pub fn admin_delete(&self, id: QuoteId) -> ServiceResult<ApiResponse<DeletedQuote>> {
        self.admin.delete(id)?;
        Ok(ApiResponse::ok(DeletedQuote { id }).with_message("Quote deleted"))
    }

    pub fn admin_history(&self, days: u32) -> ServiceResult<ApiResponse<Vec<Quote>>> {
        self.admin.history(days).map(ApiResponse::ok)
    }
}
