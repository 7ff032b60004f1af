//! Admin override use-case service.
//!
//! # Responsibility
//! - Provide list/get/create/update/delete and explicit "set as today".
//! - Route every pin change through the repository's exclusive pin ops.
//! - Commit a write and the pin it requests in one repository call.
//!
//! # Invariants
//! - Validation runs before any write; a rejected input writes nothing.
//! - Admin pins clear the previous pin's `selected_on`.
//! - Unpinning never triggers a new selection; the next read does.

use crate::clock::{Clock, DateKey, SystemClock};
use crate::config::EngineConfig;
use crate::model::quote::{NewQuote, Quote, QuoteId, QuoteUpdate};
use crate::repo::quote_repo::{QuoteFilter, QuotePatch, QuoteRepository, UnpinMode};
use crate::service::error::{QuoteServiceError, ServiceResult};
use log::info;
use serde::{Deserialize, Serialize};

/// Filter and page request for admin listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteListQuery {
    /// Case-insensitive substring over all text fields.
    pub text_search: Option<String>,
    pub is_today: Option<bool>,
    /// 1-based. `0` is treated as `1`.
    pub page: u32,
    /// `0` falls back to the configured default.
    pub page_size: u32,
}

/// Pagination metadata returned with list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(page_size))
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePage {
    pub items: Vec<Quote>,
    pub pagination: Pagination,
}

/// Admin service facade over repository implementations.
pub struct QuoteAdminService<R: QuoteRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    config: EngineConfig,
}

impl<R: QuoteRepository, C: Clock> QuoteAdminService<R, C> {
    pub fn new(repo: R, clock: C, config: EngineConfig) -> Self {
        Self {
            repo,
            clock,
            config,
        }
    }

    fn today(&self) -> DateKey {
        self.clock.today(self.config.timezone)
    }

    /// Lists quotes matching the filter, newest update first.
    pub fn list(&self, query: &QuoteListQuery) -> ServiceResult<QuotePage> {
        let (page, page_size) = self.config.normalize_page(query.page, query.page_size);
        let filter = QuoteFilter {
            text_search: query.text_search.clone(),
            is_today: query.is_today,
            ..QuoteFilter::all()
        };

        let total = self.repo.count(&filter)?;
        let offset = (page - 1).saturating_mul(page_size);
        let items = self.repo.find_many(&QuoteFilter {
            limit: Some(page_size),
            offset,
            ..filter
        })?;

        Ok(QuotePage {
            items,
            pagination: Pagination::new(page, page_size, total),
        })
    }

    pub fn get_by_id(&self, id: QuoteId) -> ServiceResult<Quote> {
        self.repo
            .find_one(&QuoteFilter::by_id(id))?
            .ok_or(QuoteServiceError::NotFound(id))
    }

    /// Creates a quote, pinning it for today when `is_today` is requested.
    ///
    /// Insert and pin commit together; a failed pin leaves no new row.
    pub fn create(&self, fields: &NewQuote) -> ServiceResult<Quote> {
        let fields = fields.normalized()?;
        let created = if fields.is_today {
            let today = self.today();
            let created = self.repo.insert_pinned(&fields, today, UnpinMode::Clear)?;
            info!(
                "event=quote_pinned module=admin status=ok date={} quote_id={}",
                today, created.id
            );
            created
        } else {
            self.repo.insert(&fields)?
        };
        info!(
            "event=quote_created module=admin status=ok quote_id={} pinned={}",
            created.id, fields.is_today
        );
        Ok(created)
    }

    /// Applies a partial update; `is_today` flips go through exclusive pin
    /// or clearing unpin. Text and flag changes are written together.
    pub fn update(&self, id: QuoteId, changes: &QuoteUpdate) -> ServiceResult<Quote> {
        let changes = changes.normalized()?;
        let current = self.get_by_id(id)?;
        let today = self.today();

        let text_patch = QuotePatch {
            text_primary: changes.text_primary.clone(),
            text_secondary: changes.text_secondary.clone(),
            annotation: changes.annotation.clone(),
            ..QuotePatch::default()
        };

        match changes.is_today {
            Some(true) if !current.is_pinned_for(today) => {
                let pinned = self
                    .repo
                    .update_and_pin(id, &text_patch, today, UnpinMode::Clear)?
                    .ok_or(QuoteServiceError::NotFound(id))?;
                info!(
                    "event=quote_pinned module=admin status=ok date={} quote_id={}",
                    today, id
                );
                Ok(pinned)
            }
            Some(false) if current.is_today => {
                let patch = QuotePatch {
                    text_primary: text_patch.text_primary,
                    text_secondary: text_patch.text_secondary,
                    annotation: text_patch.annotation,
                    ..QuotePatch::unpin(UnpinMode::Clear)
                };
                let unpinned = self
                    .repo
                    .update_by_id(id, &patch)?
                    .ok_or(QuoteServiceError::NotFound(id))?;
                info!(
                    "event=quote_unpinned module=admin status=ok quote_id={}",
                    id
                );
                Ok(unpinned)
            }
            _ if changes.touches_text() => self
                .repo
                .update_by_id(id, &text_patch)?
                .ok_or(QuoteServiceError::NotFound(id)),
            _ => Ok(current),
        }
    }

    /// Pins `id` as today's quote, clearing any other pin first.
    pub fn set_as_today(&self, id: QuoteId) -> ServiceResult<Quote> {
        self.pin(id)
    }

    /// Deletes a quote. Deleting the pin leaves nothing pinned until the
    /// next read selects again.
    pub fn delete(&self, id: QuoteId) -> ServiceResult<()> {
        let existing = self.get_by_id(id)?;
        if !self.repo.delete_by_id(id)? {
            return Err(QuoteServiceError::NotFound(id));
        }
        info!(
            "event=quote_deleted module=admin status=ok quote_id={} was_pinned={}",
            id, existing.is_today
        );
        Ok(())
    }

    /// Quotes chosen within the last `days` days (inclusive), most recent
    /// first.
    pub fn history(&self, days: u32) -> ServiceResult<Vec<Quote>> {
        let since = self.today().days_back(days);
        Ok(self.repo.find_many(&QuoteFilter::selected_since(since))?)
    }

    fn pin(&self, id: QuoteId) -> ServiceResult<Quote> {
        let today = self.today();
        let pinned = self
            .repo
            .pin_exclusive(id, today, UnpinMode::Clear)?
            .ok_or(QuoteServiceError::NotFound(id))?;
        info!(
            "event=quote_pinned module=admin status=ok date={} quote_id={}",
            today, id
        );
        Ok(pinned)
    }
}

#[cfg(test)]
mod tests {
    use super::Pagination;

    #[test]
    fn pagination_flags_follow_page_position() {
        let first = Pagination::new(1, 10, 25);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn pagination_handles_empty_results() {
        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }
}
