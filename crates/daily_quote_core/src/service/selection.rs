//! Daily selection policy.
//!
//! # Responsibility
//! - Resolve "today's quote" lazily on read, pinning a new one on the first
//!   read of each `DateKey`.
//! - Keep chosen quotes out of rotation for the trailing exclusion window.
//!
//! # Invariants
//! - A pin for the current day is returned unchanged (no writes).
//! - A new pick only touches the previous pin (retired, `selected_on` kept
//!   as history) and the newly chosen quote.
//! - A failed clear aborts the selection before any pin is written.
//! - Under `PinStrategy::CompareAndSwap` a caller that loses the race
//!   returns the winner's quote instead of overwriting it.

use crate::clock::{Clock, DateKey, SystemClock};
use crate::config::{EngineConfig, PinStrategy};
use crate::model::quote::{Quote, QuoteId};
use crate::repo::quote_repo::{
    PinOutcome, QuoteFilter, QuoteOrder, QuotePatch, QuoteRepository, UnpinMode,
};
use crate::service::error::{QuoteServiceError, ServiceResult};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Selection policy over a quote repository.
pub struct SelectionPolicy<R: QuoteRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    config: EngineConfig,
    rng: Mutex<StdRng>,
}

impl<R: QuoteRepository, C: Clock> SelectionPolicy<R, C> {
    /// Creates a policy seeded from system entropy.
    pub fn new(repo: R, clock: C, config: EngineConfig) -> Self {
        Self::with_rng(repo, clock, config, StdRng::from_entropy())
    }

    /// Creates a policy with a caller-supplied random source.
    pub fn with_rng(repo: R, clock: C, config: EngineConfig, rng: StdRng) -> Self {
        Self {
            repo,
            clock,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current day under the configured timezone.
    pub fn today(&self) -> DateKey {
        self.clock.today(self.config.timezone)
    }

    /// Returns today's quote, selecting and pinning one if needed.
    ///
    /// # Errors
    /// - `NoQuotesAvailable` when the collection is empty.
    /// - `StorageUnavailable` on any repository failure.
    pub fn get_or_select_today(&self) -> ServiceResult<Quote> {
        self.select_for(self.today())
    }

    /// Same as [`Self::get_or_select_today`] for an explicit day.
    pub fn select_for(&self, today: DateKey) -> ServiceResult<Quote> {
        if let Some(pinned) = self.repo.find_one(&QuoteFilter::pinned_for(today))? {
            debug!(
                "event=quote_selected module=selection status=cached date={} quote_id={}",
                today, pinned.id
            );
            return Ok(pinned);
        }

        // Compare-and-swap retires stale pins inside its own transaction;
        // clearing here could drop a pin a concurrent caller just won.
        if self.config.pin_strategy == PinStrategy::LastWriterWins {
            let retired = self
                .repo
                .update_many(&QuoteFilter::pinned(), &QuotePatch::unpin(UnpinMode::Retire))?;
            if retired > 0 {
                debug!(
                    "event=quote_unpinned module=selection status=ok date={} retired={}",
                    today, retired
                );
            }
        }

        let chosen = self.choose_candidate(today)?;
        let pinned = match self.config.pin_strategy {
            PinStrategy::LastWriterWins => self
                .repo
                .pin_exclusive(chosen, today, UnpinMode::Retire)?
                .ok_or(QuoteServiceError::NotFound(chosen))?,
            PinStrategy::CompareAndSwap => match self.repo.pin_if_vacant(chosen, today)? {
                PinOutcome::Pinned(quote) => quote,
                PinOutcome::AlreadyPinned(winner) => {
                    info!(
                        "event=quote_selected module=selection status=adopted date={} quote_id={} candidate_id={}",
                        today, winner.id, chosen
                    );
                    return Ok(winner);
                }
                PinOutcome::Missing => return Err(QuoteServiceError::NotFound(chosen)),
            },
        };

        info!(
            "event=quote_selected module=selection status=ok date={} quote_id={} strategy={}",
            today,
            pinned.id,
            self.config.pin_strategy.as_str()
        );
        Ok(pinned)
    }

    /// Quotes chosen within the trailing exclusion window ending on `today`.
    pub fn excluded_ids(&self, today: DateKey) -> ServiceResult<HashSet<QuoteId>> {
        let cutoff = today.days_back(self.config.exclusion_window_days);
        Ok(self
            .repo
            .find_many(&QuoteFilter::selected_since(cutoff))?
            .into_iter()
            .map(|quote| quote.id)
            .collect())
    }

    fn choose_candidate(&self, today: DateKey) -> ServiceResult<QuoteId> {
        let excluded = self.excluded_ids(today)?;
        let pool: Vec<QuoteId> = self
            .repo
            .find_many(&QuoteFilter {
                order: QuoteOrder::Created,
                ..QuoteFilter::all()
            })?
            .into_iter()
            .map(|quote| quote.id)
            .collect();

        if pool.is_empty() {
            warn!(
                "event=select_failed module=selection status=error date={} error_code=no_quotes_available",
                today
            );
            return Err(QuoteServiceError::NoQuotesAvailable);
        }

        let mut candidates: Vec<QuoteId> = pool
            .iter()
            .copied()
            .filter(|id| !excluded.contains(id))
            .collect();
        if candidates.is_empty() {
            warn!(
                "event=quote_pool_exhausted module=selection status=reset date={} pool_size={} window_days={}",
                today,
                pool.len(),
                self.config.exclusion_window_days
            );
            candidates = pool;
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        candidates
            .choose(&mut *rng)
            .copied()
            .ok_or(QuoteServiceError::NoQuotesAvailable)
    }
}
