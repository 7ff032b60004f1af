//! Daily quote selection engine.
//! Picks one quote per calendar day, keeps recent picks out of rotation,
//! and lets an administrator inspect or override the pin.

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::{ApiError, ApiResponse, DeletedQuote, QuoteApi};
pub use clock::{Clock, DateKey, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig, PinStrategy};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::quote::{NewQuote, Quote, QuoteId, QuoteUpdate, QuoteValidationError};
pub use repo::quote_repo::{
    PinOutcome, QuoteFilter, QuoteOrder, QuotePatch, QuoteRepository, RepoError, RepoResult,
    SqliteQuoteRepository, UnpinMode,
};
pub use service::admin_service::{Pagination, QuoteAdminService, QuoteListQuery, QuotePage};
pub use service::error::{ErrorKind, QuoteServiceError, ServiceResult};
pub use service::selection::SelectionPolicy;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
