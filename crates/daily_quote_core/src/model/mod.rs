//! Domain model for the daily quote store.
//!
//! # Invariants
//! - Every quote is identified by a stable `QuoteId`.
//! - At most one quote carries the `is_today` pin at any instant.

pub mod quote;
