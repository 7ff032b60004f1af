//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage-agnostic quote repository contract.
//! - Isolate SQLite query details from selection and admin orchestration.
//!
//! # Invariants
//! - Pin writes always clear every other pin first.
//! - Repository APIs return semantic results (`None`/`false` for missing
//!   ids) in addition to DB transport errors.

pub mod quote_repo;
