//! Quote store bootstrap.
//!
//! Connections handed out here are configured, carry the SQL functions the
//! repository queries call, and sit at the latest schema version. Schema
//! versions live in `PRAGMA user_version`.

mod error;
mod functions;
pub mod migrations;
mod open;

pub use error::{DbError, DbResult};
pub use functions::register_functions;
pub use open::{open_db, open_db_in_memory};
