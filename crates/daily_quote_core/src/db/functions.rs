//! Scalar SQL functions registered on every quote store connection.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// SQL name of the Unicode lowercase fold used by text search.
///
/// SQLite's built-in `LIKE` folds ASCII letters only, so search compares
/// `unicode_fold(column) LIKE pattern` with a pattern lowercased in Rust.
pub const UNICODE_FOLD: &str = "unicode_fold";

/// Registers the quote store's SQL functions on `conn`.
///
/// Safe to call repeatedly; a later registration replaces the earlier one.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        UNICODE_FOLD,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value = ctx.get::<Option<String>>(0)?;
            Ok(value.map(|text| text.to_lowercase()))
        },
    )
}
