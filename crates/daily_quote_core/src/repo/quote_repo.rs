//! Quote repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose predicate/patch based access over the `quotes` table.
//! - Provide pin operations that keep at most one quote pinned.
//!
//! # Invariants
//! - `pin_exclusive` never sets a pin without clearing all others first,
//!   and never clears anything when the target id is missing.
//! - If the clear step fails the pin step is not attempted.
//! - `insert_pinned` and `update_and_pin` write nothing when clearing the
//!   previous pin fails.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::clock::DateKey;
use crate::db::{register_functions, DbError};
use crate::model::quote::{NewQuote, Quote, QuoteId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const QUOTE_SELECT_SQL: &str = "SELECT
    id,
    text_primary,
    text_secondary,
    annotation,
    is_today,
    selected_on,
    created_at,
    updated_at
FROM quotes";

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for quote persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted quote data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Sort order for multi-row reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteOrder {
    /// `updated_at DESC, id ASC`.
    #[default]
    RecentlyUpdated,
    /// `selected_on DESC`, never-selected rows last.
    RecentlySelected,
    /// `created_at ASC, id ASC`. Stable across calls.
    Created,
}

/// Predicate over quotes. Every set field must match (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    pub id: Option<QuoteId>,
    pub is_today: Option<bool>,
    /// Exact `selected_on` match.
    pub selected_on: Option<DateKey>,
    /// `selected_on >= day`. Rows with no `selected_on` never match.
    pub selected_since: Option<DateKey>,
    /// Case-insensitive substring over all text fields.
    pub text_search: Option<String>,
    pub order: QuoteOrder,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl QuoteFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: QuoteId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Every pinned quote regardless of day.
    pub fn pinned() -> Self {
        Self {
            is_today: Some(true),
            ..Self::default()
        }
    }

    /// The pin for `day`, if any.
    pub fn pinned_for(day: DateKey) -> Self {
        Self {
            is_today: Some(true),
            selected_on: Some(day),
            ..Self::default()
        }
    }

    /// Quotes chosen on or after `day`.
    pub fn selected_since(day: DateKey) -> Self {
        Self {
            selected_since: Some(day),
            order: QuoteOrder::RecentlySelected,
            ..Self::default()
        }
    }
}

/// What happens to the previous pin when a new one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpinMode {
    /// Drop the flag and keep `selected_on` as selection history. Used by the
    /// daily rollover so the exclusion window still sees past picks.
    Retire,
    /// Drop the flag and clear `selected_on`. Used by admin overrides.
    Clear,
}

/// Partial write. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotePatch {
    pub text_primary: Option<String>,
    pub text_secondary: Option<String>,
    pub annotation: Option<String>,
    pub is_today: Option<bool>,
    /// `Some(None)` clears the column.
    pub selected_on: Option<Option<DateKey>>,
}

impl QuotePatch {
    pub fn pin(day: DateKey) -> Self {
        Self {
            is_today: Some(true),
            selected_on: Some(Some(day)),
            ..Self::default()
        }
    }

    pub fn unpin(mode: UnpinMode) -> Self {
        Self {
            is_today: Some(false),
            selected_on: match mode {
                UnpinMode::Retire => None,
                UnpinMode::Clear => Some(None),
            },
            ..Self::default()
        }
    }

    /// Same patch with the pin fields replaced by a pin for `day`.
    pub fn pinned_for(self, day: DateKey) -> Self {
        Self {
            is_today: Some(true),
            selected_on: Some(Some(day)),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_primary.is_none()
            && self.text_secondary.is_none()
            && self.annotation.is_none()
            && self.is_today.is_none()
            && self.selected_on.is_none()
    }
}

/// Result of a conditional pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// The requested quote is now the pin.
    Pinned(Quote),
    /// Another quote already held the pin for the day; nothing was written.
    AlreadyPinned(Quote),
    /// The requested id does not exist; nothing was written.
    Missing,
}

/// Storage-agnostic repository over the quote collection.
pub trait QuoteRepository {
    fn find_one(&self, filter: &QuoteFilter) -> RepoResult<Option<Quote>>;
    fn find_many(&self, filter: &QuoteFilter) -> RepoResult<Vec<Quote>>;
    /// Applies `patch` to every match and returns the number of rows changed.
    fn update_many(&self, filter: &QuoteFilter, patch: &QuotePatch) -> RepoResult<usize>;
    /// Inserts an unpinned quote with a fresh id. `fields.is_today` is ignored;
    /// use [`QuoteRepository::insert_pinned`] to insert and pin together.
    fn insert(&self, fields: &NewQuote) -> RepoResult<Quote>;
    fn update_by_id(&self, id: QuoteId, patch: &QuotePatch) -> RepoResult<Option<Quote>>;
    fn delete_by_id(&self, id: QuoteId) -> RepoResult<bool>;
    fn count(&self, filter: &QuoteFilter) -> RepoResult<u64>;

    /// Clears every pin, then pins `id` for `day`.
    ///
    /// Returns `None` (and writes nothing) when `id` does not exist. The
    /// default is not atomic; implementations with transactions override it.
    fn pin_exclusive(
        &self,
        id: QuoteId,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Option<Quote>> {
        if self.find_one(&QuoteFilter::by_id(id))?.is_none() {
            return Ok(None);
        }
        self.update_many(&QuoteFilter::pinned(), &QuotePatch::unpin(mode))?;
        self.update_by_id(id, &QuotePatch::pin(day))
    }

    /// Pins `id` for `day` only if nothing is pinned for `day` yet.
    fn pin_if_vacant(&self, id: QuoteId, day: DateKey) -> RepoResult<PinOutcome> {
        if let Some(existing) = self.find_one(&QuoteFilter::pinned_for(day))? {
            return Ok(PinOutcome::AlreadyPinned(existing));
        }
        Ok(match self.pin_exclusive(id, day, UnpinMode::Retire)? {
            Some(quote) => PinOutcome::Pinned(quote),
            None => PinOutcome::Missing,
        })
    }

    /// Inserts a quote already pinned for `day`, clearing every other pin.
    ///
    /// The default clears first so a failed clear leaves no new row behind.
    fn insert_pinned(
        &self,
        fields: &NewQuote,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Quote> {
        self.update_many(&QuoteFilter::pinned(), &QuotePatch::unpin(mode))?;
        let id = self.insert(fields)?.id;
        self.update_by_id(id, &QuotePatch::pin(day))?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted quote {id} vanished before pin"))
        })
    }

    /// Applies `patch` to `id` and pins it for `day` in one write.
    ///
    /// Pin fields in `patch` are overridden. Returns `None` (and writes
    /// nothing) when `id` does not exist.
    fn update_and_pin(
        &self,
        id: QuoteId,
        patch: &QuotePatch,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Option<Quote>> {
        if self.find_one(&QuoteFilter::by_id(id))?.is_none() {
            return Ok(None);
        }
        self.update_many(&QuoteFilter::pinned(), &QuotePatch::unpin(mode))?;
        self.update_by_id(id, &patch.clone().pinned_for(day))
    }
}

impl<T: QuoteRepository + ?Sized> QuoteRepository for &T {
    fn find_one(&self, filter: &QuoteFilter) -> RepoResult<Option<Quote>> {
        (**self).find_one(filter)
    }

    fn find_many(&self, filter: &QuoteFilter) -> RepoResult<Vec<Quote>> {
        (**self).find_many(filter)
    }

    fn update_many(&self, filter: &QuoteFilter, patch: &QuotePatch) -> RepoResult<usize> {
        (**self).update_many(filter, patch)
    }

    fn insert(&self, fields: &NewQuote) -> RepoResult<Quote> {
        (**self).insert(fields)
    }

    fn update_by_id(&self, id: QuoteId, patch: &QuotePatch) -> RepoResult<Option<Quote>> {
        (**self).update_by_id(id, patch)
    }

    fn delete_by_id(&self, id: QuoteId) -> RepoResult<bool> {
        (**self).delete_by_id(id)
    }

    fn count(&self, filter: &QuoteFilter) -> RepoResult<u64> {
        (**self).count(filter)
    }

    fn pin_exclusive(
        &self,
        id: QuoteId,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Option<Quote>> {
        (**self).pin_exclusive(id, day, mode)
    }

    fn pin_if_vacant(&self, id: QuoteId, day: DateKey) -> RepoResult<PinOutcome> {
        (**self).pin_if_vacant(id, day)
    }

    fn insert_pinned(
        &self,
        fields: &NewQuote,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Quote> {
        (**self).insert_pinned(fields, day, mode)
    }

    fn update_and_pin(
        &self,
        id: QuoteId,
        patch: &QuotePatch,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Option<Quote>> {
        (**self).update_and_pin(id, patch, day, mode)
    }
}

/// SQLite-backed quote repository.
#[derive(Clone, Copy)]
pub struct SqliteQuoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// Registers the SQL functions text search relies on, so connections not
    /// opened through [`crate::db::open_db`] work too.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        if !table_exists(conn, "quotes")? {
            return Err(RepoError::MissingRequiredTable("quotes"));
        }
        register_functions(conn)?;
        Ok(Self { conn })
    }

    fn immediate_transaction(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl QuoteRepository for SqliteQuoteRepository<'_> {
    fn find_one(&self, filter: &QuoteFilter) -> RepoResult<Option<Quote>> {
        let narrowed = QuoteFilter {
            limit: Some(1),
            ..filter.clone()
        };
        Ok(query_quotes(self.conn, &narrowed)?.into_iter().next())
    }

    fn find_many(&self, filter: &QuoteFilter) -> RepoResult<Vec<Quote>> {
        query_quotes(self.conn, filter)
    }

    fn update_many(&self, filter: &QuoteFilter, patch: &QuotePatch) -> RepoResult<usize> {
        update_matching(self.conn, filter, patch)
    }

    fn insert(&self, fields: &NewQuote) -> RepoResult<Quote> {
        let id = insert_row(self.conn, fields)?;
        load_by_id(self.conn, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted quote {id} not found in read-back"))
        })
    }

    fn update_by_id(&self, id: QuoteId, patch: &QuotePatch) -> RepoResult<Option<Quote>> {
        if patch.is_empty() {
            return load_by_id(self.conn, id);
        }
        let changed = update_matching(self.conn, &QuoteFilter::by_id(id), patch)?;
        if changed == 0 {
            return Ok(None);
        }
        load_by_id(self.conn, id)
    }

    fn delete_by_id(&self, id: QuoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM quotes WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn count(&self, filter: &QuoteFilter) -> RepoResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM quotes");
        let mut bind_values = Vec::new();
        push_where(filter, &mut sql, &mut bind_values);

        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{total}`")))
    }

    fn pin_exclusive(
        &self,
        id: QuoteId,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Option<Quote>> {
        let tx = self.immediate_transaction()?;
        if load_by_id(&tx, id)?.is_none() {
            return Ok(None);
        }
        update_matching(&tx, &QuoteFilter::pinned(), &QuotePatch::unpin(mode))?;
        update_matching(&tx, &QuoteFilter::by_id(id), &QuotePatch::pin(day))?;
        let pinned = load_by_id(&tx, id)?;
        tx.commit()?;
        Ok(pinned)
    }

    fn pin_if_vacant(&self, id: QuoteId, day: DateKey) -> RepoResult<PinOutcome> {
        let tx = self.immediate_transaction()?;
        let existing = query_quotes(
            &tx,
            &QuoteFilter {
                limit: Some(1),
                ..QuoteFilter::pinned_for(day)
            },
        )?;
        if let Some(existing) = existing.into_iter().next() {
            return Ok(PinOutcome::AlreadyPinned(existing));
        }
        if load_by_id(&tx, id)?.is_none() {
            return Ok(PinOutcome::Missing);
        }

        update_matching(
            &tx,
            &QuoteFilter::pinned(),
            &QuotePatch::unpin(UnpinMode::Retire),
        )?;
        update_matching(&tx, &QuoteFilter::by_id(id), &QuotePatch::pin(day))?;
        let pinned = load_by_id(&tx, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("pinned quote {id} not found in read-back"))
        })?;
        tx.commit()?;
        Ok(PinOutcome::Pinned(pinned))
    }

    fn insert_pinned(
        &self,
        fields: &NewQuote,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Quote> {
        let tx = self.immediate_transaction()?;
        update_matching(&tx, &QuoteFilter::pinned(), &QuotePatch::unpin(mode))?;
        let id = insert_row(&tx, fields)?;
        update_matching(&tx, &QuoteFilter::by_id(id), &QuotePatch::pin(day))?;
        let created = load_by_id(&tx, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted quote {id} not found in read-back"))
        })?;
        tx.commit()?;
        Ok(created)
    }

    fn update_and_pin(
        &self,
        id: QuoteId,
        patch: &QuotePatch,
        day: DateKey,
        mode: UnpinMode,
    ) -> RepoResult<Option<Quote>> {
        let tx = self.immediate_transaction()?;
        if load_by_id(&tx, id)?.is_none() {
            return Ok(None);
        }
        update_matching(&tx, &QuoteFilter::pinned(), &QuotePatch::unpin(mode))?;
        update_matching(&tx, &QuoteFilter::by_id(id), &patch.clone().pinned_for(day))?;
        let updated = load_by_id(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }
}

fn insert_row(conn: &Connection, fields: &NewQuote) -> RepoResult<QuoteId> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO quotes (
            id,
            text_primary,
            text_secondary,
            annotation,
            is_today,
            selected_on
        ) VALUES (?1, ?2, ?3, ?4, 0, NULL);",
        params![
            id.to_string(),
            fields.text_primary.as_str(),
            fields.text_secondary.as_str(),
            fields.annotation.as_str(),
        ],
    )?;
    Ok(id)
}

fn load_by_id(conn: &Connection, id: QuoteId) -> RepoResult<Option<Quote>> {
    let mut stmt = conn.prepare(&format!("{QUOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_quote_row(row)?));
    }
    Ok(None)
}

fn query_quotes(conn: &Connection, filter: &QuoteFilter) -> RepoResult<Vec<Quote>> {
    let mut sql = String::from(QUOTE_SELECT_SQL);
    let mut bind_values: Vec<Value> = Vec::new();
    push_where(filter, &mut sql, &mut bind_values);

    sql.push_str(match filter.order {
        QuoteOrder::RecentlyUpdated => " ORDER BY updated_at DESC, id ASC",
        QuoteOrder::RecentlySelected => {
            " ORDER BY selected_on IS NULL ASC, selected_on DESC, updated_at DESC, id ASC"
        }
        QuoteOrder::Created => " ORDER BY created_at ASC, id ASC",
    });

    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if filter.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(filter.offset)));
        }
    } else if filter.offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(filter.offset)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut quotes = Vec::new();
    while let Some(row) = rows.next()? {
        quotes.push(parse_quote_row(row)?);
    }
    Ok(quotes)
}

fn update_matching(conn: &Connection, filter: &QuoteFilter, patch: &QuotePatch) -> RepoResult<usize> {
    if patch.is_empty() {
        return Ok(0);
    }

    let mut assignments: Vec<&'static str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    if let Some(text) = patch.text_primary.as_ref() {
        assignments.push("text_primary = ?");
        bind_values.push(Value::Text(text.clone()));
    }
    if let Some(text) = patch.text_secondary.as_ref() {
        assignments.push("text_secondary = ?");
        bind_values.push(Value::Text(text.clone()));
    }
    if let Some(text) = patch.annotation.as_ref() {
        assignments.push("annotation = ?");
        bind_values.push(Value::Text(text.clone()));
    }
    if let Some(flag) = patch.is_today {
        assignments.push("is_today = ?");
        bind_values.push(Value::Integer(bool_to_int(flag)));
    }
    if let Some(selected_on) = patch.selected_on {
        assignments.push("selected_on = ?");
        bind_values.push(match selected_on {
            Some(day) => Value::Text(day.to_db_string()),
            None => Value::Null,
        });
    }

    let mut sql = format!(
        "UPDATE quotes SET {}, updated_at = {NOW_MS_SQL}",
        assignments.join(", ")
    );
    push_where(filter, &mut sql, &mut bind_values);

    Ok(conn.execute(&sql, params_from_iter(bind_values))?)
}

fn push_where(filter: &QuoteFilter, sql: &mut String, bind_values: &mut Vec<Value>) {
    sql.push_str(" WHERE 1 = 1");

    if let Some(id) = filter.id {
        sql.push_str(" AND id = ?");
        bind_values.push(Value::Text(id.to_string()));
    }
    if let Some(flag) = filter.is_today {
        sql.push_str(" AND is_today = ?");
        bind_values.push(Value::Integer(bool_to_int(flag)));
    }
    if let Some(day) = filter.selected_on {
        sql.push_str(" AND selected_on = ?");
        bind_values.push(Value::Text(day.to_db_string()));
    }
    if let Some(day) = filter.selected_since {
        sql.push_str(" AND selected_on >= ?");
        bind_values.push(Value::Text(day.to_db_string()));
    }
    if let Some(text) = filter
        .text_search
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    {
        sql.push_str(
            " AND (unicode_fold(text_primary) LIKE ? ESCAPE '\\'
                OR unicode_fold(text_secondary) LIKE ? ESCAPE '\\'
                OR unicode_fold(annotation) LIKE ? ESCAPE '\\')",
        );
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        for _ in 0..3 {
            bind_values.push(Value::Text(pattern.clone()));
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_quote_row(row: &Row<'_>) -> RepoResult<Quote> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in quotes.id"))
    })?;

    let is_today = match row.get::<_, i64>("is_today")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_today value `{other}` in quotes.is_today"
            )));
        }
    };

    let selected_on = match row.get::<_, Option<String>>("selected_on")? {
        Some(value) => Some(value.parse::<DateKey>().map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid date `{value}` in quotes.selected_on"
            ))
        })?),
        None => None,
    };

    Ok(Quote {
        id,
        text_primary: row.get("text_primary")?,
        text_secondary: row.get("text_secondary")?,
        annotation: row.get("annotation")?,
        is_today,
        selected_on,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
