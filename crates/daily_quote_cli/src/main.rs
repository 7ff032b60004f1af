//! Command-line front end for the daily quote engine.
//!
//! # Responsibility
//! - Map subcommands onto the `QuoteApi` operation surface.
//! - Print JSON envelopes; exit with status 1 on failure envelopes.

use daily_quote_core::db::open_db;
use daily_quote_core::{
    default_log_level, init_logging, ApiResponse, EngineConfig, NewQuote, QuoteApi, QuoteId,
    QuoteListQuery, QuoteUpdate, ServiceResult, SqliteQuoteRepository, SystemClock,
};
use serde::Serialize;
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "daily_quote.sqlite3";
const DEFAULT_HISTORY_DAYS: u32 = 30;

const USAGE: &str = "usage: daily-quote [--db PATH] [--log-dir DIR] [--log-level LEVEL] <command>

commands:
  today
  list [--search TEXT] [--today true|false] [--page N] [--page-size N]
  get ID
  create TEXT [--secondary TEXT] [--annotation TEXT] [--today]
  update ID [--text TEXT] [--secondary TEXT] [--annotation TEXT] [--today true|false]
  set-today ID
  delete ID
  history [DAYS]";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Today,
    List(QuoteListQuery),
    Get(QuoteId),
    Create(NewQuote),
    Update(QuoteId, QuoteUpdate),
    SetToday(QuoteId),
    Delete(QuoteId),
    History(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    db_path: String,
    log_dir: Option<String>,
    log_level: Option<String>,
    command: Command,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    if let Some(log_dir) = invocation.log_dir.as_deref() {
        let level = invocation
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().to_string());
        if let Err(err) = init_logging(&level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::from(2);
        }
    };

    let conn = match open_db(&invocation.db_path) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("failed to open `{}`: {err}", invocation.db_path);
            return ExitCode::FAILURE;
        }
    };
    let repo = match SqliteQuoteRepository::try_new(&conn) {
        Ok(repo) => repo,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let api = QuoteApi::new(repo, SystemClock, config);
    match invocation.command {
        Command::Today => emit(api.get_today()),
        Command::List(query) => emit(api.admin_list(&query)),
        Command::Get(id) => emit(api.admin_get(id)),
        Command::Create(fields) => emit(api.admin_create(&fields)),
        Command::Update(id, changes) => emit(api.admin_update(id, &changes)),
        Command::SetToday(id) => emit(api.admin_set_today(id)),
        Command::Delete(id) => emit(api.admin_delete(id)),
        Command::History(days) => emit(api.admin_history(days)),
    }
}

fn emit<T: Serialize>(result: ServiceResult<ApiResponse<T>>) -> ExitCode {
    let (response, code) = match result {
        Ok(response) => (response, ExitCode::SUCCESS),
        Err(err) => {
            log::warn!(
                "event=cli_command module=cli status=error error_code={} error={}",
                err.kind().as_str(),
                err
            );
            (ApiResponse::from_error(&err), ExitCode::FAILURE)
        }
    };

    match serde_json::to_string_pretty(&response) {
        Ok(body) => {
            println!("{body}");
            code
        }
        Err(err) => {
            eprintln!("failed to encode response: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut db_path = DEFAULT_DB_PATH.to_string();
    let mut log_dir = None;
    let mut log_level = None;

    let mut rest = args.iter().map(String::as_str).peekable();
    while let Some(flag) = rest.peek().copied() {
        match flag {
            "--db" => {
                rest.next();
                db_path = take_value(&mut rest, "--db")?;
            }
            "--log-dir" => {
                rest.next();
                log_dir = Some(take_value(&mut rest, "--log-dir")?);
            }
            "--log-level" => {
                rest.next();
                log_level = Some(take_value(&mut rest, "--log-level")?);
            }
            _ => break,
        }
    }

    let name = rest.next().ok_or("missing command")?;
    let tail: Vec<&str> = rest.collect();
    let command = match name {
        "today" => {
            expect_no_args(&tail)?;
            Command::Today
        }
        "list" => Command::List(parse_list(&tail)?),
        "get" => Command::Get(single_id(&tail)?),
        "create" => Command::Create(parse_create(&tail)?),
        "update" => {
            let (id, options) = tail.split_first().ok_or("update requires an ID")?;
            Command::Update(parse_id(id)?, parse_update(options)?)
        }
        "set-today" => Command::SetToday(single_id(&tail)?),
        "delete" => Command::Delete(single_id(&tail)?),
        "history" => match tail.as_slice() {
            [] => Command::History(DEFAULT_HISTORY_DAYS),
            [days] => Command::History(parse_number(days, "DAYS")?),
            _ => return Err("history takes at most one argument".to_string()),
        },
        other => return Err(format!("unknown command `{other}`")),
    };

    Ok(Invocation {
        db_path,
        log_dir,
        log_level,
        command,
    })
}

fn parse_list(args: &[&str]) -> Result<QuoteListQuery, String> {
    let mut query = QuoteListQuery::default();
    let mut iter = args.iter().copied();
    while let Some(flag) = iter.next() {
        match flag {
            "--search" => query.text_search = Some(take_value(&mut iter, flag)?),
            "--today" => query.is_today = Some(parse_bool(&take_value(&mut iter, flag)?)?),
            "--page" => query.page = parse_number(&take_value(&mut iter, flag)?, flag)?,
            "--page-size" => query.page_size = parse_number(&take_value(&mut iter, flag)?, flag)?,
            other => return Err(format!("unknown list option `{other}`")),
        }
    }
    Ok(query)
}

fn parse_create(args: &[&str]) -> Result<NewQuote, String> {
    let (text, options) = args.split_first().ok_or("create requires TEXT")?;
    let mut fields = NewQuote::new(*text);
    let mut iter = options.iter().copied();
    while let Some(flag) = iter.next() {
        match flag {
            "--secondary" => fields.text_secondary = take_value(&mut iter, flag)?,
            "--annotation" => fields.annotation = take_value(&mut iter, flag)?,
            "--today" => fields.is_today = true,
            other => return Err(format!("unknown create option `{other}`")),
        }
    }
    Ok(fields)
}

fn parse_update(args: &[&str]) -> Result<QuoteUpdate, String> {
    let mut changes = QuoteUpdate::default();
    let mut iter = args.iter().copied();
    while let Some(flag) = iter.next() {
        match flag {
            "--text" => changes.text_primary = Some(take_value(&mut iter, flag)?),
            "--secondary" => changes.text_secondary = Some(take_value(&mut iter, flag)?),
            "--annotation" => changes.annotation = Some(take_value(&mut iter, flag)?),
            "--today" => changes.is_today = Some(parse_bool(&take_value(&mut iter, flag)?)?),
            other => return Err(format!("unknown update option `{other}`")),
        }
    }
    Ok(changes)
}

fn take_value<'a>(iter: &mut impl Iterator<Item = &'a str>, flag: &str) -> Result<String, String> {
    iter.next()
        .map(str::to_string)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn single_id(args: &[&str]) -> Result<QuoteId, String> {
    match args {
        [id] => parse_id(id),
        _ => Err("expected exactly one ID".to_string()),
    }
}

fn expect_no_args(args: &[&str]) -> Result<(), String> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(format!("unexpected arguments: {}", args.join(" ")))
    }
}

fn parse_id(value: &str) -> Result<QuoteId, String> {
    uuid::Uuid::parse_str(value.trim()).map_err(|_| format!("invalid quote id `{value}`"))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected true|false, got `{other}`")),
    }
}

fn parse_number(value: &str, name: &str) -> Result<u32, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a non-negative integer, got `{value}`"))
}
