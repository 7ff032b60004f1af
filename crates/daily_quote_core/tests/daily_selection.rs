use daily_quote_core::db::{open_db, open_db_in_memory};
use daily_quote_core::{
    DateKey, EngineConfig, FixedClock, NewQuote, PinStrategy, QuoteFilter, QuoteId, QuotePatch,
    QuoteRepository, QuoteServiceError, SelectionPolicy, SqliteQuoteRepository,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::Path;
use std::thread;

fn day(y: i32, m: u32, d: u32) -> DateKey {
    DateKey::from_ymd(y, m, d).unwrap()
}

fn seed_quotes(repo: &SqliteQuoteRepository<'_>, count: usize) -> Vec<QuoteId> {
    (0..count)
        .map(|index| repo.insert(&NewQuote::new(format!("quote {index}"))).unwrap().id)
        .collect()
}

fn mark_selected(repo: &SqliteQuoteRepository<'_>, id: QuoteId, on: DateKey) {
    repo.update_by_id(
        id,
        &QuotePatch {
            selected_on: Some(Some(on)),
            ..QuotePatch::default()
        },
    )
    .unwrap()
    .unwrap();
}

fn policy<'conn>(
    repo: SqliteQuoteRepository<'conn>,
    today: DateKey,
    seed: u64,
) -> SelectionPolicy<SqliteQuoteRepository<'conn>, FixedClock> {
    SelectionPolicy::with_rng(
        repo,
        FixedClock::at_noon_utc(today),
        EngineConfig::default(),
        StdRng::seed_from_u64(seed),
    )
}

#[test]
fn empty_pool_fails_with_no_quotes_available() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();

    let err = policy(repo, day(2026, 5, 1), 1)
        .get_or_select_today()
        .unwrap_err();
    assert!(matches!(err, QuoteServiceError::NoQuotesAvailable));
}

#[test]
fn repeated_reads_on_the_same_day_return_the_same_quote_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    seed_quotes(&repo, 5);
    let policy = policy(repo, day(2026, 5, 1), 7);

    let first = policy.get_or_select_today().unwrap();
    let second = policy.get_or_select_today().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.updated_at, second.updated_at);
    assert!(first.is_pinned_for(day(2026, 5, 1)));
    assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
}

#[test]
fn recently_selected_quote_is_never_chosen_again_inside_the_window() {
    let today = day(2026, 5, 10);
    for seed in 0..20 {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
        let ids = seed_quotes(&repo, 3);
        let a = ids[0];
        mark_selected(&repo, a, today.days_back(1));

        let chosen = policy(repo, today, seed).get_or_select_today().unwrap();
        assert_ne!(chosen.id, a);
        assert!(chosen.is_today);
        assert_eq!(chosen.selected_on, Some(today));

        let a_after = repo.find_one(&QuoteFilter::by_id(a)).unwrap().unwrap();
        assert!(!a_after.is_today);
        assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
    }
}

#[test]
fn window_boundary_is_inclusive() {
    let today = day(2026, 5, 31);
    for seed in 0..10 {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
        let ids = seed_quotes(&repo, 2);
        mark_selected(&repo, ids[0], today.days_back(30));
        mark_selected(&repo, ids[1], today.days_back(31));

        let chosen = policy(repo, today, seed).get_or_select_today().unwrap();
        assert_eq!(chosen.id, ids[1], "day -30 is still inside the window");
    }
}

#[test]
fn exhausted_pool_falls_back_to_the_full_collection() {
    let today = day(2026, 6, 15);
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    let ids = seed_quotes(&repo, 2);
    mark_selected(&repo, ids[0], today.days_back(1));
    mark_selected(&repo, ids[1], today.days_back(2));

    let chosen = policy(repo, today, 3).get_or_select_today().unwrap();
    assert!(ids.contains(&chosen.id));
    assert!(chosen.is_pinned_for(today));
    assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
}

#[test]
fn next_day_retires_previous_pin_and_keeps_its_history() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    seed_quotes(&repo, 3);
    let first_day = day(2026, 7, 1);
    let second_day = day(2026, 7, 2);

    let first = policy(repo, first_day, 11).get_or_select_today().unwrap();
    let second = policy(repo, second_day, 11).get_or_select_today().unwrap();

    assert_ne!(first.id, second.id);
    let retired = repo.find_one(&QuoteFilter::by_id(first.id)).unwrap().unwrap();
    assert!(!retired.is_today);
    assert_eq!(retired.selected_on, Some(first_day));
    assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
}

#[test]
fn daily_picks_do_not_repeat_within_the_window() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    seed_quotes(&repo, 31);
    let policy = policy(repo, day(2026, 1, 1), 99);

    let start = day(2026, 1, 1);
    let mut last_seen: HashMap<QuoteId, u32> = HashMap::new();
    for offset in 0..95 {
        let today = start.days_ahead(offset);
        let chosen = policy.select_for(today).unwrap();
        if let Some(previous) = last_seen.insert(chosen.id, offset) {
            assert!(
                offset - previous > 30,
                "quote {} repeated after {} days",
                chosen.id,
                offset - previous
            );
        }
        assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
    }
}

#[test]
fn configured_timezone_decides_the_day() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    seed_quotes(&repo, 2);

    // 03:00 UTC on Aug 2 is still Aug 1 in Los Angeles.
    let instant = chrono::DateTime::parse_from_rfc3339("2026-08-02T03:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let config = EngineConfig {
        timezone: chrono_tz::America::Los_Angeles,
        ..EngineConfig::default()
    };
    let policy = SelectionPolicy::with_rng(
        repo,
        FixedClock::new(instant),
        config,
        StdRng::seed_from_u64(5),
    );

    let chosen = policy.get_or_select_today().unwrap();
    assert_eq!(chosen.selected_on, Some(day(2026, 8, 1)));
}

#[test]
fn compare_and_swap_strategy_selects_and_reuses_the_day_pin() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    let ids = seed_quotes(&repo, 4);
    let yesterday = day(2026, 9, 9);
    let today = day(2026, 9, 10);
    repo.pin_exclusive(ids[0], yesterday, daily_quote_core::UnpinMode::Retire)
        .unwrap()
        .unwrap();

    let config = EngineConfig {
        pin_strategy: PinStrategy::CompareAndSwap,
        ..EngineConfig::default()
    };
    let policy = SelectionPolicy::with_rng(
        repo,
        FixedClock::at_noon_utc(today),
        config,
        StdRng::seed_from_u64(21),
    );

    let chosen = policy.get_or_select_today().unwrap();
    assert_ne!(chosen.id, ids[0]);
    assert!(chosen.is_pinned_for(today));
    assert_eq!(policy.get_or_select_today().unwrap().id, chosen.id);

    let retired = repo.find_one(&QuoteFilter::by_id(ids[0])).unwrap().unwrap();
    assert!(!retired.is_today);
    assert_eq!(retired.selected_on, Some(yesterday));
}

fn concurrent_first_reads(path: &Path, strategy: PinStrategy, workers: u64) -> Vec<QuoteId> {
    let today = day(2026, 10, 1);
    let handles: Vec<_> = (0..workers)
        .map(|seed| {
            let path = path.to_path_buf();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
                let config = EngineConfig {
                    pin_strategy: strategy,
                    ..EngineConfig::default()
                };
                let policy = SelectionPolicy::with_rng(
                    repo,
                    FixedClock::at_noon_utc(today),
                    config,
                    StdRng::seed_from_u64(seed),
                );
                policy.get_or_select_today().unwrap().id
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

#[test]
fn concurrent_first_reads_leave_exactly_one_pin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    {
        let conn = open_db(&path).unwrap();
        let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
        seed_quotes(&repo, 10);
    }

    concurrent_first_reads(&path, PinStrategy::LastWriterWins, 4);

    let conn = open_db(&path).unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
}

#[test]
fn compare_and_swap_first_reads_agree_on_one_quote() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cas.db");
    {
        let conn = open_db(&path).unwrap();
        let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
        seed_quotes(&repo, 10);
    }

    let results = concurrent_first_reads(&path, PinStrategy::CompareAndSwap, 4);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));

    let conn = open_db(&path).unwrap();
    let repo = SqliteQuoteRepository::try_new(&conn).unwrap();
    let pinned = repo.find_one(&QuoteFilter::pinned()).unwrap().unwrap();
    assert_eq!(pinned.id, results[0]);
    assert_eq!(repo.count(&QuoteFilter::pinned()).unwrap(), 1);
}
