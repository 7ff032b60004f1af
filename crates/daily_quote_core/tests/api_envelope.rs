use daily_quote_core::db::open_db_in_memory;
use daily_quote_core::{
    ApiResponse, DateKey, EngineConfig, FixedClock, NewQuote, QuoteApi, QuoteListQuery,
    QuoteServiceError, QuoteUpdate, SqliteQuoteRepository,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use uuid::Uuid;

fn today() -> DateKey {
    DateKey::from_ymd(2026, 10, 19).unwrap()
}

fn api(repo: SqliteQuoteRepository<'_>) -> QuoteApi<SqliteQuoteRepository<'_>, FixedClock> {
    QuoteApi::with_rng(
        repo,
        FixedClock::at_noon_utc(today()),
        EngineConfig::default(),
        StdRng::seed_from_u64(17),
    )
}

#[test]
fn get_today_wraps_quote_in_success_envelope() {
    let conn = open_db_in_memory().unwrap();
    let api = api(SqliteQuoteRepository::try_new(&conn).unwrap());
    let mut fields = NewQuote::new("Well begun is half done.");
    fields.text_secondary = "Aristotle".to_string();
    api.admin_create(&fields).unwrap();

    let response = api.get_today().unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["success"], json!(true));
    assert_eq!(json["data"]["text_primary"], json!("Well begun is half done."));
    assert_eq!(json["data"]["text_secondary"], json!("Aristotle"));
    assert_eq!(json["data"]["is_today"], json!(true));
    assert_eq!(json["data"]["selected_on"], json!("2026-10-19"));
    assert!(json.get("pagination").is_none());
    assert!(json.get("error").is_none());
}

#[test]
fn admin_list_carries_pagination() {
    let conn = open_db_in_memory().unwrap();
    let api = api(SqliteQuoteRepository::try_new(&conn).unwrap());
    for index in 0..3 {
        api.admin_create(&NewQuote::new(format!("q{index}"))).unwrap();
    }

    let response = api
        .admin_list(&QuoteListQuery {
            page_size: 2,
            ..QuoteListQuery::default()
        })
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        json["pagination"],
        json!({
            "page": 1,
            "page_size": 2,
            "total": 3,
            "total_pages": 2,
            "has_next": true,
            "has_prev": false
        })
    );
}

#[test]
fn admin_operations_round_trip_through_the_facade() {
    let conn = open_db_in_memory().unwrap();
    let api = api(SqliteQuoteRepository::try_new(&conn).unwrap());

    let created = api.admin_create(&NewQuote::new("first")).unwrap();
    assert_eq!(created.message.as_deref(), Some("Quote created"));
    let id = created.data.unwrap().id;

    let pinned = api.admin_set_today(id).unwrap().data.unwrap();
    assert!(pinned.is_today);
    assert_eq!(api.get_today().unwrap().data.unwrap().id, id);

    let updated = api
        .admin_update(
            id,
            &QuoteUpdate {
                is_today: Some(false),
                ..QuoteUpdate::default()
            },
        )
        .unwrap()
        .data
        .unwrap();
    assert_eq!(updated.selected_on, None);

    assert_eq!(api.admin_get(id).unwrap().data.unwrap().id, id);
    let deleted = api.admin_delete(id).unwrap();
    assert_eq!(
        serde_json::to_value(&deleted).unwrap()["data"]["id"],
        json!(id.to_string())
    );
    assert!(api.admin_history(30).unwrap().data.unwrap().is_empty());
}

#[test]
fn errors_render_as_failure_envelopes() {
    let conn = open_db_in_memory().unwrap();
    let api = api(SqliteQuoteRepository::try_new(&conn).unwrap());

    let err = api.get_today().unwrap_err();
    assert!(matches!(err, QuoteServiceError::NoQuotesAvailable));
    let json = serde_json::to_value(ApiResponse::<()>::from_error(&err)).unwrap();
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["error"]["code"], json!("no_quotes_available"));
    assert_eq!(json["error"]["retryable"], json!(false));
    assert!(json.get("data").is_none());

    let missing = Uuid::new_v4();
    let err = api.admin_get(missing).unwrap_err();
    let json = serde_json::to_value(ApiResponse::<()>::from_error(&err)).unwrap();
    assert_eq!(json["error"]["code"], json!("not_found"));
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains(&missing.to_string()));
}
