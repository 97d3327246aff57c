mod common;

use std::sync::Arc;

use serde_json::json;
use spotetl::{error::Error, spotify::paginate::Paginator};

use common::{FakeTransport, TOKEN, gate, page, saved_item};

const FIRST: &str = "http://api.test/v1/me/tracks?limit=2";
const SECOND: &str = "http://api.test/v1/me/tracks?offset=2&limit=2";
const THIRD: &str = "http://api.test/v1/me/tracks?offset=4&limit=2";

#[tokio::test(start_paused = true)]
async fn test_fetch_all_follows_next_links_in_order() {
    let transport = Arc::new(
        FakeTransport::new()
            .json(FIRST, page(vec![saved_item("a"), saved_item("b")], Some(SECOND)))
            .json(SECOND, page(vec![saved_item("c"), saved_item("d")], Some(THIRD)))
            .json(THIRD, page(vec![saved_item("e")], None)),
    );
    let gate = gate(transport.clone(), 5);

    let items = Paginator::new(&gate).fetch_all(FIRST, TOKEN).await.unwrap();

    let ids: Vec<&str> = items
        .iter()
        .map(|i| i["track"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(transport.requests(), vec![FIRST, SECOND, THIRD]);
}

#[tokio::test(start_paused = true)]
async fn test_single_page_and_empty_collection() {
    let transport = Arc::new(FakeTransport::new().json(FIRST, page(vec![], None)));
    let gate = gate(transport.clone(), 5);

    let items = Paginator::new(&gate).fetch_all(FIRST, TOKEN).await.unwrap();

    assert!(items.is_empty());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_next_string_ends_the_walk() {
    let transport = Arc::new(
        FakeTransport::new().json(FIRST, json!({ "items": [saved_item("a")], "next": "" })),
    );
    let gate = gate(transport.clone(), 5);

    let items = Paginator::new(&gate).fetch_all(FIRST, TOKEN).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_page_fails_the_walk() {
    let transport = Arc::new(
        FakeTransport::new()
            .json(FIRST, page(vec![saved_item("a")], Some(SECOND)))
            .fail(SECOND, 502),
    );
    let gate = gate(transport.clone(), 5);

    let err = Paginator::new(&gate)
        .fetch_all(FIRST, TOKEN)
        .await
        .unwrap_err();

    match err {
        Error::Status { url, status } => {
            assert_eq!(url, SECOND);
            assert_eq!(status, 502);
        }
        other => panic!("expected Status, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_items_array_is_malformed() {
    let transport = Arc::new(FakeTransport::new().json(FIRST, json!({ "next": null })));
    let gate = gate(transport, 5);

    let err = Paginator::new(&gate)
        .fetch_all(FIRST, TOKEN)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Malformed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_envelope_unwraps_followed_artists() {
    let first = "http://api.test/v1/me/following?type=artist&limit=1";
    let second = "http://api.test/v1/me/following?type=artist&after=x&limit=1";
    let transport = Arc::new(
        FakeTransport::new()
            .json(
                first,
                json!({ "artists": { "items": [{ "id": "x" }], "next": second } }),
            )
            .json(
                second,
                json!({ "artists": { "items": [{ "id": "y" }], "next": null } }),
            ),
    );
    let gate = gate(transport, 5);

    let items = Paginator::new(&gate)
        .with_envelope("artists")
        .fetch_all(first, TOKEN)
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["id"], "y");

    // The same body without the envelope is not a page
    let err = Paginator::new(&gate)
        .fetch_all(first, TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_page_returns_next() {
    let transport = Arc::new(
        FakeTransport::new().json(FIRST, page(vec![saved_item("a")], Some(SECOND))),
    );
    let gate = gate(transport.clone(), 5);

    let page = Paginator::new(&gate).fetch_page(FIRST, TOKEN).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.next.as_deref(), Some(SECOND));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_next_pointing_at_itself_is_malformed() {
    let transport = Arc::new(
        FakeTransport::new().json(FIRST, page(vec![saved_item("a")], Some(FIRST))),
    );
    let gate = gate(transport.clone(), 5);

    let err = Paginator::new(&gate)
        .fetch_all(FIRST, TOKEN)
        .await
        .unwrap_err();

    match err {
        Error::Malformed { url, .. } => assert_eq!(url, FIRST),
        other => panic!("expected Malformed, got {:?}", other),
    }
    assert_eq!(transport.requests(), vec![FIRST]);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_across_pages_is_malformed() {
    let transport = Arc::new(
        FakeTransport::new()
            .json(FIRST, page(vec![saved_item("a")], Some(SECOND)))
            .json(SECOND, page(vec![saved_item("b")], Some(FIRST))),
    );
    let gate = gate(transport.clone(), 5);

    let result = Paginator::new(&gate).fetch_all(FIRST, TOKEN).await;

    assert!(matches!(result, Err(Error::Malformed { .. })));
    assert_eq!(transport.requests(), vec![FIRST, SECOND]);
}
