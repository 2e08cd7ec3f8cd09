//! Card resolution through local gateways.

mod common;

use axum::http::StatusCode;
use common::{
    content_gateway, counting_gateway, dead_gateway, payload, stalled_gateway, status_gateway,
};
use pressledger::blockchain::{Ledger, SharedLedger};
use pressledger::card::CardMapper;
use pressledger::gateway::{AttemptError, FetchOutcome, GatewayFetcher};
use pressledger::resolver::Resolver;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

fn article_document(cid: &str, title: &str) -> Value {
    json!({
        "title": title,
        "description": "Officials confirmed the bridge will reopen next week after repairs",
        "category": "Local",
        "published_at": "2024-03-01T10:00:00Z",
        "metadata_hash": cid,
        "uploaded_by": {"userID": "reporter-7"},
        "verification": {"score": 0.82},
        "files": [
            {"pin_name": "cover", "ipfsHash": "QmCover"},
            {"pin_name": format!("{title} - image 1"), "ipfsHash": "QmLead"}
        ]
    })
}

fn ledger_with(cids: &[&str]) -> SharedLedger {
    let mut ledger = Ledger::in_memory(1).unwrap();
    for cid in cids {
        ledger
            .append(payload(json!({"metadata_hash": cid, "title": format!("Block {cid}")})))
            .unwrap();
    }
    ledger.into_shared()
}

fn resolver(ledger: SharedLedger, gateways: Vec<String>) -> Resolver {
    let fetcher = GatewayFetcher::new(gateways, Duration::from_millis(500)).unwrap();
    Resolver::new(ledger, fetcher, CardMapper::default())
}

#[tokio::test]
async fn test_rich_cards_from_fetched_content() {
    let mut docs = HashMap::new();
    docs.insert("QmA".to_string(), article_document("QmA", "Bridge Reopens"));
    docs.insert("QmB".to_string(), article_document("QmB", "Market Day"));
    let gateway = content_gateway(docs).await;

    let resolver = resolver(ledger_with(&["QmA", "QmB"]), vec![gateway]);
    let list = resolver.list(None).await;
    assert_eq!(list.count, 2);

    let card = &list.items[0];
    assert_eq!(card.title.as_deref(), Some("Market Day"));
    assert_eq!(card.id.as_deref(), Some("reporter-7"));
    assert_eq!(card.reliability, Some(0.82));
    assert_eq!(card.category.as_deref(), Some("Local"));
    assert_eq!(card.thumbnail.as_deref(), Some("QmLead"));
    assert_eq!(card.published_at.as_deref(), Some("2024-03-01T10:00:00Z"));
    assert_eq!(card.metadata_hash.as_deref(), Some("QmB"));
    assert!(card.block_hash.is_some());
    assert_eq!(list.items[1].title.as_deref(), Some("Bridge Reopens"));
}

#[tokio::test]
async fn test_missing_content_falls_back_per_block() {
    let mut docs = HashMap::new();
    docs.insert("QmKnown".to_string(), article_document("QmKnown", "Known"));
    let gateway = content_gateway(docs).await;

    let ledger = ledger_with(&["QmKnown", "QmMissing"]);
    let missing_hash = ledger.read().await.last_block().unwrap().hash.clone();

    let list = resolver(ledger, vec![gateway]).list(None).await;
    assert_eq!(list.count, 2);

    let fallback = &list.items[0];
    assert_eq!(fallback.title.as_deref(), Some("Block QmMissing"));
    assert_eq!(fallback.id, None);
    assert_eq!(fallback.reliability, None);
    assert_eq!(fallback.block_hash.as_deref(), Some(missing_hash.as_str()));
    assert_eq!(fallback.metadata_hash.as_deref(), Some("QmMissing"));

    assert_eq!(list.items[1].title.as_deref(), Some("Known"));
}

#[tokio::test]
async fn test_fetch_reaches_third_gateway() {
    let mut docs = HashMap::new();
    docs.insert("QmThird".to_string(), article_document("QmThird", "Third Time"));

    let gateways = vec![
        status_gateway(StatusCode::INTERNAL_SERVER_ERROR).await,
        dead_gateway(),
        content_gateway(docs).await,
    ];
    let expected_url = gateways[2].replace("{cid}", "QmThird");

    let fetcher = GatewayFetcher::new(gateways.clone(), Duration::from_millis(500)).unwrap();
    match fetcher.fetch("QmThird", None).await {
        FetchOutcome::Found { url, content } => {
            assert_eq!(url, expected_url);
            assert_eq!(content["title"], "Third Time");
        }
        other => panic!("expected content, got {other:?}"),
    }

    let card = resolver(ledger_with(&["QmThird"]), gateways)
        .latest()
        .await
        .unwrap();
    assert_eq!(card.title.as_deref(), Some("Third Time"));
}

#[tokio::test]
async fn test_exhaustion_reports_every_attempt() {
    let gateways = vec![
        status_gateway(StatusCode::NOT_FOUND).await,
        stalled_gateway().await,
        dead_gateway(),
    ];
    let fetcher = GatewayFetcher::new(gateways, Duration::from_millis(300)).unwrap();

    match fetcher.fetch("QmGone", None).await {
        FetchOutcome::Exhausted { failures } => {
            assert_eq!(failures.len(), 3);
            assert!(matches!(failures[0].error, AttemptError::Status(404)));
            assert!(matches!(failures[1].error, AttemptError::Timeout));
            assert!(matches!(failures[2].error, AttemptError::Transport(_)));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_preferred_url_is_tried_first() {
    let mut docs = HashMap::new();
    docs.insert("QmPref".to_string(), article_document("QmPref", "Preferred"));
    let preferred = content_gateway(docs).await.replace("{cid}", "QmPref");

    let ledger = Ledger::in_memory(1).unwrap().into_shared();
    ledger
        .write()
        .await
        .append(payload(json!({"ipfs_url": preferred})))
        .unwrap();

    let card = resolver(ledger, vec![dead_gateway()]).latest().await.unwrap();
    assert_eq!(card.title.as_deref(), Some("Preferred"));
    assert_eq!(card.metadata_hash.as_deref(), Some("QmPref"));
}

#[tokio::test]
async fn test_article_lookup() {
    let mut docs = HashMap::new();
    docs.insert("QmRaw".to_string(), json!({"title": "Raw", "extra": [1, 2, 3]}));
    let gateway = content_gateway(docs).await;

    let resolver = resolver(ledger_with(&[]), vec![gateway]);
    assert_eq!(resolver.article("QmRaw").await.unwrap()["extra"], json!([1, 2, 3]));
    assert_eq!(resolver.article("QmNope").await, None);
}

#[tokio::test]
async fn test_fetches_are_capped_and_ordered() {
    let (gateway, stats) = counting_gateway(Duration::from_millis(100)).await;
    let cids: Vec<String> = (1..=12).map(|i| format!("Qm{i:02}")).collect();
    let refs: Vec<&str> = cids.iter().map(String::as_str).collect();

    let resolver = resolver(ledger_with(&refs), vec![gateway]).with_concurrency(3);
    let all = resolver.all().await;

    assert_eq!(all.count, 12);
    assert_eq!(stats.total(), 12);
    assert!(stats.peak() <= 3, "peak in-flight requests was {}", stats.peak());
    assert!(stats.peak() >= 2, "fetches did not overlap");

    let order: Vec<_> = all.items.iter().filter_map(|c| c.metadata_hash.clone()).collect();
    let mut expected = cids.clone();
    expected.reverse();
    assert_eq!(order, expected);
}
