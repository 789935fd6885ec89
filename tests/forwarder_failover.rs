mod common;

use axum::http::StatusCode;
use common::*;
use guardian_dns::config::DocumentsConfig;
use guardian_dns::dns::Forwarder;
use guardian_dns::error::ForwardError;
use guardian_dns::store::PolicyStore;
use hickory_proto::rr::RecordType;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn forwarder(docs: &Docs, plain: SocketAddr, fallback_timeout: Duration) -> Forwarder {
    let store = Arc::new(PolicyStore::new(&DocumentsConfig::in_dir(docs.path())));
    Forwarder::new(store, plain, fallback_timeout)
}

#[tokio::test]
async fn test_primary_answers_and_secondary_untouched() {
    let primary = spawn_doh(StatusCode::OK, b"PRIMARY").await;
    let secondary = spawn_doh(StatusCode::OK, b"SECONDARY").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&primary.url, &secondary.url, 2.0));

    let fwd = forwarder(&docs, udp.addr, Duration::from_secs(1));
    let answer = fwd.resolve(&query_bytes("example.com.", RecordType::A, 1)).await.unwrap();

    assert_eq!(answer, b"PRIMARY");
    assert_eq!(hits(&primary.hits), 1);
    assert_eq!(hits(&secondary.hits), 0);
    assert_eq!(hits(&udp.hits), 0);
}

#[tokio::test]
async fn test_doh_request_carries_raw_query_and_media_type() {
    let primary = spawn_doh(StatusCode::OK, b"PRIMARY").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &format!(r#"{{"primary": "{}"}}"#, primary.url));

    let query = query_bytes("example.com.", RecordType::AAAA, 42);
    forwarder(&docs, udp.addr, Duration::from_secs(1)).resolve(&query).await.unwrap();

    let (content_type, body) = primary.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(content_type, "application/dns-message");
    assert_eq!(body, query);
}

#[tokio::test]
async fn test_primary_error_status_falls_to_secondary() {
    let primary = spawn_doh(StatusCode::INTERNAL_SERVER_ERROR, b"oops").await;
    let secondary = spawn_doh(StatusCode::OK, b"SECONDARY").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&primary.url, &secondary.url, 2.0));

    let answer = forwarder(&docs, udp.addr, Duration::from_secs(1))
        .resolve(&query_bytes("example.com.", RecordType::A, 2))
        .await
        .unwrap();

    assert_eq!(answer, b"SECONDARY");
    assert_eq!(hits(&primary.hits), 1);
    assert_eq!(hits(&secondary.hits), 1);
    assert_eq!(hits(&udp.hits), 0);
}

#[tokio::test]
async fn test_empty_body_counts_as_failure() {
    let primary = spawn_doh(StatusCode::OK, b"").await;
    let secondary = spawn_doh(StatusCode::OK, b"SECONDARY").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&primary.url, &secondary.url, 2.0));

    let answer = forwarder(&docs, udp.addr, Duration::from_secs(1))
        .resolve(&query_bytes("example.com.", RecordType::A, 3))
        .await
        .unwrap();

    assert_eq!(answer, b"SECONDARY");
}

#[tokio::test]
async fn test_unreachable_primary_falls_to_secondary() {
    let secondary = spawn_doh(StatusCode::OK, b"SECONDARY").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&dead_url().await, &secondary.url, 2.0));

    let answer = forwarder(&docs, udp.addr, Duration::from_secs(1))
        .resolve(&query_bytes("example.com.", RecordType::A, 4))
        .await
        .unwrap();

    assert_eq!(answer, b"SECONDARY");
}

#[tokio::test]
async fn test_slow_primary_times_out() {
    let primary = spawn_doh_with_delay(StatusCode::OK, b"PRIMARY", Duration::from_secs(5)).await;
    let secondary = spawn_doh(StatusCode::OK, b"SECONDARY").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&primary.url, &secondary.url, 0.3));

    let started = Instant::now();
    let answer = forwarder(&docs, udp.addr, Duration::from_secs(1))
        .resolve(&query_bytes("example.com.", RecordType::A, 5))
        .await
        .unwrap();

    assert_eq!(answer, b"SECONDARY");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_both_doh_fail_then_plain_udp() {
    let primary = spawn_doh(StatusCode::BAD_GATEWAY, b"").await;
    let secondary = spawn_doh(StatusCode::SERVICE_UNAVAILABLE, b"").await;
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&primary.url, &secondary.url, 2.0));

    let answer = forwarder(&docs, udp.addr, Duration::from_secs(1))
        .resolve(&query_bytes("example.com.", RecordType::A, 6))
        .await
        .unwrap();

    assert_eq!(first_a_answer(&answer), Some(UPSTREAM_ANSWER));
    assert_eq!(hits(&primary.hits), 1);
    assert_eq!(hits(&secondary.hits), 1);
    assert_eq!(hits(&udp.hits), 1);
}

#[tokio::test]
async fn test_no_doh_document_goes_straight_to_udp() {
    let udp = spawn_udp_upstream().await;
    let docs = Docs::new();

    let answer = forwarder(&docs, udp.addr, Duration::from_secs(1))
        .resolve(&query_bytes("example.com.", RecordType::A, 7))
        .await
        .unwrap();

    assert_eq!(first_a_answer(&answer), Some(UPSTREAM_ANSWER));
    assert_eq!(hits(&udp.hits), 1);
}

#[tokio::test]
async fn test_every_upstream_failing_is_bounded_and_reported() {
    let primary = spawn_doh(StatusCode::INTERNAL_SERVER_ERROR, b"").await;
    let secondary = spawn_doh(StatusCode::INTERNAL_SERVER_ERROR, b"").await;
    let (silent, _keep) = silent_udp_upstream().await;
    let docs = Docs::new();
    docs.write("doh.json", &doh_document(&primary.url, &secondary.url, 1.0));

    let started = Instant::now();
    let err = forwarder(&docs, silent, Duration::from_millis(300))
        .resolve(&query_bytes("example.com.", RecordType::A, 8))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    match err {
        ForwardError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ForwardError::UdpTimeout { addr, .. } if addr == silent));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}
