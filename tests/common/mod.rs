#![allow(dead_code)]

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::Router;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UdpSocket;

/// Address the fake upstream puts in every answer.
pub const UPSTREAM_ANSWER: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);
/// What the fake upstream sends back for bytes it cannot parse.
pub const RAW_REPLY: &[u8] = b"RAW-OK";

/// Temporary documents directory.
pub struct Docs {
    dir: TempDir,
}

impl Docs {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("create temp dir") }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, content: &str) -> &Self {
        std::fs::write(self.dir.path().join(name), content).expect("write document");
        self
    }
}

pub fn query_bytes(name: &str, qtype: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_str(name).expect("valid name"), qtype));
    msg.to_vec().expect("encode query")
}

/// Answer `request` the way a real resolver would, with `UPSTREAM_ANSWER`.
pub fn upstream_answer(request: &Message) -> Vec<u8> {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.set_response_code(ResponseCode::NoError);
    for query in request.queries() {
        response.add_query(query.clone());
        let mut record = Record::new();
        record.set_name(query.name().clone());
        record.set_record_type(RecordType::A);
        record.set_ttl(60);
        record.set_data(Some(RData::A(A(UPSTREAM_ANSWER))));
        response.add_answer(record);
    }
    response.to_vec().expect("encode answer")
}

pub fn first_a_answer(reply: &[u8]) -> Option<Ipv4Addr> {
    a_answer(&Message::from_vec(reply).ok()?)
}

pub fn a_answer(msg: &Message) -> Option<Ipv4Addr> {
    msg.answers().iter().find_map(|r| match r.data() {
        Some(RData::A(a)) => Some(a.0),
        _ => None,
    })
}

/// Fake plain-UDP upstream. Parsable queries get a real answer, anything
/// else gets `RAW_REPLY`.
pub struct UdpUpstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

pub async fn spawn_udp_upstream() -> UdpUpstream {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind fake upstream");
    let addr = socket.local_addr().expect("local addr");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else { continue };
            counter.fetch_add(1, Ordering::SeqCst);
            let reply = match Message::from_vec(&buf[..len]) {
                Ok(request) => upstream_answer(&request),
                Err(_) => RAW_REPLY.to_vec(),
            };
            let _ = socket.send_to(&reply, peer).await;
        }
    });

    UdpUpstream { addr, hits }
}

/// A bound UDP socket that never answers. Keep the socket alive for the
/// duration of the test.
pub async fn silent_udp_upstream() -> (SocketAddr, UdpSocket) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind silent upstream");
    (socket.local_addr().expect("local addr"), socket)
}

/// Fake DoH endpoint returning a fixed status and body at `/dns-query`.
pub struct DohServer {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    /// Content-Type and body of the last request seen.
    pub last_request: Arc<Mutex<Option<(String, Vec<u8>)>>>,
}

pub async fn spawn_doh(status: StatusCode, body: &[u8]) -> DohServer {
    spawn_doh_with_delay(status, body, Duration::ZERO).await
}

pub async fn spawn_doh_with_delay(status: StatusCode, body: &[u8], delay: Duration) -> DohServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let last_request = Arc::new(Mutex::new(None));
    let reply = body.to_vec();

    let (counter, seen) = (hits.clone(), last_request.clone());
    let app = Router::new().route(
        "/dns-query",
        post(move |headers: HeaderMap, body: Bytes| {
            let (counter, seen, reply) = (counter.clone(), seen.clone(), reply.clone());
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *seen.lock().unwrap() = Some((content_type, body.to_vec()));
                tokio::time::sleep(delay).await;
                (status, reply)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind fake DoH");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake DoH server");
    });

    DohServer { url: format!("http://{}/dns-query", addr), hits, last_request }
}

/// A URL nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}/dns-query", addr)
}

pub fn doh_document(primary: &str, secondary: &str, timeout_seconds: f64) -> String {
    serde_json::json!({
        "primary": primary,
        "secondary": secondary,
        "timeout_seconds": timeout_seconds,
    })
    .to_string()
}

pub fn hits(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
