use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single upstream attempt, or of the whole attempt plan.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("DoH endpoint {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("DoH request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("DoH endpoint {url} returned an empty body")]
    EmptyBody { url: String },

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("UDP upstream {addr} failed: {source}")]
    Udp {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("UDP upstream {addr} did not answer within {timeout:?}")]
    UdpTimeout { addr: SocketAddr, timeout: Duration },

    #[error("all {attempts} upstream attempts failed, last: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<ForwardError>,
    },
}

/// Reasons the inbound datagram could not be turned into a single DNS question.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("malformed DNS message: {0}")]
    Malformed(#[from] hickory_proto::error::ProtoError),

    #[error("not a standard query")]
    NotAQuery,

    #[error("query has no question")]
    NoQuestion,
}

pub type ForwardResult<T> = Result<T, ForwardError>;
