//! Synthetic answers for blocked names.
//!
//! A blocked name resolves to an unroutable address instead of NXDOMAIN, so
//! clients do not negative-cache and retry, and enforcement stays silent.

use hickory_proto::error::ProtoResult;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};

/// TTL on sinkhole records (5 min).
pub const SINKHOLE_TTL: u32 = 300;

/// Build the reply for a blocked query: same id, opcode, RD and CD bits and
/// question; one answer mapping the queried name to `sinkhole_v4` (or `::`
/// for AAAA).
pub fn build_sinkhole_response(request: &Message, sinkhole_v4: Ipv4Addr) -> ProtoResult<Vec<u8>> {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_authoritative(true);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.set_checking_disabled(request.checking_disabled());
    response.set_response_code(ResponseCode::NoError);

    for query in request.queries() {
        response.add_query(query.clone());
    }

    if let Some(query) = request.queries().first() {
        let (record_type, rdata) = match query.query_type() {
            RecordType::AAAA => (RecordType::AAAA, RData::AAAA(AAAA(Ipv6Addr::UNSPECIFIED))),
            _ => (RecordType::A, RData::A(A(sinkhole_v4))),
        };
        let mut record = Record::new();
        record.set_name(query.name().clone());
        record.set_record_type(record_type);
        record.set_ttl(SINKHOLE_TTL);
        record.set_data(Some(rdata));
        response.add_answer(record);
    }

    response.to_vec()
}
