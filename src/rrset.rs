// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record data helpers shared by the update and transfer paths.

use crate::constants::{RR_TYPE_DNAME, RR_TYPE_MAILA, RR_TYPE_MAILB, RR_TYPE_NXT};
use hickory_proto::rr::rdata::TXT;
use hickory_proto::rr::{RData, RecordType};

/// Types for which a name can hold at most one value.
#[must_use]
pub fn is_singleton(record_type: RecordType) -> bool {
    matches!(
        record_type,
        RecordType::SOA | RecordType::CNAME | RecordType::NSEC
    ) || matches!(u16::from(record_type), RR_TYPE_DNAME | RR_TYPE_NXT)
}

/// Types that may never appear in an update section in any class.
#[must_use]
pub fn is_transfer_or_mailbox_type(record_type: RecordType) -> bool {
    matches!(record_type, RecordType::AXFR | RecordType::IXFR)
        || matches!(u16::from(record_type), RR_TYPE_MAILA | RR_TYPE_MAILB)
}

/// Meta and query-only types, which cannot be added as data.
#[must_use]
pub fn is_meta_type(record_type: RecordType) -> bool {
    record_type == RecordType::ANY || is_transfer_or_mailbox_type(record_type)
}

/// Presentation format of `rdata`, as the provider stores it.
#[must_use]
pub fn rdata_to_text(rdata: &RData) -> String {
    match rdata {
        RData::TXT(txt) => txt_to_text(txt),
        other => other.to_string(),
    }
}

/// Quote every character-string of a TXT record, escaping `"` and `\`.
fn txt_to_text(txt: &TXT) -> String {
    txt.txt_data()
        .iter()
        .map(|chunk| {
            let mut quoted = String::with_capacity(chunk.len() + 2);
            quoted.push('"');
            for ch in String::from_utf8_lossy(chunk).chars() {
                if ch == '"' || ch == '\\' {
                    quoted.push('\\');
                }
                quoted.push(ch);
            }
            quoted.push('"');
            quoted
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serial number field of an SOA value in presentation format.
#[must_use]
pub fn soa_serial(value: &str) -> Option<u32> {
    value.split_whitespace().nth(2)?.parse().ok()
}

#[cfg(test)]
#[path = "rrset_tests.rs"]
mod rrset_tests;
