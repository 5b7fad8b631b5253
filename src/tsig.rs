// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TSIG key management, request verification and response signing.
//!
//! Keys are bound to peer addresses. The [`KeyTable`] is built once from the
//! configuration at startup and is never mutated afterwards, so workers can
//! share it behind an `Arc` without locking.

use crate::constants::TSIG_FUDGE_TIME_SECS;
use crate::dns_errors::TsigError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_proto::error::{ProtoError, ProtoResult};
use hickory_proto::op::{Message, MessageFinalizer, MessageVerifier};
use hickory_proto::rr::dnssec::rdata::DNSSECRData;
use hickory_proto::rr::dnssec::tsig::TSigner;
use hickory_proto::rr::dnssec::rdata::tsig::{make_tsig_record, message_tbs, TsigAlgorithm, TSIG};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;

/// HMAC algorithms accepted in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TsigAlgorithmName {
    HmacMd5,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl TsigAlgorithmName {
    /// Name as written in configuration and BIND key files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HmacMd5 => "hmac-md5",
            Self::HmacSha1 => "hmac-sha1",
            Self::HmacSha224 => "hmac-sha224",
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha384 => "hmac-sha384",
            Self::HmacSha512 => "hmac-sha512",
        }
    }
}

/// TSIG key data for one peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsigKeyData {
    /// Key name, as it appears in the TSIG record owner
    pub name: String,
    /// HMAC algorithm
    pub algorithm: TsigAlgorithmName,
    /// Base64-encoded shared secret
    pub secret: String,
}

/// Create a TSIG signer from key data.
///
/// # Errors
///
/// Returns [`TsigError::InvalidTsigKeyData`] if the secret is not valid
/// base64, the key name is not a valid domain name, or the algorithm is not
/// supported by the crypto backend.
pub fn create_tsig_signer(key_data: &TsigKeyData) -> Result<TSigner, TsigError> {
    let invalid = |reason: String| TsigError::InvalidTsigKeyData {
        key_name: key_data.name.clone(),
        reason,
    };

    let algorithm = match key_data.algorithm {
        TsigAlgorithmName::HmacMd5 => TsigAlgorithm::HmacMd5,
        TsigAlgorithmName::HmacSha1 => TsigAlgorithm::HmacSha1,
        TsigAlgorithmName::HmacSha224 => TsigAlgorithm::HmacSha224,
        TsigAlgorithmName::HmacSha256 => TsigAlgorithm::HmacSha256,
        TsigAlgorithmName::HmacSha384 => TsigAlgorithm::HmacSha384,
        TsigAlgorithmName::HmacSha512 => TsigAlgorithm::HmacSha512,
    };

    let key_bytes = BASE64
        .decode(&key_data.secret)
        .map_err(|e| invalid(format!("secret is not valid base64: {e}")))?;

    let name = Name::from_str(&key_data.name)
        .map_err(|e| invalid(format!("invalid key name: {e}")))?;

    TSigner::new(
        key_bytes,
        algorithm,
        name,
        u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
    )
    .map_err(|e| invalid(format!("{} not usable: {e}", key_data.algorithm.as_str())))
}

/// Immutable peer address to TSIG signer table.
#[derive(Clone, Default)]
pub struct KeyTable {
    keys: HashMap<IpAddr, TSigner>,
}

impl KeyTable {
    /// Build the table from the `tsig` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error for the first entry whose address or key data is invalid.
    pub fn from_config(entries: &HashMap<String, TsigKeyData>) -> Result<Self, TsigError> {
        let mut keys = HashMap::with_capacity(entries.len());
        for (address, key_data) in entries {
            let peer = IpAddr::from_str(address.trim()).map_err(|e| {
                TsigError::InvalidTsigKeyData {
                    key_name: key_data.name.clone(),
                    reason: format!("peer address '{address}' is not an IP address: {e}"),
                }
            })?;
            keys.insert(peer, create_tsig_signer(key_data)?);
        }
        Ok(Self { keys })
    }

    /// Signer configured for `peer`, if any.
    #[must_use]
    pub fn get(&self, peer: IpAddr) -> Option<&TSigner> {
        self.keys.get(&peer)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for KeyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyTable")
            .field("peers", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// TSIG record carried by a decoded message, if any.
#[must_use]
pub fn message_tsig(message: &Message) -> Option<(&Name, &TSIG)> {
    message
        .signature()
        .iter()
        .filter(|record| record.record_type() == RecordType::TSIG)
        .find_map(|record| match record.data() {
            Some(RData::DNSSEC(DNSSECRData::TSIG(tsig))) => Some((record.name(), tsig)),
            _ => None,
        })
}

/// Current UNIX time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Verify the TSIG on a raw message against `signer`.
///
/// `previous_mac` is the request MAC when verifying a response, or the MAC
/// of the preceding message for later messages of a multi-message transfer
/// (`first_message == false`). Returns the message's MAC for chaining.
///
/// # Errors
///
/// Returns [`TsigError::UnknownKey`] when the key name differs from the
/// signer's, [`TsigError::BadSignature`] when the MAC does not verify and
/// [`TsigError::BadTime`] when the signing time is outside the fudge window.
pub fn verify_signed(
    signer: &TSigner,
    raw: &[u8],
    key_name: &Name,
    previous_mac: Option<&[u8]>,
    first_message: bool,
    peer: &str,
) -> Result<Vec<u8>, TsigError> {
    if key_name != signer.signer_name() {
        return Err(TsigError::UnknownKey {
            peer: peer.to_string(),
            key_name: key_name.to_string(),
        });
    }

    let (mac, valid_range, signed_at) = signer
        .verify_message_byte(previous_mac, raw, first_message)
        .map_err(|e| TsigError::BadSignature {
            peer: peer.to_string(),
            key_name: key_name.to_string(),
            reason: e.to_string(),
        })?;

    let now = unix_now();
    if !valid_range.contains(&now) {
        return Err(TsigError::BadTime {
            peer: peer.to_string(),
            signed_at,
            now,
        });
    }

    Ok(mac)
}

/// Signs a response with the key that signed the request, chaining the
/// request MAC into the digest (RFC 8945 section 5.3).
#[derive(Clone)]
pub struct ResponseSigner {
    signer: TSigner,
    request_mac: Vec<u8>,
}

impl ResponseSigner {
    #[must_use]
    pub fn new(signer: TSigner, request_mac: Vec<u8>) -> Self {
        Self {
            signer,
            request_mac,
        }
    }

    /// Bytes covered by the MAC: the request MAC with its length, then the
    /// message and the TSIG variables.
    ///
    /// The message is encoded on its own so name compression offsets match
    /// the wire form.
    fn to_be_signed(&self, message: &Message, pre_tsig: &TSIG) -> ProtoResult<Vec<u8>> {
        let mac_len = u16::try_from(self.request_mac.len())
            .map_err(|_| ProtoError::from("request MAC is too long"))?;
        let body = message_tbs(None, message, pre_tsig, self.signer.signer_name())?;

        let mut tbs = Vec::with_capacity(2 + self.request_mac.len() + body.len());
        tbs.extend_from_slice(&mac_len.to_be_bytes());
        tbs.extend_from_slice(&self.request_mac);
        tbs.extend_from_slice(&body);
        Ok(tbs)
    }
}

impl MessageFinalizer for ResponseSigner {
    fn finalize_message(
        &self,
        message: &Message,
        current_time: u32,
    ) -> ProtoResult<(Vec<Record>, Option<MessageVerifier>)> {
        let pre_tsig = TSIG::new(
            self.signer.algorithm().clone(),
            u64::from(current_time),
            self.signer.fudge(),
            Vec::new(),
            message.id(),
            0,
            Vec::new(),
        );
        let tbs = self.to_be_signed(message, &pre_tsig)?;
        let mac = self.signer.sign(&tbs)?;
        let record = make_tsig_record(self.signer.signer_name().clone(), pre_tsig.set_mac(mac));
        Ok((vec![record], None))
    }
}

/// Sign an outgoing response in place.
///
/// # Errors
///
/// Returns [`TsigError::SigningFailed`] if the HMAC cannot be computed.
pub fn sign_response(
    response: &mut Message,
    signer: &TSigner,
    request_mac: &[u8],
) -> Result<(), TsigError> {
    let now = u32::try_from(unix_now()).unwrap_or(u32::MAX);
    let finalizer = ResponseSigner::new(signer.clone(), request_mac.to_vec());
    response
        .finalize(&finalizer, now)
        .map_err(|e| TsigError::SigningFailed {
            key_name: signer.signer_name().to_string(),
            reason: e.to_string(),
        })?;
    Ok(())
}

#[cfg(test)]
#[path = "tsig_tests.rs"]
mod tsig_tests;
