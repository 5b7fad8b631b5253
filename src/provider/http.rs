// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP/JSON provider client.
//!
//! Speaks a Route 53-shaped REST API:
//!
//! | Operation | Request |
//! |---|---|
//! | read record set | `GET {endpoint}/hostedzone/{id}/rrset?name=&type=&maxitems=1` |
//! | submit batch | `POST {endpoint}/hostedzone/{id}/rrset` |
//! | change status | `GET {endpoint}/change/{id}` |
//!
//! The list endpoint returns record sets starting at (`name`, `type`), so the
//! first entry is only a hit if its owner and type match exactly.

use super::{same_owner, Change, ChangeAction, ChangeInfo, DnsProvider, ResourceRecordSet};
use crate::config::ProviderConfig;
use crate::constants::{CHANGE_BATCH_COMMENT, CHANGE_ID_PREFIX};
use crate::dns_errors::ProviderError;
use crate::metrics::record_provider_call;
use hickory_proto::rr::RecordType;
use reqwest::{Client as HttpClient, Method};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, error};
use url::Url;

/// Prefix some providers put in front of zone identifiers.
const HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecordSetBody {
    name: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    #[serde(default)]
    resource_records: Vec<ResourceRecordBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecordBody {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListRecordSetsResponse {
    #[serde(default)]
    resource_record_sets: Vec<ResourceRecordSetBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeBatchRequest {
    change_batch: ChangeBatchBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeBatchBody {
    comment: String,
    changes: Vec<ChangeBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeBody {
    action: ChangeAction,
    resource_record_set: ResourceRecordSetBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeInfoResponse {
    change_info: ChangeInfoBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeInfoBody {
    id: String,
    status: String,
    #[serde(default)]
    submitted_at: Option<String>,
}

impl From<&ResourceRecordSet> for ResourceRecordSetBody {
    fn from(rrset: &ResourceRecordSet) -> Self {
        Self {
            name: rrset.name.clone(),
            record_type: rrset.record_type.to_string(),
            ttl: Some(rrset.ttl),
            resource_records: rrset
                .values
                .iter()
                .map(|value| ResourceRecordBody {
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

impl From<ChangeInfoBody> for ChangeInfo {
    fn from(body: ChangeInfoBody) -> Self {
        let id = body
            .id
            .strip_prefix(CHANGE_ID_PREFIX)
            .unwrap_or(&body.id)
            .to_string();
        Self {
            id,
            status: body.status,
        }
    }
}

/// Provider client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: HttpClient,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpProvider {
    /// Build a client from the `provider` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a URL or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        Url::parse(&config.endpoint)?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        let raw = format!("{}{path}", self.endpoint);
        Url::parse(&raw).map_err(|e| ProviderError::InvalidResponse {
            endpoint: raw.clone(),
            reason: format!("cannot build request URL: {e}"),
        })
    }

    fn rrset_url(&self, zone_id: &str) -> Result<Url, ProviderError> {
        let zone_id = zone_id.strip_prefix(HOSTED_ZONE_PREFIX).unwrap_or(zone_id);
        self.url(&format!("/hostedzone/{zone_id}/rrset"))
    }

    /// Execute one request and return the response body.
    async fn request<T: Serialize + std::fmt::Debug>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Option<&T>,
    ) -> Result<String, ProviderError> {
        debug!(
            operation = operation,
            method = %method,
            url = %url,
            body = ?body,
            auth_enabled = self.token.is_some(),
            "HTTP API request to provider"
        );

        let endpoint = url.to_string();
        let mut request = self.client.request(method.clone(), url);
        if let Some(body_data) = body {
            request = request.json(body_data);
        }
        if let Some(token_value) = &self.token {
            request = request.header("Authorization", format!("Bearer {token_value}"));
        }

        let start = Instant::now();
        let result = request.send().await;
        record_provider_call(operation, start.elapsed());

        let response = result.map_err(|e| {
            if e.is_timeout() {
                ProviderError::HttpRequestTimeout {
                    endpoint: endpoint.clone(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                ProviderError::HttpConnectionFailed {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                operation = operation,
                method = %method,
                url = %endpoint,
                status = %status,
                error = %error_text,
                "HTTP API request failed"
            );
            return Err(ProviderError::UnexpectedHttpResponse {
                endpoint,
                status_code: status.as_u16(),
                reason: error_text,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: format!("failed to read response body: {e}"),
            })?;

        debug!(
            operation = operation,
            url = %endpoint,
            status = %status,
            response_len = text.len(),
            "HTTP API request successful"
        );
        Ok(text)
    }

    fn parse_body<R: for<'de> Deserialize<'de>>(
        endpoint: &str,
        text: &str,
    ) -> Result<R, ProviderError> {
        serde_json::from_str(text).map_err(|e| ProviderError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl DnsProvider for HttpProvider {
    async fn get_rrset(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ResourceRecordSet>, ProviderError> {
        let mut url = self.rrset_url(zone_id)?;
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("type", &record_type.to_string())
            .append_pair("maxitems", "1");
        let endpoint = url.to_string();

        let text = self
            .request("get_rrset", Method::GET, url, None::<&()>)
            .await?;
        let listing: ListRecordSetsResponse = Self::parse_body(&endpoint, &text)?;

        let Some(first) = listing.resource_record_sets.into_iter().next() else {
            return Ok(None);
        };
        let wanted_type = record_type.to_string();
        if !same_owner(&first.name, name) || !first.record_type.eq_ignore_ascii_case(&wanted_type) {
            return Ok(None);
        }

        let invalid = |reason: &str| ProviderError::InvalidRecordData {
            name: first.name.clone(),
            record_type: first.record_type.clone(),
            reason: reason.to_string(),
        };
        let parsed_type = RecordType::from_str(&first.record_type)
            .map_err(|e| invalid(&format!("unknown record type: {e}")))?;
        let ttl = first
            .ttl
            .ok_or_else(|| invalid("record set has no TTL (alias records are not supported)"))?;

        let mut values: Vec<String> = Vec::with_capacity(first.resource_records.len());
        for record in &first.resource_records {
            if !values.contains(&record.value) {
                values.push(record.value.clone());
            }
        }

        Ok(Some(ResourceRecordSet {
            name: first.name.clone(),
            record_type: parsed_type,
            ttl,
            values,
        }))
    }

    async fn submit(&self, zone_id: &str, changes: &[Change]) -> Result<ChangeInfo, ProviderError> {
        let url = self.rrset_url(zone_id)?;
        let endpoint = url.to_string();
        let body = ChangeBatchRequest {
            change_batch: ChangeBatchBody {
                comment: CHANGE_BATCH_COMMENT.to_string(),
                changes: changes
                    .iter()
                    .map(|change| ChangeBody {
                        action: change.action,
                        resource_record_set: ResourceRecordSetBody::from(&change.rrset),
                    })
                    .collect(),
            },
        };

        let text = self.request("submit", Method::POST, url, Some(&body)).await?;
        let response: ChangeInfoResponse = Self::parse_body(&endpoint, &text)?;
        debug!(
            change_id = %response.change_info.id,
            submitted_at = ?response.change_info.submitted_at,
            "Change batch accepted"
        );
        Ok(response.change_info.into())
    }

    async fn change_status(&self, change_id: &str) -> Result<ChangeInfo, ProviderError> {
        let change_id = change_id.strip_prefix(CHANGE_ID_PREFIX).unwrap_or(change_id);
        let url = self.url(&format!("/change/{change_id}"))?;
        let endpoint = url.to_string();

        let text = self
            .request("change_status", Method::GET, url, None::<&()>)
            .await?;
        let response: ChangeInfoResponse = Self::parse_body(&endpoint, &text)?;
        Ok(response.change_info.into())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
