//! JSOC export service client
//!
//! Speaks the `jsoc_info` / `jsoc_fetch` JSON endpoints:
//! - `op=rs_summary` counts records in a record set
//! - `op=exp_request` submits an export and returns a request id
//! - `op=exp_status` re-reads a request's status (the nudge)

use crate::error::{NudgeError, TransportError};
use crate::models::{Job, JobStatus, RecordQuery, ResultSet};
use crate::types::StagingClient;
use hmis_common::config::JsocConfig;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("hmis-stage/", env!("CARGO_PKG_VERSION"));
const INFO_PATH: &str = "/cgi-bin/ajax/jsoc_info";
const FETCH_PATH: &str = "/cgi-bin/ajax/jsoc_fetch";

/// `jsoc_info?op=rs_summary` response
#[derive(Debug, Deserialize)]
struct RecordSummary {
    status: i64,
    count: Option<u64>,
    error: Option<String>,
}

/// `jsoc_fetch` exp_request / exp_status response
#[derive(Debug, Deserialize)]
struct ExportResponse {
    status: i64,
    requestid: Option<String>,
    error: Option<String>,
}

/// HTTP client for the JSOC export system
pub struct JsocClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl JsocClient {
    pub fn new(config: &JsocConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = governor::RateLimiter::direct(governor::Quota::per_second(per_second));

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    /// Rate-limited GET returning the response body
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<String, TransportError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, ?params, "Querying JSOC");

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Http(status.as_u16(), error_text));
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    async fn export_status(&self, request_id: &str) -> Result<Job, TransportError> {
        let body = self
            .get(
                FETCH_PATH,
                &[("op", "exp_status"), ("requestid", request_id), ("format", "json")],
            )
            .await?;
        let mut job = parse_export(&body)?;
        if job.id.is_empty() {
            job.id = request_id.to_string();
        }
        Ok(job)
    }
}

#[async_trait::async_trait]
impl StagingClient for JsocClient {
    fn name(&self) -> &'static str {
        "JSOC"
    }

    async fn search(&self, query: &RecordQuery) -> Result<ResultSet, TransportError> {
        let record_set = query.record_set();
        let body = self
            .get(INFO_PATH, &[("op", "rs_summary"), ("ds", record_set.as_str())])
            .await?;
        let count = parse_summary(&body)?;

        debug!(record_set = %record_set, count, "Record set summarized");

        Ok(ResultSet {
            query: query.clone(),
            count,
        })
    }

    async fn submit(&self, results: &ResultSet) -> Result<Job, TransportError> {
        let record_set = results.query.record_set();
        let body = self
            .get(
                FETCH_PATH,
                &[
                    ("op", "exp_request"),
                    ("ds", record_set.as_str()),
                    ("notify", results.query.notify_address.as_str()),
                    ("method", "url"),
                    ("protocol", "FITS"),
                    ("format", "json"),
                    ("requestor", "none"),
                ],
            )
            .await?;
        let job = parse_export(&body)?;

        if job.id.is_empty() {
            return Err(TransportError::Parse(format!(
                "exp_request returned no request id (status {})",
                job.status.code()
            )));
        }

        Ok(job)
    }

    async fn nudge(&self, job: &Job, download_dir: &Path) -> Result<Job, NudgeError> {
        tokio::fs::create_dir_all(download_dir)
            .await
            .map_err(|source| NudgeError::DownloadDir {
                path: download_dir.to_path_buf(),
                source,
            })?;

        Ok(self.export_status(&job.id).await?)
    }
}

/// Record count from an `rs_summary` body
fn parse_summary(body: &str) -> Result<u64, TransportError> {
    let summary: RecordSummary =
        serde_json::from_str(body).map_err(|e| TransportError::Parse(e.to_string()))?;

    if summary.status != 0 {
        return Err(TransportError::Service {
            status: summary.status,
            message: summary.error.unwrap_or_default(),
        });
    }

    summary
        .count
        .ok_or_else(|| TransportError::Parse("rs_summary response has no count".to_string()))
}

/// Job from an `exp_request` / `exp_status` body
///
/// Export status codes are job states, not transport failures, so any code
/// is accepted here and left to the retry policy.
fn parse_export(body: &str) -> Result<Job, TransportError> {
    let response: ExportResponse =
        serde_json::from_str(body).map_err(|e| TransportError::Parse(e.to_string()))?;

    if let Some(error) = response.error.as_deref().filter(|e| !e.is_empty()) {
        debug!(status = response.status, error, "Export response carries error text");
    }

    Ok(Job::new(
        response.requestid.unwrap_or_default(),
        JobStatus::from_code(response.status),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = JsocClient::new(&JsocConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "http://jsoc.stanford.edu");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = JsocConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..JsocConfig::default()
        };
        assert_eq!(JsocClient::new(&config).unwrap().base_url, "http://localhost:8080");
    }

    #[test]
    fn test_parse_summary() {
        assert_eq!(parse_summary(r#"{"count": 3000, "status": 0}"#).unwrap(), 3000);
    }

    #[test]
    fn test_parse_summary_service_error() {
        let result = parse_summary(r#"{"status": 1, "error": "bad series"}"#);
        assert!(matches!(result, Err(TransportError::Service { status: 1, .. })));
    }

    #[test]
    fn test_parse_summary_malformed() {
        assert!(matches!(parse_summary("<html>"), Err(TransportError::Parse(_))));
        assert!(matches!(parse_summary(r#"{"status": 0}"#), Err(TransportError::Parse(_))));
    }

    #[test]
    fn test_parse_export() {
        let job = parse_export(r#"{"status": 2, "requestid": "JSOC_20130801_123"}"#).unwrap();
        assert_eq!(job, Job::new("JSOC_20130801_123", JobStatus::NeedsNudge));
    }

    #[test]
    fn test_parse_export_keeps_failure_statuses() {
        let job = parse_export(
            r#"{"status": 4, "requestid": "JSOC_20130801_9", "error": "staging failed"}"#,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::FailedRetryStage);
    }

    #[test]
    fn test_parse_export_without_id() {
        let job = parse_export(r#"{"status": 6}"#).unwrap();
        assert!(job.id.is_empty());
        assert_eq!(job.status, JobStatus::FailedRetryNudge);
    }
}
