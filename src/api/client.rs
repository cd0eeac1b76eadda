// file: src/api/client.rs
// description: batched metadata lookups against the external document service
// reference: https://docs.rs/reqwest

use crate::api::cache::LookupCache;
use crate::api::retry::RetryPolicy;
use crate::config::ApiConfig;
use crate::error::{PipelineError, Result};
use crate::models::{DocumentMetadata, LookupResult, MetadataStatus};
use crate::pipeline::CancellationFlag;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use uuid::Uuid;

/// Anything that can resolve lookup ids into found, expired and missing buckets.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn lookup(&self, ids: &BTreeSet<String>, cancel: &CancellationFlag) -> Result<LookupResult>;
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    #[serde(rename = "Lookup_ID")]
    lookup_ids: Vec<&'a str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    #[serde(rename = "Changes", default)]
    pub changes: Option<String>,
    #[serde(rename = "Results", default)]
    pub results: Vec<LookupRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupRecord {
    #[serde(rename = "Lookup_ID", default, deserialize_with = "optional_text")]
    pub lookup_id: Option<String>,
    #[serde(rename = "Document_ID", default, deserialize_with = "text")]
    pub document_id: String,
    #[serde(rename = "Content_ID", default, deserialize_with = "text")]
    pub content_id: String,
    #[serde(rename = "Title", default, deserialize_with = "text")]
    pub title: String,
    #[serde(rename = "Status", default, deserialize_with = "text")]
    pub status: String,
    #[serde(rename = "Author", default, deserialize_with = "optional_text")]
    pub author: Option<String>,
    #[serde(rename = "Last_Modified", default, deserialize_with = "optional_text")]
    pub last_modified: Option<String>,
}

impl LookupRecord {
    fn answers(&self, requested: &str) -> bool {
        self.lookup_id
            .as_deref()
            .is_some_and(|id| id.trim().eq_ignore_ascii_case(requested))
    }

    fn answers_by_fallback(&self, requested: &str) -> bool {
        (!self.document_id.is_empty() && self.document_id.trim().eq_ignore_ascii_case(requested))
            || (!self.content_id.is_empty() && self.content_id.trim() == requested)
    }

    fn to_metadata(&self, requested: &str) -> DocumentMetadata {
        DocumentMetadata {
            lookup_id: requested.to_string(),
            document_id: self.document_id.trim().to_string(),
            content_id: self.content_id.trim().to_string(),
            title: self.title.trim().to_string(),
            status: MetadataStatus::parse(&self.status),
            author: self.author.clone(),
            last_modified: self.last_modified.clone(),
        }
    }
}

/// Identifiers and content ids arrive as strings or bare numbers.
fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Buckets a response against the identifiers that were asked for. Records
/// are matched by `Lookup_ID`, then `Document_ID`, then `Content_ID`; every
/// requested id without a record is missing.
pub fn parse_response(requested: &BTreeSet<String>, response: &LookupResponse) -> LookupResult {
    let mut result = LookupResult::empty();

    for id in requested {
        let record = response
            .results
            .iter()
            .find(|record| record.answers(id))
            .or_else(|| response.results.iter().find(|record| record.answers_by_fallback(id)));

        match record {
            Some(record) => {
                let metadata = record.to_metadata(id);
                if metadata.status == MetadataStatus::Expired {
                    result.expired.push(metadata);
                } else {
                    result.found.push(metadata);
                }
            }
            None => result.missing.push(id.clone()),
        }
    }

    result
}

pub struct MetadataClient {
    client: reqwest::Client,
    config: ApiConfig,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    cache: Option<LookupCache>,
}

impl MetadataClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        let cache = (config.cache_ttl_secs > 0)
            .then(|| LookupCache::new(Duration::from_secs(config.cache_ttl_secs)));

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            retry: RetryPolicy::from_config(&config),
            cache,
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn request(&self, ids: &BTreeSet<String>) -> Result<LookupResponse> {
        let endpoint = self.config.endpoint.as_str();
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::communication(endpoint, "request permit pool closed"))?;

        let correlation_id = Uuid::new_v4().to_string();
        let body = LookupRequest {
            lookup_ids: ids.iter().map(String::as_str).collect(),
        };
        debug!(
            "Looking up {} ids at {} (correlation {})",
            ids.len(),
            endpoint,
            correlation_id
        );

        let mut request = self
            .client
            .post(endpoint)
            .header("X-Correlation-ID", &correlation_id)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out after {}s", self.config.timeout_secs)
            } else {
                format!("request failed: {}", e)
            };
            PipelineError::communication(endpoint, message)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            PipelineError::communication(endpoint, format!("failed to read response: {}", e))
        })?;

        if !status.is_success() {
            return Err(PipelineError::Communication {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                body: (!text.is_empty()).then_some(text),
                message: format!("unexpected status {}", status),
            });
        }

        serde_json::from_str(&text).map_err(|e| PipelineError::Communication {
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            body: Some(text.clone()),
            message: format!("malformed response: {}", e),
        })
    }

    async fn request_or_cancel(&self, ids: &BTreeSet<String>, cancel: &CancellationFlag) -> Result<LookupResponse> {
        tokio::select! {
            response = self.request(ids) => response,
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        }
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn lookup(&self, ids: &BTreeSet<String>, cancel: &CancellationFlag) -> Result<LookupResult> {
        let requested: BTreeSet<String> = ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if requested.is_empty() {
            return Ok(LookupResult::empty());
        }

        let (mut result, pending) = match &self.cache {
            Some(cache) => cache.partition(&requested).await,
            None => (LookupResult::empty(), requested),
        };

        if !pending.is_empty() {
            let response = self
                .retry
                .run(cancel, || self.request_or_cancel(&pending, cancel))
                .await?;
            let fetched = parse_response(&pending, &response);
            if let Some(cache) = &self.cache {
                cache.store(&fetched).await;
            }
            result.merge(fetched);
        }

        info!(
            "Metadata lookup: {} found, {} expired, {} missing",
            result.found.len(),
            result.expired.len(),
            result.missing.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn api_config(endpoint: String) -> ApiConfig {
        let mut config = Config::default_config().api;
        config.endpoint = endpoint;
        config.retry_delay_ms = 1;
        config.timeout_secs = 5;
        config.cache_ttl_secs = 0;
        config
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    /// Answers one connection per canned response and returns the raw requests.
    async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            requests
        });

        (format!("http://{}/lookup", address), handle)
    }

    #[test]
    fn test_parse_response_buckets() {
        let response: LookupResponse = serde_json::from_str(
            r#"{
                "Version": "1.2",
                "Changes": "",
                "Results": [
                    {"Lookup_ID": "tsrc-prod-123456", "Document_ID": "DOC-1", "Content_ID": 12345, "Title": "Travel Policy", "Status": "Released"},
                    {"Lookup_ID": "CMS-HR-000001", "Document_ID": "DOC-2", "Content_ID": "654321", "Title": "Old Policy", "Status": "EXPIRED"},
                    {"Document_ID": "doc-411364-329", "Content_ID": "111111", "Title": "By document id", "Status": "Draft"}
                ]
            }"#,
        )
        .unwrap();

        let requested = ids(&["TSRC-PROD-123456", "CMS-HR-000001", "doc-411364-329", "TSRC-GONE-999999"]);
        let result = parse_response(&requested, &response);

        assert_eq!(result.found.len(), 2);
        assert_eq!(result.expired.len(), 1);
        assert_eq!(result.missing, vec!["TSRC-GONE-999999".to_string()]);

        let travel = result.find_found("TSRC-PROD-123456").unwrap();
        assert_eq!(travel.content_id, "12345");
        assert_eq!(travel.document_id, "DOC-1");

        let unknown = result.find_found("doc-411364-329").unwrap();
        assert_eq!(unknown.status, MetadataStatus::Unknown);
        assert_eq!(result.find_expired("CMS-HR-000001").unwrap().title, "Old Policy");
    }

    #[test]
    fn test_parse_response_without_results_marks_all_missing() {
        let response: LookupResponse = serde_json::from_str(r#"{"Version": "1"}"#).unwrap();
        let result = parse_response(&ids(&["TSRC-A-000001", "TSRC-B-000002"]), &response);
        assert!(result.found.is_empty());
        assert_eq!(result.missing.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_set_short_circuits() {
        let client = MetadataClient::new(api_config("http://127.0.0.1:9/unused".to_string())).unwrap();
        let result = client
            .lookup(&BTreeSet::new(), &CancellationFlag::new())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_posts_batched_request() {
        let body = r#"{"Version":"1","Changes":"","Results":[{"Lookup_ID":"TSRC-PROD-123456","Document_ID":"D1","Content_ID":"123456","Title":"Travel","Status":"Released"}]}"#;
        let (endpoint, server) = serve(vec![(200, body.to_string())]).await;
        let mut config = api_config(endpoint);
        config.api_key = Some("secret".to_string());
        let client = MetadataClient::new(config).unwrap();

        let result = client
            .lookup(&ids(&["TSRC-PROD-123456", "CMS-HR-000001"]), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(result.found.len(), 1);
        assert_eq!(result.missing, vec!["CMS-HR-000001".to_string()]);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = requests[0].to_ascii_lowercase();
        assert!(request.contains("x-correlation-id:"));
        assert!(request.contains("authorization: bearer secret"));
        assert!(requests[0].contains(r#""Lookup_ID":["CMS-HR-000001","TSRC-PROD-123456"]"#));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let ok = r#"{"Results":[]}"#.to_string();
        let (endpoint, server) =
            serve(vec![(503, "busy".to_string()), (200, ok)]).await;
        let client = MetadataClient::new(api_config(endpoint)).unwrap();

        let result = client
            .lookup(&ids(&["TSRC-A-000001"]), &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(result.missing.len(), 1);
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_carries_status_and_body() {
        let (endpoint, server) = serve(vec![(400, "bad lookup".to_string())]).await;
        let client = MetadataClient::new(api_config(endpoint.clone())).unwrap();

        let err = client
            .lookup(&ids(&["TSRC-A-000001"]), &CancellationFlag::new())
            .await
            .unwrap_err();

        match err {
            PipelineError::Communication {
                endpoint: reported,
                status,
                body,
                ..
            } => {
                assert_eq!(reported, endpoint);
                assert_eq!(status, Some(400));
                assert_eq!(body.as_deref(), Some("bad lookup"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_in_flight_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/lookup", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let client = MetadataClient::new(api_config(endpoint)).unwrap();
        let cancel = CancellationFlag::new();

        let trigger = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            }
        });
        let started = std::time::Instant::now();
        let err = client
            .lookup(&ids(&["TSRC-A-000001"]), &cancel)
            .await
            .unwrap_err();
        trigger.await.unwrap();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        server.abort();
    }

    #[tokio::test]
    async fn test_cache_avoids_second_request() {
        let body = r#"{"Results":[{"Lookup_ID":"TSRC-A-000001","Document_ID":"D1","Content_ID":"1","Title":"T","Status":"Released"}]}"#;
        let (endpoint, server) = serve(vec![(200, body.to_string())]).await;
        let mut config = api_config(endpoint);
        config.cache_ttl_secs = 60;
        let client = MetadataClient::new(config).unwrap();
        let cancel = CancellationFlag::new();

        let first = client.lookup(&ids(&["TSRC-A-000001"]), &cancel).await.unwrap();
        let second = client.lookup(&ids(&["TSRC-A-000001"]), &cancel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(server.await.unwrap().len(), 1);
    }
}
