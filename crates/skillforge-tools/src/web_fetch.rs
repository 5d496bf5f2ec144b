//! Web fetch tool.
//!
//! Provides a `web_fetch` tool that retrieves content from a URL, guarded
//! by [`crate::url_safety::validate_url`] against SSRF.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::url_safety::{validate_url, UrlPolicy};
use crate::{LocalTool, ToolError};

/// Maximum response body size in bytes (1 MB).
const MAX_RESPONSE_BYTES: usize = 1_048_576;

/// Fetches content from a caller-supplied URL and returns it as text.
/// Enforces a maximum response size and runs every target through the
/// configured [`UrlPolicy`] before making the request.
pub struct WebFetchTool {
    client: reqwest::Client,
    policy: UrlPolicy,
}

impl WebFetchTool {
    pub fn new(policy: UrlPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            policy,
        }
    }
}

#[async_trait]
impl LocalTool for WebFetchTool {
    fn name(&self) -> &str {
        "fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL. Returns the response body as text (HTML, JSON, etc.)."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch content from"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST, etc.). Defaults to GET."
                },
                "headers": {
                    "type": "object",
                    "description": "Optional HTTP headers as key-value pairs"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("missing required field: url".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArgs(
                "url must start with http:// or https://".into(),
            ));
        }

        validate_url(url, &self.policy)
            .map_err(|e| ToolError::InvalidArgs(format!("blocked by URL policy: {e}")))?;

        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| ToolError::InvalidArgs(format!("invalid HTTP method: {method}")))?;

        let mut request = self.client.request(method, url);
        if let Some(headers) = args.get("headers").and_then(|v| v.as_object()) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key, value);
                }
            }
        }

        debug!(url = %url, "fetching web content");

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("fetch failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("read body failed: {e}")))?;

        let body = if bytes.len() > MAX_RESPONSE_BYTES {
            let truncated = String::from_utf8_lossy(&bytes[..MAX_RESPONSE_BYTES]);
            format!("{truncated}\n\n[... truncated at {MAX_RESPONSE_BYTES} bytes]")
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(json!({
            "status": status,
            "content_type": content_type,
            "body": body,
            "url": url,
            "bytes": bytes.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_tool() -> WebFetchTool {
        WebFetchTool::new(UrlPolicy::default())
    }

    #[test]
    fn name_is_fetch() {
        assert_eq!(make_tool().name(), "fetch");
    }

    #[test]
    fn parameters_has_url() {
        let params = make_tool().parameters();
        assert!(params["properties"]["url"].is_object());
        let required = params["required"].as_array().unwrap();
        assert!(required.contains(&json!("url")));
    }

    #[tokio::test]
    async fn missing_url_returns_error() {
        let err = make_tool().execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn invalid_url_scheme_returns_error() {
        let err = make_tool()
            .execute(json!({"url": "ftp://example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
        assert!(err.to_string().contains("http"));
    }

    #[tokio::test]
    async fn private_ip_target_rejected_by_policy() {
        let err = make_tool()
            .execute(json!({"url": "http://127.0.0.1/"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
        assert!(err.to_string().contains("blocked"));
    }
}
