//! HTTP probe tool: one outbound GET or POST, headers and body returned as text.
//!
//! The tool reaches arbitrary hosts unless a [`HostPolicy`] says otherwise;
//! the SSRF exercise depends on that.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::traits::required_str;
use super::Tool;
use crate::error::ToolError;

/// Allow/deny rules applied to the request host.
#[derive(Debug, Clone, Default)]
pub struct HostPolicy {
    /// If non-empty, only these hosts are reachable.
    pub allow: Vec<String>,
    /// Never reachable, even when allowed.
    pub deny: Vec<String>,
}

impl HostPolicy {
    pub fn permits(&self, host: &str) -> bool {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let matches = |list: &[String]| list.iter().any(|h| h.eq_ignore_ascii_case(host));
        if matches(&self.deny) {
            return false;
        }
        self.allow.is_empty() || matches(&self.allow)
    }
}

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

pub struct HttpProbe {
    client: reqwest::Client,
    policy: HostPolicy,
}

impl HttpProbe {
    /// A zero timeout leaves requests unbounded. Every redirect hop is
    /// checked against the same policy as the first request.
    pub fn new(timeout_secs: u64, policy: HostPolicy) -> Result<Self, ToolError> {
        let hop_policy = policy.clone();
        let redirects = reqwest::redirect::Policy::custom(move |attempt| {
            let host = attempt.url().host_str().unwrap_or_default().to_string();
            if !hop_policy.permits(&host) {
                attempt.error(ToolError::HostBlocked(host))
            } else if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error(format!("stopped after {} redirects", MAX_REDIRECTS))
            } else {
                attempt.follow()
            }
        });
        let mut builder = reqwest::Client::builder()
            .user_agent("vulnscout/0.1")
            .redirect(redirects);
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            policy,
        })
    }
}

#[async_trait]
impl Tool for HttpProbe {
    fn name(&self) -> &str {
        "http_tool"
    }

    fn description(&self) -> &str {
        "Useful for when you need to make a request to a url. Can be used for GET and POST requests."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "a url to make a request to"
                },
                "method": {
                    "type": "string",
                    "description": "the http method to use (GET or POST)",
                    "default": "GET"
                },
                "data": {
                    "type": "object",
                    "description": "the data to send with a POST request"
                }
            },
            "required": ["url"]
        })
    }

    fn primary_arg(&self) -> &str {
        "url"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let url = required_str(&args, "url")?;
        let method = args["method"].as_str().unwrap_or("GET").to_uppercase();

        let parsed = reqwest::Url::parse(url.trim())
            .map_err(|e| ToolError::InvalidInput(format!("invalid url '{}': {}", url, e)))?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        if !self.policy.permits(&host) {
            return Err(ToolError::HostBlocked(host));
        }

        let request = match method.as_str() {
            "GET" => self.client.get(parsed),
            "POST" => self.client.post(parsed).form(&form_fields(&args["data"])?),
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "unsupported method '{}', use GET or POST",
                    other
                )))
            }
        };

        debug!("HTTP probe: {} {}", method, url);
        let response = request.send().await.map_err(blocked_redirect)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes())))
            .collect::<Vec<_>>()
            .join("\n");
        let body = response.text().await?;

        Ok(format!(
            "Status: {}\nHeaders:\n{}\n\nBody:\n{}",
            status, headers, body
        ))
    }
}

/// Surface a redirect refused by the host policy as `HostBlocked`.
fn blocked_redirect(err: reqwest::Error) -> ToolError {
    if err.is_redirect() {
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            if let Some(ToolError::HostBlocked(host)) = inner.downcast_ref::<ToolError>() {
                return ToolError::HostBlocked(host.clone());
            }
            source = inner.source();
        }
    }
    ToolError::Http(err)
}

/// Flatten a JSON object into form fields; scalars are stringified.
fn form_fields(data: &Value) -> Result<Vec<(String, String)>, ToolError> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()),
        _ => Err(ToolError::InvalidInput(
            "'data' must be a JSON object".into(),
        )),
    }
}
