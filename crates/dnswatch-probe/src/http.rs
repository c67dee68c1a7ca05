//! HTTP probe with status allow-list and optional body match.

use async_trait::async_trait;
use dnswatch_core::{RegexFlags, TargetSpec};
use reqwest::{Client as HttpClient, Method};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::error::{ProbeError, ProbeResult};
use crate::prober::{Prober, Verdict};
use crate::regex_cache::RegexCache;

/// Body bytes inspected by `http-regex` when the target sets no `res_size`
pub const DEFAULT_HTTP_RES_SIZE: usize = 2048;

/// Prober for `http` and `http-regex` targets.
///
/// `dest` is an `http://` or `https://` URL. Status allow-list entries are
/// patterns matched against the whole three-digit code.
#[derive(Debug, Clone)]
pub struct HttpProber {
    http: HttpClient,
    insecure: HttpClient,
    regex: Arc<RegexCache>,
}

impl HttpProber {
    /// Create a prober compiling patterns through `regex`
    pub fn new(regex: Arc<RegexCache>) -> ProbeResult<Self> {
        let user_agent = format!("dnswatch/{}", env!("CARGO_PKG_VERSION"));
        let http = HttpClient::builder().user_agent(&user_agent).build()?;
        let insecure = HttpClient::builder()
            .user_agent(&user_agent)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            http,
            insecure,
            regex,
        })
    }

    fn compile(&self, pattern: &str, flags: RegexFlags) -> ProbeResult<Arc<regex::bytes::Regex>> {
        self.regex
            .get(pattern, flags)
            .map_err(|source| ProbeError::Regex {
                pattern: pattern.to_string(),
                source,
            })
    }

    fn status_allowed(&self, spec: &TargetSpec, status: reqwest::StatusCode) -> ProbeResult<bool> {
        if spec.http_status.is_empty() {
            return Ok(true);
        }
        for entry in &spec.http_status {
            let anchored = format!("^(?:{})$", entry.trim());
            if self
                .compile(&anchored, RegexFlags::NONE)?
                .is_match(status.as_str().as_bytes())
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn request(&self, spec: &TargetSpec) -> ProbeResult<reqwest::RequestBuilder> {
        let url = Url::parse(&spec.dest).map_err(|e| ProbeError::InvalidDestination {
            dest: spec.dest.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProbeError::InvalidDestination {
                dest: spec.dest.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        let method = Method::from_bytes(spec.http_method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ProbeError::InvalidMethod(spec.http_method.clone()))?;
        let client = if spec.tls_skip_verify {
            &self.insecure
        } else {
            &self.http
        };
        Ok(client.request(method, url).timeout(spec.timeout))
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn attempt(&self, spec: &TargetSpec, deadline: Instant) -> ProbeResult<Verdict> {
        let pattern = if spec.protocol.matches_content() {
            let source = spec
                .regex
                .as_deref()
                .ok_or_else(|| ProbeError::MissingPattern(spec.name.clone()))?;
            Some(self.compile(source, spec.regex_flags)?)
        } else {
            None
        };
        let request = self.request(spec)?;

        let mut response = request.send().await?;
        let status = response.status();
        if !self.status_allowed(spec, status)? {
            return Ok(Verdict::Mismatch(format!("status {} not allowed", status.as_u16())));
        }
        let Some(pattern) = pattern else {
            return Ok(Verdict::Alive);
        };

        let limit = spec.response_limit(DEFAULT_HTTP_RES_SIZE);
        let mut body = Vec::with_capacity(limit.min(64 * 1024));
        while body.len() < limit {
            let chunk = match tokio::time::timeout_at(deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    return Err(ProbeError::Read {
                        dest: spec.dest.clone(),
                        reason: e.to_string(),
                    })
                }
                Err(_) if !body.is_empty() => break,
                Err(_) => return Err(ProbeError::Timeout(spec.timeout)),
            };
            let take = chunk.len().min(limit - body.len());
            body.extend_from_slice(&chunk[..take]);
        }

        if pattern.is_match(&body) {
            debug!(target_name = %spec.name, bytes = body.len(), "body matched");
            Ok(Verdict::Alive)
        } else {
            Ok(Verdict::Mismatch(format!(
                "pattern {:?} not found in {} body bytes",
                pattern.as_str(),
                body.len()
            )))
        }
    }
}
