use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default HTTP method for HTTP probes
pub const DEFAULT_HTTP_METHOD: &str = "GET";

/// Probe protocol of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// ICMP echo request/reply
    Icmp,
    /// TCP connect
    Tcp,
    /// TCP connect and match the first bytes received
    #[serde(alias = "tcpRegexp")]
    TcpRegex,
    /// HTTP request with optional status allow-list
    Http,
    /// HTTP request, status allow-list and body match
    #[serde(alias = "httpRegexp")]
    HttpRegex,
    /// Anything else; always probes dead
    #[serde(other)]
    Unknown,
}

impl Protocol {
    /// Returns true if the protocol inspects response content
    #[must_use]
    pub const fn matches_content(self) -> bool {
        matches!(self, Self::TcpRegex | Self::HttpRegex)
    }

    /// Protocol name as written in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Icmp => "icmp",
            Self::Tcp => "tcp",
            Self::TcpRegex => "tcp-regex",
            Self::Http => "http",
            Self::HttpRegex => "http-regex",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compilation flags for content patterns.
///
/// Part of the regex cache key together with the pattern text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexFlags {
    /// `(?i)`
    pub case_insensitive: bool,
    /// `(?m)`: `^` and `$` match at line boundaries
    pub multi_line: bool,
    /// `(?s)`: `.` matches `\n`
    pub dot_matches_new_line: bool,
}

impl RegexFlags {
    /// No flags set
    pub const NONE: Self = Self {
        case_insensitive: false,
        multi_line: false,
        dot_matches_new_line: false,
    };

    /// Case-insensitive matching only
    pub const CASE_INSENSITIVE: Self = Self {
        case_insensitive: true,
        multi_line: false,
        dot_matches_new_line: false,
    };

    /// Bit representation, stable across runs
    #[must_use]
    pub const fn bits(self) -> u8 {
        (self.case_insensitive as u8)
            | ((self.multi_line as u8) << 1)
            | ((self.dot_matches_new_line as u8) << 2)
    }
}

/// Static probe configuration of one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Name used as `%(name)` in the owning record's rule
    pub name: String,
    /// Probe protocol
    pub protocol: Protocol,
    /// Host, `host:port` or URL depending on the protocol
    pub dest: String,
    /// HTTP method
    pub http_method: String,
    /// Accepted HTTP status codes (patterns); empty accepts any status
    pub http_status: Vec<String>,
    /// Pattern that must match the response content
    pub regex: Option<String>,
    /// Pattern compilation flags
    pub regex_flags: RegexFlags,
    /// Maximum response bytes to inspect; protocol default when `None`
    pub res_size: Option<usize>,
    /// Additional attempts after the first
    pub retry: u32,
    /// Pause between failed attempts
    pub retry_wait: Duration,
    /// Deadline of a single attempt
    pub timeout: Duration,
    /// Accept invalid TLS certificates (HTTPS only)
    pub tls_skip_verify: bool,
}

impl TargetSpec {
    /// Create a target with default retry and timeout settings
    #[must_use]
    pub fn new(name: impl Into<String>, protocol: Protocol, dest: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol,
            dest: dest.into(),
            http_method: DEFAULT_HTTP_METHOD.to_string(),
            http_status: Vec::new(),
            regex: None,
            regex_flags: RegexFlags::NONE,
            res_size: None,
            retry: 0,
            retry_wait: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            tls_skip_verify: false,
        }
    }

    /// Set the number of retries
    #[must_use]
    pub const fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Set the pause between failed attempts
    #[must_use]
    pub const fn retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the HTTP method
    #[must_use]
    pub fn http_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = method.into();
        self
    }

    /// Set the accepted HTTP status codes
    #[must_use]
    pub fn http_status<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.http_status = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the content pattern
    #[must_use]
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    /// Set the content pattern flags
    #[must_use]
    pub const fn regex_flags(mut self, flags: RegexFlags) -> Self {
        self.regex_flags = flags;
        self
    }

    /// Set the maximum response size inspected
    #[must_use]
    pub const fn res_size(mut self, size: usize) -> Self {
        self.res_size = Some(size);
        self
    }

    /// Accept invalid TLS certificates
    #[must_use]
    pub const fn tls_skip_verify(mut self, skip: bool) -> Self {
        self.tls_skip_verify = skip;
        self
    }

    /// Response bytes to inspect, falling back to `default`
    #[must_use]
    pub fn response_limit(&self, default: usize) -> usize {
        match self.res_size {
            Some(0) | None => default,
            Some(size) => size,
        }
    }

    /// Upper bound on the time a full probe of this target can take:
    /// `(retry + 1) * timeout + retry * retry_wait`
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let attempts = self.retry.saturating_add(1);
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(self.retry_wait.saturating_mul(self.retry))
    }
}

/// A probed target and its latest result.
///
/// The alive flag is written only by the probe cycle of the owning record
/// and read by its rule evaluation.
#[derive(Debug)]
pub struct Target {
    spec: TargetSpec,
    alive: AtomicBool,
}

impl Target {
    /// Create a target that starts dead
    #[must_use]
    pub const fn new(spec: TargetSpec) -> Self {
        Self {
            spec,
            alive: AtomicBool::new(false),
        }
    }

    /// Probe configuration
    #[must_use]
    pub const fn spec(&self) -> &TargetSpec {
        &self.spec
    }

    /// Target name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Result of the most recently completed probe
    #[must_use]
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Store a probe result
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }
}
