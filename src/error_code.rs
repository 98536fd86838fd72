//! 错误分类：封闭的错误类别集合及其重试语义。
//!
//! Closed error classification for generation calls.
//!
//! Every [`crate::Error`] maps to exactly one [`ErrorClass`]. The class decides
//! retry eligibility; the retry layers never look at anything else.
//!
//! ## Error Classes
//!
//! | Code  | Name                  | Retryable |
//! |-------|-----------------------|-----------|
//! | E1001 | remote_client_error   | no        |
//! | E1002 | authentication        | no        |
//! | E1010 | invalid_request       | no        |
//! | E2002 | quota_exhausted       | no        |
//! | E3001 | server_error          | yes       |
//! | E3003 | timeout               | yes       |
//! | E3004 | transport             | yes       |
//! | E3005 | protocol              | no        |
//! | E4002 | cancelled             | no        |
//! | E4010 | configuration         | no        |
//! | E4011 | callback              | no        |
//! | E9001 | cache                 | no        |
//!
//! ## Example
//!
//! ```rust
//! use storyboard_runtime::error_code::ErrorClass;
//!
//! let class = ErrorClass::from_http_status(503);
//! assert_eq!(class.code(), "E3001");
//! assert!(class.retryable());
//! assert!(!ErrorClass::from_http_status(401).retryable());
//! ```

use std::fmt;

/// Classification of a failed generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// E3003: No terminal frame arrived before the wall-clock deadline
    Timeout,
    /// E4002: The caller's cancellation token fired
    Cancelled,
    /// E3004: Connection never established or dropped mid-exchange
    Transport,
    /// E3005: The reply body could not be understood
    Protocol,
    /// E1002: Remote rejected the credentials (401)
    RemoteAuth,
    /// E2002: Remote refused the call for permission or balance reasons (403)
    RemoteQuota,
    /// E3001: Remote failed on its side (5xx)
    RemoteServer,
    /// E1001: Any other 4xx
    RemoteClient,
    /// E1010: The request was rejected locally before any network attempt
    InvalidRequest,
    /// E4010: Client or cache configuration is unusable
    Configuration,
    /// E4011: The chunk handler refused a delta
    Callback,
    /// E9001: Cache read/write failure (never surfaced by generation calls)
    Cache,
}

impl ErrorClass {
    /// Returns the stable code string (e.g., `"E3001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RemoteClient => "E1001",
            Self::RemoteAuth => "E1002",
            Self::InvalidRequest => "E1010",
            Self::RemoteQuota => "E2002",
            Self::RemoteServer => "E3001",
            Self::Timeout => "E3003",
            Self::Transport => "E3004",
            Self::Protocol => "E3005",
            Self::Cancelled => "E4002",
            Self::Configuration => "E4010",
            Self::Callback => "E4011",
            Self::Cache => "E9001",
        }
    }

    /// Returns the snake case name (e.g., `"server_error"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::RemoteAuth => "authentication",
            Self::RemoteQuota => "quota_exhausted",
            Self::RemoteServer => "server_error",
            Self::RemoteClient => "remote_client_error",
            Self::InvalidRequest => "invalid_request",
            Self::Configuration => "configuration",
            Self::Callback => "callback",
            Self::Cache => "cache",
        }
    }

    /// Human-readable explanation suitable for surfacing to an end user.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Timeout => "request timed out: the generation service responded too slowly",
            Self::Cancelled => "operation cancelled by the user",
            Self::Transport => "network connection failed: check that the local service is running",
            Self::Protocol => "the generation service returned a reply in an unexpected format",
            Self::RemoteAuth => "authentication failed: check the API key setting",
            Self::RemoteQuota => "permission denied: the API key may be invalid or out of balance",
            Self::RemoteServer => "the generation service reported an internal error",
            Self::RemoteClient => "the generation service rejected the request",
            Self::InvalidRequest => "the request is invalid and was not sent",
            Self::Configuration => "the client configuration is invalid",
            Self::Callback => "the output handler stopped the generation",
            Self::Cache => "the result cache could not be used",
        }
    }

    /// Whether a failure of this class may succeed when attempted again.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport | Self::RemoteServer)
    }

    /// Maps a non-success HTTP status to its class.
    ///
    /// Statuses outside 4xx/5xx are not error replies the service is expected to
    /// send, so they classify as [`ErrorClass::Protocol`].
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::RemoteAuth,
            403 => Self::RemoteQuota,
            400..=499 => Self::RemoteClient,
            500..=599 => Self::RemoteServer,
            _ => Self::Protocol,
        }
    }

    /// Reverse lookup by [`ErrorClass::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        let class = match name {
            "timeout" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            "transport" => Self::Transport,
            "protocol" => Self::Protocol,
            "authentication" => Self::RemoteAuth,
            "quota_exhausted" => Self::RemoteQuota,
            "server_error" => Self::RemoteServer,
            "remote_client_error" => Self::RemoteClient,
            "invalid_request" => Self::InvalidRequest,
            "configuration" => Self::Configuration,
            "callback" => Self::Callback,
            "cache" => Self::Cache,
            _ => return None,
        };
        Some(class)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
