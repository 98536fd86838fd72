use crate::error_code::ErrorClass;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for validation and configuration failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "request.messages", "config.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "request_validator", "client_builder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the generation runtime.
///
/// Every variant maps to one [`ErrorClass`] through [`Error::class`]; the
/// `Display` output always names that class so an exhausted call can be
/// rethrown verbatim and still read well.
#[derive(Debug, Error)]
pub enum Error {
    #[error("timeout: no terminal frame within {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("cancelled: operation cancelled by caller")]
    Cancelled,

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("transport: I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol: {message}")]
    Protocol { message: String },

    #[error("{class}: HTTP {status}: {message}")]
    Remote {
        status: u16,
        class: ErrorClass,
        message: String,
    },

    #[error("cache: {message}")]
    Cache { message: String },

    #[error("invalid_request: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("configuration: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("callback: {message}")]
    Callback { message: String },
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol {
            message: msg.into(),
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Error::Cache {
            message: msg.into(),
        }
    }

    /// A chunk handler can return this to stop a generation; it is never retried.
    pub fn callback(msg: impl Into<String>) -> Self {
        Error::Callback {
            message: msg.into(),
        }
    }

    /// Build a remote error, classifying it from the HTTP status.
    pub fn remote(status: u16, msg: impl Into<String>) -> Self {
        Error::Remote {
            status,
            class: ErrorClass::from_http_status(status),
            message: msg.into(),
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Timeout { .. } => ErrorClass::Timeout,
            Error::Cancelled => ErrorClass::Cancelled,
            Error::Transport(_) | Error::Io(_) => ErrorClass::Transport,
            Error::Protocol { .. } => ErrorClass::Protocol,
            Error::Remote { class, .. } => *class,
            Error::Cache { .. } => ErrorClass::Cache,
            Error::Validation { .. } => ErrorClass::InvalidRequest,
            Error::Configuration { .. } => ErrorClass::Configuration,
            Error::Callback { .. } => ErrorClass::Callback,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().retryable()
    }

    /// HTTP status of a remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }
}
