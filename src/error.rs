//! Error types for vllm-chat.
//!
//! Errors fall into four families: configuration problems (bad URL or
//! arguments), transport failures (connect, timeout, broken stream), server
//! errors (non-2xx with a message), and protocol errors (a 2xx response that
//! does not decode).  Context-length overflow is a server error recognized by
//! [`Error::is_context_overflow`].

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// Substrings that mark a server error as a context-length overflow.
pub const CONTEXT_OVERFLOW_MARKERS: [&str; 2] = ["maximum context length", "reduce the length"];

/// The main error type for vllm-chat.
#[derive(Clone, Debug)]
pub enum Error {
    /// Invalid command-line input or configuration.
    Config {
        /// Human-readable error message.
        message: String,
        /// Option or argument that caused the error.
        param: Option<String>,
    },

    /// A URL could not be parsed or normalized.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// Connection error.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The request timed out.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// Any other failure inside the HTTP client.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The byte stream broke while a streamed reply was being read.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The server answered with a non-success status.
    Server {
        /// HTTP status code.
        status_code: u16,
        /// Error type string from the server, if any.
        error_type: Option<String>,
        /// Error message from the body, or the raw body.
        message: String,
        /// Whether `message` came from a JSON error body.
        structured: bool,
    },

    /// A success response that could not be decoded.
    Protocol {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Encoding/decoding error.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },
}

impl Error {
    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Config {
            message: message.into(),
            param,
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new server error.
    pub fn server(
        status_code: u16,
        error_type: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Server {
            status_code,
            error_type,
            message: message.into(),
            structured: true,
        }
    }

    /// Creates a server error from a body that carried no JSON error message.
    pub fn server_unstructured(status_code: u16, body: impl Into<String>) -> Self {
        Error::Server {
            status_code,
            error_type: None,
            message: body.into(),
            structured: false,
        }
    }

    /// Creates a new protocol error.
    pub fn protocol(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Protocol {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Returns true if this error stems from bad configuration or arguments.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::Url { .. })
    }

    /// Returns true if this error happened below HTTP: connect, timeout, broken stream.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. }
                | Error::Timeout { .. }
                | Error::HttpClient { .. }
                | Error::Streaming { .. }
        )
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if the server answered with a non-success status.
    pub fn is_server(&self) -> bool {
        matches!(self, Error::Server { .. })
    }

    /// Returns true if a success response could not be decoded.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol { .. } | Error::Encoding { .. })
    }

    /// Returns true if the server rejected the request because the prompt
    /// does not fit in the model's context window.
    ///
    /// Only messages read from a JSON error body count.
    pub fn is_context_overflow(&self) -> bool {
        match self {
            Error::Server {
                message,
                structured: true,
                ..
            } => CONTEXT_OVERFLOW_MARKERS
                .iter()
                .any(|marker| message.contains(marker)),
            _ => false,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Server { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config { message, param } => {
                if let Some(param) = param {
                    write!(f, "Configuration error: {message} (parameter: {param})")
                } else {
                    write!(f, "Configuration error: {message}")
                }
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::Server {
                status_code,
                error_type,
                message,
                ..
            } => {
                if let Some(error_type) = error_type {
                    write!(f, "{status_code} {error_type}: {message}")
                } else {
                    write!(f, "{status_code} - {message}")
                }
            }
            Error::Protocol { message, .. } => {
                write!(f, "Error parsing response: {message}")
            }
            Error::Encoding { message, .. } => {
                write!(f, "Encoding error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::Connection { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Protocol { source, .. }
            | Error::Encoding { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::protocol(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for vllm-chat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_overflow_detection() {
        let err = Error::server(
            400,
            Some("BadRequestError".to_string()),
            "This model's maximum context length is 4096 tokens. However, you requested 5000 tokens.",
        );
        assert!(err.is_context_overflow());

        let err = Error::server(400, None, "Please reduce the length of the messages.");
        assert!(err.is_context_overflow());

        let err = Error::server(400, None, "temperature must be non-negative");
        assert!(!err.is_context_overflow());

        let err = Error::connection("maximum context length", None);
        assert!(!err.is_context_overflow());

        let err = Error::server_unstructured(400, "maximum context length exceeded");
        assert!(err.is_server());
        assert!(!err.is_context_overflow());
        assert_eq!(err.to_string(), "400 - maximum context length exceeded");
    }

    #[test]
    fn classification() {
        assert!(Error::config("bad", None).is_config());
        assert!(Error::url("bad", None).is_config());
        assert!(Error::timeout("slow", Some(60.0)).is_transport());
        assert!(Error::connection("refused", None).is_transport());
        assert!(Error::streaming("reset", None).is_transport());
        assert!(Error::protocol("missing choices", None).is_protocol());
        assert!(Error::server(503, None, "busy").is_server());
        assert_eq!(Error::server(503, None, "busy").status_code(), Some(503));
        assert_eq!(Error::timeout("slow", None).status_code(), None);
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            Error::server(500, None, "boom").to_string(),
            "500 - boom"
        );
        assert_eq!(
            Error::server(400, Some("BadRequestError".to_string()), "nope").to_string(),
            "400 BadRequestError: nope"
        );
        assert_eq!(
            Error::config("no prompt", Some("prompt".to_string())).to_string(),
            "Configuration error: no prompt (parameter: prompt)"
        );
    }

    #[test]
    fn from_serde_json_is_protocol() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.is_protocol());
    }
}
