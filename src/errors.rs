use serde::Deserialize;
use std::fmt;

/// Twilio error code for "the requested resource was not found".
pub const TWILIO_NOT_FOUND: i64 = 20404;

/// Twilio error code returned when an alphanumeric sender ID is not
/// supported for the destination.
pub const TWILIO_ALPHA_SENDER_REJECTED: i64 = 21612;

/// Error body returned by every Twilio REST endpoint on a non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VendorError {
    /// HTTP status of the response (filled in from the transport, not the body).
    #[serde(default)]
    pub status: u16,
    /// Twilio error code (e.g. 20404).
    #[serde(default)]
    pub code: Option<i64>,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Link to the Twilio error reference.
    #[serde(default)]
    pub more_info: Option<String>,
}

impl VendorError {
    /// Builds a vendor error for a failure that never produced a Twilio body
    /// (connection refused, timeout, undecodable payload).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            code: None,
            message: message.into(),
            more_info: None,
        }
    }

    /// True when Twilio reports the resource as missing.
    ///
    /// Only the Twilio code counts: a 404 without a Twilio body (wrong host,
    /// proxy page) is an ordinary failure.
    pub fn is_not_found(&self) -> bool {
        self.code == Some(TWILIO_NOT_FOUND)
    }

    pub fn has_code(&self, code: i64) -> bool {
        self.code == Some(code)
    }
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "HTTP {} error {}: {}", self.status, code, self.message),
            None => write!(f, "HTTP {}: {}", self.status, self.message),
        }
    }
}

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Twilio rejected the request or could not be reached.
    Vendor(VendorError),
    /// Reading or writing a local file failed.
    Io(std::io::Error),
    /// The tabular file could not be parsed or serialized.
    Csv(csv::Error),
    /// The input table is missing a required column.
    MissingColumn(String),
    /// Invalid or incomplete configuration.
    Config(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Vendor(e) => write!(f, "Twilio error: {}", e),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
            // csv::Error already reads "CSV error: ..."
            AppError::Csv(e) => write!(f, "{}", e),
            AppError::MissingColumn(name) => write!(f, "Missing column: {}", name),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io(e) => Some(e),
            AppError::Csv(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl AppError {
    /// Returns the vendor error at the bottom of a context chain, if any.
    pub fn vendor(&self) -> Option<&VendorError> {
        match self {
            AppError::Vendor(e) => Some(e),
            AppError::WithContext { source, .. } => source.vendor(),
            _ => None,
        }
    }
}

impl From<VendorError> for AppError {
    fn from(err: VendorError) -> Self {
        AppError::Vendor(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        let mut vendor = VendorError::transport(err.to_string());
        if let Some(status) = err.status() {
            vendor.status = status.as_u16();
        }
        AppError::Vendor(vendor)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}
