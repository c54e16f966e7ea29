#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod debounce;
pub mod draft;
pub mod effect;
pub mod job;
pub mod ledger;
pub mod reconcile;
pub mod remote;
pub mod status;

use serde::{Deserialize, Serialize};

pub use app::{App, Event, Model, ViewModel};
pub use effect::Effect;

/// One visible-timer tick while a job is actively worked or traveled.
pub const TICK_INTERVAL_MS: u64 = 1000;
/// Quiet period before cause/correction/vehicle edits are auto-saved.
pub const AUTO_SAVE_DEBOUNCE_MS: u64 = 700;

pub const STATUS_CALL_TIMEOUT_MS: u64 = 30_000;
pub const AUTO_SAVE_TIMEOUT_MS: u64 = 30_000;
pub const INSPECTION_FETCH_TIMEOUT_MS: u64 = 30_000;
pub const INSPECTION_SUBMIT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    NotFound,
    Storage,
    Serialization,
    InvalidState,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Storage => ErrorSeverity::Transient,
            Self::Serialization | Self::InvalidState => ErrorSeverity::Fatal,
            Self::Validation | Self::NotFound | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Storage)
    }
}

/// User-visible error carried on the model. Only user-initiated, irreversible
/// actions (completion, submission) ever set one; background calls log and
/// degrade silently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Storage => {
                "Unable to save data locally. Please free up some storage space.".into()
            }
            ErrorKind::Serialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::InvalidState => {
                "The app is in an invalid state. Please restart the app.".into()
            }
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChecklistTemplateId(pub String);

impl ChecklistTemplateId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChecklistTemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch, client wall-clock. The core never reads
/// the system clock; shells pass `now` into `App::update`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0 / 1000
    }

    /// Whole seconds between `earlier` and `self`, clamped to zero when the
    /// timestamps are out of order.
    #[must_use]
    pub fn seconds_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0) / 1000
    }

    #[must_use]
    pub fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    #[must_use]
    pub fn add_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs.saturating_mul(1000)))
    }
}

/// `HH:MM:SS` for the job-detail timer display. Hours are not wrapped, so a
/// multi-day job reads `49:10:05` rather than rolling over.
#[must_use]
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(600), "00:10:00");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(177_005), "49:10:05");
    }

    #[test]
    fn test_seconds_since_clamps_out_of_order() {
        let earlier = UnixTimeMs(10_000);
        let later = UnixTimeMs(16_500);
        assert_eq!(later.seconds_since(earlier), 6);
        assert_eq!(earlier.seconds_since(later), 0);
    }

    #[test]
    fn test_error_kind_severity() {
        assert_eq!(
            ErrorKind::Network.default_severity(),
            ErrorSeverity::Transient
        );
        assert_eq!(
            ErrorKind::Validation.default_severity(),
            ErrorSeverity::Permanent
        );
        assert!(AppError::new(ErrorKind::Timeout, "t").is_retryable());
        assert!(!AppError::new(ErrorKind::Validation, "v").is_retryable());
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = AppError::new(ErrorKind::Validation, "Cause is required");
        assert_eq!(err.user_facing_message(), "Cause is required");
    }
}
