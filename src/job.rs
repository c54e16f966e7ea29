//! Job state as the mechanic sees it: the fine-grained work status, the
//! timestamps the ledger is computed from, and the pause log.

use serde::{Deserialize, Serialize};

use crate::{JobId, UnixTimeMs};

/// Reason string reserved for pause-log entries that mark travel segments.
/// Travel reuses the pause-log machinery on the wire, but travel time is
/// billable and is accounted separately.
pub const TRAVEL_REASON: &str = "Travel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MechanicStatus {
    #[default]
    NotStarted,
    InProgress,
    Paused,
    Travel,
    MarkedComplete,
    Completed,
}

impl MechanicStatus {
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "not_started" | "notstarted" | "new" => Some(Self::NotStarted),
            "in_progress" | "inprogress" | "started" => Some(Self::InProgress),
            "paused" | "on_hold" => Some(Self::Paused),
            "travel" | "traveling" | "travelling" | "en_route" => Some(Self::Travel),
            "marked_complete" | "markedcomplete" => Some(Self::MarkedComplete),
            "completed" | "complete" | "done" | "closed" => Some(Self::Completed),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Travel => "travel",
            Self::MarkedComplete => "marked_complete",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Paused => "Paused",
            Self::Travel => "Traveling",
            Self::MarkedComplete => "Marked Complete",
            Self::Completed => "Completed",
        }
    }

    /// Active states keep the wall clock (and the 1 s ticker) running.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Travel)
    }

    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::MarkedComplete | Self::Completed)
    }
}

impl std::fmt::Display for MechanicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One interval during which active work was suspended. `end` absent means the
/// interval is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEntry {
    pub reason: String,
    pub start: UnixTimeMs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<UnixTimeMs>,
}

impl PauseEntry {
    #[must_use]
    pub fn open(reason: impl Into<String>, start: UnixTimeMs) -> Self {
        Self {
            reason: reason.into(),
            start,
            end: None,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    #[must_use]
    pub fn is_travel(&self) -> bool {
        self.reason == TRAVEL_REASON
    }

    /// Whole seconds covered by this entry; an open entry is measured up to
    /// `now`. Out-of-order timestamps clamp to zero.
    #[must_use]
    pub fn duration_seconds(&self, now: UnixTimeMs) -> u64 {
        self.end.unwrap_or(now).seconds_since(self.start)
    }
}

/// Vehicle fields edited on the job-detail screen and auto-saved alongside
/// cause/correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VehicleFields {
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub vehicle_vin: Option<String>,
    #[serde(default)]
    pub mileage: Option<String>,
    #[serde(default)]
    pub unit_no: Option<String>,
    #[serde(default)]
    pub make_model: Option<String>,
}

/// Server-owned job record, mirrored read-mostly on the client. The status
/// state machine mutates it optimistically; the server is reconciled through
/// fire-and-forget calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Business-facing status, distinct from `mechanic_status`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mechanic_status: MechanicStatus,
    #[serde(default)]
    pub started_at: Option<UnixTimeMs>,
    #[serde(default)]
    pub ended_at: Option<UnixTimeMs>,
    #[serde(default)]
    pub travel_started_at: Option<UnixTimeMs>,
    #[serde(default)]
    pub total_travel_seconds: u64,
    /// Legacy aggregate; authoritative for active-time math. The pause log is
    /// the audit trail.
    #[serde(default)]
    pub total_paused_seconds: u64,
    #[serde(default)]
    pub pause_log: Vec<PauseEntry>,
    #[serde(default)]
    pub is_read_only: bool,
    /// Anchor for the frozen elapsed clock while paused. Falls back to the
    /// open pause entry's start when absent (e.g. freshly fetched from the
    /// server).
    #[serde(default)]
    pub last_status_change_at: Option<UnixTimeMs>,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub correction: String,
    #[serde(default)]
    pub vehicle: VehicleFields,
}

impl Job {
    #[must_use]
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            status: String::new(),
            mechanic_status: MechanicStatus::NotStarted,
            started_at: None,
            ended_at: None,
            travel_started_at: None,
            total_travel_seconds: 0,
            total_paused_seconds: 0,
            pause_log: Vec::new(),
            is_read_only: false,
            last_status_change_at: None,
            cause: String::new(),
            correction: String::new(),
            vehicle: VehicleFields::default(),
        }
    }

    #[must_use]
    pub fn open_pause_entry(&self) -> Option<&PauseEntry> {
        self.pause_log.last().filter(|entry| entry.is_open())
    }

    #[must_use]
    pub fn open_pause_entry_mut(&mut self) -> Option<&mut PauseEntry> {
        self.pause_log.last_mut().filter(|entry| entry.is_open())
    }

    /// Mechanic edits stop once the job is mechanic-completed or the business
    /// side has closed it.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        !self.is_read_only && !self.mechanic_status.is_complete()
    }

    #[must_use]
    pub fn has_completion_fields(&self) -> bool {
        !self.cause.trim().is_empty() && !self.correction.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            MechanicStatus::NotStarted,
            MechanicStatus::InProgress,
            MechanicStatus::Paused,
            MechanicStatus::Travel,
            MechanicStatus::MarkedComplete,
            MechanicStatus::Completed,
        ] {
            assert_eq!(MechanicStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(MechanicStatus::from_str("en-route"), Some(MechanicStatus::Travel));
        assert_eq!(MechanicStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_active_states() {
        assert!(MechanicStatus::InProgress.is_active());
        assert!(MechanicStatus::Travel.is_active());
        assert!(!MechanicStatus::Paused.is_active());
        assert!(!MechanicStatus::MarkedComplete.is_active());
    }

    #[test]
    fn test_pause_entry_duration() {
        let mut entry = PauseEntry::open("Lunch", UnixTimeMs(10_000));
        assert!(entry.is_open());
        assert_eq!(entry.duration_seconds(UnixTimeMs(70_000)), 60);

        entry.end = Some(UnixTimeMs(40_000));
        assert_eq!(entry.duration_seconds(UnixTimeMs(999_000)), 30);
    }

    #[test]
    fn test_pause_entry_clamps_negative_interval() {
        let entry = PauseEntry::open("Lunch", UnixTimeMs(50_000));
        assert_eq!(entry.duration_seconds(UnixTimeMs(10_000)), 0);
    }

    #[test]
    fn test_travel_marker() {
        assert!(PauseEntry::open(TRAVEL_REASON, UnixTimeMs(0)).is_travel());
        assert!(!PauseEntry::open("Parts run", UnixTimeMs(0)).is_travel());
    }

    #[test]
    fn test_open_pause_entry_is_last_only() {
        let mut job = Job::new(JobId::new("j1"));
        job.pause_log.push(PauseEntry {
            reason: "Lunch".into(),
            start: UnixTimeMs(1000),
            end: Some(UnixTimeMs(2000)),
        });
        assert!(job.open_pause_entry().is_none());

        job.pause_log.push(PauseEntry::open("Parts", UnixTimeMs(3000)));
        assert_eq!(job.open_pause_entry().map(|e| e.reason.as_str()), Some("Parts"));
    }

    #[test]
    fn test_editability() {
        let mut job = Job::new(JobId::new("j1"));
        assert!(job.is_editable());

        job.mechanic_status = MechanicStatus::MarkedComplete;
        assert!(!job.is_editable());

        let mut closed = Job::new(JobId::new("j2"));
        closed.is_read_only = true;
        assert!(!closed.is_editable());
    }

    #[test]
    fn test_completion_fields_require_non_blank() {
        let mut job = Job::new(JobId::new("j1"));
        assert!(!job.has_completion_fields());
        job.cause = "Worn brake pads".into();
        job.correction = "   ".into();
        assert!(!job.has_completion_fields());
        job.correction = "Replaced pads".into();
        assert!(job.has_completion_fields());
    }
}
