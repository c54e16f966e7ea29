//! Mechanic status transitions. `apply` validates the trigger against the
//! current job state, mutates the job optimistically, and names the side
//! effects the caller must carry out. A failed remote call is never rolled
//! back locally; retries are the sync layer's problem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{Job, MechanicStatus, PauseEntry, TRAVEL_REASON};
use crate::UnixTimeMs;

/// Mechanic-initiated transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusTrigger {
    Start,
    Pause { reason: String },
    BeginTravel,
    Arrived,
    Resume,
    Complete,
}

impl StatusTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            StatusTrigger::Start => "start",
            StatusTrigger::Pause { .. } => "pause",
            StatusTrigger::BeginTravel => "begin_travel",
            StatusTrigger::Arrived => "arrived",
            StatusTrigger::Resume => "resume",
            StatusTrigger::Complete => "complete",
        }
    }
}

/// Remote call a transition requires. Travel rides on the pause endpoint with
/// the travel marker as its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCallKind {
    Start,
    Pause { reason: String },
    Resume,
    Arrived,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEffect {
    RemoteCall(StatusCallKind),
    StartTicker,
    StopTicker,
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionError {
    #[error("job is read-only, no further status changes are accepted")]
    ReadOnly,

    #[error("cannot {trigger} while {from}")]
    InvalidTransition { from: MechanicStatus, trigger: String },

    #[error("cause and correction are required before completing")]
    MissingCompletionFields,

    #[error("pause reason cannot be empty")]
    EmptyPauseReason,
}

/// Applies `trigger` to `job` at `now`. On success the job is already in its
/// new state and the returned effects still need executing; on error the job
/// is untouched.
pub fn apply(
    job: &mut Job,
    trigger: StatusTrigger,
    now: UnixTimeMs,
) -> Result<Vec<StatusEffect>, TransitionError> {
    if job.is_read_only {
        return Err(TransitionError::ReadOnly);
    }

    let effects = match (&trigger, job.mechanic_status) {
        (StatusTrigger::Start, MechanicStatus::NotStarted) => {
            job.started_at = Some(now);
            job.mechanic_status = MechanicStatus::InProgress;
            vec![
                StatusEffect::RemoteCall(StatusCallKind::Start),
                StatusEffect::StartTicker,
            ]
        }

        (StatusTrigger::Pause { reason }, MechanicStatus::InProgress) => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(TransitionError::EmptyPauseReason);
            }
            job.pause_log.push(PauseEntry::open(reason, now));
            job.mechanic_status = MechanicStatus::Paused;
            vec![
                StatusEffect::RemoteCall(StatusCallKind::Pause {
                    reason: reason.to_string(),
                }),
                StatusEffect::StopTicker,
            ]
        }

        (StatusTrigger::BeginTravel, MechanicStatus::InProgress) => {
            job.pause_log.push(PauseEntry::open(TRAVEL_REASON, now));
            if job.travel_started_at.is_none() {
                job.travel_started_at = Some(now);
            }
            job.mechanic_status = MechanicStatus::Travel;
            vec![StatusEffect::RemoteCall(StatusCallKind::Pause {
                reason: TRAVEL_REASON.to_string(),
            })]
        }

        (StatusTrigger::Arrived, MechanicStatus::Travel) => {
            fold_travel(job, now);
            if let Some(entry) = job.open_pause_entry_mut() {
                entry.end = Some(now);
            }
            job.mechanic_status = MechanicStatus::InProgress;
            vec![StatusEffect::RemoteCall(StatusCallKind::Arrived)]
        }

        (StatusTrigger::Resume, MechanicStatus::Paused) => {
            if let Some(entry) = job.open_pause_entry_mut() {
                entry.end = Some(now);
                let duration = now.seconds_since(entry.start);
                job.total_paused_seconds = job.total_paused_seconds.saturating_add(duration);
            }
            job.mechanic_status = MechanicStatus::InProgress;
            vec![
                StatusEffect::RemoteCall(StatusCallKind::Resume),
                StatusEffect::StartTicker,
            ]
        }

        (
            StatusTrigger::Complete,
            MechanicStatus::InProgress | MechanicStatus::Travel | MechanicStatus::Paused,
        ) => {
            if !job.has_completion_fields() {
                return Err(TransitionError::MissingCompletionFields);
            }
            if job.mechanic_status == MechanicStatus::Travel {
                fold_travel(job, now);
            }
            if let Some(entry) = job.open_pause_entry_mut() {
                entry.end = Some(now);
                // Only a genuine pause counts toward the aggregate; a travel
                // marker was already folded into travel time.
                if !entry.is_travel() {
                    let duration = now.seconds_since(entry.start);
                    job.total_paused_seconds =
                        job.total_paused_seconds.saturating_add(duration);
                }
            }
            job.ended_at = Some(now);
            job.mechanic_status = MechanicStatus::MarkedComplete;
            job.is_read_only = true;
            vec![
                StatusEffect::RemoteCall(StatusCallKind::Complete),
                StatusEffect::StopTicker,
            ]
        }

        (_, from) => {
            return Err(TransitionError::InvalidTransition {
                from,
                trigger: trigger.name().to_string(),
            });
        }
    };

    job.last_status_change_at = Some(now);
    Ok(effects)
}

/// Folds the live travel segment into the accumulated total and stops it, so
/// the next travel leg opens a fresh segment.
fn fold_travel(job: &mut Job, now: UnixTimeMs) {
    if let Some(travel_start) = job.travel_started_at.take() {
        let duration = now.seconds_since(travel_start);
        job.total_travel_seconds = job.total_travel_seconds.saturating_add(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TimeLedger;
    use crate::JobId;

    const T0: UnixTimeMs = UnixTimeMs(1_700_000_000_000);

    fn job() -> Job {
        Job::new(JobId::new("job-1"))
    }

    fn complete_ready(job: &mut Job) {
        job.cause = "Worn brake pads".into();
        job.correction = "Replaced front pads".into();
    }

    #[test]
    fn test_start_sets_started_at_once() {
        let mut job = job();
        let effects = apply(&mut job, StatusTrigger::Start, T0).unwrap();

        assert_eq!(job.mechanic_status, MechanicStatus::InProgress);
        assert_eq!(job.started_at, Some(T0));
        assert_eq!(job.last_status_change_at, Some(T0));
        assert!(effects.contains(&StatusEffect::RemoteCall(StatusCallKind::Start)));
        assert!(effects.contains(&StatusEffect::StartTicker));

        // Already started: start again is rejected and started_at is untouched.
        let err = apply(&mut job, StatusTrigger::Start, T0.add_secs(5)).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
        assert_eq!(job.started_at, Some(T0));
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();

        let effects = apply(
            &mut job,
            StatusTrigger::Pause {
                reason: "Lunch".into(),
            },
            T0.add_secs(600),
        )
        .unwrap();
        assert_eq!(job.mechanic_status, MechanicStatus::Paused);
        assert!(job.open_pause_entry().is_some());
        assert!(effects.contains(&StatusEffect::StopTicker));

        apply(&mut job, StatusTrigger::Resume, T0.add_secs(1200)).unwrap();
        assert_eq!(job.mechanic_status, MechanicStatus::InProgress);
        assert_eq!(job.total_paused_seconds, 600);
        assert!(job.open_pause_entry().is_none());

        let ledger = TimeLedger::compute(&job, T0.add_secs(1200));
        assert_eq!(ledger.total_active_seconds, 600);
    }

    #[test]
    fn test_pause_rejects_blank_reason() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        let err = apply(
            &mut job,
            StatusTrigger::Pause { reason: "  ".into() },
            T0.add_secs(10),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::EmptyPauseReason);
        assert_eq!(job.mechanic_status, MechanicStatus::InProgress);
        assert!(job.pause_log.is_empty());
    }

    #[test]
    fn test_travel_round_trip_accumulates() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();

        apply(&mut job, StatusTrigger::BeginTravel, T0.add_secs(300)).unwrap();
        assert_eq!(job.mechanic_status, MechanicStatus::Travel);
        assert_eq!(job.travel_started_at, Some(T0.add_secs(300)));
        assert!(job.open_pause_entry().is_some());

        apply(&mut job, StatusTrigger::Arrived, T0.add_secs(900)).unwrap();
        assert_eq!(job.mechanic_status, MechanicStatus::InProgress);
        assert_eq!(job.total_travel_seconds, 600);
        assert_eq!(job.travel_started_at, None);
        assert!(job.open_pause_entry().is_none());
        // Travel never feeds the paused aggregate.
        assert_eq!(job.total_paused_seconds, 0);

        let ledger = TimeLedger::compute(&job, T0.add_secs(900));
        assert_eq!(ledger.total_active_seconds, 900);
    }

    #[test]
    fn test_second_travel_leg_opens_fresh_segment() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        apply(&mut job, StatusTrigger::BeginTravel, T0.add_secs(100)).unwrap();
        apply(&mut job, StatusTrigger::Arrived, T0.add_secs(200)).unwrap();
        apply(&mut job, StatusTrigger::BeginTravel, T0.add_secs(500)).unwrap();

        assert_eq!(job.travel_started_at, Some(T0.add_secs(500)));
        let ledger = TimeLedger::compute(&job, T0.add_secs(600));
        assert_eq!(ledger.total_travel_seconds, 200);
    }

    #[test]
    fn test_travel_uses_pause_endpoint_with_marker() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        let effects = apply(&mut job, StatusTrigger::BeginTravel, T0.add_secs(10)).unwrap();
        assert!(effects.iter().any(|e| matches!(
            e,
            StatusEffect::RemoteCall(StatusCallKind::Pause { reason }) if reason == TRAVEL_REASON
        )));
    }

    #[test]
    fn test_complete_requires_cause_and_correction() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        job.cause = "Worn pads".into();

        let err = apply(&mut job, StatusTrigger::Complete, T0.add_secs(100)).unwrap_err();
        assert_eq!(err, TransitionError::MissingCompletionFields);
        assert_eq!(job.mechanic_status, MechanicStatus::InProgress);
        assert_eq!(job.ended_at, None);
    }

    #[test]
    fn test_complete_is_irreversible() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        complete_ready(&mut job);

        let effects = apply(&mut job, StatusTrigger::Complete, T0.add_secs(1800)).unwrap();
        assert_eq!(job.mechanic_status, MechanicStatus::MarkedComplete);
        assert_eq!(job.ended_at, Some(T0.add_secs(1800)));
        assert!(job.is_read_only);
        assert!(effects.contains(&StatusEffect::StopTicker));

        let err = apply(&mut job, StatusTrigger::Resume, T0.add_secs(2000)).unwrap_err();
        assert_eq!(err, TransitionError::ReadOnly);
        assert_eq!(job.ended_at, Some(T0.add_secs(1800)));
    }

    #[test]
    fn test_complete_while_paused_closes_entry() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        apply(
            &mut job,
            StatusTrigger::Pause {
                reason: "Parts run".into(),
            },
            T0.add_secs(100),
        )
        .unwrap();
        complete_ready(&mut job);

        apply(&mut job, StatusTrigger::Complete, T0.add_secs(400)).unwrap();
        assert!(job.open_pause_entry().is_none());
        assert_eq!(job.total_paused_seconds, 300);
    }

    #[test]
    fn test_complete_while_traveling_folds_travel() {
        let mut job = job();
        apply(&mut job, StatusTrigger::Start, T0).unwrap();
        apply(&mut job, StatusTrigger::BeginTravel, T0.add_secs(100)).unwrap();
        complete_ready(&mut job);

        apply(&mut job, StatusTrigger::Complete, T0.add_secs(400)).unwrap();
        assert_eq!(job.total_travel_seconds, 300);
        assert_eq!(job.total_paused_seconds, 0);
        assert!(job.open_pause_entry().is_none());
        assert_eq!(job.travel_started_at, None);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut job = job();
        assert!(apply(&mut job, StatusTrigger::Resume, T0).is_err());
        assert!(apply(&mut job, StatusTrigger::Arrived, T0).is_err());
        assert!(apply(
            &mut job,
            StatusTrigger::Pause {
                reason: "Lunch".into()
            },
            T0
        )
        .is_err());
        assert_eq!(job.mechanic_status, MechanicStatus::NotStarted);
        assert_eq!(job.last_status_change_at, None);
    }
}
