//! Checklist session: decides once per screen mount whether the editor starts
//! from a local draft, a previously submitted inspection, or empty, then keeps
//! local storage as the write-through copy of every edit.
//!
//! The policy is local-first, fetch-once, never-overwrite. A non-empty local
//! draft short-circuits the remote fetch entirely, so a late server response
//! can never clobber offline work; the fetch runs at most once per session
//! behind an explicit guard.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::draft::{
    ChecklistDraft, ChecklistTemplate, DraftKey, DraftValidationError, ItemStatus,
};
use crate::effect::{HttpError, KvError};
use crate::remote::{InspectionSubmission, RemoteInspection};
use crate::JobId;

/// Where the editor's initial state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftSource {
    Empty,
    Local,
    Remote,
}

/// Hydration progresses strictly forward; callbacks arriving in the wrong
/// phase (re-render, stale subscription) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HydrationPhase {
    LoadingLocal,
    FetchingRemote,
    Ready,
}

/// What the session asks its driver to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCmd {
    LoadLocal,
    FetchRemote,
    SaveDraft,
    ClearDraft,
    Submit(InspectionSubmission),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementKind {
    PushrodStroke,
    TreadDepth,
    TirePressure,
}

/// One field edit from the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DraftEdit {
    SetItemStatus { item_id: String, status: ItemStatus },
    SetItemNotes { item_id: String, notes: String },
    SetMeasurement {
        kind: MeasurementKind,
        position: String,
        value: String,
    },
    SetInspectorName(String),
    SetInspectionDate(String),
    SetAdditionalNotes(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBlocked {
    Validation(DraftValidationError),
    AlreadyInFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistSession {
    pub job_id: Option<JobId>,
    pub key: DraftKey,
    pub template: ChecklistTemplate,
    pub draft: ChecklistDraft,
    phase: HydrationPhase,
    source: DraftSource,
    remote_fetch_attempted: bool,
    submit_in_flight: bool,
    pub last_submit_error: Option<HttpError>,
}

impl ChecklistSession {
    /// Opens a session for a mounted checklist screen. The first command is
    /// always a local load; everything else waits on its outcome.
    pub fn open(job_id: Option<JobId>, template: ChecklistTemplate) -> (Self, SessionCmd) {
        let key = match &job_id {
            Some(id) => DraftKey::for_job(id),
            None => DraftKey::for_template(&template.id),
        };
        let session = Self {
            job_id,
            key,
            template,
            draft: ChecklistDraft::default(),
            phase: HydrationPhase::LoadingLocal,
            source: DraftSource::Empty,
            remote_fetch_attempted: false,
            submit_in_flight: false,
            last_submit_error: None,
        };
        (session, SessionCmd::LoadLocal)
    }

    pub fn phase(&self) -> HydrationPhase {
        self.phase
    }

    pub fn source(&self) -> DraftSource {
        self.source
    }

    pub fn is_hydrated(&self) -> bool {
        self.phase == HydrationPhase::Ready
    }

    pub fn is_submit_in_flight(&self) -> bool {
        self.submit_in_flight
    }

    /// Outcome of the local load. A found, non-empty draft is authoritative
    /// and the remote fetch is skipped for the rest of the session.
    pub fn on_local_loaded(&mut self, stored: Option<ChecklistDraft>) -> Vec<SessionCmd> {
        if self.phase != HydrationPhase::LoadingLocal {
            return Vec::new();
        }

        match stored {
            Some(draft) if !draft.is_empty() => {
                debug!(key = %self.key, "restored draft from local storage");
                self.draft = draft;
                self.source = DraftSource::Local;
                self.phase = HydrationPhase::Ready;
                Vec::new()
            }
            _ => {
                if self.job_id.is_some() && !self.remote_fetch_attempted {
                    self.remote_fetch_attempted = true;
                    self.phase = HydrationPhase::FetchingRemote;
                    vec![SessionCmd::FetchRemote]
                } else {
                    self.phase = HydrationPhase::Ready;
                    Vec::new()
                }
            }
        }
    }

    /// Outcome of the single remote fetch. Not-found means no inspection was
    /// submitted yet and the editor starts empty; any other failure degrades
    /// to the same empty start so editing is never blocked on the network.
    pub fn on_remote_fetched(
        &mut self,
        result: Result<RemoteInspection, HttpError>,
    ) -> Vec<SessionCmd> {
        if self.phase != HydrationPhase::FetchingRemote {
            return Vec::new();
        }
        self.phase = HydrationPhase::Ready;

        match result {
            Ok(inspection) => {
                self.draft = inspection.into_draft();
                self.source = DraftSource::Remote;
                // Persist immediately so the remote seed survives a restart.
                vec![SessionCmd::SaveDraft]
            }
            Err(err) if err.is_not_found() => {
                debug!(key = %self.key, "no submitted inspection, starting empty");
                Vec::new()
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "inspection fetch failed, starting empty");
                Vec::new()
            }
        }
    }

    /// Applies one editor change. Saves are gated on hydration: mutating
    /// storage before the load resolves could overwrite a real draft with
    /// this session's empty initial state.
    pub fn apply_edit(&mut self, edit: DraftEdit) -> Vec<SessionCmd> {
        match edit {
            DraftEdit::SetItemStatus { item_id, status } => {
                self.draft.status_map.insert(item_id, status);
            }
            DraftEdit::SetItemNotes { item_id, notes } => {
                self.draft.notes_map.insert(item_id, notes);
            }
            DraftEdit::SetMeasurement {
                kind,
                position,
                value,
            } => {
                let map = match kind {
                    MeasurementKind::PushrodStroke => &mut self.draft.measurements.pushrod_stroke,
                    MeasurementKind::TreadDepth => &mut self.draft.measurements.tread_depth,
                    MeasurementKind::TirePressure => &mut self.draft.measurements.tire_pressure,
                };
                map.insert(position, value);
            }
            DraftEdit::SetInspectorName(name) => self.draft.inspector_name = name,
            DraftEdit::SetInspectionDate(date) => self.draft.inspection_date = date,
            DraftEdit::SetAdditionalNotes(notes) => self.draft.additional_notes = notes,
        }

        if self.is_hydrated() {
            vec![SessionCmd::SaveDraft]
        } else {
            Vec::new()
        }
    }

    /// Local persistence failed. Logged and ignored; the in-memory draft is
    /// still live and the next edit retries the save.
    pub fn on_save_failed(&self, err: &KvError) {
        warn!(key = %self.key, error = %err, "draft save failed, continuing in-memory");
    }

    /// Validates and stages a submission. The draft stays in storage until
    /// the server confirms.
    pub fn submit(
        &mut self,
        customer_name: String,
        location: String,
    ) -> Result<SessionCmd, SubmitBlocked> {
        if self.submit_in_flight {
            return Err(SubmitBlocked::AlreadyInFlight);
        }
        self.draft
            .validate(&self.template)
            .map_err(SubmitBlocked::Validation)?;

        self.submit_in_flight = true;
        self.last_submit_error = None;
        Ok(SessionCmd::Submit(InspectionSubmission::from_draft(
            &self.draft,
            customer_name,
            location,
        )))
    }

    /// Server's answer to the submission. Success finally releases the local
    /// draft; failure keeps it so a retry loses nothing.
    pub fn on_submit_result(&mut self, result: Result<(), HttpError>) -> Vec<SessionCmd> {
        if !self.submit_in_flight {
            return Vec::new();
        }
        self.submit_in_flight = false;

        match result {
            Ok(()) => {
                self.last_submit_error = None;
                vec![SessionCmd::ClearDraft]
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "inspection submit failed, draft retained");
                self.last_submit_error = Some(err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChecklistTemplateId;
    use crate::draft::ChecklistItem;

    fn template() -> ChecklistTemplate {
        ChecklistTemplate {
            id: ChecklistTemplateId::new("pm-standard"),
            items: vec![ChecklistItem {
                id: "brakes".into(),
                label: "Brake system".into(),
            }],
        }
    }

    fn local_draft() -> ChecklistDraft {
        let mut draft = ChecklistDraft::default();
        draft.inspector_name = "R. Alvarez".into();
        draft.status_map.insert("brakes".into(), ItemStatus::Pass);
        draft
    }

    fn open_with_job() -> ChecklistSession {
        let (session, cmd) = ChecklistSession::open(Some(JobId::new("job-1")), template());
        assert_eq!(cmd, SessionCmd::LoadLocal);
        session
    }

    #[test]
    fn test_local_draft_short_circuits_remote_fetch() {
        let mut session = open_with_job();
        let cmds = session.on_local_loaded(Some(local_draft()));

        assert!(cmds.is_empty());
        assert_eq!(session.source(), DraftSource::Local);
        assert!(session.is_hydrated());
        assert_eq!(session.draft.inspector_name, "R. Alvarez");
    }

    #[test]
    fn test_empty_stored_draft_still_fetches_remote() {
        let mut session = open_with_job();
        let cmds = session.on_local_loaded(Some(ChecklistDraft::default()));
        assert_eq!(cmds, vec![SessionCmd::FetchRemote]);
    }

    #[test]
    fn test_no_local_draft_fetches_remote_exactly_once() {
        let mut session = open_with_job();
        let cmds = session.on_local_loaded(None);
        assert_eq!(cmds, vec![SessionCmd::FetchRemote]);

        // A duplicate load callback must not restart hydration.
        assert!(session.on_local_loaded(None).is_empty());
    }

    #[test]
    fn test_no_job_id_never_fetches() {
        let (mut session, _) = ChecklistSession::open(None, template());
        let cmds = session.on_local_loaded(None);
        assert!(cmds.is_empty());
        assert!(session.is_hydrated());
        assert_eq!(session.source(), DraftSource::Empty);
    }

    #[test]
    fn test_remote_hydration_seeds_and_persists() {
        let mut session = open_with_job();
        session.on_local_loaded(None);

        let remote = RemoteInspection {
            inspector_name: "R. Alvarez".into(),
            ..RemoteInspection::default()
        };
        let cmds = session.on_remote_fetched(Ok(remote));
        assert_eq!(cmds, vec![SessionCmd::SaveDraft]);
        assert_eq!(session.source(), DraftSource::Remote);
        assert_eq!(session.draft.inspector_name, "R. Alvarez");
    }

    #[test]
    fn test_remote_not_found_is_normal() {
        let mut session = open_with_job();
        session.on_local_loaded(None);

        let cmds = session.on_remote_fetched(Err(HttpError::Status {
            status: 404,
            message: "not found".into(),
        }));
        assert!(cmds.is_empty());
        assert!(session.is_hydrated());
        assert_eq!(session.source(), DraftSource::Empty);
        assert!(session.last_submit_error.is_none());
    }

    #[test]
    fn test_remote_failure_degrades_to_empty() {
        let mut session = open_with_job();
        session.on_local_loaded(None);

        let cmds = session.on_remote_fetched(Err(HttpError::Timeout { timeout_ms: 30_000 }));
        assert!(cmds.is_empty());
        assert!(session.is_hydrated());
        assert!(session.draft.is_empty());
    }

    #[test]
    fn test_late_remote_response_cannot_overwrite_local_draft() {
        let mut session = open_with_job();
        session.on_local_loaded(Some(local_draft()));

        // A stray fetch callback after local hydration is dropped.
        let cmds = session.on_remote_fetched(Ok(RemoteInspection {
            inspector_name: "Someone Else".into(),
            ..RemoteInspection::default()
        }));
        assert!(cmds.is_empty());
        assert_eq!(session.draft.inspector_name, "R. Alvarez");
        assert_eq!(session.source(), DraftSource::Local);
    }

    #[test]
    fn test_edits_before_hydration_do_not_persist() {
        let mut session = open_with_job();
        let cmds = session.apply_edit(DraftEdit::SetInspectorName("R. Alvarez".into()));
        assert!(cmds.is_empty());
        assert_eq!(session.draft.inspector_name, "R. Alvarez");
    }

    #[test]
    fn test_edits_after_hydration_write_through() {
        let mut session = open_with_job();
        session.on_local_loaded(None);
        session.on_remote_fetched(Err(HttpError::Status {
            status: 404,
            message: "not found".into(),
        }));

        let cmds = session.apply_edit(DraftEdit::SetItemStatus {
            item_id: "brakes".into(),
            status: ItemStatus::Fail,
        });
        assert_eq!(cmds, vec![SessionCmd::SaveDraft]);

        let cmds = session.apply_edit(DraftEdit::SetMeasurement {
            kind: MeasurementKind::TirePressure,
            position: "front_left".into(),
            value: "105".into(),
        });
        assert_eq!(cmds, vec![SessionCmd::SaveDraft]);
        assert_eq!(
            session.draft.measurements.tire_pressure["front_left"],
            "105"
        );
    }

    #[test]
    fn test_submit_blocked_by_validation() {
        let mut session = open_with_job();
        session.on_local_loaded(Some(local_draft()));
        session.apply_edit(DraftEdit::SetInspectorName(String::new()));

        let err = session
            .submit("Acme Trucking".into(), "Yard 3".into())
            .unwrap_err();
        assert_eq!(
            err,
            SubmitBlocked::Validation(DraftValidationError::MissingInspectorName)
        );
        assert!(!session.is_submit_in_flight());
    }

    #[test]
    fn test_submit_success_clears_draft_storage() {
        let mut session = open_with_job();
        session.on_local_loaded(Some(local_draft()));

        let cmd = session
            .submit("Acme Trucking".into(), "Yard 3".into())
            .unwrap();
        assert!(matches!(cmd, SessionCmd::Submit(_)));
        assert!(session.is_submit_in_flight());

        // No double submit while one is pending.
        assert_eq!(
            session
                .submit("Acme Trucking".into(), "Yard 3".into())
                .unwrap_err(),
            SubmitBlocked::AlreadyInFlight
        );

        let cmds = session.on_submit_result(Ok(()));
        assert_eq!(cmds, vec![SessionCmd::ClearDraft]);
        assert!(!session.is_submit_in_flight());
    }

    #[test]
    fn test_submit_failure_preserves_draft() {
        let mut session = open_with_job();
        session.on_local_loaded(Some(local_draft()));
        let before = session.draft.clone();

        session
            .submit("Acme Trucking".into(), "Yard 3".into())
            .unwrap();
        let cmds = session.on_submit_result(Err(HttpError::Timeout { timeout_ms: 60_000 }));

        assert!(cmds.is_empty());
        assert_eq!(session.draft, before);
        assert!(session.last_submit_error.is_some());

        // Retry is possible immediately.
        assert!(session.submit("Acme Trucking".into(), "Yard 3".into()).is_ok());
    }
}
