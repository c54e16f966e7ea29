//! Headless app core. The shell forwards user input, timer expiries, and
//! I/O outcomes as events; `update` mutates the model and returns the effects
//! to run next. All timing comes from the injected `now`, never a clock read.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::debounce::AutoSaveDebouncer;
use crate::draft::{ChecklistDraft, ChecklistTemplate};
use crate::effect::{Effect, HttpError, HttpPurpose, HttpResult, KvError};
use crate::job::{Job, MechanicStatus};
use crate::ledger::TimeLedger;
use crate::reconcile::{ChecklistSession, DraftEdit, SessionCmd, SubmitBlocked};
use crate::remote::{Api, JobPatch, RemoteInspection};
use crate::status::{self, StatusCallKind, StatusEffect, StatusTrigger, TransitionError};
use crate::{
    format_hms, AppError, ErrorKind, UnixTimeMs, AUTO_SAVE_DEBOUNCE_MS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Job detail screen
    JobLoaded(Job),
    JobScreenMounted,
    JobScreenUnmounted,
    StatusTriggered(StatusTrigger),
    StatusCallCompleted {
        kind: StatusCallKind,
        result: HttpResult,
    },
    Tick,
    FieldsEdited(JobPatch),
    AutoSaveElapsed {
        token: u64,
    },
    AutoSaveCompleted {
        result: HttpResult,
    },

    // Checklist screen
    ChecklistOpened {
        template: ChecklistTemplate,
    },
    ChecklistClosed,
    DraftLoaded {
        result: Result<Option<Vec<u8>>, KvError>,
    },
    DraftSaved {
        result: Result<(), KvError>,
    },
    DraftEdited(DraftEdit),
    InspectionFetchCompleted {
        result: HttpResult,
    },
    SubmitRequested {
        customer_name: String,
        location: String,
    },
    SubmitCompleted {
        result: HttpResult,
    },

    ErrorDismissed,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::JobLoaded(_) => "job_loaded",
            Event::JobScreenMounted => "job_screen_mounted",
            Event::JobScreenUnmounted => "job_screen_unmounted",
            Event::StatusTriggered(_) => "status_triggered",
            Event::StatusCallCompleted { .. } => "status_call_completed",
            Event::Tick => "tick",
            Event::FieldsEdited(_) => "fields_edited",
            Event::AutoSaveElapsed { .. } => "auto_save_elapsed",
            Event::AutoSaveCompleted { .. } => "auto_save_completed",
            Event::ChecklistOpened { .. } => "checklist_opened",
            Event::ChecklistClosed => "checklist_closed",
            Event::DraftLoaded { .. } => "draft_loaded",
            Event::DraftSaved { .. } => "draft_saved",
            Event::DraftEdited(_) => "draft_edited",
            Event::InspectionFetchCompleted { .. } => "inspection_fetch_completed",
            Event::SubmitRequested { .. } => "submit_requested",
            Event::SubmitCompleted { .. } => "submit_completed",
            Event::ErrorDismissed => "error_dismissed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub api: Api,
    pub job: Option<Job>,
    pub session: Option<ChecklistSession>,
    job_screen_mounted: bool,
    ticker_running: bool,
    auto_save: AutoSaveDebouncer,
    pending_patch: JobPatch,
    pub active_error: Option<AppError>,
    now_ms: UnixTimeMs,
}

impl Model {
    pub fn new(api: Api) -> Self {
        Self {
            api,
            job: None,
            session: None,
            job_screen_mounted: false,
            ticker_running: false,
            auto_save: AutoSaveDebouncer::new(),
            pending_patch: JobPatch::default(),
            active_error: None,
            now_ms: UnixTimeMs(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistViewModel {
    pub hydrated: bool,
    pub restored_from_local: bool,
    pub submit_in_flight: bool,
    pub submit_error: Option<String>,
    pub draft: ChecklistDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub mechanic_status: MechanicStatus,
    pub status_label: String,
    pub elapsed_hms: String,
    pub active_hms: String,
    pub travel_hms: String,
    pub paused_hms: String,
    pub can_start: bool,
    pub can_pause: bool,
    pub can_resume: bool,
    pub can_begin_travel: bool,
    pub can_arrive: bool,
    pub can_complete: bool,
    pub checklist: Option<ChecklistViewModel>,
    pub error_message: Option<String>,
}

#[derive(Default)]
pub struct App;

impl App {
    pub fn update(&self, event: Event, model: &mut Model, now: UnixTimeMs) -> Vec<Effect> {
        debug!(event = event.name(), "update");
        model.now_ms = now;

        match event {
            Event::JobLoaded(job) => {
                model.job = Some(job);
                let mut effects = self.sync_ticker(model);
                effects.push(Effect::Render);
                effects
            }

            Event::JobScreenMounted => {
                model.job_screen_mounted = true;
                let mut effects = self.sync_ticker(model);
                effects.push(Effect::Render);
                effects
            }

            Event::JobScreenUnmounted => {
                model.job_screen_mounted = false;
                model.auto_save.cancel();
                let mut effects = self.sync_ticker(model);
                effects.push(Effect::CancelAutoSave);
                effects
            }

            Event::StatusTriggered(trigger) => self.handle_trigger(model, trigger, now),

            Event::StatusCallCompleted { kind, result } => {
                // Optimistic policy: the local transition already happened and
                // is never rolled back here.
                if let Err(err) = to_unit_result(result) {
                    warn!(?kind, error = %err, "status call failed, keeping local state");
                }
                Vec::new()
            }

            Event::Tick => {
                if model.ticker_running {
                    vec![Effect::Render]
                } else {
                    Vec::new()
                }
            }

            Event::FieldsEdited(patch) => self.handle_fields_edited(model, patch),

            Event::AutoSaveElapsed { token } => {
                if !model.auto_save.try_fire(token) {
                    return Vec::new();
                }
                self.emit_pending_patch(model)
            }

            Event::AutoSaveCompleted { result } => {
                if let Err(err) = to_unit_result(result) {
                    warn!(error = %err, "auto-save failed, next edit retries");
                }
                Vec::new()
            }

            Event::ChecklistOpened { template } => {
                let job_id = model.job.as_ref().map(|job| job.id.clone());
                let (mut session, cmd) = ChecklistSession::open(job_id, template);
                if let Some(job) = &model.job {
                    session.draft.vehicle_info =
                        serde_json::to_value(&job.vehicle).unwrap_or_default();
                }
                let mut effects = self.run_session_cmds(model.api.clone(), &mut session, vec![cmd]);
                model.session = Some(session);
                effects.push(Effect::Render);
                effects
            }

            Event::ChecklistClosed => {
                model.session = None;
                Vec::new()
            }

            Event::DraftLoaded { result } => {
                let stored = match result {
                    Ok(Some(bytes)) => match ChecklistDraft::decode(&bytes) {
                        Ok(draft) => Some(draft),
                        Err(err) => {
                            warn!(error = %err, "stored draft unreadable, treating as absent");
                            None
                        }
                    },
                    Ok(None) => None,
                    Err(err) => {
                        warn!(error = %err, "draft load failed, treating as absent");
                        None
                    }
                };
                self.with_session(model, |session| session.on_local_loaded(stored))
            }

            Event::DraftSaved { result } => {
                if let (Err(err), Some(session)) = (&result, &model.session) {
                    session.on_save_failed(err);
                }
                Vec::new()
            }

            Event::DraftEdited(edit) => {
                self.with_session(model, |session| session.apply_edit(edit))
            }

            Event::InspectionFetchCompleted { result } => {
                let fetched = to_inspection_result(result);
                self.with_session(model, |session| session.on_remote_fetched(fetched))
            }

            Event::SubmitRequested {
                customer_name,
                location,
            } => self.handle_submit(model, customer_name, location),

            Event::SubmitCompleted { result } => {
                let outcome = to_unit_result(result);
                let failed = outcome.is_err();
                let effects =
                    self.with_session(model, |session| session.on_submit_result(outcome));
                if failed {
                    // Submission is user-initiated: unlike background sync,
                    // its failure is surfaced as retryable.
                    model.active_error = Some(AppError::new(
                        ErrorKind::Network,
                        "Could not submit the inspection. Your draft is saved; try again.",
                    ));
                }
                effects
            }

            Event::ErrorDismissed => {
                model.active_error = None;
                vec![Effect::Render]
            }
        }
    }

    pub fn view(&self, model: &Model) -> ViewModel {
        let (status, ledger, editable, has_completion_fields) = match &model.job {
            Some(job) => (
                job.mechanic_status,
                TimeLedger::compute(job, model.now_ms),
                job.is_editable(),
                job.has_completion_fields(),
            ),
            None => (MechanicStatus::NotStarted, TimeLedger::default(), false, false),
        };

        let checklist = model.session.as_ref().map(|session| ChecklistViewModel {
            hydrated: session.is_hydrated(),
            restored_from_local: session.source() == crate::reconcile::DraftSource::Local,
            submit_in_flight: session.is_submit_in_flight(),
            submit_error: session.last_submit_error.as_ref().map(|e| e.to_string()),
            draft: session.draft.clone(),
        });

        ViewModel {
            mechanic_status: status,
            status_label: status.display_name().to_string(),
            elapsed_hms: format_hms(ledger.total_elapsed_seconds),
            active_hms: format_hms(ledger.total_active_seconds),
            travel_hms: format_hms(ledger.total_travel_seconds),
            paused_hms: format_hms(ledger.total_paused_from_log),
            can_start: editable && status == MechanicStatus::NotStarted,
            can_pause: editable && status == MechanicStatus::InProgress,
            can_resume: editable && status == MechanicStatus::Paused,
            can_begin_travel: editable && status == MechanicStatus::InProgress,
            can_arrive: editable && status == MechanicStatus::Travel,
            can_complete: editable
                && has_completion_fields
                && matches!(
                    status,
                    MechanicStatus::InProgress | MechanicStatus::Travel | MechanicStatus::Paused
                ),
            checklist,
            error_message: model
                .active_error
                .as_ref()
                .map(AppError::user_facing_message),
        }
    }

    fn handle_trigger(
        &self,
        model: &mut Model,
        trigger: StatusTrigger,
        now: UnixTimeMs,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        // Completion requires cause/correction to be on the server already,
        // so a pending auto-save is flushed ahead of the complete call.
        if trigger == StatusTrigger::Complete && model.auto_save.flush() {
            effects.push(Effect::CancelAutoSave);
            effects.extend(self.emit_pending_patch(model));
        }

        let Some(job) = model.job.as_mut() else {
            model.active_error = Some(AppError::new(ErrorKind::InvalidState, "No job loaded"));
            return vec![Effect::Render];
        };

        match status::apply(job, trigger, now) {
            Ok(status_effects) => {
                let job_id = job.id.clone();
                for status_effect in status_effects {
                    match status_effect {
                        StatusEffect::RemoteCall(kind) => {
                            match model.api.status_call(&job_id, &kind) {
                                Ok(request) => effects.push(Effect::Http {
                                    purpose: HttpPurpose::StatusCall { kind },
                                    request,
                                }),
                                Err(err) => {
                                    error!(?kind, error = %err, "could not build status call")
                                }
                            }
                        }
                        StatusEffect::StartTicker | StatusEffect::StopTicker => {}
                    }
                }
                effects.extend(self.sync_ticker(model));
                effects.push(Effect::Render);
            }
            Err(err @ (TransitionError::MissingCompletionFields
            | TransitionError::EmptyPauseReason)) => {
                model.active_error =
                    Some(AppError::new(ErrorKind::Validation, err.to_string()));
                effects.push(Effect::Render);
            }
            Err(err) => {
                warn!(error = %err, "transition rejected");
                effects.push(Effect::Render);
            }
        }
        effects
    }

    fn handle_fields_edited(&self, model: &mut Model, patch: JobPatch) -> Vec<Effect> {
        let Some(job) = model.job.as_mut() else {
            return Vec::new();
        };
        if !job.is_editable() || patch.is_empty() {
            return Vec::new();
        }

        if let Some(cause) = &patch.cause {
            job.cause = cause.clone();
        }
        if let Some(correction) = &patch.correction {
            job.correction = correction.clone();
        }
        if let Some(vehicle_id) = &patch.vehicle_id {
            job.vehicle.vehicle_id = Some(vehicle_id.clone());
        }
        if let Some(vin) = &patch.vehicle_vin {
            job.vehicle.vehicle_vin = Some(vin.clone());
        }
        if let Some(mileage) = &patch.mileage {
            job.vehicle.mileage = Some(mileage.clone());
        }
        if let Some(unit_no) = &patch.unit_no {
            job.vehicle.unit_no = Some(unit_no.clone());
        }
        if let Some(make_model) = &patch.make_model {
            job.vehicle.make_model = Some(make_model.clone());
        }

        model.pending_patch.merge(patch);
        let token = model.auto_save.schedule();
        vec![
            Effect::ScheduleAutoSave {
                delay_ms: AUTO_SAVE_DEBOUNCE_MS,
                token,
            },
            Effect::Render,
        ]
    }

    fn emit_pending_patch(&self, model: &mut Model) -> Vec<Effect> {
        if model.pending_patch.is_empty() {
            return Vec::new();
        }
        let Some(job) = &model.job else {
            return Vec::new();
        };
        let patch = std::mem::take(&mut model.pending_patch);
        match model.api.patch_job(&job.id, &patch) {
            Ok(request) => vec![Effect::Http {
                purpose: HttpPurpose::JobPatch,
                request,
            }],
            Err(err) => {
                error!(error = %err, "could not build auto-save patch");
                Vec::new()
            }
        }
    }

    fn handle_submit(
        &self,
        model: &mut Model,
        customer_name: String,
        location: String,
    ) -> Vec<Effect> {
        let api = model.api.clone();
        let Some(session) = model.session.as_mut() else {
            return Vec::new();
        };
        match session.submit(customer_name, location) {
            Ok(cmd) => {
                let mut effects = self.run_session_cmds(api, session, vec![cmd]);
                effects.push(Effect::Render);
                effects
            }
            Err(SubmitBlocked::Validation(err)) => {
                model.active_error =
                    Some(AppError::new(ErrorKind::Validation, err.to_string()));
                vec![Effect::Render]
            }
            Err(SubmitBlocked::AlreadyInFlight) => {
                debug!("submit ignored, one already in flight");
                Vec::new()
            }
        }
    }

    /// Routes a session callback and translates the resulting commands into
    /// effects. No-op when no checklist screen is open.
    fn with_session(
        &self,
        model: &mut Model,
        f: impl FnOnce(&mut ChecklistSession) -> Vec<SessionCmd>,
    ) -> Vec<Effect> {
        let api = model.api.clone();
        let Some(session) = model.session.as_mut() else {
            return Vec::new();
        };
        let cmds = f(session);
        let mut effects = self.run_session_cmds(api, session, cmds);
        effects.push(Effect::Render);
        effects
    }

    fn run_session_cmds(
        &self,
        api: Api,
        session: &mut ChecklistSession,
        cmds: Vec<SessionCmd>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        for cmd in cmds {
            match cmd {
                SessionCmd::LoadLocal => effects.push(Effect::KvGet {
                    key: session.key.as_str().to_string(),
                }),
                SessionCmd::FetchRemote => {
                    let Some(job_id) = &session.job_id else {
                        continue;
                    };
                    match api.fetch_inspection(job_id) {
                        Ok(request) => effects.push(Effect::Http {
                            purpose: HttpPurpose::InspectionFetch,
                            request,
                        }),
                        Err(err) => error!(error = %err, "could not build inspection fetch"),
                    }
                }
                SessionCmd::SaveDraft => match session.draft.encode() {
                    Ok(value) => effects.push(Effect::KvSet {
                        key: session.key.as_str().to_string(),
                        value,
                    }),
                    Err(err) => warn!(error = %err, "draft encode failed, skipping save"),
                },
                SessionCmd::ClearDraft => effects.push(Effect::KvDelete {
                    key: session.key.as_str().to_string(),
                }),
                SessionCmd::Submit(submission) => {
                    let Some(job_id) = &session.job_id else {
                        continue;
                    };
                    match api.submit_inspection(job_id, &submission) {
                        Ok(request) => effects.push(Effect::Http {
                            purpose: HttpPurpose::InspectionSubmit,
                            request,
                        }),
                        Err(err) => error!(error = %err, "could not build inspection submit"),
                    }
                }
            }
        }
        effects
    }

    /// Reconciles the ticker with whether the screen is mounted and the job
    /// is actively accruing time. Emits at most one start or stop.
    fn sync_ticker(&self, model: &mut Model) -> Vec<Effect> {
        let should_run = model.job_screen_mounted
            && model
                .job
                .as_ref()
                .is_some_and(|job| job.mechanic_status.is_active());

        if should_run && !model.ticker_running {
            model.ticker_running = true;
            vec![Effect::StartTicker]
        } else if !should_run && model.ticker_running {
            model.ticker_running = false;
            vec![Effect::StopTicker]
        } else {
            Vec::new()
        }
    }
}

fn to_unit_result(result: HttpResult) -> Result<(), HttpError> {
    match result {
        Ok(response) if response.is_success() => Ok(()),
        Ok(response) => Err(HttpError::Status {
            status: response.status(),
            message: String::from_utf8_lossy(response.body())
                .chars()
                .take(200)
                .collect(),
        }),
        Err(err) => Err(err),
    }
}

fn to_inspection_result(result: HttpResult) -> Result<RemoteInspection, HttpError> {
    match result {
        Ok(response) if response.is_success() => response.json(),
        Ok(response) => Err(HttpError::Status {
            status: response.status(),
            message: String::from_utf8_lossy(response.body())
                .chars()
                .take(200)
                .collect(),
        }),
        Err(err) => Err(err),
    }
}
