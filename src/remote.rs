//! Request builders for the job and inspection API. Builders only construct
//! `HttpRequest` values; issuing them and routing responses is the shell's
//! job. Status and submit calls carry an `Idempotency-Key` so at-least-once
//! delivery cannot double-apply a transition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::draft::{ChecklistDraft, ItemStatus, Measurements};
use crate::effect::{HttpError, HttpRequest};
use crate::status::StatusCallKind;
use crate::{
    JobId, AUTO_SAVE_TIMEOUT_MS, INSPECTION_FETCH_TIMEOUT_MS, INSPECTION_SUBMIT_TIMEOUT_MS,
    STATUS_CALL_TIMEOUT_MS,
};

#[derive(Debug, Clone, Serialize)]
struct PauseBody<'a> {
    reason: &'a str,
}

/// Partial job update sent by the debounced auto-save. Absent fields are left
/// untouched server-side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    #[serde(rename = "vehicleId", skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_vin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make_model: Option<String>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        self.cause.is_none()
            && self.correction.is_none()
            && self.vehicle_id.is_none()
            && self.vehicle_vin.is_none()
            && self.mileage.is_none()
            && self.unit_no.is_none()
            && self.make_model.is_none()
    }

    /// Folds `other` into `self`, later values winning per field.
    pub fn merge(&mut self, other: JobPatch) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(cause);
        take!(correction);
        take!(vehicle_id);
        take!(vehicle_vin);
        take!(mileage);
        take!(unit_no);
        take!(make_model);
    }
}

/// Submitted inspection as the server returns it. Shape mirrors the draft so
/// a previously submitted inspection can seed the editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteInspection {
    #[serde(default)]
    pub inspector_name: String,
    #[serde(default)]
    pub inspection_date: String,
    #[serde(default)]
    pub additional_notes: String,
    #[serde(default)]
    pub business_info: serde_json::Value,
    #[serde(default)]
    pub vehicle_info: serde_json::Value,
    #[serde(default)]
    pub status_map: BTreeMap<String, ItemStatus>,
    #[serde(default)]
    pub notes_map: BTreeMap<String, String>,
    #[serde(default)]
    pub measurements: Measurements,
}

impl RemoteInspection {
    pub fn into_draft(self) -> ChecklistDraft {
        ChecklistDraft {
            status_map: self.status_map,
            notes_map: self.notes_map,
            measurements: self.measurements,
            inspector_name: self.inspector_name,
            inspection_date: self.inspection_date,
            additional_notes: self.additional_notes,
            business_info: self.business_info,
            vehicle_info: self.vehicle_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistAnswer {
    pub status: ItemStatus,
    #[serde(default)]
    pub notes: String,
}

/// Submission payload for `POST /jobs/{id}/pm-inspection/submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionSubmission {
    pub business_info: serde_json::Value,
    pub vehicle_info: serde_json::Value,
    pub checklist: BTreeMap<String, ChecklistAnswer>,
    pub measurements: Measurements,
    pub additional_notes: String,
    pub inspector_name: String,
    pub inspection_date: String,
    pub customer_name: String,
    pub location: String,
}

impl InspectionSubmission {
    pub fn from_draft(draft: &ChecklistDraft, customer_name: String, location: String) -> Self {
        let checklist = draft
            .status_map
            .iter()
            .map(|(item_id, status)| {
                let notes = draft.notes_map.get(item_id).cloned().unwrap_or_default();
                (
                    item_id.clone(),
                    ChecklistAnswer {
                        status: *status,
                        notes,
                    },
                )
            })
            .collect();

        Self {
            business_info: draft.business_info.clone(),
            vehicle_info: draft.vehicle_info.clone(),
            checklist,
            measurements: draft.measurements.clone(),
            additional_notes: draft.additional_notes.clone(),
            inspector_name: draft.inspector_name.clone(),
            inspection_date: draft.inspection_date.clone(),
            customer_name,
            location,
        }
    }
}

/// Endpoint builders rooted at one base URL. The base is validated up front
/// so every derived request URL is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    base_url: String,
}

impl Api {
    pub fn new(base_url: impl Into<String>) -> Result<Self, HttpError> {
        let base_url = base_url.into();
        crate::effect::ValidatedUrl::new(base_url.as_str())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn job_url(&self, job_id: &JobId, suffix: &str) -> String {
        format!("{}/jobs/{}{}", self.base_url, job_id.as_str(), suffix)
    }

    pub fn status_call(
        &self,
        job_id: &JobId,
        kind: &StatusCallKind,
    ) -> Result<HttpRequest, HttpError> {
        let request = match kind {
            StatusCallKind::Start => HttpRequest::post(self.job_url(job_id, "/timer/start"))?,
            StatusCallKind::Resume => HttpRequest::post(self.job_url(job_id, "/timer/resume"))?,
            StatusCallKind::Pause { reason } => {
                HttpRequest::post(self.job_url(job_id, "/pause"))?
                    .with_json(&PauseBody { reason })?
            }
            StatusCallKind::Arrived => HttpRequest::post(self.job_url(job_id, "/arrived"))?,
            StatusCallKind::Complete => HttpRequest::post(self.job_url(job_id, "/complete"))?,
        };
        request
            .with_header("Idempotency-Key", uuid::Uuid::new_v4().to_string())?
            .with_timeout_ms(STATUS_CALL_TIMEOUT_MS)
    }

    pub fn patch_job(&self, job_id: &JobId, patch: &JobPatch) -> Result<HttpRequest, HttpError> {
        HttpRequest::patch(self.job_url(job_id, ""))?
            .with_json(patch)?
            .with_timeout_ms(AUTO_SAVE_TIMEOUT_MS)
    }

    pub fn fetch_inspection(&self, job_id: &JobId) -> Result<HttpRequest, HttpError> {
        HttpRequest::get(self.job_url(job_id, "/pm-inspection"))?
            .with_timeout_ms(INSPECTION_FETCH_TIMEOUT_MS)
    }

    pub fn submit_inspection(
        &self,
        job_id: &JobId,
        submission: &InspectionSubmission,
    ) -> Result<HttpRequest, HttpError> {
        HttpRequest::post(self.job_url(job_id, "/pm-inspection/submit"))?
            .with_json(submission)?
            .with_header("Idempotency-Key", uuid::Uuid::new_v4().to_string())?
            .with_timeout_ms(INSPECTION_SUBMIT_TIMEOUT_MS)
    }
}
