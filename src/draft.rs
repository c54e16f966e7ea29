//! Checklist draft: the locally-owned, not-yet-submitted inspection data for
//! one job. Lives in key-value storage between app restarts and is removed
//! only by a successful submission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChecklistTemplateId, JobId};

pub const DRAFT_KEY_VERSION: u32 = 1;

/// Per-item inspection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pass,
    Fail,
    Na,
}

impl ItemStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pass => "pass",
            ItemStatus::Fail => "fail",
            ItemStatus::Na => "na",
        }
    }
}

/// Wheel-position keyed readings. Values stay as entered text; parsing and
/// unit handling belong to whoever consumes the submitted inspection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurements {
    pub pushrod_stroke: BTreeMap<String, String>,
    pub tread_depth: BTreeMap<String, String>,
    pub tire_pressure: BTreeMap<String, String>,
}

impl Measurements {
    pub fn is_empty(&self) -> bool {
        self.pushrod_stroke.is_empty()
            && self.tread_depth.is_empty()
            && self.tire_pressure.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChecklistDraft {
    pub status_map: BTreeMap<String, ItemStatus>,
    pub notes_map: BTreeMap<String, String>,
    pub measurements: Measurements,
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
}

impl ChecklistDraft {
    /// True when no mechanic-entered field is populated. The display
    /// snapshots (`business_info`, `vehicle_info`) are seeded at mount and do
    /// not count, otherwise every fresh draft would look edited.
    pub fn is_empty(&self) -> bool {
        self.status_map.is_empty()
            && self.notes_map.values().all(|n| n.trim().is_empty())
            && self.measurements.is_empty()
            && self.inspector_name.trim().is_empty()
            && self.inspection_date.trim().is_empty()
            && self.additional_notes.trim().is_empty()
    }

    /// Submission gate: every item answered, every failure explained, and an
    /// inspector named.
    pub fn validate(&self, template: &ChecklistTemplate) -> Result<(), DraftValidationError> {
        if self.inspector_name.trim().is_empty() {
            return Err(DraftValidationError::MissingInspectorName);
        }
        for item in &template.items {
            match self.status_map.get(&item.id) {
                None => {
                    return Err(DraftValidationError::MissingItemStatus {
                        item_id: item.id.clone(),
                    });
                }
                Some(ItemStatus::Fail) => {
                    let has_notes = self
                        .notes_map
                        .get(&item.id)
                        .is_some_and(|n| !n.trim().is_empty());
                    if !has_notes {
                        return Err(DraftValidationError::MissingFailureNotes {
                            item_id: item.id.clone(),
                        });
                    }
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, DraftStoreError> {
        serde_json::to_vec(self).map_err(|e| DraftStoreError::Serialization {
            message: e.to_string(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DraftStoreError> {
        serde_json::from_slice(bytes).map_err(|e| DraftStoreError::Serialization {
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub id: ChecklistTemplateId,
    pub items: Vec<ChecklistItem>,
}

/// Storage key for one draft. Derived from the job identity; a checklist with
/// no job yet falls back to its template identity so it still survives
/// restarts. The two derivations are namespaced so they can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey(String);

impl DraftKey {
    pub fn for_job(job_id: &JobId) -> Self {
        Self(Self::derive("job", job_id.as_str()))
    }

    pub fn for_template(template_id: &ChecklistTemplateId) -> Self {
        Self(Self::derive("template", template_id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn derive(kind: &str, id: &str) -> String {
        let hash = blake3::hash(format!("{}:{}", kind, id).as_bytes());
        format!("pm_draft_v{}_{}", DRAFT_KEY_VERSION, &hash.to_hex()[..16])
    }
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftValidationError {
    #[error("inspector name is required")]
    MissingInspectorName,

    #[error("checklist item '{item_id}' has no status")]
    MissingItemStatus { item_id: String },

    #[error("failed item '{item_id}' requires notes")]
    MissingFailureNotes { item_id: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStoreError {
    #[error("draft serialization failed: {message}")]
    Serialization { message: String },
}
