use crate::types::{Clef, Lang};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum CoachError {
    #[error("coach returned http status {status}")]
    Http { status: u16 },
    #[error("coach transport error: {0}")]
    Transport(String),
    #[error("coach reply could not be decoded: {0}")]
    Decode(String),
    #[error("no coach backend configured")]
    Unavailable,
}

/// Body of the coaching POST.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoachRequest {
    pub message: String,
    pub clef: Clef,
    pub lang: Lang,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachReply {
    #[serde(default)]
    pub reply_text: String,
    #[serde(default)]
    pub challenge_data: Option<serde_json::Value>,
}

impl CoachReply {
    pub fn from_json(data: &[u8]) -> Result<Self, CoachError> {
        serde_json::from_slice(data).map_err(|e| CoachError::Decode(e.to_string()))
    }
}

impl CoachRequest {
    pub fn to_json(&self) -> Result<Vec<u8>, CoachError> {
        serde_json::to_vec(self).map_err(|e| CoachError::Decode(e.to_string()))
    }
}

/// Remote coaching collaborator. May block for a network round trip.
pub trait CoachPort: Send + Sync {
    fn ask_coach(&self, request: &CoachRequest) -> Result<CoachReply, CoachError>;
}

/// Coach used when no backend is configured: every call fails, so callers use
/// their local fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineCoach;

impl CoachPort for OfflineCoach {
    fn ask_coach(&self, _request: &CoachRequest) -> Result<CoachReply, CoachError> {
        Err(CoachError::Unavailable)
    }
}
