// ── Aggregate outputs ──

use std::sync::Arc;

use serde::Serialize;

use obdstream_api::TroubleCode;

/// Latest trouble-code answer.
///
/// `Received` with an empty list means the vehicle reported no codes,
/// which is different from not having heard back yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "codes", rename_all = "snake_case")]
pub enum TroubleCodeState {
    #[default]
    Unknown,
    Received(Arc<Vec<TroubleCode>>),
}

impl TroubleCodeState {
    pub fn received(codes: Vec<TroubleCode>) -> Self {
        Self::Received(Arc::new(codes))
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Received(_))
    }

    /// Codes if received, `None` while unknown.
    pub fn codes(&self) -> Option<&[TroubleCode]> {
        match self {
            Self::Unknown => None,
            Self::Received(codes) => Some(codes.as_slice()),
        }
    }
}
