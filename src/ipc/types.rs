use serde::Deserialize;

use crate::model::Snapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The sidecar holds at most one cohort snapshot at a time; every report
/// method recomputes from it on demand.
pub struct AppState {
    pub snapshot: Option<Snapshot>,
}
