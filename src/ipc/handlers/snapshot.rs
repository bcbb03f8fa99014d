use serde_json::json;

use crate::ipc::error::{err, err_calc, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{normalize_entries, Snapshot};

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("snapshot") else {
        return err(&req.id, "bad_params", "missing params.snapshot", None);
    };
    let snapshot: Snapshot = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_snapshot", e.to_string(), None),
    };
    if let Err(e) = snapshot.check_preconditions() {
        return err_calc(&req.id, e);
    }

    let (accepted, rejected) = normalize_entries(&snapshot);
    let result = json!({
        "scale": snapshot.scale,
        "students": snapshot.students.len(),
        "subjects": snapshot.subjects.len(),
        "subjectGroups": snapshot.subject_groups.len(),
        "terms": snapshot.terms.len(),
        "acceptedEntries": accepted.len(),
        "rejected": rejected,
    });
    state.snapshot = Some(snapshot);
    ok(&req.id, result)
}

fn handle_info(state: &AppState, req: &Request) -> serde_json::Value {
    match &state.snapshot {
        None => ok(&req.id, json!({ "loaded": false })),
        Some(snapshot) => ok(
            &req.id,
            json!({
                "loaded": true,
                "scale": snapshot.scale,
                "students": snapshot.students.len(),
                "subjects": snapshot.subjects.len(),
                "subjectGroups": snapshot.subject_groups.len(),
                "terms": snapshot.terms.len(),
                "gradeEntries": snapshot.grade_entries.len(),
                "appreciationBands": snapshot.appreciation_bands.len(),
            }),
        ),
    }
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_loaded = state.snapshot.take().is_some();
    ok(&req.id, json!({ "cleared": was_loaded }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshot.load" => Some(handle_load(state, req)),
        "snapshot.info" => Some(handle_info(state, req)),
        "snapshot.clear" => Some(handle_clear(state, req)),
        _ => None,
    }
}
