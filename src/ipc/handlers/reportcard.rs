use serde_json::json;

use crate::appreciation::AppreciationTable;
use crate::calc;
use crate::ipc::error::{err, err_calc, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Snapshot;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn loaded_snapshot<'a>(state: &'a AppState, req: &Request) -> Result<&'a Snapshot, serde_json::Value> {
    state
        .snapshot
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_snapshot", "load a snapshot first", None))
}

fn handle_term(state: &AppState, req: &Request) -> serde_json::Value {
    let snapshot = match loaded_snapshot(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::term_report(snapshot, &term_id) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => err_calc(&req.id, e),
    }
}

fn handle_annual(state: &AppState, req: &Request) -> serde_json::Value {
    let snapshot = match loaded_snapshot(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::annual_report(snapshot) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => err_calc(&req.id, e),
    }
}

fn handle_student(state: &AppState, req: &Request) -> serde_json::Value {
    let snapshot = match loaded_snapshot(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::student_term_view(snapshot, &student_id, &term_id) {
        Ok(view) => ok(&req.id, json!(view)),
        Err(e) => err_calc(&req.id, e),
    }
}

/// Standalone band lookup for gradesheet printouts: maps one average through
/// the loaded bands without building a whole report.
fn handle_appreciation_lookup(state: &AppState, req: &Request) -> serde_json::Value {
    let snapshot = match loaded_snapshot(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let average = match req.params.get("average") {
        None => return err(&req.id, "bad_params", "missing average", None),
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_f64() {
            Some(n) => Some(n),
            None => return err(&req.id, "bad_params", "average must be a number or null", None),
        },
    };

    if snapshot.appreciation_bands.is_empty() {
        return ok(&req.id, json!({ "appreciation": null }));
    }
    let table = match AppreciationTable::new(&snapshot.appreciation_bands, snapshot.scale) {
        Ok(t) => t,
        Err(e) => return err_calc(&req.id, e),
    };
    let label = average.and_then(|v| table.label(v));
    ok(&req.id, json!({ "appreciation": label }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reportcard.term" => Some(handle_term(state, req)),
        "reportcard.annual" => Some(handle_annual(state, req)),
        "reportcard.student" => Some(handle_student(state, req)),
        "appreciations.lookup" => Some(handle_appreciation_lookup(state, req)),
        _ => None,
    }
}
