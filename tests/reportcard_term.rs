use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportcardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportcardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn scenario_snapshot() -> serde_json::Value {
    json!({
        "scale": 20.0,
        "students": [
            { "id": "a", "firstName": "Awa", "lastName": "Ndongo" },
            { "id": "b", "firstName": "Biko", "lastName": "Essomba" },
            { "id": "c", "firstName": "Chantal", "lastName": "Abena" }
        ],
        "subjects": [
            { "id": 101, "name": "Mathematics", "coefficient": 2.0, "subjectGroupId": 1, "order": 1 },
            { "id": 102, "name": "French", "coefficient": 3.0, "subjectGroupId": 2, "order": 2 }
        ],
        "subjectGroups": [
            { "id": 1, "name": "Sciences", "order": 1 },
            { "id": 2, "name": "Languages", "order": 2 }
        ],
        "terms": [
            { "id": "seq-1", "name": "Sequence 1", "order": 1 }
        ],
        "gradeEntries": [
            { "studentId": "a", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 14.0, "scale": 20.0, "weight": 1.0 },
            { "studentId": "a", "subjectId": 102, "gradeSheetId": 2, "termId": "seq-1", "value": 10.0, "scale": 20.0, "weight": 1.0 },
            { "studentId": "b", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 8.0, "scale": 20.0, "weight": 1.0 },
            { "studentId": "b", "subjectId": 102, "gradeSheetId": 2, "termId": "seq-1", "value": 12.0, "scale": 20.0, "weight": 1.0 },
            { "studentId": "c", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 10.0, "scale": 20.0, "weight": 1.0 }
        ],
        "appreciationBands": []
    })
}

#[test]
fn term_report_over_ipc_matches_expected_figures() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let loaded = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "snapshot.load",
        json!({ "snapshot": scenario_snapshot() }),
    );
    assert_eq!(loaded["students"], 3);
    assert_eq!(loaded["acceptedEntries"], 5);
    assert_eq!(loaded["rejected"].as_array().map(|v| v.len()), Some(0));

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "reportcard.term",
        json!({ "termId": "seq-1" }),
    );
    assert_eq!(report["termId"], "seq-1");

    let students = report["students"].as_array().expect("students");
    assert_eq!(students.len(), 3);
    let a = &students[0];
    let b = &students[1];
    let c = &students[2];

    assert_eq!(a["displayName"], "Ndongo, Awa");
    assert_eq!(a["overallAverage"], 11.6);
    assert_eq!(a["totalPoints"], 58.0);
    assert_eq!(a["totalCoefficient"], 5.0);
    assert_eq!(a["rank"], 1);
    // (8*2 + 12*3) / 5
    assert_eq!(b["overallAverage"], 10.4);
    assert_eq!(b["rank"], 2);
    assert_eq!(c["overallAverage"], 10.0);
    assert_eq!(c["totalCoefficient"], 2.0);
    assert_eq!(c["rank"], 3);

    // C has no French grade: null line, excluded from totals.
    assert_eq!(c["subjects"][1]["average"], serde_json::Value::Null);
    assert_eq!(c["subjects"][1]["rank"], serde_json::Value::Null);

    // Group subtotals only cover graded subjects.
    assert_eq!(c["groups"][1]["coefficient"], 0.0);
    assert_eq!(c["groups"][1]["average"], serde_json::Value::Null);
    assert_eq!(c["groups"][0]["points"], 20.0);

    // Per-subject cohort statistics skip ungraded students.
    let french = &report["perSubject"][1]["statistic"];
    assert_eq!(french["gradedCount"], 2);
    assert_eq!(french["min"], 10.0);
    assert_eq!(french["max"], 12.0);
    assert_eq!(french["average"], 11.0);

    let global = &report["global"];
    assert_eq!(global["gradedCount"], 3);
    assert_eq!(global["max"], 11.6);
    assert_eq!(global["min"], 10.0);

    let _ = child.kill();
}

#[test]
fn student_view_over_ipc_includes_cohort_spread() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "snapshot.load",
        json!({ "snapshot": scenario_snapshot() }),
    );

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "reportcard.student",
        json!({ "studentId": "c", "termId": "seq-1" }),
    );
    assert_eq!(view["studentId"], "c");
    assert_eq!(view["overallAverage"], 10.0);
    assert_eq!(view["rank"], 3);

    let maths = &view["subjects"][0];
    assert_eq!(maths["average"], 10.0);
    assert_eq!(maths["gradedCount"], 3);
    assert_eq!(maths["cohort"]["min"], 8.0);
    assert_eq!(maths["cohort"]["max"], 14.0);

    let _ = child.kill();
}

#[test]
fn tied_averages_share_rank_and_skip_next() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let mut snapshot = scenario_snapshot();
    snapshot["subjects"] = json!([
        { "id": 101, "name": "Mathematics", "coefficient": 1.0, "subjectGroupId": 1, "order": 1 }
    ]);
    snapshot["gradeEntries"] = json!([
        { "studentId": "a", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 15.0, "scale": 20.0 },
        { "studentId": "b", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 15.0, "scale": 20.0 },
        { "studentId": "c", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 12.0, "scale": 20.0 }
    ]);

    request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "snapshot.load",
        json!({ "snapshot": snapshot }),
    );
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "reportcard.term",
        json!({ "termId": "seq-1" }),
    );
    let students = report["students"].as_array().expect("students");
    assert_eq!(students[0]["rank"], 1);
    assert_eq!(students[1]["rank"], 1);
    assert_eq!(students[2]["rank"], 3);

    let _ = child.kill();
}
