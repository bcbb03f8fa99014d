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

fn annual_snapshot() -> serde_json::Value {
    json!({
        "students": [
            { "id": "a", "firstName": "Awa", "lastName": "Ndongo" },
            { "id": "b", "firstName": "Biko", "lastName": "Essomba" }
        ],
        "subjects": [
            { "id": 101, "name": "Mathematics", "coefficient": 2.0, "subjectGroupId": 1, "order": 1 },
            { "id": 102, "name": "French", "coefficient": 3.0, "subjectGroupId": 1, "order": 2 }
        ],
        "subjectGroups": [
            { "id": 1, "name": "General", "order": 1 }
        ],
        "terms": [
            { "id": "seq-1", "name": "Sequence 1", "order": 1 },
            { "id": "seq-2", "name": "Sequence 2", "order": 2 },
            { "id": "seq-3", "name": "Sequence 3", "order": 3 }
        ],
        "gradeEntries": [
            // Student a is unenrolled in term 2 for maths.
            { "studentId": "a", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 12.0, "scale": 20.0 },
            { "studentId": "a", "subjectId": 101, "gradeSheetId": 2, "termId": "seq-3", "value": 16.0, "scale": 20.0 },
            { "studentId": "a", "subjectId": 102, "gradeSheetId": 3, "termId": "seq-1", "value": 10.0, "scale": 20.0 },
            { "studentId": "b", "subjectId": 101, "gradeSheetId": 1, "termId": "seq-1", "value": 9.0, "scale": 20.0 },
            { "studentId": "b", "subjectId": 101, "gradeSheetId": 4, "termId": "seq-2", "value": 11.0, "scale": 20.0 }
        ]
    })
}

#[test]
fn annual_report_averages_only_graded_terms() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "snapshot.load",
        json!({ "snapshot": annual_snapshot() }),
    );
    let report = request_ok(&mut stdin, &mut reader, "r2", "reportcard.annual", json!({}));

    assert_eq!(report["termId"], serde_json::Value::Null);
    assert_eq!(report["termIds"].as_array().map(|v| v.len()), Some(3));

    let a = &report["students"][0];
    let maths = &a["subjects"][0];
    // (12 + 16) / 2, the ungraded middle term never counts as zero.
    assert_eq!(maths["average"], 14.0);
    assert_eq!(maths["termAverages"], json!([12.0, null, 16.0]));

    // Annual overall re-applies the coefficient reduction: (14*2 + 10*3) / 5.
    assert_eq!(a["overallAverage"], 11.6);
    assert_eq!(a["termOveralls"], json!([10.8, null, 16.0]));

    let b = &report["students"][1];
    // French never graded for b: excluded entirely from the totals.
    assert_eq!(b["subjects"][1]["average"], serde_json::Value::Null);
    assert_eq!(b["totalCoefficient"], 2.0);
    assert_eq!(b["overallAverage"], 10.0);

    let _ = child.kill();
}

#[test]
fn annual_report_is_idempotent() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "snapshot.load",
        json!({ "snapshot": annual_snapshot() }),
    );
    let first = request_ok(&mut stdin, &mut reader, "r2", "reportcard.annual", json!({}));
    let second = request_ok(&mut stdin, &mut reader, "r3", "reportcard.annual", json!({}));
    assert_eq!(first, second);

    let _ = child.kill();
}
