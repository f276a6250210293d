use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_pondokd");
    let mut child = Command::new(exe)
        .env_remove("PONDOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pondokd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = tempfile::tempdir().expect("temp workspace");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "halaqahs.create",
        json!({ "name": "Halaqah Smoke" }),
    );
    let halaqah_id = created
        .get("result")
        .and_then(|v| v.get("halaqahId"))
        .and_then(|v| v.as_str())
        .expect("halaqahId")
        .to_string();
    let _ = request(&mut stdin, &mut reader, "4", "halaqahs.list", json!({}));

    let created_student = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "name": "Smoke Santri", "halaqahId": halaqah_id }),
    );
    let student_id = created_student
        .get("result")
        .and_then(|v| v.get("studentId"))
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.update",
        json!({ "studentId": student_id, "patch": { "active": true } }),
    );
    let _ = request(&mut stdin, &mut reader, "7", "students.list", json!({}));

    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.record",
        json!({ "studentId": student_id, "date": "2025-07-01", "status": "present" }),
    );
    let _ = request(&mut stdin, &mut reader, "9", "attendance.list", json!({}));
    let mem = request(
        &mut stdin,
        &mut reader,
        "10",
        "memorization.create",
        json!({ "studentId": student_id, "date": "2025-07-01", "target": 2, "actual": 1 }),
    );
    let record_id = mem
        .get("result")
        .and_then(|v| v.get("record"))
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "memorization.update",
        json!({ "recordId": record_id, "patch": { "actual": 2 } }),
    );
    let _ = request(&mut stdin, &mut reader, "12", "memorization.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "expenses.create",
        json!({ "studentId": student_id, "date": "2025-07-01", "amount": 5000, "category": "snack" }),
    );
    let _ = request(&mut stdin, &mut reader, "14", "expenses.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "activities.record",
        json!({ "studentId": student_id, "date": "2025-07-01", "activities": { "tahajud": true } }),
    );
    let _ = request(&mut stdin, &mut reader, "16", "activities.list", json!({}));

    let window = json!({ "month": 6, "year": 2025 });
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "calc.memorizationSummary",
        json!({ "studentId": student_id, "window": window }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "18",
        "calc.windowTotal",
        json!({ "studentId": student_id, "window": window, "collection": "memorization", "field": "actual" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "calc.attendanceSummary",
        json!({ "studentId": student_id, "window": window }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "calc.expenseSummary",
        json!({ "halaqahId": halaqah_id, "window": window }),
    );
    for (i, board) in ["memorization", "attendance", "activities", "finance"].iter().enumerate() {
        let _ = request(
            &mut stdin,
            &mut reader,
            &format!("21-{}", i),
            "calc.leaderboard",
            json!({ "board": board }),
        );
    }
    let _ = request(&mut stdin, &mut reader, "22", "setup.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "23",
        "setup.update",
        json!({ "section": "leaderboard", "patch": { "size": 5 } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "halaqahs.delete",
        json!({ "halaqahId": halaqah_id }),
    );

    drop(stdin);
    let _ = child.wait();
}
