use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .args(["--log-level", "off"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn create_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    student_ids: &[String],
) -> String {
    let r = request_ok(
        stdin,
        reader,
        id,
        "classes.create",
        json!({
            "courseName": name,
            "days": ["Sexta"],
            "time": "10:00",
            "frequency": 2,
            "year": 2024,
            "semester": "1º Semestre",
            "startDate": "2024-02-15",
            "endDate": "2024-06-15",
            "studentIds": student_ids,
        }),
    );
    r["class"]["id"].as_str().expect("class id").to_string()
}

fn class_ids(result: &serde_json::Value) -> Vec<String> {
    result["classes"]
        .as_array()
        .expect("classes")
        .iter()
        .map(|c| c["id"].as_str().expect("id").to_string())
        .collect()
}

#[test]
fn clone_to_next_term_archives_and_copies_without_students() {
    let workspace = temp_dir("attendance-term-clone");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = request_ok(&mut stdin, &mut reader, "2", "students.create", json!({ "name": "Ana" }));
    let ana = student["student"]["id"].as_str().expect("id").to_string();
    let c1 = create_class(&mut stdin, &mut reader, "3", "Piano", &[ana.clone()]);
    let c2 = create_class(&mut stdin, &mut reader, "4", "Canto", &[]);

    let cloned = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.cloneToTerm",
        json!({ "year": 2024, "semester": "2º Semestre" }),
    );
    assert_eq!(cloned["archived"], 2);
    assert_eq!(cloned["createdClassIds"].as_array().expect("ids").len(), 2);

    let next = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.list",
        json!({ "year": 2024, "semester": "2º semestre" }),
    );
    let rows = next["classes"].as_array().expect("classes");
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["archived"], false);
        assert!(row["studentIds"].as_array().expect("ids").is_empty());
        assert!(row["startDate"].is_null());
        assert_eq!(row["frequency"], 2);
        assert_eq!(row["time"], "10:00");
    }

    let old = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "classes.list",
        json!({ "year": 2024, "semester": "1º Semestre" }),
    );
    let old_ids = class_ids(&old);
    assert_eq!(old_ids, vec![c1.clone(), c2.clone()]);
    assert!(old["classes"][0]["archived"].as_bool().expect("archived"));
    assert_eq!(old["classes"][0]["studentIds"][0], ana.as_str());

    let active_only = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.list",
        json!({ "includeArchived": false }),
    );
    assert_eq!(class_ids(&active_only).len(), 2);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn clone_with_no_active_classes_fails() {
    let workspace = temp_dir("attendance-term-clone-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.cloneToTerm",
        json!({ "year": 2025, "semester": "1º Semestre" }),
    );
    assert_eq!(error_code(&resp), "validation_failed");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reorder_and_term_dates() {
    let workspace = temp_dir("attendance-term-reorder");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let a = create_class(&mut stdin, &mut reader, "2", "A", &[]);
    let b = create_class(&mut stdin, &mut reader, "3", "B", &[]);
    let c = create_class(&mut stdin, &mut reader, "4", "C", &[]);

    let reordered = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.reorder",
        json!({ "classIds": [c, a, b] }),
    );
    let order: Vec<&str> = reordered["classIds"]
        .as_array()
        .expect("ids")
        .iter()
        .map(|v| v.as_str().expect("id"))
        .collect();
    assert_eq!(order, vec![c.as_str(), a.as_str(), b.as_str()]);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.updateTermDates",
        json!({
            "year": 2024,
            "semester": "1º Semestre",
            "startDate": "2024-03-01",
            "endDate": "2024-03-31",
        }),
    );
    assert_eq!(updated["updated"], 3);

    // Fridays in March 2024.
    let sheet = request_ok(&mut stdin, &mut reader, "7", "attendance.sheetOpen", json!({ "classId": a }));
    assert_eq!(sheet["dates"].as_array().expect("dates").len(), 5);

    let listed = request_ok(&mut stdin, &mut reader, "8", "classes.list", json!({}));
    assert_eq!(class_ids(&listed), vec![c.clone(), a.clone(), b.clone()]);
    assert_eq!(listed["classes"][0]["position"], 0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
