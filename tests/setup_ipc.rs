mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn setup_defaults_patch_and_persist() {
    let workspace = temp_dir("resultd-setup");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        defaults.get("results"),
        Some(&json!({ "subjectFallback": true, "showGeneratedAt": true }))
    );
    assert_eq!(
        defaults.get("marks"),
        Some(&json!({ "t1Max": 100.0, "examsMax": 100.0, "totalMax": 100.0 }))
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "marks", "patch": { "t1Max": 30 } }),
    );
    assert_eq!(
        updated.get("value"),
        Some(&json!({ "t1Max": 30.0, "examsMax": 100.0, "totalMax": 100.0 }))
    );

    let bad_field = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "marks", "patch": { "curve": 2 } }),
    );
    assert_eq!(error_code(&bad_field), Some("bad_params"));
    let bad_value = request(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "marks", "patch": { "examsMax": 0 } }),
    );
    assert_eq!(error_code(&bad_value), Some("bad_params"));
    let bad_section = request(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(error_code(&bad_section), Some("bad_params"));
    drop(stdin);
    let _ = child.wait();

    // A fresh process sees the stored values.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let reloaded = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        reloaded.pointer("/marks/t1Max").and_then(|v| v.as_f64()),
        Some(30.0)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn marks_bounds_follow_setup() {
    let workspace = temp_dir("resultd-setup-bounds");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (class_id, exam_id, subjects, students) =
        seed_class(&mut stdin, &mut reader, &["Math"], &["Ada"]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "section": "marks", "patch": { "t1Max": 30, "examsMax": 70 } }),
    );

    let too_high = request(
        &mut stdin,
        &mut reader,
        "3",
        "marks.save",
        json!({
            "classId": class_id,
            "examId": exam_id,
            "subjectId": subjects[0],
            "entries": [{ "studentId": students[0], "t1": 31, "exams": 50 }]
        }),
    );
    assert_eq!(error_code(&too_high), Some("bad_params"));
    assert_eq!(
        too_high
            .pointer("/error/details/errors/0/code")
            .and_then(|v| v.as_str()),
        Some("out_of_range")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.save",
        json!({
            "classId": class_id,
            "examId": exam_id,
            "subjectId": subjects[0],
            "entries": [{ "studentId": students[0], "t1": 30, "exams": 70 }]
        }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "results", "patch": { "showGeneratedAt": false } }),
    );
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "results.student",
        json!({ "examId": exam_id, "studentId": students[0] }),
    );
    assert!(report.get("generatedAt").is_none());
    assert_eq!(report.get("totalScore").and_then(|v| v.as_f64()), Some(100.0));

    drop(stdin);
    let _ = child.wait();
}
