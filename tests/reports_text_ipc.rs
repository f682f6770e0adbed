mod test_support;

use serde_json::json;
use test_support::{request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn class_result_text_renders_and_writes_report() {
    let workspace = temp_dir("resultd-report-text");
    let out_dir = workspace.join("reports");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (class_id, exam_id, subjects, students) =
        seed_class(&mut stdin, &mut reader, &["Math", "Science"], &["Ada", "Ben"]);
    for (i, (subject, scores)) in subjects.iter().zip([[90, 40], [85, 35]]).enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "marks.save",
            json!({
                "classId": class_id,
                "examId": exam_id,
                "subjectId": subject,
                "entries": [
                    { "studentId": students[0], "exams": scores[0] },
                    { "studentId": students[1], "exams": scores[1] }
                ]
            }),
        );
    }

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.classResultText",
        json!({ "classId": class_id, "examId": exam_id }),
    );
    assert!(preview.get("path").is_some_and(|v| v.is_null()));
    let text = preview
        .get("text")
        .and_then(|v| v.as_str())
        .expect("text")
        .to_string();
    assert!(text.contains("STUDENT RESULT REPORT"));
    assert!(text.contains("Class Topper: Ada with 175.0 marks (87.5%)"));
    assert!(text.contains("Class Average Percentage: 62.5%"));
    assert!(text.contains("  Math      : 90.0  (Ada)"));

    let written = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.classResultText",
        json!({
            "classId": class_id,
            "examId": exam_id,
            "outDir": out_dir.to_string_lossy()
        }),
    );
    let path = written
        .get("path")
        .and_then(|v| v.as_str())
        .expect("path");
    assert_eq!(
        std::path::Path::new(path).file_name().and_then(|s| s.to_str()),
        Some("class_result_report.txt")
    );
    let on_disk = std::fs::read_to_string(path).expect("read report");
    assert_eq!(on_disk, text);

    drop(stdin);
    let _ = child.wait();
}
