mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn classes_list_counts_and_delete_cascades() {
    let workspace = temp_dir("resultd-classes");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (class_id, exam_id, subjects, students) =
        seed_class(&mut stdin, &mut reader, &["Math", "Science"], &["Ada", "Ben", "Cy"]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.save",
        json!({
            "classId": class_id,
            "examId": exam_id,
            "subjectId": subjects[0],
            "entries": [{ "studentId": students[0], "t1": 10, "exams": 50 }]
        }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    let class = listed
        .get("classes")
        .and_then(|v| v.as_array())
        .and_then(|rows| rows.first())
        .expect("class row");
    assert_eq!(class.get("studentCount").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(class.get("subjectCount").and_then(|v| v.as_i64()), Some(2));

    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "classId": class_id }),
    );
    let names: Vec<&str> = roster
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .filter_map(|s| s.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["Ada", "Ben", "Cy"]);

    let duplicate = request(
        &mut stdin,
        &mut reader,
        "5",
        "subjects.create",
        json!({ "classId": class_id, "name": "math" }),
    );
    assert_eq!(error_code(&duplicate), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    let after = request_ok(&mut stdin, &mut reader, "7", "classes.list", json!({}));
    assert_eq!(after.get("classes"), Some(&json!([])));
    let subjects_left = request_ok(&mut stdin, &mut reader, "8", "subjects.list", json!({}));
    assert_eq!(subjects_left.get("subjects"), Some(&json!([])));

    let again = request(
        &mut stdin,
        &mut reader,
        "9",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    assert_eq!(error_code(&again), Some("not_found"));

    let bad_term = request(
        &mut stdin,
        &mut reader,
        "10",
        "exams.create",
        json!({ "name": "Finals", "term": 4 }),
    );
    assert_eq!(error_code(&bad_term), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}
