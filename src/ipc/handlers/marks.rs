use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_timestamp, required_str};
use crate::ipc::types::{AppState, Request};
use crate::results;
use crate::setup::{self, MarksSettings};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

const MARKS_SAVE_MAX_ENTRIES: usize = 5000;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn db_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

struct MarkTarget {
    exam_id: String,
    subject_id: String,
    class_id: String,
}

fn parse_target(req: &Request) -> Result<MarkTarget, serde_json::Value> {
    Ok(MarkTarget {
        exam_id: required_str(req, "examId")?,
        subject_id: required_str(req, "subjectId")?,
        class_id: required_str(req, "classId")?,
    })
}

fn ensure_exists(conn: &Connection, table: &str, label: &str, id: &str) -> Result<(), HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found = conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map_err(db_failed)?;
    if found.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: format!("{} not found", label),
            details: Some(json!({ "id": id })),
        });
    }
    Ok(())
}

fn check_target(conn: &Connection, target: &MarkTarget) -> Result<(), HandlerErr> {
    ensure_exists(conn, "exams", "exam", &target.exam_id)?;
    ensure_exists(conn, "subjects", "subject", &target.subject_id)?;
    ensure_exists(conn, "classes", "class", &target.class_id)?;

    // Only subjects that show up in this class's results can carry marks.
    let settings = setup::results_settings(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: format!("{e:#}"),
        details: None,
    })?;
    let (subjects, _) =
        results::class_subjects(conn, &target.class_id, &settings).map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.message,
            details: e.details,
        })?;
    if !subjects.iter().any(|s| s.id == target.subject_id) {
        return Err(HandlerErr {
            code: "bad_params",
            message: "subject is not taught in this class".to_string(),
            details: Some(json!({
                "subjectId": target.subject_id,
                "classId": target.class_id
            })),
        });
    }
    Ok(())
}

fn class_students(conn: &Connection, class_id: &str) -> Result<Vec<(String, String)>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name FROM students
             WHERE class_id = ?
             ORDER BY sort_order",
        )
        .map_err(db_failed)?;
    let students = stmt
        .query_map([class_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_failed)?;
    Ok(students)
}

fn handle_marks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target = match parse_target(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = check_target(conn, &target) {
        return e.response(&req.id);
    }
    let students = match class_students(conn, &target.class_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let mut stmt = match conn.prepare(
        "SELECT student_id, t1, exams, total, teacher_remark
         FROM marks
         WHERE exam_id = ? AND subject_id = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    type MarkCells = (Option<f64>, Option<f64>, f64, Option<String>);
    let by_student: HashMap<String, MarkCells> = match stmt
        .query_map((&target.exam_id, &target.subject_id), |r| {
            Ok((
                r.get::<_, String>(0)?,
                (
                    r.get::<_, Option<f64>>(1)?,
                    r.get::<_, Option<f64>>(2)?,
                    r.get::<_, f64>(3)?,
                    r.get::<_, Option<String>>(4)?,
                ),
            ))
        })
        .and_then(|it| it.collect::<Result<HashMap<_, _>, _>>())
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|(id, name)| match by_student.get(id) {
            Some((t1, exams, total, remark)) => json!({
                "studentId": id,
                "name": name,
                "t1": t1,
                "exams": exams,
                "total": total,
                "remark": remark,
            }),
            None => json!({
                "studentId": id,
                "name": name,
                "t1": null,
                "exams": null,
                "total": null,
                "remark": null,
            }),
        })
        .collect();

    ok(&req.id, json!({ "marks": rows }))
}

struct MarkEntry {
    student_id: String,
    t1: Option<f64>,
    exams: Option<f64>,
    remark: Option<String>,
}

impl MarkEntry {
    fn total(&self) -> f64 {
        self.t1.unwrap_or(0.0) + self.exams.unwrap_or(0.0)
    }
}

fn parse_component(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    max: f64,
) -> Result<Option<f64>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(n) = v.as_f64() else {
                return Err(format!("{} must be a number", key));
            };
            if !(0.0..=max).contains(&n) {
                return Err(format!("{} must be between 0 and {}", key, max));
            }
            Ok(Some(n))
        }
    }
}

/// Validates every entry up front; any rejection fails the whole batch.
fn parse_entries(
    entries: &[serde_json::Value],
    roster: &HashMap<String, String>,
    bounds: &MarksSettings,
) -> Result<Vec<MarkEntry>, Vec<serde_json::Value>> {
    let mut parsed = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("entry at index {} must be an object", i),
            }));
            continue;
        };
        let Some(student_id) = obj.get("studentId").and_then(|v| v.as_str()) else {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("entry at index {} missing studentId", i),
            }));
            continue;
        };
        if !roster.contains_key(student_id) {
            errors.push(json!({
                "index": i,
                "studentId": student_id,
                "code": "not_in_class",
                "message": "student is not in this class",
            }));
            continue;
        }

        let t1 = parse_component(obj, "t1", bounds.t1_max);
        let exams = parse_component(obj, "exams", bounds.exams_max);
        match (t1, exams) {
            (Ok(t1), Ok(exams)) => {
                let entry = MarkEntry {
                    student_id: student_id.to_string(),
                    t1,
                    exams,
                    remark: obj
                        .get("remark")
                        .and_then(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                };
                if entry.total() > bounds.total_max {
                    errors.push(json!({
                        "index": i,
                        "studentId": student_id,
                        "code": "out_of_range",
                        "message": format!("t1 + exams must not exceed {}", bounds.total_max),
                    }));
                    continue;
                }
                parsed.push(entry);
            }
            (t1, exams) => {
                for message in [t1.err(), exams.err()].into_iter().flatten() {
                    errors.push(json!({
                        "index": i,
                        "studentId": student_id,
                        "code": "out_of_range",
                        "message": message,
                    }));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(errors)
    }
}

fn upsert_marks(
    conn: &Connection,
    target: &MarkTarget,
    entries: &[MarkEntry],
) -> Result<usize, HandlerErr> {
    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    let now = now_timestamp();
    for entry in entries {
        tx.execute(
            "INSERT INTO marks(id, exam_id, subject_id, student_id, class_id, t1, exams, total, teacher_remark, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(exam_id, subject_id, student_id) DO UPDATE SET
               class_id = excluded.class_id,
               t1 = excluded.t1,
               exams = excluded.exams,
               total = excluded.total,
               teacher_remark = excluded.teacher_remark,
               updated_at = excluded.updated_at",
            (
                Uuid::new_v4().to_string(),
                &target.exam_id,
                &target.subject_id,
                &entry.student_id,
                &target.class_id,
                entry.t1,
                entry.exams,
                entry.total(),
                &entry.remark,
                &now,
            ),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "studentId": entry.student_id })),
        })?;
    }
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(entries.len())
}

fn handle_marks_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target = match parse_target(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(entries) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing entries[]", None);
    };
    if entries.len() > MARKS_SAVE_MAX_ENTRIES {
        return err(
            &req.id,
            "bad_params",
            format!(
                "marks payload exceeds max entries: {} > {}",
                entries.len(),
                MARKS_SAVE_MAX_ENTRIES
            ),
            None,
        );
    }
    if let Err(e) = check_target(conn, &target) {
        return e.response(&req.id);
    }

    let bounds = match setup::marks_settings(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let roster: HashMap<String, String> = match class_students(conn, &target.class_id) {
        Ok(v) => v.into_iter().collect(),
        Err(e) => return e.response(&req.id),
    };

    let parsed = match parse_entries(entries, &roster, &bounds) {
        Ok(v) => v,
        Err(errors) => {
            log::warn!(
                "marks.save rejected {} of {} entries",
                errors.len(),
                entries.len()
            );
            return err(
                &req.id,
                "bad_params",
                "one or more mark entries are invalid",
                Some(json!({ "rejected": errors.len(), "errors": errors })),
            );
        }
    };

    match upsert_marks(conn, &target, &parsed) {
        Ok(saved) => ok(&req.id, json!({ "ok": true, "saved": saved })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.get" => Some(handle_marks_get(state, req)),
        "marks.save" => Some(handle_marks_save(state, req)),
        _ => None,
    }
}
