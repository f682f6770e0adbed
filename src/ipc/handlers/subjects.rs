use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_name};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId");

    let sql = if class_id.is_some() {
        "SELECT id, class_id, name, sort_order FROM subjects
         WHERE class_id = ?
         ORDER BY sort_order, name"
    } else {
        "SELECT id, class_id, name, sort_order FROM subjects
         ORDER BY sort_order, name"
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        let id: String = r.get(0)?;
        let class_id: Option<String> = r.get(1)?;
        let name: String = r.get(2)?;
        let sort_order: i64 = r.get(3)?;
        Ok(json!({
            "id": id,
            "classId": class_id,
            "name": name,
            "sortOrder": sort_order
        }))
    };
    let rows = match &class_id {
        Some(cid) => stmt
            .query_map([cid], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    };

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId");

    if let Some(cid) = &class_id {
        let exists = conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [cid], |r| {
                r.get::<_, i64>(0)
            })
            .optional();
        match exists {
            Ok(Some(_)) => {}
            Ok(None) => return err(&req.id, "not_found", "class not found", None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    // Names are unique within a scope (one class, or the shared pool).
    let duplicate: Option<String> = match conn
        .query_row(
            "SELECT id FROM subjects
             WHERE class_id IS ? AND lower(name) = lower(?)",
            (&class_id, &name),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Some(existing) = duplicate {
        return err(
            &req.id,
            "bad_params",
            "a subject with this name already exists",
            Some(json!({ "subjectId": existing, "name": name })),
        );
    }

    let next_sort: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM subjects WHERE class_id IS ?",
        [&class_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, class_id, name, sort_order) VALUES(?, ?, ?, ?)",
        (&subject_id, &class_id, &name, next_sort),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    ok(
        &req.id,
        json!({ "subjectId": subject_id, "name": name, "classId": class_id }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        _ => None,
    }
}
