use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_name};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, name, term, year FROM exams
         ORDER BY year DESC, term, name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            let term: Option<i64> = r.get(2)?;
            let year: Option<String> = r.get(3)?;
            Ok(json!({ "id": id, "name": name, "term": term, "year": year }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(exams) => ok(&req.id, json!({ "exams": exams })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_name(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match req.params.get("term") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_i64() {
            Some(t) if (1..=3).contains(&t) => Some(t),
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    "term must be 1, 2 or 3",
                    Some(json!({ "term": v })),
                )
            }
        },
    };
    let year = optional_str(req, "year");

    let exam_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO exams(id, name, term, year) VALUES(?, ?, ?, ?)",
        (&exam_id, &name, term, &year),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "exams" })),
        );
    }

    ok(
        &req.id,
        json!({ "examId": exam_id, "name": name, "term": term, "year": year }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        _ => None,
    }
}
