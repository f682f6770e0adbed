use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::results::{self, ResultsContext};
use crate::setup::{self, ResultsSettings};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

fn results_settings(conn: &Connection, req: &Request) -> Result<ResultsSettings, serde_json::Value> {
    setup::results_settings(conn)
        .map_err(|e| err(&req.id, "db_query_failed", format!("{e:#}"), None))
}

fn class_results(
    state: &AppState,
    req: &Request,
) -> Result<results::ClassResultsModel, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let exam_id = required_str(req, "examId")?;
    let class_id = required_str(req, "classId")?;
    let settings = results_settings(conn, req)?;
    let ctx = ResultsContext {
        conn,
        class_id: &class_id,
        exam_id: &exam_id,
    };
    results::compute_class_results(&ctx, &settings).map_err(|e| calc_err(&req.id, e))
}

fn handle_results_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    match class_results(state, req) {
        Ok(model) => ok(&req.id, json!(model)),
        Err(e) => e,
    }
}

fn handle_results_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match results_settings(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match results::compute_student_result(conn, &exam_id, &student_id, &settings) {
        Ok(model) => ok(&req.id, json!(model)),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_reports_class_result_text(state: &mut AppState, req: &Request) -> serde_json::Value {
    let model = match class_results(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let text = report::render_class_report(&model.report);

    let written = match optional_str(req, "outDir").map(PathBuf::from) {
        None => None,
        Some(dir) => match report::write_report(&dir, &text) {
            Ok(path) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                return err(
                    &req.id,
                    "io_failed",
                    format!("{e:#}"),
                    Some(json!({ "outDir": dir.to_string_lossy() })),
                )
            }
        },
    };

    ok(
        &req.id,
        json!({
            "text": text,
            "path": written,
            "studentCount": model.report.statistics.student_count
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.class" => Some(handle_results_class(state, req)),
        "results.student" => Some(handle_results_student(state, req)),
        "reports.classResultText" => Some(handle_reports_class_result_text(state, req)),
        _ => None,
    }
}
