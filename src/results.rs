use crate::calc::{
    self, CalcError, ClassReport, ScoreComponent, StudentMarks, SubjectDef, SubjectScore,
};
use crate::grading::{classify_grade, Grade};
use crate::setup::ResultsSettings;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ResultsContext<'a> {
    pub conn: &'a Connection,
    pub class_id: &'a str,
    pub exam_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamInfo {
    pub id: String,
    pub name: String,
    pub term: Option<i64>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResultsModel {
    pub class: ClassInfo,
    pub exam: ExamInfo,
    /// True when the class had no subjects and every subject was used instead.
    pub subjects_fell_back: bool,
    #[serde(flatten)]
    pub report: ClassReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_id: String,
    pub subject_name: String,
    pub t1: f64,
    pub exams: f64,
    pub total: f64,
    pub grade: Grade,
    pub remark: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReportModel {
    pub class: ClassInfo,
    pub exam: ExamInfo,
    pub student_id: String,
    pub name: String,
    pub adm_no: Option<String>,
    pub subjects: Vec<SubjectLine>,
    pub total_score: f64,
    pub subject_count: usize,
    pub percentage: f64,
    pub overall_grade: Grade,
    pub gpa: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

#[derive(Debug, Clone)]
struct MarkRow {
    student_id: String,
    subject_id: String,
    t1: Option<f64>,
    exams: Option<f64>,
    total: f64,
    remark: Option<String>,
}

fn db_err(e: rusqlite::Error) -> CalcError {
    CalcError::new("db_query_failed", e.to_string())
}

fn load_class(conn: &Connection, class_id: &str) -> Result<ClassInfo, CalcError> {
    let name: Option<String> = conn
        .query_row("SELECT name FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(db_err)?;
    let Some(name) = name else {
        return Err(CalcError::new("not_found", "class not found"));
    };
    Ok(ClassInfo {
        id: class_id.to_string(),
        name,
    })
}

fn load_exam(conn: &Connection, exam_id: &str) -> Result<ExamInfo, CalcError> {
    conn.query_row(
        "SELECT name, term, year FROM exams WHERE id = ?",
        [exam_id],
        |r| {
            Ok(ExamInfo {
                id: exam_id.to_string(),
                name: r.get(0)?,
                term: r.get(1)?,
                year: r.get(2)?,
            })
        },
    )
    .optional()
    .map_err(db_err)?
    .ok_or_else(|| CalcError::new("not_found", "exam not found"))
}

fn subject_def(r: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectDef> {
    Ok(SubjectDef {
        id: r.get(0)?,
        name: r.get(1)?,
    })
}

/// Subjects that count for a class, in display order: its own plus the
/// shared ones (NULL `class_id`). When there are none and the fallback is
/// enabled, every subject counts. The flag reports that fallback.
pub fn class_subjects(
    conn: &Connection,
    class_id: &str,
    settings: &ResultsSettings,
) -> Result<(Vec<SubjectDef>, bool), CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name FROM subjects
             WHERE class_id = ? OR class_id IS NULL
             ORDER BY sort_order, name",
        )
        .map_err(db_err)?;
    let scoped = stmt
        .query_map([class_id], subject_def)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    if !scoped.is_empty() || !settings.subject_fallback {
        return Ok((scoped, false));
    }

    let mut stmt = conn
        .prepare("SELECT id, name FROM subjects ORDER BY sort_order, name")
        .map_err(db_err)?;
    let all = stmt
        .query_map([], subject_def)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    Ok((all, true))
}

fn mark_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<MarkRow> {
    Ok(MarkRow {
        student_id: r.get(0)?,
        subject_id: r.get(1)?,
        t1: r.get(2)?,
        exams: r.get(3)?,
        total: r.get(4)?,
        remark: r.get(5)?,
    })
}

fn mark_components(row: &MarkRow) -> Vec<ScoreComponent> {
    let mut components = Vec::with_capacity(2);
    if let Some(v) = row.t1 {
        components.push(ScoreComponent::new("t1", v));
    }
    if let Some(v) = row.exams {
        components.push(ScoreComponent::new("exams", v));
    }
    // Rows written without components still carry the stored total.
    if components.is_empty() {
        components.push(ScoreComponent::new("total", row.total));
    }
    components
}

fn load_exam_marks(
    conn: &Connection,
    exam_id: &str,
    class_id: &str,
) -> Result<Vec<MarkRow>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT m.student_id, m.subject_id, m.t1, m.exams, m.total, m.teacher_remark
             FROM marks m
             JOIN students s ON s.id = m.student_id
             WHERE m.exam_id = ? AND s.class_id = ?",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map((exam_id, class_id), mark_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    Ok(rows)
}

pub fn compute_class_results(
    ctx: &ResultsContext<'_>,
    settings: &ResultsSettings,
) -> Result<ClassResultsModel, CalcError> {
    let conn = ctx.conn;
    let class = load_class(conn, ctx.class_id)?;
    let exam = load_exam(conn, ctx.exam_id)?;
    let (subjects, subjects_fell_back) = class_subjects(conn, ctx.class_id, settings)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, name FROM students
             WHERE class_id = ?
             ORDER BY sort_order",
        )
        .map_err(db_err)?;
    let mut students: Vec<StudentMarks> = stmt
        .query_map([ctx.class_id], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            Ok(StudentMarks::new(&id, &name))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let index_by_id: HashMap<String, usize> = students
        .iter()
        .enumerate()
        .map(|(i, s)| (s.student_id.clone(), i))
        .collect();
    for row in load_exam_marks(conn, ctx.exam_id, ctx.class_id)? {
        let Some(&i) = index_by_id.get(&row.student_id) else {
            continue;
        };
        let score = SubjectScore::from_components(&row.subject_id, mark_components(&row));
        students[i].insert(score);
    }

    let report = calc::aggregate_class(&subjects, &students).map_err(|e| {
        if e.code == "no_data" {
            log::warn!(
                "no result data for class {} exam {}",
                ctx.class_id,
                ctx.exam_id
            );
            CalcError::new("no_data", "No data found for this class.")
        } else {
            e
        }
    })?;

    Ok(ClassResultsModel {
        class,
        exam,
        subjects_fell_back,
        report,
    })
}

pub fn compute_student_result(
    conn: &Connection,
    exam_id: &str,
    student_id: &str,
    settings: &ResultsSettings,
) -> Result<StudentReportModel, CalcError> {
    let exam = load_exam(conn, exam_id)?;
    let student: Option<(String, String, Option<String>)> = conn
        .query_row(
            "SELECT class_id, name, adm_no FROM students WHERE id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(db_err)?;
    let Some((class_id, name, adm_no)) = student else {
        return Err(CalcError::new("not_found", "Student record not found."));
    };
    let class = load_class(conn, &class_id)?;
    let (subjects, _) = class_subjects(conn, &class_id, settings)?;

    let mut stmt = conn
        .prepare(
            "SELECT student_id, subject_id, t1, exams, total, teacher_remark
             FROM marks
             WHERE exam_id = ? AND student_id = ?",
        )
        .map_err(db_err)?;
    let rows: HashMap<String, MarkRow> = stmt
        .query_map((exam_id, student_id), mark_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?
        .into_iter()
        .map(|m| (m.subject_id.clone(), m))
        .collect();

    let mut marks = StudentMarks::new(student_id, &name);
    let mut lines = Vec::with_capacity(subjects.len());
    for subject in &subjects {
        let row = rows.get(&subject.id);
        let total = row.map(|m| m.total).unwrap_or(0.0);
        lines.push(SubjectLine {
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            t1: row.and_then(|m| m.t1).unwrap_or(0.0),
            exams: row.and_then(|m| m.exams).unwrap_or(0.0),
            total,
            // marks.save caps a subject total at 100, so it reads as a percentage.
            grade: classify_grade(total),
            remark: row.and_then(|m| m.remark.clone()).unwrap_or_default(),
        });
        if let Some(m) = row {
            marks.insert(SubjectScore::from_components(&subject.id, mark_components(m)));
        }
    }
    let result = calc::aggregate_student(&subjects, &marks);

    Ok(StudentReportModel {
        class,
        exam,
        student_id: student_id.to_string(),
        name,
        adm_no,
        subjects: lines,
        total_score: result.total_score,
        subject_count: result.subject_count,
        percentage: result.percentage,
        overall_grade: result.grade,
        gpa: result.gpa,
        generated_at: settings
            .show_generated_at
            .then(|| chrono::Local::now().to_rfc3339()),
    })
}
