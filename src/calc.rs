use crate::grading::{classify_grade, gpa_for, Grade};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponent {
    pub name: String,
    pub value: f64,
}

impl ScoreComponent {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// One subject's mark for one student. `total` is always the sum of `components`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub subject: String,
    pub components: Vec<ScoreComponent>,
    pub total: f64,
}

impl SubjectScore {
    pub fn from_components(subject: &str, components: Vec<ScoreComponent>) -> Self {
        let total = components.iter().map(|c| c.value).sum();
        Self {
            subject: subject.to_string(),
            components,
            total,
        }
    }

    /// No recorded mark. Counts as zero.
    pub fn missing(subject: &str) -> Self {
        Self::from_components(subject, Vec::new())
    }

    pub fn is_missing(&self) -> bool {
        self.components.is_empty()
    }
}

/// A subject column: `id` keys the scores, `name` is what reports print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDef {
    pub id: String,
    pub name: String,
}

impl SubjectDef {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// Subject whose name doubles as its identifier.
    pub fn named(name: &str) -> Self {
        Self::new(name, name)
    }
}

/// Raw input for one student, keyed by subject. Callers build this from
/// database rows or prompt answers; the aggregator does not care which.
#[derive(Debug, Clone, Default)]
pub struct StudentMarks {
    pub student_id: String,
    pub name: String,
    pub scores: HashMap<String, SubjectScore>,
}

impl StudentMarks {
    pub fn new(student_id: &str, name: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            name: name.to_string(),
            scores: HashMap::new(),
        }
    }

    pub fn insert(&mut self, score: SubjectScore) {
        self.scores.insert(score.subject.clone(), score);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub student_id: String,
    pub name: String,
    /// In the order of the expected subject list.
    pub scores: Vec<SubjectScore>,
    pub total_score: f64,
    pub subject_count: usize,
    pub percentage: f64,
    pub has_subjects: bool,
    pub grade: Grade,
    pub gpa: f64,
}

impl StudentResult {
    pub fn score_for(&self, subject: &str) -> Option<&SubjectScore> {
        self.scores.iter().find(|s| s.subject == subject)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectHigh {
    pub subject: String,
    pub subject_name: String,
    pub score: f64,
    pub student_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub topper: StudentResult,
    pub subject_highs: Vec<SubjectHigh>,
    pub class_average: f64,
    pub student_count: usize,
}

impl ClassStatistics {
    pub fn subject_high(&self, subject: &str) -> Option<&SubjectHigh> {
        self.subject_highs.iter().find(|h| h.subject == subject)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub subjects: Vec<SubjectDef>,
    pub students: Vec<StudentResult>,
    pub statistics: ClassStatistics,
}

/// Percentage over `subject_count` subjects. A zero count is treated as one,
/// so a student with no subjects reports percentage == total (0).
pub fn percentage_of(total_score: f64, subject_count: usize) -> f64 {
    total_score / (subject_count.max(1) as f64)
}

pub fn student_result(student_id: &str, name: &str, scores: Vec<SubjectScore>) -> StudentResult {
    let total_score: f64 = scores.iter().map(|s| s.total).sum();
    let subject_count = scores.len();
    let percentage = percentage_of(total_score, subject_count);
    StudentResult {
        student_id: student_id.to_string(),
        name: name.to_string(),
        scores,
        total_score,
        subject_count,
        percentage,
        has_subjects: subject_count > 0,
        grade: classify_grade(percentage),
        gpa: gpa_for(percentage),
    }
}

/// Per-student pass. Every expected subject is counted; a subject with no
/// recorded score contributes zero.
pub fn aggregate_student(subjects: &[SubjectDef], marks: &StudentMarks) -> StudentResult {
    let scores = subjects
        .iter()
        .map(|subject| {
            marks
                .scores
                .get(&subject.id)
                .cloned()
                .unwrap_or_else(|| SubjectScore::missing(&subject.id))
        })
        .collect();
    student_result(&marks.student_id, &marks.name, scores)
}

/// Class-wide pass. Ties go to the first student in iteration order.
pub fn class_statistics(
    subjects: &[SubjectDef],
    results: &[StudentResult],
) -> Result<ClassStatistics, CalcError> {
    let Some(first) = results.first() else {
        return Err(CalcError::new("no_data", "no students found for this class"));
    };

    let mut topper = first;
    for r in &results[1..] {
        if r.total_score > topper.total_score {
            topper = r;
        }
    }

    let mut subject_highs = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let mut best: Option<(&StudentResult, f64)> = None;
        for r in results {
            let score = r.score_for(&subject.id).map(|s| s.total).unwrap_or(0.0);
            match best {
                Some((_, high)) if score <= high => {}
                _ => best = Some((r, score)),
            }
        }
        if let Some((r, score)) = best {
            subject_highs.push(SubjectHigh {
                subject: subject.id.clone(),
                subject_name: subject.name.clone(),
                score,
                student_id: r.student_id.clone(),
                name: r.name.clone(),
            });
        }
    }

    let class_average =
        results.iter().map(|r| r.percentage).sum::<f64>() / (results.len() as f64);

    Ok(ClassStatistics {
        topper: topper.clone(),
        subject_highs,
        class_average,
        student_count: results.len(),
    })
}

pub fn aggregate_class(
    subjects: &[SubjectDef],
    students: &[StudentMarks],
) -> Result<ClassReport, CalcError> {
    let results: Vec<StudentResult> = students
        .iter()
        .map(|m| aggregate_student(subjects, m))
        .collect();
    let statistics = class_statistics(subjects, &results)?;
    Ok(ClassReport {
        subjects: subjects.to_vec(),
        students: results,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subjects() -> Vec<SubjectDef> {
        ["Math", "Science", "English"]
            .iter()
            .map(|s| SubjectDef::named(s))
            .collect()
    }

    fn marks(id: &str, name: &str, totals: &[(&str, f64)]) -> StudentMarks {
        let mut m = StudentMarks::new(id, name);
        for (subject, total) in totals {
            m.insert(SubjectScore::from_components(
                subject,
                vec![ScoreComponent::new("total", *total)],
            ));
        }
        m
    }

    fn ada_and_ben() -> Vec<StudentMarks> {
        vec![
            marks("s1", "Ada", &[("Math", 90.0), ("Science", 85.0), ("English", 95.0)]),
            marks("s2", "Ben", &[("Math", 40.0), ("Science", 35.0), ("English", 30.0)]),
        ]
    }

    #[test]
    fn subject_total_is_sum_of_components() {
        let s = SubjectScore::from_components(
            "Math",
            vec![ScoreComponent::new("theory", 60.5), ScoreComponent::new("internal", 20.0)],
        );
        assert_eq!(s.total, 80.5);
        assert!(!s.is_missing());
        assert_eq!(SubjectScore::missing("Math").total, 0.0);
    }

    #[test]
    fn ada_and_ben_scenario() {
        let report = aggregate_class(&subjects(), &ada_and_ben()).expect("report");
        let ada = &report.students[0];
        assert_eq!(ada.total_score, 270.0);
        assert_eq!(ada.percentage, 90.0);
        assert_eq!(ada.grade, Grade::A);
        assert_eq!(ada.gpa, 4.0);

        let ben = &report.students[1];
        assert_eq!(ben.total_score, 105.0);
        assert_eq!(ben.percentage, 35.0);
        assert_eq!(ben.grade, Grade::F);
        assert_eq!(ben.gpa, 0.0);

        let stats = &report.statistics;
        assert_eq!(stats.class_average, 62.5);
        assert_eq!(stats.topper.name, "Ada");
        let math = stats.subject_high("Math").expect("math high");
        assert_eq!(math.score, 90.0);
        assert_eq!(math.name, "Ada");
    }

    #[test]
    fn missing_subject_counts_as_zero() {
        let m = marks("s3", "Cy", &[("Math", 80.0), ("English", 70.0)]);
        let r = aggregate_student(&subjects(), &m);
        assert_eq!(r.subject_count, 3);
        assert_eq!(r.total_score, 150.0);
        assert_eq!(r.percentage, 50.0);
        assert!(r.score_for("Science").expect("science").is_missing());
    }

    #[test]
    fn zero_subjects_reports_total_as_percentage() {
        let r = aggregate_student(&[], &marks("s4", "Dee", &[("Math", 70.0)]));
        assert_eq!(r.subject_count, 0);
        assert_eq!(r.total_score, 0.0);
        assert_eq!(r.percentage, r.total_score);
        assert!(!r.has_subjects);
        assert_eq!(r.grade, Grade::F);
    }

    #[test]
    fn percentage_is_exact_division() {
        assert_eq!(percentage_of(250.0, 3), 250.0 / 3.0);
        assert_eq!(percentage_of(42.0, 0), 42.0);
    }

    #[test]
    fn empty_class_is_no_data() {
        let e = aggregate_class(&subjects(), &[]).expect_err("no data");
        assert_eq!(e.code, "no_data");
    }

    #[test]
    fn ties_go_to_first_student() {
        let students = vec![
            marks("a", "First", &[("Math", 70.0), ("Science", 70.0), ("English", 70.0)]),
            marks("b", "Second", &[("Math", 70.0), ("Science", 80.0), ("English", 60.0)]),
        ];
        let report = aggregate_class(&subjects(), &students).expect("report");
        assert_eq!(report.statistics.topper.student_id, "a");
        assert_eq!(report.statistics.subject_high("Math").expect("math").student_id, "a");
        assert_eq!(
            report.statistics.subject_high("Science").expect("science").student_id,
            "b"
        );
    }

    #[test]
    fn three_student_class_average() {
        let students = vec![
            marks("a", "A", &[("Math", 90.0), ("Science", 80.0), ("English", 70.0)]),
            marks("b", "B", &[("Math", 60.0), ("Science", 60.0), ("English", 60.0)]),
            marks("c", "C", &[("Math", 10.0), ("Science", 20.0), ("English", 30.0)]),
        ];
        let report = aggregate_class(&subjects(), &students).expect("report");
        // 80 + 60 + 20 over three students.
        assert_eq!(report.statistics.class_average, 160.0 / 3.0);
        assert_eq!(report.statistics.student_count, 3);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let input = ada_and_ben();
        let a = aggregate_class(&subjects(), &input).expect("first");
        let b = aggregate_class(&subjects(), &input).expect("second");
        assert_eq!(a, b);
    }

    #[test]
    fn negative_scores_propagate() {
        let m = marks("n", "Neg", &[("Math", -10.0), ("Science", 40.0), ("English", 30.0)]);
        let r = aggregate_student(&subjects(), &m);
        assert_eq!(r.total_score, 60.0);
        assert_eq!(r.percentage, 20.0);
    }
}
