use crate::calc::ClassReport;
use anyhow::Context;
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "class_result_report.txt";

const RULE_WIDTH: usize = 80;

fn subject_abbrev(subject: &str) -> String {
    subject.chars().take(3).collect()
}

/// Fixed-width class result table followed by the class statistics block.
pub fn render_class_report(report: &ClassReport) -> String {
    let mut lines: Vec<String> = Vec::new();
    let heavy = "=".repeat(RULE_WIDTH);

    lines.push(String::new());
    lines.push(heavy.clone());
    lines.push(format!("{:^80}", "STUDENT RESULT REPORT"));
    lines.push(heavy.clone());

    let subject_cols = report
        .subjects
        .iter()
        .map(|s| format!("{:<5}", subject_abbrev(&s.name)))
        .collect::<Vec<_>>()
        .join(" | ");
    let header = format!(
        "{:<20} | {} | {:<6} | {:<5} | {:<3} | {:<4}",
        "Name", subject_cols, "Total", "%", "Grd", "GPA"
    );
    let light = "-".repeat(header.chars().count());
    lines.push(header);
    lines.push(light.clone());

    for s in &report.students {
        let marks = report
            .subjects
            .iter()
            .map(|subject| {
                let total = s.score_for(&subject.id).map(|v| v.total).unwrap_or(0.0);
                format!("{:<5.1}", total)
            })
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(format!(
            "{:<20} | {} | {:<6.1} | {:<5.1} | {:<3} | {:<4.1}",
            s.name, marks, s.total_score, s.percentage, s.grade, s.gpa
        ));
    }
    lines.push(light);

    let stats = &report.statistics;
    lines.push(String::new());
    lines.push(heavy.clone());
    lines.push(format!("{:^80}", "CLASS STATISTICS"));
    lines.push(heavy);
    lines.push(format!(
        "Class Topper: {} with {:.1} marks ({:.1}%)",
        stats.topper.name, stats.topper.total_score, stats.topper.percentage
    ));
    lines.push(format!("Class Average Percentage: {:.1}%", stats.class_average));
    lines.push(String::new());
    lines.push("Subject High Scores:".to_string());
    for high in &stats.subject_highs {
        lines.push(format!(
            "  {:<10}: {:<5.1} ({})",
            high.subject_name, high.score, high.name
        ));
    }

    lines.join("\n")
}

/// Writes the report as `class_result_report.txt` inside `dir`.
pub fn write_report(dir: &Path, text: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let path = dir.join(REPORT_FILE_NAME);
    std::fs::write(&path, text)
        .with_context(|| format!("failed to write report {}", path.to_string_lossy()))?;
    log::info!("class report written to {}", path.to_string_lossy());
    Ok(path)
}
