use crate::calc::{ScoreComponent, StudentMarks, SubjectScore};
use anyhow::{anyhow, Context};
use std::io::{BufRead, Write};

pub const DEFAULT_SUBJECTS: [&str; 5] = ["Math", "Science", "English", "Computer", "History"];

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub subjects: Vec<String>,
    pub theory_max: f64,
    pub internal_max: f64,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            theory_max: 75.0,
            internal_max: 25.0,
        }
    }
}

/// Line-oriented prompt session over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn say(&mut self, text: &str) -> anyhow::Result<()> {
        writeln!(self.output, "{}", text).context("failed to write prompt output")
    }

    fn ask(&mut self, prompt: &str) -> anyhow::Result<String> {
        write!(self.output, "{}", prompt).context("failed to write prompt")?;
        self.output.flush().context("failed to flush prompt")?;
        let mut line = String::new();
        let n = self
            .input
            .read_line(&mut line)
            .context("failed to read input")?;
        if n == 0 {
            return Err(anyhow!("input closed before all marks were entered"));
        }
        Ok(line.trim().to_string())
    }

    /// Re-prompts until the answer is a number within `min..=max`.
    pub fn ask_float(&mut self, prompt: &str, min: f64, max: f64) -> anyhow::Result<f64> {
        loop {
            let answer = self.ask(prompt)?;
            match answer.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= min && v <= max => return Ok(v),
                Ok(_) => self.say(&format!(
                    "Invalid input. Please enter a value between {} and {}.",
                    min, max
                ))?,
                Err(_) => self.say("Invalid input. Please enter a number.")?,
            }
        }
    }

    pub fn ask_positive_count(&mut self, prompt: &str) -> anyhow::Result<usize> {
        loop {
            let answer = self.ask(prompt)?;
            match answer.parse::<i64>() {
                Ok(v) if v > 0 => return Ok(v as usize),
                Ok(_) => self.say("Please enter a positive integer.")?,
                Err(_) => self.say("Invalid input. Please enter an integer.")?,
            }
        }
    }

    pub fn ask_name(&mut self, prompt: &str) -> anyhow::Result<String> {
        self.ask(prompt)
    }
}

/// Collects theory + internal marks for every subject of every student.
pub fn collect_students<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    cfg: &PromptConfig,
) -> anyhow::Result<Vec<StudentMarks>> {
    let count = prompter.ask_positive_count("Enter the number of students: ")?;
    prompter.say(&format!("\nEntering data for {} students.", count))?;
    prompter.say(&format!(
        "Marks: Theory (Max {}), Internal (Max {})",
        cfg.theory_max, cfg.internal_max
    ))?;

    // Count is unbounded user input; no capacity is reserved from it.
    let mut students = Vec::new();
    for i in 0..count {
        prompter.say(&format!("\nStudent {}:", i + 1))?;
        let name = prompter.ask_name("Enter Student Name: ")?;
        let mut marks = StudentMarks::new(&(i + 1).to_string(), &name);
        for subject in &cfg.subjects {
            prompter.say(&format!("  {}:", subject))?;
            let theory = prompter.ask_float(
                &format!("    Theory (0-{}): ", cfg.theory_max),
                0.0,
                cfg.theory_max,
            )?;
            let internal = prompter.ask_float(
                &format!("    Internal (0-{}): ", cfg.internal_max),
                0.0,
                cfg.internal_max,
            )?;
            marks.insert(SubjectScore::from_components(
                subject,
                vec![
                    ScoreComponent::new("theory", theory),
                    ScoreComponent::new("internal", internal),
                ],
            ));
        }
        students.push(marks);
    }
    Ok(students)
}
