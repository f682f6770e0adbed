use anyhow::Context;
use clap::Parser;
use resultd::calc::{self, SubjectDef};
use resultd::interactive::{collect_students, PromptConfig, Prompter, DEFAULT_SUBJECTS};
use resultd::report;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "result-calc", version, about = "Interactive class result calculator")]
struct Cli {
    /// Subjects, comma-separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SUBJECTS.map(String::from))]
    subjects: Vec<String>,

    /// Maximum theory mark per subject
    #[arg(long, default_value_t = 75.0, value_parser = parse_max_mark)]
    theory_max: f64,

    /// Maximum internal mark per subject
    #[arg(long, default_value_t = 25.0, value_parser = parse_max_mark)]
    internal_max: f64,

    /// Directory the report file is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn parse_max_mark(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("`{}` is not a number", s))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("`{}` must be a finite, non-negative mark", s));
    }
    Ok(v)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = PromptConfig {
        subjects: cli
            .subjects
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        theory_max: cli.theory_max,
        internal_max: cli.internal_max,
    };

    let stdin = io::stdin();
    let mut prompter = Prompter::new(stdin.lock(), io::stdout());
    prompter.say("--- Student Result Calculator ---")?;
    let students = collect_students(&mut prompter, &cfg)?;

    let subjects: Vec<SubjectDef> = cfg.subjects.iter().map(|s| SubjectDef::named(s)).collect();
    let class_report = match calc::aggregate_class(&subjects, &students) {
        Ok(v) => v,
        Err(e) if e.code == "no_data" => {
            log::warn!("{}", e.message);
            prompter.say("No student data entered.")?;
            return Ok(());
        }
        Err(e) => anyhow::bail!("{}: {}", e.code, e.message),
    };

    let text = report::render_class_report(&class_report);
    prompter.say(&text)?;

    let path = report::write_report(&cli.out_dir, &text)?;
    let shown = std::fs::canonicalize(&path).unwrap_or(path);
    prompter.say(&format!("\nReport saved to '{}'", shown.to_string_lossy()))?;
    let mut out = prompter.into_output();
    out.flush().context("failed to flush stdout")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
