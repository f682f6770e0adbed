use crate::db;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Results,
    Marks,
}

pub const ALL_SECTIONS: [SetupSection; 2] = [SetupSection::Results, SetupSection::Marks];

impl SetupSection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "results" => Some(Self::Results),
            "marks" => Some(Self::Marks),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Results => "results",
            Self::Marks => "marks",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Results => "setup.results",
            Self::Marks => "setup.marks",
        }
    }
}

pub fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Results => json!({
            "subjectFallback": true,
            "showGeneratedAt": true
        }),
        SetupSection::Marks => json!({
            "t1Max": 100.0,
            "examsMax": 100.0,
            "totalMax": 100.0
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSettings {
    /// Use every subject when a class has none of its own.
    pub subject_fallback: bool,
    pub show_generated_at: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksSettings {
    pub t1_max: f64,
    pub exams_max: f64,
    /// Ceiling on `t1 + exams`; a subject total never exceeds 100.
    pub total_max: f64,
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be a boolean", key))
}

fn parse_max_mark(v: &Value, key: &str, ceiling: f64) -> Result<f64, String> {
    let Some(n) = v.as_f64() else {
        return Err(format!("{} must be a number", key));
    };
    if !(n > 0.0 && n <= ceiling) {
        return Err(format!("{} must be in (0, {}]", key, ceiling));
    }
    Ok(n)
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Results => match k.as_str() {
                "subjectFallback" | "showGeneratedAt" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown results field: {}", k)),
            },
            SetupSection::Marks => match k.as_str() {
                "t1Max" | "examsMax" => {
                    obj.insert(k.clone(), json!(parse_max_mark(v, k, 1000.0)?));
                }
                "totalMax" => {
                    obj.insert(k.clone(), json!(parse_max_mark(v, k, 100.0)?));
                }
                _ => return Err(format!("unknown marks field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stored values that no longer validate fall back to defaults.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                log::warn!("ignoring stored {} settings: {}", section.name(), msg);
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn results_settings(conn: &Connection) -> anyhow::Result<ResultsSettings> {
    Ok(serde_json::from_value(load_section(
        conn,
        SetupSection::Results,
    )?)?)
}

pub fn marks_settings(conn: &Connection) -> anyhow::Result<MarksSettings> {
    Ok(serde_json::from_value(load_section(
        conn,
        SetupSection::Marks,
    )?)?)
}
