use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pad through the formatter so `{:<3}` works in report rows.
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeBand {
    /// Inclusive lower bound on the percentage.
    pub min_percent: f64,
    pub grade: Grade,
    pub gpa: f64,
}

/// Ordered from the highest band down. Anything below the last row is F / 0.0.
pub const GRADE_BANDS: [GradeBand; 5] = [
    GradeBand {
        min_percent: 90.0,
        grade: Grade::A,
        gpa: 4.0,
    },
    GradeBand {
        min_percent: 80.0,
        grade: Grade::B,
        gpa: 3.6,
    },
    GradeBand {
        min_percent: 70.0,
        grade: Grade::C,
        gpa: 3.2,
    },
    GradeBand {
        min_percent: 60.0,
        grade: Grade::D,
        gpa: 2.8,
    },
    GradeBand {
        min_percent: 50.0,
        grade: Grade::E,
        gpa: 2.4,
    },
];

pub const FAIL_BAND: GradeBand = GradeBand {
    min_percent: f64::NEG_INFINITY,
    grade: Grade::F,
    gpa: 0.0,
};

/// Band for a percentage. Out-of-range input is not rejected: anything at or
/// above 90 is an A, anything below 50 (or NaN) is an F.
pub fn band_for(percentage: f64) -> &'static GradeBand {
    GRADE_BANDS
        .iter()
        .find(|b| percentage >= b.min_percent)
        .unwrap_or(&FAIL_BAND)
}

pub fn classify_grade(percentage: f64) -> Grade {
    band_for(percentage).grade
}

pub fn gpa_for(percentage: f64) -> f64 {
    band_for(percentage).gpa
}
