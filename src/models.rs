use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a snapshot's score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeSource {
    /// Score of the caller's submission to the sentinel assignment (point scale).
    Assignment,
    /// Aggregate enrollment score (percentage).
    Enrollment,
}

impl fmt::Display for GradeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeSource::Assignment => write!(f, "assignment"),
            GradeSource::Enrollment => write!(f, "enrollment"),
        }
    }
}

/// The consumer surface asking for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageContext {
    Dashboard,
    AllGrades,
    CourseGrades,
}

impl PageContext {
    pub const ALL: [PageContext; 3] = [
        PageContext::Dashboard,
        PageContext::AllGrades,
        PageContext::CourseGrades,
    ];
}

impl FromStr for PageContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Ok(PageContext::Dashboard),
            "all-grades" | "all_grades" => Ok(PageContext::AllGrades),
            "course-grades" | "course_grades" => Ok(PageContext::CourseGrades),
            other => Err(format!(
                "unknown page context '{other}' (expected dashboard, all-grades or course-grades)"
            )),
        }
    }
}

/// Cached, classified grade record for one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub course_id: String,
    pub course_name: String,
    pub is_standards_based: bool,
    pub score: Option<f64>,
    pub letter_grade: Option<String>,
    pub grade_source: GradeSource,
    /// Epoch milliseconds at population time.
    pub timestamp: i64,
}

/// Output of the grade resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGrade {
    pub value: f64,
    pub source: GradeSource,
    pub letter_grade: Option<String>,
}

/// Resolver cache entry.
#[derive(Debug, Clone)]
pub struct RawGrade {
    pub grade: ResolvedGrade,
    pub cached_at: i64,
}

/// A course to be populated in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CourseRef {
    pub id: String,
    pub name: String,
}

impl CourseRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Counts reported by a bulk population run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Courses already cached; also counted as succeeded.
    pub skipped: usize,
}
