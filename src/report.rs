use std::fmt::Write;

use crate::config::RatingScale;
use crate::models::{BatchReport, CourseSnapshot, GradeSource};

/// Score on the rating scale's point range, converting enrollment percentages.
pub fn points(snapshot: &CourseSnapshot, scale: &RatingScale) -> Option<f64> {
    let score = snapshot.score?;
    Some(match snapshot.grade_source {
        GradeSource::Assignment => score,
        GradeSource::Enrollment => scale.percentage_to_points(score),
    })
}

fn describe(snapshot: &CourseSnapshot, scale: &RatingScale) -> String {
    let Some(score) = snapshot.score else {
        return "no score".to_string();
    };
    match (snapshot.is_standards_based, snapshot.grade_source) {
        (true, _) => {
            let pts = points(snapshot, scale).unwrap_or(score);
            let label = snapshot
                .letter_grade
                .clone()
                .or_else(|| scale.level_for_points(pts).map(|l| l.description.clone()))
                .unwrap_or_else(|| "unrated".to_string());
            format!("{pts:.2} / {:.0} ({label})", scale.max_points)
        }
        (false, GradeSource::Enrollment) => format!("{score:.1}%"),
        (false, GradeSource::Assignment) => format!("{score:.2} pts"),
    }
}

pub fn build_report(
    snapshots: &[CourseSnapshot],
    scale: &RatingScale,
    batch: Option<&BatchReport>,
) -> String {
    let mut output = String::new();
    let standards: Vec<&CourseSnapshot> =
        snapshots.iter().filter(|s| s.is_standards_based).collect();
    let traditional: Vec<&CourseSnapshot> =
        snapshots.iter().filter(|s| !s.is_standards_based).collect();

    let _ = writeln!(output, "# Course Grade Snapshots");
    let _ = writeln!(
        output,
        "{} courses cached ({} standards-based, {} traditional)",
        snapshots.len(),
        standards.len(),
        traditional.len()
    );

    if let Some(batch) = batch {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Last Population Run");
        let _ = writeln!(
            output,
            "- processed {}, succeeded {}, failed {}, already cached {}",
            batch.processed, batch.succeeded, batch.failed, batch.skipped
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Standards-Based Courses");
    if standards.is_empty() {
        let _ = writeln!(output, "No standards-based courses cached.");
    } else {
        for snapshot in &standards {
            let _ = writeln!(
                output,
                "- {} [{}]: {} via {}",
                snapshot.course_name,
                snapshot.course_id,
                describe(snapshot, scale),
                snapshot.grade_source
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Traditional Courses");
    if traditional.is_empty() {
        let _ = writeln!(output, "No traditional courses cached.");
    } else {
        for snapshot in &traditional {
            let _ = writeln!(
                output,
                "- {} [{}]: {} via {}",
                snapshot.course_name,
                snapshot.course_id,
                describe(snapshot, scale),
                snapshot.grade_source
            );
        }
    }

    output
}
