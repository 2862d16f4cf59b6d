//! Bulk snapshot population.

use std::path::Path;

use crate::error::PopulateError;
use crate::models::{BatchReport, CourseRef};
use crate::pool::{bounded_map, Outcome};
use crate::store::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Cached,
    Populated,
}

/// Read `id,name` rows from a CSV file with a header line.
pub fn read_courses_csv(path: &Path) -> Result<Vec<CourseRef>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize::<CourseRef>().collect()
}

/// Make sure every course in `courses` has a snapshot.
///
/// At most `concurrency` courses are in flight at once. A course that cannot
/// be populated is logged and counted; it never stops the batch.
pub async fn populate_all(
    store: &SnapshotStore,
    courses: &[CourseRef],
    concurrency: usize,
) -> BatchReport {
    let outcomes = bounded_map(courses.to_vec(), concurrency, true, move |course| async move {
        if store.get(&course.id).is_some() {
            return Ok(Visit::Cached);
        }
        let populated = store.populate(&course.id, &course.name).await;
        match populated {
            Some(_) => Ok(Visit::Populated),
            None => Err(PopulateError::NoGrade {
                course_id: course.id,
            }),
        }
    })
    .await;

    let mut report = BatchReport::default();
    for outcome in &outcomes {
        match outcome {
            Outcome::Done(visit) => {
                report.processed += 1;
                report.succeeded += 1;
                if *visit == Visit::Cached {
                    report.skipped += 1;
                }
            }
            Outcome::Failed(e) => {
                report.processed += 1;
                report.failed += 1;
                tracing::warn!(error = %e, "course population failed");
            }
            Outcome::NotRun => {}
        }
    }

    tracing::info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "bulk population finished"
    );
    report
}
