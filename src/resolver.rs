//! Current-grade resolution.
//!
//! The sentinel assignment's submission score is preferred; the enrollment's
//! aggregate percentage is the fallback. Results are held briefly so a burst
//! of lookups for one course costs a single round of requests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;

use crate::client::{self, GradingClient};
use crate::config::EngineConfig;
use crate::error::ClientError;
use crate::models::{GradeSource, RawGrade, ResolvedGrade};

const RAW_CACHE_CAPACITY: u64 = 1_000;

pub struct GradeResolver {
    client: Arc<dyn GradingClient>,
    sentinel: String,
    recent: Cache<String, RawGrade>,
}

impl GradeResolver {
    pub fn new(config: &EngineConfig, client: Arc<dyn GradingClient>) -> Self {
        Self::with_ttl(client, &config.sentinel_assignment, config.raw_cache_ttl())
    }

    pub fn with_ttl(client: Arc<dyn GradingClient>, sentinel: &str, ttl: Duration) -> Self {
        Self {
            client,
            sentinel: sentinel.to_string(),
            recent: Cache::builder()
                .max_capacity(RAW_CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Current grade for `course_id`, served from the short-lived cache when possible.
    pub async fn resolve_grade(&self, course_id: &str) -> Option<ResolvedGrade> {
        if let Some(raw) = self.recent.get(course_id).await {
            tracing::debug!(course_id, cached_at = raw.cached_at, "raw grade cache hit");
            return Some(raw.grade);
        }
        self.resolve_fresh(course_id).await
    }

    /// Like [`resolve_grade`](Self::resolve_grade) but always asks the remote.
    pub async fn resolve_fresh(&self, course_id: &str) -> Option<ResolvedGrade> {
        let grade = match self.from_assignment(course_id).await {
            Ok(Some(grade)) => Some(grade),
            Ok(None) => self.enrollment_fallback(course_id).await,
            Err(e) => {
                tracing::warn!(course_id, error = %e, "assignment score lookup failed");
                self.enrollment_fallback(course_id).await
            }
        }?;

        self.recent
            .insert(
                course_id.to_string(),
                RawGrade {
                    grade: grade.clone(),
                    cached_at: Utc::now().timestamp_millis(),
                },
            )
            .await;
        Some(grade)
    }

    async fn enrollment_fallback(&self, course_id: &str) -> Option<ResolvedGrade> {
        match self.from_enrollment(course_id).await {
            Ok(grade) => grade,
            Err(e) => {
                tracing::warn!(course_id, error = %e, "enrollment score lookup failed");
                None
            }
        }
    }

    async fn from_assignment(&self, course_id: &str) -> Result<Option<ResolvedGrade>, ClientError> {
        let Some(assignment) =
            client::find_assignment(self.client.as_ref(), course_id, &self.sentinel).await?
        else {
            return Ok(None);
        };
        let submission =
            client::own_submission(self.client.as_ref(), course_id, assignment.id).await?;
        Ok(submission.score.map(|value| ResolvedGrade {
            value,
            source: GradeSource::Assignment,
            letter_grade: submission.grade,
        }))
    }

    async fn from_enrollment(&self, course_id: &str) -> Result<Option<ResolvedGrade>, ClientError> {
        let Some(enrollment) = client::own_enrollment(self.client.as_ref(), course_id).await? else {
            return Ok(None);
        };
        Ok(enrollment.percentage().map(|value| ResolvedGrade {
            value,
            source: GradeSource::Enrollment,
            letter_grade: enrollment.grade_label(),
        }))
    }

    pub fn clear_cache(&self) {
        self.recent.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeGradingClient;
    use futures::executor::block_on;
    use serde_json::json;

    const ENROLLMENTS: &str = "/api/v1/courses/9/enrollments";
    const SUBMISSION: &str = "/api/v1/courses/9/assignments/31/submissions/self";

    fn resolver(client: Arc<FakeGradingClient>) -> GradeResolver {
        GradeResolver::new(&EngineConfig::default(), client)
    }

    #[tokio::test]
    async fn assignment_score_wins_over_enrollment() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .with_sentinel("9", 31, "Current Score")
            .with_submission("9", 31, json!({ "score": 3.25, "grade": "Target" }))
            .with_enrollment("9", json!({ "computed_current_score": 88.0 }));

        let grade = resolver(client.clone()).resolve_grade("9").await.unwrap();
        assert_eq!(grade.value, 3.25);
        assert_eq!(grade.source, GradeSource::Assignment);
        assert_eq!(grade.letter_grade.as_deref(), Some("Target"));
        assert_eq!(client.calls_to(ENROLLMENTS), 0);
    }

    #[tokio::test]
    async fn ungraded_submission_falls_back_to_enrollment() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .with_sentinel("9", 31, "Current Score")
            .with_submission("9", 31, json!({ "score": null }))
            .with_enrollment("9", json!({ "grades": { "current_score": 77.5 } }));

        let grade = resolver(client).resolve_grade("9").await.unwrap();
        assert_eq!(grade.value, 77.5);
        assert_eq!(grade.source, GradeSource::Enrollment);
    }

    #[tokio::test]
    async fn assignment_failure_falls_back_to_enrollment() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .with_sentinel("9", 31, "Current Score")
            .fail(SUBMISSION)
            .with_enrollment("9", json!({ "computed_final_score": 64.0 }));

        let grade = resolver(client).resolve_grade("9").await.unwrap();
        assert_eq!(grade.value, 64.0);
        assert_eq!(grade.source, GradeSource::Enrollment);
    }

    #[tokio::test]
    async fn no_sources_yields_none() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .respond("/api/v1/courses/9/assignments", json!([]))
            .with_enrollment("9", json!({ "grades": {} }));

        assert_eq!(resolver(client).resolve_grade("9").await, None);
    }

    #[tokio::test]
    async fn enrollment_failure_yields_none() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .respond("/api/v1/courses/9/assignments", json!([]))
            .fail(ENROLLMENTS);

        assert_eq!(resolver(client).resolve_grade("9").await, None);
    }

    #[tokio::test]
    async fn burst_is_served_from_cache() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .respond("/api/v1/courses/9/assignments", json!([]))
            .with_enrollment("9", json!({ "computed_current_score": 90.0 }));
        let resolver = resolver(client.clone());

        resolver.resolve_grade("9").await.unwrap();
        let calls_after_first = client.call_count();
        resolver.resolve_grade("9").await.unwrap();
        assert_eq!(client.call_count(), calls_after_first);

        resolver.resolve_fresh("9").await.unwrap();
        assert_eq!(client.call_count(), calls_after_first * 2);
    }

    // moka expires entries on the wall clock, so this sleeps for real and
    // stays off the tokio runtime.
    #[test]
    fn cache_entries_expire() {
        let client = Arc::new(FakeGradingClient::new());
        client
            .respond("/api/v1/courses/9/assignments", json!([]))
            .with_enrollment("9", json!({ "computed_current_score": 90.0 }));
        let resolver =
            GradeResolver::with_ttl(client.clone(), "Current Score", Duration::from_millis(50));

        block_on(async {
            resolver.resolve_grade("9").await.unwrap();
            let calls_after_first = client.call_count();
            std::thread::sleep(Duration::from_millis(120));
            resolver.resolve_grade("9").await.unwrap();
            assert_eq!(client.call_count(), calls_after_first * 2);
        });
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let client = Arc::new(FakeGradingClient::new());
        client.fail_course("9");
        let resolver = resolver(client.clone());

        assert_eq!(resolver.resolve_grade("9").await, None);
        let calls_after_first = client.call_count();
        assert_eq!(resolver.resolve_grade("9").await, None);
        assert_eq!(client.call_count(), calls_after_first * 2);
    }
}
