//! Session-scoped course snapshot cache.
//!
//! [`SnapshotStore::populate`] is the only code path that writes a snapshot.
//! Everything else reads. Concurrent populates for one course are not
//! deduplicated; the later write wins, and both writers derive from the same
//! remote state.

use std::sync::Arc;

use chrono::Utc;

use crate::classifier::CourseClassifier;
use crate::client::GradingClient;
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::models::{CourseSnapshot, GradeSource, PageContext};
use crate::resolver::GradeResolver;
use crate::session::SessionStore;

pub struct SnapshotStore {
    session: Arc<dyn SessionStore>,
    classifier: CourseClassifier,
    resolver: GradeResolver,
    key_prefix: String,
}

impl SnapshotStore {
    pub fn new(
        config: &EngineConfig,
        client: Arc<dyn GradingClient>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        let classifier = CourseClassifier::new(config, Arc::clone(&client), Arc::clone(&session))?;
        let resolver = GradeResolver::new(config, client);
        Ok(Self {
            session,
            classifier,
            resolver,
            key_prefix: format!("{}snapshot:", config.key_prefix),
        })
    }

    pub fn classifier(&self) -> &CourseClassifier {
        &self.classifier
    }

    pub fn resolver(&self) -> &GradeResolver {
        &self.resolver
    }

    fn key(&self, course_id: &str) -> String {
        format!("{}{}", self.key_prefix, course_id)
    }

    /// Stored snapshot for `course_id`. Never touches the network.
    pub fn get(&self, course_id: &str) -> Option<CourseSnapshot> {
        let key = self.key(course_id);
        let raw = self.session.get(&key)?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(course_id, error = %e, "dropping malformed snapshot");
                if let Err(e) = self.session.delete(&key) {
                    tracing::warn!(course_id, error = %e, "failed to delete malformed snapshot");
                }
                None
            }
        }
    }

    /// Every stored snapshot, ordered by course id.
    pub fn snapshots(&self) -> Vec<CourseSnapshot> {
        let mut snapshots: Vec<CourseSnapshot> = self
            .session
            .keys()
            .iter()
            .filter_map(|key| key.strip_prefix(&self.key_prefix))
            .filter_map(|course_id| self.get(course_id))
            .collect();
        snapshots.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        snapshots
    }

    /// Resolve, classify and store a fresh snapshot.
    ///
    /// Returns `None` without writing when no grade is available, leaving any
    /// earlier snapshot in place.
    pub async fn populate(&self, course_id: &str, course_name: &str) -> Option<CourseSnapshot> {
        let Some(grade) = self.resolver.resolve_fresh(course_id).await else {
            tracing::debug!(course_id, "no grade available, snapshot left as is");
            return None;
        };

        let letter_grade = grade.letter_grade.as_deref();
        // An assignment-sourced grade means the resolver already found the sentinel.
        let is_standards_based = match grade.source {
            GradeSource::Assignment => {
                self.classifier
                    .classify_with_sentinel(course_id, course_name, letter_grade)
            }
            GradeSource::Enrollment => {
                self.classifier
                    .classify(course_id, course_name, letter_grade, true)
                    .await
            }
        };

        let snapshot = CourseSnapshot {
            course_id: course_id.to_string(),
            course_name: course_name.to_string(),
            is_standards_based,
            score: Some(grade.value),
            letter_grade: grade.letter_grade,
            grade_source: grade.source,
            timestamp: Utc::now().timestamp_millis(),
        };

        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(course_id, error = %e, "failed to serialize snapshot");
                return None;
            }
        };
        if let Err(e) = self.session.set(&self.key(course_id), raw) {
            tracing::warn!(course_id, error = %e, "failed to store snapshot");
            return None;
        }

        tracing::debug!(
            course_id,
            is_standards_based,
            score = grade.value,
            source = %snapshot.grade_source,
            "snapshot stored"
        );
        Some(snapshot)
    }

    /// Whether a consumer on `page` should repopulate `course_id`.
    ///
    /// Standards-based snapshots are stable once computed. Traditional ones
    /// are refreshed everywhere except the dashboard.
    pub fn should_refresh(&self, course_id: &str, page: PageContext) -> bool {
        match self.get(course_id) {
            None => true,
            Some(snapshot) if snapshot.is_standards_based => false,
            Some(_) => page != PageContext::Dashboard,
        }
    }

    pub async fn refresh(
        &self,
        course_id: &str,
        course_name: &str,
        page: PageContext,
        force: bool,
    ) -> Option<CourseSnapshot> {
        if force || self.should_refresh(course_id, page) {
            self.populate(course_id, course_name).await
        } else {
            self.get(course_id)
        }
    }

    /// Remove every snapshot and reset the classification and grade caches.
    ///
    /// Meant for session boundaries such as sign-out. Returns the number of
    /// snapshots removed.
    pub fn clear_all(&self) -> usize {
        let mut removed = 0;
        for key in self.session.keys() {
            if !key.starts_with(&self.key_prefix) {
                continue;
            }
            match self.session.delete(&key) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to delete snapshot"),
            }
        }
        let classifications = self.classifier.clear_cache();
        self.resolver.clear_cache();
        tracing::info!(snapshots = removed, classifications, "session cache cleared");
        removed
    }
}
