//! Course grading-model classification.
//!
//! A course is standards-based when its name matches a configured pattern,
//! when its letter grade is a rating-scale label, or when it carries the
//! sentinel assignment. Checks run in that order and stop at the first hit.

use std::sync::Arc;

use crate::client::{self, GradingClient};
use crate::config::{EngineConfig, NameMatcher, RatingScale};
use crate::error::ConfigError;
use crate::session::SessionStore;

pub struct CourseClassifier {
    client: Arc<dyn GradingClient>,
    session: Arc<dyn SessionStore>,
    matchers: Vec<NameMatcher>,
    rating_scale: RatingScale,
    sentinel: String,
    key_prefix: String,
}

/// How a probe-backed check ended.
enum Probe {
    Found,
    NotFound,
    Failed,
    Skipped,
}

impl CourseClassifier {
    pub fn new(
        config: &EngineConfig,
        client: Arc<dyn GradingClient>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            session,
            matchers: config.matchers()?,
            rating_scale: config.rating_scale.clone(),
            sentinel: config.sentinel_assignment.clone(),
            key_prefix: format!("{}sbg:", config.key_prefix),
        })
    }

    fn key(&self, course_id: &str) -> String {
        format!("{}{}", self.key_prefix, course_id)
    }

    /// Previously stored classification, if any. Unparsable entries are dropped.
    pub fn cached(&self, course_id: &str) -> Option<bool> {
        let key = self.key(course_id);
        let raw = self.session.get(&key)?;
        match serde_json::from_str::<bool>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(course_id, error = %e, "dropping malformed cached classification");
                if let Err(e) = self.session.delete(&key) {
                    tracing::warn!(course_id, error = %e, "failed to delete cached classification");
                }
                None
            }
        }
    }

    fn remember(&self, course_id: &str, standards_based: bool) {
        let key = self.key(course_id);
        if let Err(e) = self.session.set(&key, standards_based.to_string()) {
            tracing::warn!(course_id, error = %e, "failed to cache classification");
        }
    }

    pub fn matches_name(&self, course_name: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(course_name))
    }

    pub fn is_rating_label(&self, letter_grade: &str) -> bool {
        self.rating_scale.contains_label(letter_grade)
    }

    async fn probe(&self, course_id: &str) -> Probe {
        match client::find_assignment(self.client.as_ref(), course_id, &self.sentinel).await {
            Ok(Some(_)) => Probe::Found,
            Ok(None) => Probe::NotFound,
            Err(e) => {
                tracing::warn!(course_id, error = %e, "sentinel probe failed, treating as not found");
                Probe::Failed
            }
        }
    }

    /// Cache, name and rating-label checks. `None` when none of them decide.
    fn classify_locally(
        &self,
        course_id: &str,
        course_name: &str,
        letter_grade: Option<&str>,
    ) -> Option<bool> {
        if let Some(cached) = self.cached(course_id) {
            tracing::debug!(course_id, cached, "classification cache hit");
            return Some(cached);
        }

        if self.matches_name(course_name) {
            tracing::debug!(course_id, course_name, "standards-based by name");
            self.remember(course_id, true);
            return Some(true);
        }

        if letter_grade.is_some_and(|grade| self.is_rating_label(grade)) {
            tracing::debug!(course_id, ?letter_grade, "standards-based by rating label");
            self.remember(course_id, true);
            return Some(true);
        }

        None
    }

    fn settle(&self, course_id: &str, outcome: Probe) -> bool {
        match outcome {
            Probe::Found => {
                tracing::debug!(course_id, "standards-based by sentinel assignment");
                self.remember(course_id, true);
                true
            }
            // Only positives are cached; a later pass may still find the sentinel.
            Probe::NotFound | Probe::Failed | Probe::Skipped => false,
        }
    }

    /// Classify `course_id` as standards-based (`true`) or traditional (`false`).
    ///
    /// Never fails: a probe error counts as "sentinel not found".
    pub async fn classify(
        &self,
        course_id: &str,
        course_name: &str,
        letter_grade: Option<&str>,
        probe: bool,
    ) -> bool {
        if let Some(decided) = self.classify_locally(course_id, course_name, letter_grade) {
            return decided;
        }

        let outcome = if probe {
            self.probe(course_id).await
        } else {
            Probe::Skipped
        };
        self.settle(course_id, outcome)
    }

    /// Like [`classify`](Self::classify) for a course whose sentinel assignment
    /// the caller has already seen. Makes no remote calls.
    pub fn classify_with_sentinel(
        &self,
        course_id: &str,
        course_name: &str,
        letter_grade: Option<&str>,
    ) -> bool {
        self.classify_locally(course_id, course_name, letter_grade)
            .unwrap_or_else(|| self.settle(course_id, Probe::Found))
    }

    /// Drop every cached classification. Returns how many were removed.
    pub fn clear_cache(&self) -> usize {
        let mut removed = 0;
        for key in self.session.keys() {
            if key.starts_with(&self.key_prefix) {
                match self.session.delete(&key) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(key = %key, error = %e, "failed to delete cached classification"),
                }
            }
        }
        removed
    }
}
