//! Scripted in-memory grading client for tests and dry runs.
//!
//! Responses are registered per path; unregistered paths answer with HTTP 404.
//! Every call is counted so tests can assert on remote traffic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::GradingClient;
use crate::error::ClientError;
use crate::session::lock;

#[derive(Debug, Clone)]
enum Scripted {
    Respond(Value),
    Fail,
}

#[derive(Debug, Default)]
pub struct FakeGradingClient {
    routes: Mutex<HashMap<String, Scripted>>,
    failing_courses: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl FakeGradingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` (tokio clock) before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn respond(&self, path: &str, body: Value) -> &Self {
        lock(&self.routes).insert(path.to_string(), Scripted::Respond(body));
        self
    }

    pub fn fail(&self, path: &str) -> &Self {
        lock(&self.routes).insert(path.to_string(), Scripted::Fail);
        self
    }

    /// Every request under `/api/v1/courses/{course_id}/` fails.
    pub fn fail_course(&self, course_id: &str) -> &Self {
        lock(&self.failing_courses).push(format!("/api/v1/courses/{course_id}/"));
        self
    }

    /// Register the sentinel assignment `name` with `id` in `course_id`.
    pub fn with_sentinel(&self, course_id: &str, id: u64, name: &str) -> &Self {
        self.respond(
            &format!("/api/v1/courses/{course_id}/assignments"),
            json!([{ "id": id, "name": name }]),
        )
    }

    pub fn with_submission(&self, course_id: &str, assignment_id: u64, body: Value) -> &Self {
        self.respond(
            &format!("/api/v1/courses/{course_id}/assignments/{assignment_id}/submissions/self"),
            body,
        )
    }

    pub fn with_enrollment(&self, course_id: &str, body: Value) -> &Self {
        self.respond(
            &format!("/api/v1/courses/{course_id}/enrollments"),
            json!([body]),
        )
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|p| p.as_str() == path).count()
    }

    async fn answer(&self, path: &str) -> Result<Value, ClientError> {
        lock(&self.calls).push(path.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let course_failed = lock(&self.failing_courses)
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        if course_failed {
            return Err(ClientError::Http {
                path: path.to_string(),
                detail: "connection reset".to_string(),
            });
        }

        let scripted = lock(&self.routes).get(path).cloned();
        match scripted {
            Some(Scripted::Respond(body)) => Ok(body),
            Some(Scripted::Fail) => Err(ClientError::Http {
                path: path.to_string(),
                detail: "connection reset".to_string(),
            }),
            None => Err(ClientError::Status {
                path: path.to_string(),
                status: 404,
            }),
        }
    }
}

#[async_trait]
impl GradingClient for FakeGradingClient {
    async fn get(&self, path: &str, _query: &[(&str, &str)]) -> Result<Value, ClientError> {
        self.answer(path).await
    }

    async fn post(&self, path: &str, _body: &Value) -> Result<Value, ClientError> {
        self.answer(path).await
    }

    async fn put(&self, path: &str, _body: &Value) -> Result<Value, ClientError> {
        self.answer(path).await
    }
}
