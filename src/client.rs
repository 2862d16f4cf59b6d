//! Remote grading client.
//!
//! [`GradingClient`] is the seam to the learning-management REST API. The
//! typed helpers below decode the few responses the engine needs so that
//! business logic only sees named optional fields.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ClientError;

#[async_trait]
pub trait GradingClient: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ClientError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assignment {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Submission {
    pub score: Option<f64>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EnrollmentGrades {
    pub current_score: Option<f64>,
    pub final_score: Option<f64>,
    pub current_grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Enrollment {
    pub computed_current_score: Option<f64>,
    pub computed_final_score: Option<f64>,
    pub computed_current_grade: Option<String>,
    pub grades: Option<EnrollmentGrades>,
}

impl Enrollment {
    /// First available percentage, current before final, computed before calculated.
    pub fn percentage(&self) -> Option<f64> {
        let grades = self.grades.as_ref();
        self.computed_current_score
            .or_else(|| grades.and_then(|g| g.current_score))
            .or(self.computed_final_score)
            .or_else(|| grades.and_then(|g| g.final_score))
    }

    pub fn grade_label(&self) -> Option<String> {
        self.computed_current_grade
            .clone()
            .or_else(|| self.grades.as_ref().and_then(|g| g.current_grade.clone()))
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode {
        path: path.to_string(),
        detail: e.to_string(),
    })
}

/// Find an assignment in `course_id` whose name equals `name` exactly.
pub async fn find_assignment(
    client: &dyn GradingClient,
    course_id: &str,
    name: &str,
) -> Result<Option<Assignment>, ClientError> {
    let path = format!("/api/v1/courses/{course_id}/assignments");
    let value = client.get(&path, &[("search_term", name)]).await?;
    let assignments: Vec<Assignment> = decode(&path, value)?;
    Ok(assignments.into_iter().find(|a| a.name == name))
}

pub async fn own_submission(
    client: &dyn GradingClient,
    course_id: &str,
    assignment_id: u64,
) -> Result<Submission, ClientError> {
    let path = format!("/api/v1/courses/{course_id}/assignments/{assignment_id}/submissions/self");
    let value = client.get(&path, &[]).await?;
    decode(&path, value)
}

/// The caller's enrollment in `course_id`, with aggregate scores included.
pub async fn own_enrollment(
    client: &dyn GradingClient,
    course_id: &str,
) -> Result<Option<Enrollment>, ClientError> {
    let path = format!("/api/v1/courses/{course_id}/enrollments");
    let value = client
        .get(&path, &[("user_id", "self"), ("include[]", "total_scores")])
        .await?;
    let enrollments: Vec<Enrollment> = decode(&path, value)?;
    let first_scored = enrollments.iter().position(|e| e.percentage().is_some());
    Ok(match first_scored {
        Some(idx) => enrollments.into_iter().nth(idx),
        None => enrollments.into_iter().next(),
    })
}

/// HTTP client for a Canvas-style REST API.
#[derive(Clone)]
pub struct CanvasClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl CanvasClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Http {
                path: base_url.to_string(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, path: &str, req: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let resp = req.send().await.map_err(|e| ClientError::Http {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        resp.json::<Value>().await.map_err(|e| ClientError::Decode {
            path: path.to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl GradingClient for CanvasClient {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ClientError> {
        tracing::debug!(path, "GET");
        let req = self.request(reqwest::Method::GET, path).query(query);
        self.send(path, req).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        tracing::debug!(path, "POST");
        let req = self.request(reqwest::Method::POST, path).json(body);
        self.send(path, req).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        tracing::debug!(path, "PUT");
        let req = self.request(reqwest::Method::PUT, path).json(body);
        self.send(path, req).await
    }
}
