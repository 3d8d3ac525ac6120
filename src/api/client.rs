// SPDX-License-Identifier: MIT

//! HTTP client for the classification backend
//!
//! JSON over HTTP with an optional session cookie. Any non-2xx answer becomes
//! [`ClassifierError::Api`] carrying the server's error text; nothing is
//! retried.

use super::config::Config;
use super::error::{ClassifierError, Result};
use super::session::User;
use crate::classification::jobs::{
    DataRefresh, JobSnapshot, JobStatusSource, ResponseDraft, SaveSink,
};
use crate::classification::preview::{EvaluationResult, Evaluator, TestRequest};
use crate::classification::rules::{sort_by_priority, ClassificationRule, RuleStore};
use async_trait::async_trait;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

const RULES_PATH: &str = "/api/classification/rules";
const TEST_PATH: &str = "/api/classification/test";
const AUTH_STATUS_PATH: &str = "/api/auth/status";

/// Header carrying the autosave edit sequence number
pub const EDIT_SEQUENCE_HEADER: &str = "X-Edit-Sequence";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session_cookie: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        log::info!(
            "API client: base_url={}, has_session={}",
            config.base_url,
            config.session_cookie.is_some()
        );
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            session_cookie: config.session_cookie.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined)
            .map_err(|e| ClassifierError::config(format!("invalid URL '{}': {}", joined, e)))
    }

    /// Send a request and hand back the response whatever its status
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra: Option<(&str, String)>,
    ) -> Result<Response> {
        let url = self.url(path)?;
        log::debug!("{} {}", method, url);

        let mut req = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if let Some(cookie) = &self.session_cookie {
            req = req.header(header::COOKIE, cookie);
        }
        if let Some((name, value)) = extra {
            req = req.header(name, value);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        Ok(req.send().await?)
    }

    /// Send a request, failing on any non-2xx status
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let resp = self.execute(method, path, body, None).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let resp = self.send(method, path, body).await?;
        Ok(resp.json().await?)
    }

    /// The signed-in user, or `None` when the backend answers 401
    pub async fn auth_status(&self) -> Result<Option<User>> {
        let resp = self.execute(Method::GET, AUTH_STATUS_PATH, None, None).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(Some(resp.json().await?))
    }
}

/// Turn a failed response into an API error with the server's text
async fn api_error(resp: Response) -> ClassifierError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = error_message(&text)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();
    log::warn!("API error {}: {}", status.as_u16(), message);
    ClassifierError::api(status.as_u16(), message)
}

/// Pull a readable message out of an error body
///
/// Accepts `{"error": ..}`, `{"message": ..}`, a bare JSON string or plain
/// text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let message = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or(body)
            .to_string(),
        Ok(Value::String(s)) => s,
        _ => body.to_string(),
    };
    Some(message)
}

fn not_found_on_404(err: ClassifierError, id: i64) -> ClassifierError {
    match err {
        ClassifierError::Api { status: 404, .. } => ClassifierError::not_found("rule", id),
        other => other,
    }
}

#[async_trait]
impl RuleStore for ApiClient {
    async fn list(&self) -> Result<Vec<ClassificationRule>> {
        let mut rules: Vec<ClassificationRule> = self.request(Method::GET, RULES_PATH, None).await?;
        sort_by_priority(&mut rules);
        Ok(rules)
    }

    async fn get(&self, id: i64) -> Result<ClassificationRule> {
        self.request(Method::GET, &format!("{}/{}", RULES_PATH, id), None)
            .await
            .map_err(|e| not_found_on_404(e, id))
    }

    async fn create(&self, rule: &ClassificationRule) -> Result<ClassificationRule> {
        let body = serde_json::to_value(rule)?;
        self.request(Method::POST, RULES_PATH, Some(body)).await
    }

    async fn update(&self, id: i64, rule: &ClassificationRule) -> Result<ClassificationRule> {
        let body = serde_json::to_value(rule)?;
        self.request(Method::PUT, &format!("{}/{}", RULES_PATH, id), Some(body))
            .await
            .map_err(|e| not_found_on_404(e, id))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.send(Method::DELETE, &format!("{}/{}", RULES_PATH, id), None)
            .await
            .map_err(|e| not_found_on_404(e, id))?;
        Ok(())
    }

    async fn export(&self) -> Result<Vec<ClassificationRule>> {
        self.request(Method::GET, &format!("{}/export", RULES_PATH), None)
            .await
    }

    async fn import(&self, rules: &[ClassificationRule]) -> Result<usize> {
        let body = serde_json::to_value(rules)?;
        let resp = self
            .send(Method::POST, &format!("{}/import", RULES_PATH), Some(body))
            .await?;
        let text = resp.text().await?;
        let count = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Number(n)) => n.as_u64(),
            Ok(Value::Array(items)) => Some(items.len() as u64),
            Ok(Value::Object(map)) => ["imported", "count"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_u64)),
            _ => None,
        };
        Ok(count.map_or(rules.len(), |n| n as usize))
    }
}

#[async_trait]
impl Evaluator for ApiClient {
    async fn evaluate(&self, request: &TestRequest) -> Result<EvaluationResult> {
        let body = serde_json::to_value(request)?;
        self.request(Method::POST, TEST_PATH, Some(body)).await
    }
}

/// The refresh-job status endpoint
#[derive(Clone)]
pub struct JobStatusEndpoint {
    client: ApiClient,
    path: String,
}

impl JobStatusEndpoint {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl JobStatusSource for JobStatusEndpoint {
    /// 404, 204, `null` and bodies without a `status` all mean no job
    async fn status(&self) -> Result<Option<JobSnapshot>> {
        let resp = self.client.execute(Method::GET, &self.path, None, None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Ok(None),
            status if !status.is_success() => return Err(api_error(resp).await),
            _ => {}
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&text)?;
        if value.get("status").map_or(true, Value::is_null) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// Reloads a resource with a plain GET once a job finished
#[derive(Clone)]
pub struct ResourceRefresh {
    client: ApiClient,
    path: String,
}

impl ResourceRefresh {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl DataRefresh for ResourceRefresh {
    async fn refresh(&self) -> Result<()> {
        let resp = self.client.send(Method::GET, &self.path, None).await?;
        let body = resp.bytes().await?;
        log::info!("Refreshed {} ({} bytes)", self.path, body.len());
        Ok(())
    }
}

/// Saves requirement answers of one assessment
#[derive(Clone)]
pub struct AssessmentResponses {
    client: ApiClient,
    token: String,
}

impl AssessmentResponses {
    pub fn new(client: ApiClient, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }

    /// Answers stored so far, ordered by requirement
    pub async fn list(&self) -> Result<Vec<ResponseDraft>> {
        let path = format!("/api/assessment/{}/responses", self.token);
        self.client.request(Method::GET, &path, None).await
    }
}

#[async_trait]
impl SaveSink<ResponseDraft> for AssessmentResponses {
    async fn save(&self, seq: u64, value: &ResponseDraft) -> Result<ResponseDraft> {
        let path = format!("/api/assessment/{}/response", self.token);
        let body = serde_json::to_value(value)?;
        let resp = self
            .client
            .execute(
                Method::POST,
                &path,
                Some(body),
                Some((EDIT_SEQUENCE_HEADER, seq.to_string())),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let text = resp.text().await?;
        // The backend may answer with the stored response or just a status
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| value.clone()))
    }
}
