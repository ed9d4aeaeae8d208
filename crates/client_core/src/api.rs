//! HTTP access to the task REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, COOKIE},
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{TaskId, UserId},
    error::{ApiError, ApiException},
    protocol::{
        CreateTaskResponse, MessageResponse, NewTask, ProfileUpdate, Task, TaskPage, TaskUpdate,
        UserProfile,
    },
};
use tracing::debug;
use url::Url;

use crate::{error::ClientError, query_state::QueryState};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn fetch_tasks(
        &self,
        user_id: &UserId,
        query: &QueryState,
    ) -> Result<TaskPage, ClientError>;
    async fn get_task(&self, task_id: &TaskId) -> Result<Task, ClientError>;
    async fn create_task(&self, task: &NewTask) -> Result<TaskId, ClientError>;
    async fn update_task(&self, task_id: &TaskId, update: &TaskUpdate) -> Result<(), ClientError>;
}

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ClientError>;
    async fn delete_user(&self, user_id: &UserId) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpClientOptions {
    /// Raw `Cookie` header carrying the authenticated session.
    pub session_cookie: Option<String>,
    pub timeout: Option<Duration>,
}

pub struct HttpTaskClient {
    http: Client,
    base_url: String,
}

impl HttpTaskClient {
    pub fn new(base_url: &str, options: HttpClientOptions) -> Result<Self, ClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        Url::parse(trimmed).map_err(|source| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = options.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            let mut value =
                HeaderValue::from_str(cookie).map_err(|_| ClientError::InvalidSessionCookie)?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()?;

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TaskApi for HttpTaskClient {
    async fn fetch_tasks(
        &self,
        user_id: &UserId,
        query: &QueryState,
    ) -> Result<TaskPage, ClientError> {
        debug!(user_id = %user_id, query = %query, "fetching task page");
        let response = self
            .http
            .get(format!("{}/tasks/user/{user_id}", self.base_url))
            .query(&query.to_pairs())
            .send()
            .await?;
        read_json(response).await
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Task, ClientError> {
        let response = self
            .http
            .get(format!("{}/tasks/{task_id}", self.base_url))
            .send()
            .await?;
        read_json(response).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<TaskId, ClientError> {
        reject_invalid(task.validate())?;
        let response = self
            .http
            .post(format!("{}/tasks/create", self.base_url))
            .json(task)
            .send()
            .await?;
        let created: CreateTaskResponse = read_json(response).await?;
        Ok(created.inserted_id)
    }

    async fn update_task(&self, task_id: &TaskId, update: &TaskUpdate) -> Result<(), ClientError> {
        reject_invalid(update.validate())?;
        let response = self
            .http
            .patch(format!("{}/tasks/{task_id}", self.base_url))
            .json(update)
            .send()
            .await?;
        success_body(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileApi for HttpTaskClient {
    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ClientError> {
        reject_invalid(update.validate())?;
        let response = self
            .http
            .patch(format!("{}/users/update/{user_id}", self.base_url))
            .json(update)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<String, ClientError> {
        let response = self
            .http
            .delete(format!("{}/users/delete/{user_id}", self.base_url))
            .send()
            .await?;
        let body: MessageResponse = read_json(response).await?;
        Ok(body.message)
    }
}

fn reject_invalid(errors: Vec<String>) -> Result<(), ClientError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(errors))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = success_body(response).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Returns the body of a 200 response, or the server's `message` as an error.
async fn success_body(response: Response) -> Result<Vec<u8>, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;
    if status == StatusCode::OK {
        return Ok(body.to_vec());
    }

    let exception = serde_json::from_slice::<ApiError>(&body)
        .map(ApiException::from)
        .unwrap_or_else(|_| ApiException::new(format!("request failed with status {status}")));
    debug!(status = status.as_u16(), message = %exception, "task API rejected request");
    Err(ClientError::Server {
        status: status.as_u16(),
        source: exception,
    })
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
