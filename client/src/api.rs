//! Remote task API: the four REST calls the rest of the crate is built on.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{CreateTaskRequest, Task, TaskId, UpdateTaskRequest};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Operation, TransportError};

const TASKS: &str = "tasks";

/// Calls against the task API. A failed attempt is reported as-is; nothing
/// here retries.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `GET /tasks`. Order is whatever the server returns.
    async fn list(&self) -> Result<Vec<Task>, TransportError>;

    /// `POST /tasks`. The server assigns the id, timestamps and initial status.
    async fn create(&self, request: &CreateTaskRequest) -> Result<Task, TransportError>;

    /// `PUT /tasks/{id}` with a partial body.
    async fn update(&self, id: &TaskId, updates: &UpdateTaskRequest)
        -> Result<Task, TransportError>;

    /// `DELETE /tasks/{id}`. Any response body is ignored.
    async fn delete(&self, id: &TaskId) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    config: ClientConfig,
    http: reqwest::Client,
}

impl HttpTaskApi {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.config.endpoint(segments);
        debug!(%method, %url, "sending task API request");
        self.http.request(method, url)
    }

    async fn send(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<Response, TransportError> {
        let response = request.send().await.map_err(|err| {
            debug!(?operation, error = %err, "task API request failed");
            TransportError::network(operation, err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                ?operation,
                status = status.as_u16(),
                %body,
                "task API returned error status"
            );
            return Err(TransportError::status(operation, status.as_u16(), body));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        operation: Operation,
        response: Response,
    ) -> Result<T, TransportError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::network(operation, err))?;
        serde_json::from_slice(&bytes).map_err(|err| {
            debug!(?operation, error = %err, "could not decode task API response");
            TransportError::decode(operation, err)
        })
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list(&self) -> Result<Vec<Task>, TransportError> {
        let response = self
            .send(Operation::List, self.request(Method::GET, &[TASKS]))
            .await?;
        let tasks: Vec<Task> = Self::decode(Operation::List, response).await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    async fn create(&self, request: &CreateTaskRequest) -> Result<Task, TransportError> {
        let response = self
            .send(
                Operation::Create,
                self.request(Method::POST, &[TASKS]).json(request),
            )
            .await?;
        Self::decode(Operation::Create, response).await
    }

    async fn update(
        &self,
        id: &TaskId,
        updates: &UpdateTaskRequest,
    ) -> Result<Task, TransportError> {
        let response = self
            .send(
                Operation::Update,
                self.request(Method::PUT, &[TASKS, id.as_str()]).json(updates),
            )
            .await?;
        Self::decode(Operation::Update, response).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TransportError> {
        self.send(
            Operation::Delete,
            self.request(Method::DELETE, &[TASKS, id.as_str()]),
        )
        .await?;
        Ok(())
    }
}
