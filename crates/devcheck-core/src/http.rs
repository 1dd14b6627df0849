use std::time::Duration;

use anyhow::Context;
use devcheck_shared::{
    AccessToken, Credentials, IssueReport, Page, PageCreate, PageId, Project, ProjectCreate,
    ProjectDetail, ProjectId, ProjectPatch, RefreshRequest, Section, SectionCreate, SectionId,
    Stage, Task, TaskCreate, TaskId, TaskPatch, TokenPair, User,
};
use parking_lot::RwLock;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, ApiResult, ChecklistApi, ImageUpload};

const API_PREFIX: &str = "checklists";

/// `ChecklistApi` over the REST backend.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    access: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            anyhow::bail!("api.base_url is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for checklist API")?;

        Ok(Self {
            client,
            base_url: trimmed.trim_end_matches('/').to_string(),
            access: RwLock::new(None),
        })
    }

    pub fn with_access_token(self, token: Option<String>) -> Self {
        *self.access.write() = token;
        self
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access.write() = token;
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path.trim_start_matches('/'))
    }

    #[instrument(skip(self, body))]
    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let mut request = self
            .client
            .request(method, url.as_str())
            .header(header::ACCEPT, "application/json");

        request = self.authorize(request);

        if let Some(body) = body {
            let payload =
                serde_json::to_string(body).map_err(|e| ApiError::Decode(e.to_string()))?;
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        self.execute(request, &url).await
    }

    /// Sends `payload` as form text parts plus the image as a file part.
    #[instrument(skip(self, payload, image), fields(image = %image.file_name))]
    async fn send_multipart<B>(
        &self,
        method: Method,
        path: &str,
        payload: &B,
        image: ImageUpload,
    ) -> ApiResult<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let mut form = Form::new();
        for (name, value) in form_fields(payload)? {
            form = form.text(name, value);
        }
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(image.mime)
            .map_err(|e| ApiError::Transport(format!("invalid image type: {e}")))?;
        form = form.part("image", part);

        let request = self
            .client
            .request(method, url.as_str())
            .header(header::ACCEPT, "application/json")
            .multipart(form);
        self.execute(self.authorize(request), &url).await
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access.read().clone();
        match token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder, url: &str) -> ApiResult<String> {
        let response = request.send().await.map_err(|error| {
            warn!(url = %url, error = %error, "checklist request failed");
            ApiError::Transport(error.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| ApiError::Transport(format!("failed reading body: {error}")))?;

        debug!(url = %url, status = %status, bytes = text.len(), "checklist response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    async fn json<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self.send(method, path, body).await?;
        decode(&text)
    }

    async fn empty<B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, path, body).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Flattens a JSON object payload into form fields. Nulls are left out and
/// non-string scalars use their JSON text.
fn form_fields<B: Serialize + ?Sized>(payload: &B) -> ApiResult<Vec<(String, String)>> {
    let value = serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ApiError::Decode("form payload is not an object".to_string()));
    };

    Ok(map
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((name, text)),
            other => Some((name, other.to_string())),
        })
        .collect())
}

const NO_BODY: Option<&()> = None;

impl ChecklistApi for HttpApi {
    async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.json(Method::GET, "projects/", NO_BODY).await
    }

    async fn get_project_detail(&self, project: ProjectId) -> ApiResult<ProjectDetail> {
        self.json(Method::GET, &format!("projects/{project}/detail/"), NO_BODY)
            .await
    }

    async fn create_project(
        &self,
        fields: ProjectCreate,
        image: Option<ImageUpload>,
    ) -> ApiResult<Project> {
        match image {
            Some(image) => {
                let text = self
                    .send_multipart(Method::POST, "projects/", &fields, image)
                    .await?;
                decode(&text)
            }
            None => self.json(Method::POST, "projects/", Some(&fields)).await,
        }
    }

    async fn update_project(
        &self,
        project: ProjectId,
        patch: ProjectPatch,
        image: Option<ImageUpload>,
    ) -> ApiResult<ProjectDetail> {
        let path = format!("projects/{project}/detail/");
        match image {
            Some(image) => {
                let text = self
                    .send_multipart(Method::PATCH, &path, &patch, image)
                    .await?;
                decode(&text)
            }
            None => self.json(Method::PATCH, &path, Some(&patch)).await,
        }
    }

    async fn delete_project(&self, project: ProjectId) -> ApiResult<()> {
        self.empty(Method::DELETE, &format!("projects/delete/{project}/"), NO_BODY)
            .await
    }

    async fn create_page(&self, project: ProjectId, name: String) -> ApiResult<Page> {
        self.json(
            Method::POST,
            &format!("projects/{project}/pages/"),
            Some(&PageCreate { name }),
        )
        .await
    }

    async fn delete_page(&self, page: PageId) -> ApiResult<()> {
        self.empty(Method::DELETE, &format!("pages/{page}/"), NO_BODY)
            .await
    }

    // The backend mounts section and task creation under `projects/<parent>/`.
    async fn create_section(&self, page: PageId, title: Stage) -> ApiResult<Section> {
        self.json(
            Method::POST,
            &format!("projects/{page}/sections/"),
            Some(&SectionCreate { title }),
        )
        .await
    }

    async fn create_task(
        &self,
        section: SectionId,
        title: String,
        completed: bool,
    ) -> ApiResult<Task> {
        self.json(
            Method::POST,
            &format!("projects/{section}/tasks/"),
            Some(&TaskCreate { title, completed }),
        )
        .await
    }

    async fn update_task(&self, task: TaskId, patch: TaskPatch) -> ApiResult<Task> {
        self.json(Method::PATCH, &format!("tasks/{task}/"), Some(&patch))
            .await
    }

    async fn delete_task(&self, task: TaskId) -> ApiResult<()> {
        self.empty(Method::DELETE, &format!("tasks/{task}/"), NO_BODY)
            .await
    }

    async fn get_current_user(&self) -> ApiResult<User> {
        self.json(Method::GET, "user/", NO_BODY).await
    }

    async fn submit_issue_report(&self, report: IssueReport) -> ApiResult<()> {
        self.empty(Method::POST, "issues/", Some(&report)).await
    }

    async fn register(&self, credentials: Credentials) -> ApiResult<User> {
        self.json(Method::POST, "user/register/", Some(&credentials))
            .await
    }

    async fn obtain_token(&self, credentials: Credentials) -> ApiResult<TokenPair> {
        self.json(Method::POST, "token/", Some(&credentials)).await
    }

    async fn refresh_token(&self, refresh: String) -> ApiResult<String> {
        let token: AccessToken = self
            .json(Method::POST, "token/refresh/", Some(&RefreshRequest { refresh }))
            .await?;
        Ok(token.access)
    }
}
