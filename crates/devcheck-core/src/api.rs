use std::fs;
use std::future::Future;
use std::path::Path;

use anyhow::{Context, bail};
use devcheck_shared::{
    Credentials, IssueReport, Page, PageId, Project, ProjectCreate, ProjectDetail, ProjectId,
    ProjectPatch, Section, SectionId, Stage, Task, TaskId, TaskPatch, TokenPair, User,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("not authorized (HTTP 401)")]
    Unauthorized,

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Project thumbnail sent as the `image` part of a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    #[tracing::instrument]
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            bail!("image path has no file name: {}", path.display());
        };
        let bytes =
            fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
        if bytes.is_empty() {
            bail!("image file is empty: {}", path.display());
        }

        Ok(Self {
            mime: image_mime(path),
            file_name,
            bytes,
        })
    }
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Backend operations the checklist core depends on.
///
/// Any non-2xx response or transport failure comes back as an `ApiError`;
/// callers decide whether that triggers a reconciliation.
pub trait ChecklistApi {
    fn list_projects(&self) -> impl Future<Output = ApiResult<Vec<Project>>> + Send;

    fn get_project_detail(
        &self,
        project: ProjectId,
    ) -> impl Future<Output = ApiResult<ProjectDetail>> + Send;

    /// With an `image`, the fields go out as multipart form data.
    fn create_project(
        &self,
        fields: ProjectCreate,
        image: Option<ImageUpload>,
    ) -> impl Future<Output = ApiResult<Project>> + Send;

    fn update_project(
        &self,
        project: ProjectId,
        patch: ProjectPatch,
        image: Option<ImageUpload>,
    ) -> impl Future<Output = ApiResult<ProjectDetail>> + Send;

    fn delete_project(&self, project: ProjectId) -> impl Future<Output = ApiResult<()>> + Send;

    fn create_page(
        &self,
        project: ProjectId,
        name: String,
    ) -> impl Future<Output = ApiResult<Page>> + Send;

    fn delete_page(&self, page: PageId) -> impl Future<Output = ApiResult<()>> + Send;

    fn create_section(
        &self,
        page: PageId,
        title: Stage,
    ) -> impl Future<Output = ApiResult<Section>> + Send;

    fn create_task(
        &self,
        section: SectionId,
        title: String,
        completed: bool,
    ) -> impl Future<Output = ApiResult<Task>> + Send;

    fn update_task(
        &self,
        task: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = ApiResult<Task>> + Send;

    fn delete_task(&self, task: TaskId) -> impl Future<Output = ApiResult<()>> + Send;

    fn get_current_user(&self) -> impl Future<Output = ApiResult<User>> + Send;

    fn submit_issue_report(
        &self,
        report: IssueReport,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn register(&self, credentials: Credentials) -> impl Future<Output = ApiResult<User>> + Send;

    fn obtain_token(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = ApiResult<TokenPair>> + Send;

    fn refresh_token(&self, refresh: String) -> impl Future<Output = ApiResult<String>> + Send;
}
