use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use devcheck_shared::{
    PageId, PageNode, Project, ProjectCreate, ProjectId, ProjectPatch, ProjectStatus, Section,
    SectionId, SectionNode, Stage, TaskId, TaskPatch,
};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::{TaskTotals, detail_totals};
use crate::api::{ApiError, ApiResult, ChecklistApi, ImageUpload};
use crate::drafts::{DraftBook, SectionKey};
use crate::optimistic::{LocalEdit, Reconcile};
use crate::tree::ProjectTree;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("page {page} is missing sections: {}", stage_list(.missing))]
    PartialBatch { page: PageId, missing: Vec<Stage> },

    #[error("{0} not found")]
    NotFound(String),

    #[error("nothing staged to confirm")]
    NothingStaged,

    #[error("project {0} has not been loaded")]
    NotLoaded(ProjectId),
}

fn stage_list(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|s| s.code())
        .collect::<Vec<_>>()
        .join(", ")
}

/// User-visible failure message raised by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

/// Shared "is the view still mounted" flag. Once unmounted, in-flight
/// operations stop touching coordinator state.
#[derive(Debug, Clone)]
pub struct Lifecycle(Arc<AtomicBool>);

impl Default for Lifecycle {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl Lifecycle {
    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Applies user edits to one project's tree immediately, confirms them with
/// the backend, and reconciles with a full re-fetch where needed.
///
/// Every mutation borrows the coordinator mutably, so mutations on one
/// coordinator run one after another. Within a mutation, the section batch of
/// `add_page` and `repair_page` is still issued concurrently. Independent
/// projects can be driven concurrently through separate coordinators.
pub struct Coordinator<'a, A> {
    api: &'a A,
    project: ProjectId,
    tree: Option<ProjectTree>,
    drafts: DraftBook,
    new_page_name: String,
    staged_page_delete: Option<PageId>,
    staged_status: Option<ProjectStatus>,
    notices: Vec<Notice>,
    lifecycle: Lifecycle,
}

impl<'a, A: ChecklistApi> Coordinator<'a, A> {
    pub fn new(api: &'a A, project: ProjectId) -> Self {
        Self {
            api,
            project,
            tree: None,
            drafts: DraftBook::default(),
            new_page_name: String::new(),
            staged_page_delete: None,
            staged_status: None,
            notices: Vec::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project
    }

    pub fn tree(&self) -> Option<&ProjectTree> {
        self.tree.as_ref()
    }

    pub fn loaded_tree(&self) -> Result<&ProjectTree, MutationError> {
        self.tree
            .as_ref()
            .ok_or(MutationError::NotLoaded(self.project))
    }

    pub fn totals(&self) -> TaskTotals {
        self.tree
            .as_ref()
            .map(|tree| detail_totals(tree.detail()))
            .unwrap_or_default()
    }

    pub fn drafts(&self) -> &DraftBook {
        &self.drafts
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn new_page_name(&self) -> &str {
        &self.new_page_name
    }

    pub fn set_new_page_name(&mut self, name: impl Into<String>) {
        self.new_page_name = name.into();
    }

    pub fn staged_page_delete(&self) -> Option<PageId> {
        self.staged_page_delete
    }

    pub fn staged_status(&self) -> Option<ProjectStatus> {
        self.staged_status
    }

    fn mounted(&self) -> bool {
        self.lifecycle.is_mounted()
    }

    fn fail(&mut self, context: &str, err: MutationError) -> MutationError {
        error!(project = %self.project, error = %err, "{context}");
        if self.mounted() {
            self.notices.push(Notice {
                message: format!("{context}: {err}"),
            });
        }
        err
    }

    /// Initial fetch of the project tree.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn load(&mut self) -> Result<(), MutationError> {
        match self.api.get_project_detail(self.project).await {
            Ok(detail) => {
                self.replace_tree(ProjectTree::new(detail));
                Ok(())
            }
            Err(err) => Err(self.fetch_failed(err)),
        }
    }

    /// Full reconciliation: replaces local state with the server's tree.
    /// Returns whether fresh state was applied.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn reload(&mut self) -> bool {
        match self.api.get_project_detail(self.project).await {
            Ok(detail) => self.replace_tree(ProjectTree::new(detail)),
            Err(err) => {
                self.fetch_failed(err);
                false
            }
        }
    }

    fn replace_tree(&mut self, tree: ProjectTree) -> bool {
        if !self.mounted() {
            debug!("view unmounted; dropping fetched project tree");
            return false;
        }
        self.drafts.rekey(&tree);
        self.tree = Some(tree);
        true
    }

    fn fetch_failed(&mut self, err: ApiError) -> MutationError {
        if err.is_unauthorized() {
            warn!(project = %self.project, "project fetch unauthorized");
            return MutationError::Api(err);
        }
        self.fail("failed to fetch project details", err.into())
    }

    async fn run_edit<T, F>(
        &mut self,
        edit: LocalEdit,
        request: F,
        context: &str,
    ) -> Result<T, MutationError>
    where
        F: Future<Output = ApiResult<T>>,
    {
        if self.mounted()
            && let Some(tree) = self.tree.as_mut()
            && !edit.apply(tree)
        {
            debug!(?edit, "optimistic edit matched nothing locally");
        }

        let result = request.await;
        if edit.reconcile_after(result.is_ok()) == Reconcile::Refetch {
            self.reload().await;
        }
        result.map_err(|err| self.fail(context, err.into()))
    }

    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn toggle_task(
        &mut self,
        task: TaskId,
        current_completed: bool,
    ) -> Result<(), MutationError> {
        let completed = !current_completed;
        let patch = TaskPatch {
            completed: Some(completed),
            ..TaskPatch::default()
        };
        let api = self.api;
        self.run_edit(
            LocalEdit::SetTaskCompleted { task, completed },
            api.update_task(task, patch),
            "failed to toggle task",
        )
        .await
        .map(|_| ())
    }

    pub fn section_key(&self, page: PageId, stage: Stage) -> Result<SectionKey, MutationError> {
        Ok(SectionKey::for_section(self.loaded_tree()?, page, stage))
    }

    pub fn open_draft(&mut self, page: PageId, stage: Stage) -> Result<SectionKey, MutationError> {
        let key = self.section_key(page, stage)?;
        self.drafts.open(key);
        Ok(key)
    }

    pub fn set_draft_title(
        &mut self,
        page: PageId,
        stage: Stage,
        title: impl Into<String>,
    ) -> Result<SectionKey, MutationError> {
        let key = self.section_key(page, stage)?;
        self.drafts.set_title(key, title);
        Ok(key)
    }

    pub fn cancel_draft(&mut self, page: PageId, stage: Stage) -> Result<(), MutationError> {
        let key = self.section_key(page, stage)?;
        self.drafts.clear(key);
        Ok(())
    }

    /// Submits the draft typed for `page`/`stage`, resolving the section id
    /// from the tree when the draft was keyed before the id was known.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn submit_draft(&mut self, page: PageId, stage: Stage) -> Result<(), MutationError> {
        let key = self.section_key(page, stage)?;
        let title = self.drafts.title(key).trim().to_string();
        if title.is_empty() {
            return Err(MutationError::Validation("task title cannot be empty"));
        }

        let tree = self.loaded_tree()?;
        let Some(section) = key.resolve(tree) else {
            let err = MutationError::NotFound(format!("{} section on page {page}", stage.code()));
            return Err(self.fail("failed to add task", err));
        };
        self.add_task(section, &title, key).await
    }

    /// Creates a task, then clears the input keyed by `form_key` and
    /// re-fetches to pick up the server-assigned id. On failure the input is
    /// kept.
    #[instrument(skip(self, title), fields(project = %self.project))]
    pub async fn add_task(
        &mut self,
        section: SectionId,
        title: &str,
        form_key: SectionKey,
    ) -> Result<(), MutationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(MutationError::Validation("task title cannot be empty"));
        }

        match self.api.create_task(section, title.to_string(), false).await {
            Ok(task) => {
                info!(task = %task.id, section = %section, "task created");
                if self.mounted() {
                    self.drafts.clear(form_key);
                }
                self.reload().await;
                Ok(())
            }
            Err(err) => Err(self.fail("failed to add task", err.into())),
        }
    }

    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn delete_task(&mut self, task: TaskId) -> Result<(), MutationError> {
        let api = self.api;
        self.run_edit(
            LocalEdit::RemoveTask { task },
            api.delete_task(task),
            "failed to delete task",
        )
        .await
    }

    /// Creates a page and its three stage sections. The sections are
    /// requested concurrently and the page is only ready when all exist.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn add_page(&mut self, name: &str) -> Result<PageId, MutationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MutationError::Validation("page name cannot be empty"));
        }

        let page = match self.api.create_page(self.project, name.to_string()).await {
            Ok(page) => page,
            Err(err) => return Err(self.fail("failed to add page", err.into())),
        };
        info!(page = %page.id, "page created");

        if self.mounted()
            && let Some(tree) = self.tree.as_mut()
        {
            tree.upsert_page(PageNode {
                id: page.id,
                name: page.name.clone(),
                sections: vec![],
            });
        }

        let missing = self.create_sections(page.id, Stage::ALL.to_vec()).await;
        if missing.is_empty() && self.mounted() {
            self.new_page_name.clear();
        }
        self.reload().await;

        if missing.is_empty() {
            Ok(page.id)
        } else {
            let err = MutationError::PartialBatch {
                page: page.id,
                missing,
            };
            Err(self.fail("failed to add page", err))
        }
    }

    /// Adds the sections an incompletely created page is missing.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn repair_page(&mut self, page: PageId) -> Result<Vec<Stage>, MutationError> {
        let tree = self.loaded_tree()?;
        if tree.page(page).is_none() {
            return Err(MutationError::NotFound(format!("page {page}")));
        }
        let wanted = tree.missing_stages(page);
        if wanted.is_empty() {
            return Ok(vec![]);
        }

        let missing = self.create_sections(page, wanted.clone()).await;
        self.reload().await;
        if missing.is_empty() {
            Ok(wanted)
        } else {
            let err = MutationError::PartialBatch { page, missing };
            Err(self.fail("failed to repair page", err))
        }
    }

    /// Issues one creation request per stage concurrently and returns the
    /// stages that failed.
    async fn create_sections(&mut self, page: PageId, stages: Vec<Stage>) -> Vec<Stage> {
        let api = self.api;
        let results: Vec<(Stage, ApiResult<Section>)> = join_all(
            stages
                .into_iter()
                .map(|stage| async move { (stage, api.create_section(page, stage).await) }),
        )
        .await;

        let mut missing = Vec::new();
        for (stage, result) in results {
            match result {
                Ok(section) => {
                    if self.mounted()
                        && let Some(tree) = self.tree.as_mut()
                    {
                        tree.add_section(
                            page,
                            SectionNode {
                                id: section.id,
                                title: section.title,
                                tasks: vec![],
                            },
                        );
                    }
                }
                Err(err) => {
                    warn!(page = %page, stage = stage.code(), error = %err, "section creation failed");
                    missing.push(stage);
                }
            }
        }
        missing
    }

    pub fn stage_page_deletion(&mut self, page: PageId) {
        self.staged_page_delete = Some(page);
    }

    pub fn cancel_page_deletion(&mut self) {
        self.staged_page_delete = None;
    }

    /// Deletes the staged page. Re-fetches whether or not the delete succeeds.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn confirm_page_deletion(&mut self) -> Result<PageId, MutationError> {
        let page = self
            .staged_page_delete
            .take()
            .ok_or(MutationError::NothingStaged)?;
        let api = self.api;
        self.run_edit(
            LocalEdit::RemovePage { page },
            api.delete_page(page),
            "failed to delete page",
        )
        .await
        .map(|_| page)
    }

    pub fn stage_status(&mut self, status: ProjectStatus) {
        self.staged_status = Some(status);
    }

    pub fn cancel_status_change(&mut self) {
        self.staged_status = None;
    }

    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn confirm_status_change(&mut self) -> Result<ProjectStatus, MutationError> {
        let status = self
            .staged_status
            .take()
            .ok_or(MutationError::NothingStaged)?;
        let api = self.api;
        let project = self.project;
        self.run_edit(
            LocalEdit::SetStatus { status },
            api.update_project(project, ProjectPatch::status(status), None),
            "could not update status",
        )
        .await
        .map(|_| status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCreation {
    pub project: Project,
    pub pages: Vec<PageId>,
    pub incomplete: Vec<(PageId, Vec<Stage>)>,
}

/// Creates a project, then each named page together with its three sections.
#[instrument(
    skip(api, create, image, pages),
    fields(name = %create.name, page_count = pages.len(), has_image = image.is_some())
)]
pub async fn create_project_with_pages<A: ChecklistApi>(
    api: &A,
    create: ProjectCreate,
    image: Option<ImageUpload>,
    pages: &[String],
) -> Result<ProjectCreation, MutationError> {
    if create.name.trim().is_empty() {
        return Err(MutationError::Validation("project name cannot be empty"));
    }

    let project = api.create_project(create, image).await?;
    info!(project = %project.id, "project created");

    let mut created = Vec::new();
    let mut incomplete = Vec::new();
    for name in pages.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let page = api.create_page(project.id, name.to_string()).await?.id;
        let results = join_all(
            Stage::ALL
                .into_iter()
                .map(|stage| async move { (stage, api.create_section(page, stage).await) }),
        )
        .await;
        let missing: Vec<Stage> = results
            .into_iter()
            .filter_map(|(stage, result)| result.err().map(|_| stage))
            .collect();
        if !missing.is_empty() {
            warn!(page = %page, missing = %stage_list(&missing), "page left without all sections");
            incomplete.push((page, missing));
        }
        created.push(page);
    }

    Ok(ProjectCreation {
        project,
        pages: created,
        incomplete,
    })
}
