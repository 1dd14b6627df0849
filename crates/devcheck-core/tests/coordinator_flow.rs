use std::collections::{HashMap, HashSet};
use std::future::Future;

use chrono::{DateTime, Duration, TimeZone, Utc};
use devcheck_core::aggregate::TaskTotals;
use devcheck_core::api::{ApiError, ApiResult, ChecklistApi, ImageUpload};
use devcheck_core::coordinator::{Coordinator, Lifecycle, MutationError, create_project_with_pages};
use devcheck_core::dashboard::load_dashboard;
use devcheck_core::drafts::SectionKey;
use devcheck_shared::{
    Credentials, IssueReport, Page, PageId, PageNode, Project, ProjectCreate, ProjectDetail,
    ProjectId, ProjectPatch, ProjectStatus, Section, SectionId, SectionNode, Stage, Task, TaskId,
    TaskNode, TaskPatch, TokenPair, User, UserId,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    CreatePage,
    CreateTask,
    UpdateTask,
    DeleteTask,
    DeletePage,
    UpdateProject,
}

#[derive(Default)]
struct Server {
    projects: Vec<Project>,
    details: HashMap<ProjectId, ProjectDetail>,
    next_id: u64,
    failing: HashSet<Op>,
    failing_stages: HashSet<Stage>,
    failing_details: HashSet<ProjectId>,
    unmount_on: Option<(Op, Lifecycle)>,
    detail_fetches: usize,
}

impl Server {
    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn check(&mut self, op: Op) -> ApiResult<()> {
        if let Some((trigger, lifecycle)) = &self.unmount_on
            && *trigger == op
        {
            lifecycle.unmount();
        }
        if self.failing.contains(&op) {
            return Err(server_error());
        }
        Ok(())
    }

    fn pages_mut(&mut self) -> impl Iterator<Item = &mut PageNode> {
        self.details
            .values_mut()
            .flat_map(|detail| detail.pages.iter_mut())
    }

    fn sections_mut(&mut self) -> impl Iterator<Item = &mut SectionNode> {
        self.pages_mut().flat_map(|page| page.sections.iter_mut())
    }
}

/// In-memory backend with per-operation failure injection.
#[derive(Default)]
struct MockApi {
    server: Mutex<Server>,
}

impl MockApi {
    fn with_project(detail: ProjectDetail) -> Self {
        let api = Self::default();
        api.add_project(detail, at(0));
        api
    }

    fn add_project(&self, detail: ProjectDetail, updated_at: DateTime<Utc>) {
        let mut server = self.server.lock();
        server.projects.push(Project {
            id: detail.id,
            name: detail.name.clone(),
            description: detail.description.clone(),
            link: detail.link.clone(),
            image: None,
            project_status: detail.project_status,
            created_at: at(0),
            updated_at: Some(updated_at),
        });
        server.details.insert(detail.id, detail);
    }

    fn fail(&self, op: Op) {
        self.server.lock().failing.insert(op);
    }

    fn recover(&self, op: Op) {
        self.server.lock().failing.remove(&op);
    }

    fn fail_stage(&self, stage: Stage) {
        self.server.lock().failing_stages.insert(stage);
    }

    fn recover_stage(&self, stage: Stage) {
        self.server.lock().failing_stages.remove(&stage);
    }

    fn fail_detail(&self, project: ProjectId) {
        self.server.lock().failing_details.insert(project);
    }

    fn unmount_on(&self, op: Op, lifecycle: Lifecycle) {
        self.server.lock().unmount_on = Some((op, lifecycle));
    }

    fn detail_fetches(&self) -> usize {
        self.server.lock().detail_fetches
    }

    fn server_task(&self, id: TaskId) -> Option<TaskNode> {
        self.server
            .lock()
            .sections_mut()
            .flat_map(|section| section.tasks.iter())
            .find(|task| task.id == id)
            .cloned()
    }

    fn server_status(&self, project: ProjectId) -> Option<ProjectStatus> {
        self.server
            .lock()
            .details
            .get(&project)
            .map(|detail| detail.project_status)
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: "boom".to_string(),
    }
}

fn media_url(upload: &ImageUpload) -> String {
    format!("/media/images/{}", upload.file_name)
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        body: "not found".to_string(),
    }
}

impl ChecklistApi for MockApi {
    async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        Ok(self.server.lock().projects.clone())
    }

    async fn get_project_detail(&self, project: ProjectId) -> ApiResult<ProjectDetail> {
        let mut server = self.server.lock();
        server.detail_fetches += 1;
        if server.failing_details.contains(&project) {
            return Err(server_error());
        }
        server.details.get(&project).cloned().ok_or_else(not_found)
    }

    async fn create_project(
        &self,
        fields: ProjectCreate,
        image: Option<ImageUpload>,
    ) -> ApiResult<Project> {
        let mut server = self.server.lock();
        let id = ProjectId(server.fresh_id());
        let now = Utc::now();
        let project = Project {
            id,
            name: fields.name,
            description: Some(fields.description),
            link: fields.link,
            image: image.map(|upload| media_url(&upload)),
            project_status: ProjectStatus::Mvp,
            created_at: now,
            updated_at: Some(now),
        };
        server.details.insert(
            id,
            ProjectDetail {
                id,
                name: project.name.clone(),
                description: project.description.clone(),
                link: project.link.clone(),
                image: project.image.clone(),
                project_status: ProjectStatus::Mvp,
                created_at: Some(now),
                updated_at: Some(now),
                pages: vec![],
            },
        );
        server.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        project: ProjectId,
        patch: ProjectPatch,
        image: Option<ImageUpload>,
    ) -> ApiResult<ProjectDetail> {
        let mut server = self.server.lock();
        server.check(Op::UpdateProject)?;
        let detail = server.details.get_mut(&project).ok_or_else(not_found)?;
        if let Some(name) = patch.name {
            detail.name = name;
        }
        if let Some(description) = patch.description {
            detail.description = Some(description);
        }
        if let Some(link) = patch.link {
            detail.link = Some(link);
        }
        if let Some(status) = patch.project_status {
            detail.project_status = status;
        }
        if let Some(upload) = image {
            detail.image = Some(media_url(&upload));
        }
        let updated = detail.clone();
        if let Some(listed) = server.projects.iter_mut().find(|p| p.id == project) {
            listed.name = updated.name.clone();
            listed.image = updated.image.clone();
            listed.project_status = updated.project_status;
        }
        Ok(updated)
    }

    async fn delete_project(&self, project: ProjectId) -> ApiResult<()> {
        let mut server = self.server.lock();
        server.details.remove(&project).ok_or_else(not_found)?;
        server.projects.retain(|p| p.id != project);
        Ok(())
    }

    async fn create_page(&self, project: ProjectId, name: String) -> ApiResult<Page> {
        let mut server = self.server.lock();
        server.check(Op::CreatePage)?;
        let id = PageId(server.fresh_id());
        let detail = server.details.get_mut(&project).ok_or_else(not_found)?;
        detail.pages.push(PageNode {
            id,
            name: name.clone(),
            sections: vec![],
        });
        Ok(Page {
            id,
            name,
            project,
            order: detail.pages.len() as u32,
        })
    }

    async fn delete_page(&self, page: PageId) -> ApiResult<()> {
        let mut server = self.server.lock();
        server.check(Op::DeletePage)?;
        for detail in server.details.values_mut() {
            detail.pages.retain(|p| p.id != page);
        }
        Ok(())
    }

    async fn create_section(&self, page: PageId, title: Stage) -> ApiResult<Section> {
        let mut server = self.server.lock();
        if server.failing_stages.contains(&title) {
            return Err(server_error());
        }
        let id = SectionId(server.fresh_id());
        let node = server
            .pages_mut()
            .find(|p| p.id == page)
            .ok_or_else(not_found)?;
        node.sections.push(SectionNode {
            id,
            title,
            tasks: vec![],
        });
        node.sections.sort_by_key(|s| s.title);
        Ok(Section {
            id,
            title,
            page,
            order: 0,
        })
    }

    async fn create_task(
        &self,
        section: SectionId,
        title: String,
        completed: bool,
    ) -> ApiResult<Task> {
        let mut server = self.server.lock();
        server.check(Op::CreateTask)?;
        let id = TaskId(server.fresh_id());
        let node = server
            .sections_mut()
            .find(|s| s.id == section)
            .ok_or_else(not_found)?;
        node.tasks.push(TaskNode {
            id,
            title: title.clone(),
            completed,
        });
        Ok(Task {
            id,
            title,
            completed,
            section,
            order: node.tasks.len() as u32,
            created_at: None,
            updated_at: None,
        })
    }

    async fn update_task(&self, task: TaskId, patch: TaskPatch) -> ApiResult<Task> {
        let mut server = self.server.lock();
        server.check(Op::UpdateTask)?;
        for section in server.sections_mut() {
            if let Some(node) = section.tasks.iter_mut().find(|t| t.id == task) {
                if let Some(title) = patch.title {
                    node.title = title;
                }
                if let Some(completed) = patch.completed {
                    node.completed = completed;
                }
                return Ok(Task {
                    id: node.id,
                    title: node.title.clone(),
                    completed: node.completed,
                    section: section.id,
                    order: 0,
                    created_at: None,
                    updated_at: None,
                });
            }
        }
        Err(not_found())
    }

    async fn delete_task(&self, task: TaskId) -> ApiResult<()> {
        let mut server = self.server.lock();
        server.check(Op::DeleteTask)?;
        for section in server.sections_mut() {
            section.tasks.retain(|t| t.id != task);
        }
        Ok(())
    }

    async fn get_current_user(&self) -> ApiResult<User> {
        Ok(User {
            id: UserId(1),
            username: "ada".to_string(),
            date_joined: None,
        })
    }

    async fn submit_issue_report(&self, _report: IssueReport) -> ApiResult<()> {
        Ok(())
    }

    async fn register(&self, credentials: Credentials) -> ApiResult<User> {
        Ok(User {
            id: UserId(2),
            username: credentials.username,
            date_joined: None,
        })
    }

    async fn obtain_token(&self, _credentials: Credentials) -> ApiResult<TokenPair> {
        Ok(TokenPair {
            access: "access".to_string(),
            refresh: "refresh".to_string(),
        })
    }

    async fn refresh_token(&self, refresh: String) -> ApiResult<String> {
        Ok(format!("{refresh}-renewed"))
    }
}

fn run_async<T>(future: impl Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
        .block_on(future)
}

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::minutes(minutes)
}

fn task(id: u64, title: &str, completed: bool) -> TaskNode {
    TaskNode {
        id: TaskId(id),
        title: title.to_string(),
        completed,
    }
}

fn section(id: u64, stage: Stage, tasks: Vec<TaskNode>) -> SectionNode {
    SectionNode {
        id: SectionId(id),
        title: stage,
        tasks,
    }
}

fn detail(id: u64, status: ProjectStatus, pages: Vec<PageNode>) -> ProjectDetail {
    ProjectDetail {
        id: ProjectId(id),
        name: format!("project {id}"),
        description: None,
        link: None,
        image: None,
        project_status: status,
        created_at: None,
        updated_at: None,
        pages,
    }
}

/// Page 10 "Landing": MVP has tasks 1 (done) and 2, DEV is empty, DEPLOY has task 3.
fn landing() -> ProjectDetail {
    detail(
        1,
        ProjectStatus::Mvp,
        vec![PageNode {
            id: PageId(10),
            name: "Landing".to_string(),
            sections: vec![
                section(
                    100,
                    Stage::Mvp,
                    vec![task(1, "Hero section", true), task(2, "CTA button", false)],
                ),
                section(101, Stage::Dev, vec![]),
                section(102, Stage::Deploy, vec![task(3, "Setup analytics", false)]),
            ],
        }],
    )
}

fn completed_in_tree(coordinator: &Coordinator<'_, MockApi>, id: u64) -> Option<bool> {
    coordinator
        .tree()
        .and_then(|tree| tree.task(TaskId(id)))
        .map(|t| t.completed)
}

#[test]
fn confirmed_toggle_keeps_local_state_without_refetch() {
    let api = MockApi::with_project(landing());
    let mut coordinator = Coordinator::new(&api, ProjectId(1));

    run_async(async {
        coordinator.load().await.expect("load");
        assert_eq!(
            coordinator.totals(),
            TaskTotals {
                completed: 1,
                total: 3
            }
        );
        assert_eq!(coordinator.totals().progress(), "33.33333333333333%");

        coordinator
            .toggle_task(TaskId(2), false)
            .await
            .expect("toggle");
    });

    assert_eq!(completed_in_tree(&coordinator, 2), Some(true));
    assert_eq!(coordinator.totals().completed, 2);
    assert_eq!(api.detail_fetches(), 1);
    assert_eq!(api.server_task(TaskId(2)).map(|t| t.completed), Some(true));
    assert!(coordinator.notices().is_empty());
}

#[test]
fn failed_toggle_reconciles_to_server_tree() {
    let api = MockApi::with_project(landing());
    api.fail(Op::UpdateTask);
    let mut coordinator = Coordinator::new(&api, ProjectId(1));

    let result = run_async(async {
        coordinator.load().await.expect("load");
        coordinator.toggle_task(TaskId(2), false).await
    });

    assert!(matches!(result, Err(MutationError::Api(_))));
    assert_eq!(completed_in_tree(&coordinator, 2), Some(false));
    assert_eq!(api.detail_fetches(), 2);
    let notices = coordinator.drain_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.starts_with("failed to toggle task"));
    assert!(coordinator.notices().is_empty());
}

#[test]
fn add_page_creates_three_empty_stage_sections() {
    let api = MockApi::with_project(detail(2, ProjectStatus::Mvp, vec![]));
    let mut coordinator = Coordinator::new(&api, ProjectId(2));
    coordinator.set_new_page_name("Landing");

    let page = run_async(async {
        coordinator.load().await.expect("load");
        coordinator.add_page("Landing").await.expect("add page")
    });

    let tree = coordinator.tree().expect("tree loaded");
    let node = tree.page(page).expect("page present");
    assert_eq!(node.name, "Landing");
    let stages: Vec<Stage> = node.sections.iter().map(|s| s.title).collect();
    assert_eq!(stages, vec![Stage::Mvp, Stage::Dev, Stage::Deploy]);
    assert!(node.sections.iter().all(|s| s.tasks.is_empty()));
    assert!(tree.missing_stages(page).is_empty());
    assert_eq!(coordinator.new_page_name(), "");
    assert!(!coordinator.totals().has_tasks());
    assert_eq!(coordinator.totals().progress(), "0%");
}

#[test]
fn blank_page_name_is_rejected_before_any_request() {
    let api = MockApi::with_project(landing());
    let mut coordinator = Coordinator::new(&api, ProjectId(1));

    let result = run_async(async {
        coordinator.load().await.expect("load");
        coordinator.add_page("   ").await
    });

    assert!(matches!(result, Err(MutationError::Validation(_))));
    assert_eq!(api.detail_fetches(), 1);
    assert!(coordinator.notices().is_empty());
}

#[test]
fn partial_section_batch_is_reported_and_repairable() {
    let api = MockApi::with_project(detail(2, ProjectStatus::Mvp, vec![]));
    api.fail_stage(Stage::Dev);
    let mut coordinator = Coordinator::new(&api, ProjectId(2));
    coordinator.set_new_page_name("Docs");

    let result = run_async(async {
        coordinator.load().await.expect("load");
        coordinator.add_page("Docs").await
    });

    let page = match result {
        Err(MutationError::PartialBatch { page, missing }) => {
            assert_eq!(missing, vec![Stage::Dev]);
            page
        }
        other => panic!("expected partial batch, got {other:?}"),
    };
    assert_eq!(coordinator.new_page_name(), "Docs");
    assert_eq!(coordinator.drain_notices().len(), 1);
    let tree = coordinator.tree().expect("tree loaded");
    assert_eq!(tree.missing_stages(page), vec![Stage::Dev]);

    // A draft typed while the DEV section is missing follows it once created.
    coordinator.open_draft(page, Stage::Dev).expect("open draft");
    coordinator
        .set_draft_title(page, Stage::Dev, "Write API")
        .expect("set title");
    assert_eq!(
        coordinator.section_key(page, Stage::Dev).expect("key"),
        SectionKey::Pending {
            page,
            stage: Stage::Dev
        }
    );

    api.recover_stage(Stage::Dev);
    let repaired = run_async(coordinator.repair_page(page)).expect("repair page");
    assert_eq!(repaired, vec![Stage::Dev]);

    let key = coordinator.section_key(page, Stage::Dev).expect("key");
    assert!(matches!(key, SectionKey::Known(_)));
    assert_eq!(coordinator.drafts().title(key), "Write API");

    run_async(coordinator.submit_draft(page, Stage::Dev)).expect("submit draft");
    let tree = coordinator.tree().expect("tree loaded");
    let dev = tree.section(page, Stage::Dev).expect("dev section");
    assert_eq!(dev.tasks.len(), 1);
    assert_eq!(dev.tasks[0].title, "Write API");
    assert!(!coordinator.drafts().is_open(key));

    let again = run_async(coordinator.repair_page(page)).expect("second repair");
    assert!(again.is_empty());
}

#[test]
fn failed_task_delete_restores_the_task() {
    let api = MockApi::with_project(landing());
    api.fail(Op::DeleteTask);
    let mut coordinator = Coordinator::new(&api, ProjectId(1));

    let result = run_async(async {
        coordinator.load().await.expect("load");
        coordinator.delete_task(TaskId(3)).await
    });

    assert!(result.is_err());
    assert_eq!(completed_in_tree(&coordinator, 3), Some(false));
    assert_eq!(coordinator.drain_notices().len(), 1);

    api.recover(Op::DeleteTask);
    run_async(coordinator.delete_task(TaskId(1))).expect("delete task");
    assert_eq!(completed_in_tree(&coordinator, 1), None);
    assert_eq!(
        coordinator.totals(),
        TaskTotals {
            completed: 0,
            total: 2
        }
    );
    assert_eq!(api.detail_fetches(), 3);
}

#[test]
fn page_deletion_must_be_staged_and_can_be_cancelled() {
    let api = MockApi::with_project(landing());
    let mut coordinator = Coordinator::new(&api, ProjectId(1));
    run_async(coordinator.load()).expect("load");

    let unstaged = run_async(coordinator.confirm_page_deletion());
    assert!(matches!(unstaged, Err(MutationError::NothingStaged)));

    coordinator.stage_page_deletion(PageId(10));
    coordinator.cancel_page_deletion();
    assert_eq!(coordinator.staged_page_delete(), None);
    let cancelled = run_async(coordinator.confirm_page_deletion());
    assert!(matches!(cancelled, Err(MutationError::NothingStaged)));

    coordinator
        .open_draft(PageId(10), Stage::Mvp)
        .expect("open draft");
    coordinator.stage_page_deletion(PageId(10));
    let deleted = run_async(coordinator.confirm_page_deletion()).expect("delete page");
    assert_eq!(deleted, PageId(10));
    assert_eq!(coordinator.staged_page_delete(), None);
    assert!(coordinator.tree().expect("tree").pages().is_empty());
    assert_eq!(coordinator.totals(), TaskTotals::default());
    assert!(coordinator.drafts().is_empty());
}

#[test]
fn failed_page_delete_restores_page_and_notifies() {
    let api = MockApi::with_project(landing());
    api.fail(Op::DeletePage);
    let mut coordinator = Coordinator::new(&api, ProjectId(1));

    let result = run_async(async {
        coordinator.load().await.expect("load");
        coordinator.stage_page_deletion(PageId(10));
        coordinator.confirm_page_deletion().await
    });

    assert!(result.is_err());
    assert!(coordinator.tree().expect("tree").page(PageId(10)).is_some());
    assert_eq!(coordinator.totals().total, 3);
    let notices = coordinator.drain_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.starts_with("failed to delete page"));
}

#[test]
fn status_change_applies_then_reverts_on_failure() {
    let api = MockApi::with_project(landing());
    let mut coordinator = Coordinator::new(&api, ProjectId(1));
    run_async(coordinator.load()).expect("load");

    coordinator.stage_status(ProjectStatus::InDevelopment);
    assert_eq!(
        coordinator.staged_status(),
        Some(ProjectStatus::InDevelopment)
    );
    let status = run_async(coordinator.confirm_status_change()).expect("status change");
    assert_eq!(status, ProjectStatus::InDevelopment);
    assert_eq!(
        coordinator.tree().expect("tree").status(),
        ProjectStatus::InDevelopment
    );
    assert_eq!(
        api.server_status(ProjectId(1)),
        Some(ProjectStatus::InDevelopment)
    );

    coordinator.stage_status(ProjectStatus::InDeployment);
    coordinator.cancel_status_change();
    let cancelled = run_async(coordinator.confirm_status_change());
    assert!(matches!(cancelled, Err(MutationError::NothingStaged)));

    api.fail(Op::UpdateProject);
    coordinator.stage_status(ProjectStatus::InDeployment);
    let failed = run_async(coordinator.confirm_status_change());
    assert!(failed.is_err());
    assert_eq!(
        coordinator.tree().expect("tree").status(),
        ProjectStatus::InDevelopment
    );
    let notices = coordinator.drain_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.starts_with("could not update status"));
}

#[test]
fn failed_task_creation_keeps_the_draft() {
    let api = MockApi::with_project(landing());
    api.fail(Op::CreateTask);
    let mut coordinator = Coordinator::new(&api, ProjectId(1));
    run_async(coordinator.load()).expect("load");

    let key = coordinator
        .open_draft(PageId(10), Stage::Dev)
        .expect("open draft");
    assert_eq!(key, SectionKey::Known(SectionId(101)));
    coordinator
        .set_draft_title(PageId(10), Stage::Dev, "  Wire auth  ")
        .expect("set title");

    let failed = run_async(coordinator.submit_draft(PageId(10), Stage::Dev));
    assert!(failed.is_err());
    assert!(coordinator.drafts().is_open(key));
    assert_eq!(coordinator.drafts().title(key), "  Wire auth  ");
    assert_eq!(coordinator.drain_notices().len(), 1);

    api.recover(Op::CreateTask);
    run_async(coordinator.submit_draft(PageId(10), Stage::Dev)).expect("submit draft");
    assert!(!coordinator.drafts().is_open(key));
    assert_eq!(coordinator.drafts().title(key), "");
    let tree = coordinator.tree().expect("tree");
    let dev = tree.section(PageId(10), Stage::Dev).expect("dev section");
    assert_eq!(dev.tasks.len(), 1);
    assert_eq!(dev.tasks[0].title, "Wire auth");
    assert!(!dev.tasks[0].completed);
}

#[test]
fn empty_draft_title_is_a_validation_error() {
    let api = MockApi::with_project(landing());
    let mut coordinator = Coordinator::new(&api, ProjectId(1));
    run_async(coordinator.load()).expect("load");

    coordinator
        .open_draft(PageId(10), Stage::Mvp)
        .expect("open draft");
    let result = run_async(coordinator.submit_draft(PageId(10), Stage::Mvp));
    assert!(matches!(result, Err(MutationError::Validation(_))));
    assert_eq!(coordinator.totals().total, 3);
}

#[test]
fn unmounted_view_ignores_late_results() {
    let api = MockApi::with_project(landing());
    let mut coordinator = Coordinator::new(&api, ProjectId(1));
    run_async(coordinator.load()).expect("load");

    let key = coordinator
        .open_draft(PageId(10), Stage::Dev)
        .expect("open draft");
    coordinator
        .set_draft_title(PageId(10), Stage::Dev, "Late task")
        .expect("set title");
    api.unmount_on(Op::CreateTask, coordinator.lifecycle());

    run_async(coordinator.submit_draft(PageId(10), Stage::Dev)).expect("server accepts task");

    assert!(!coordinator.lifecycle().is_mounted());
    assert_eq!(coordinator.drafts().title(key), "Late task");
    let dev = coordinator
        .tree()
        .and_then(|tree| tree.section(PageId(10), Stage::Dev))
        .map(|s| s.tasks.len());
    assert_eq!(dev, Some(0));
    assert_eq!(api.detail_fetches(), 2);

    api.fail(Op::DeleteTask);
    let failed = run_async(coordinator.delete_task(TaskId(1)));
    assert!(failed.is_err());
    assert!(coordinator.notices().is_empty());
    assert_eq!(completed_in_tree(&coordinator, 1), Some(true));
    assert!(api.server_task(TaskId(1)).is_some());

    run_async(coordinator.toggle_task(TaskId(2), false)).expect("server accepts toggle");
    assert_eq!(completed_in_tree(&coordinator, 2), Some(false));
    assert_eq!(api.server_task(TaskId(2)).map(|t| t.completed), Some(true));
}

#[test]
fn dashboard_counts_failed_detail_as_zero_tasks() {
    let api = MockApi::default();
    api.add_project(landing(), at(10));
    api.add_project(
        detail(
            2,
            ProjectStatus::InDevelopment,
            vec![PageNode {
                id: PageId(20),
                name: "Checkout".to_string(),
                sections: vec![section(200, Stage::Mvp, vec![task(4, "Cart", true)])],
            }],
        ),
        at(30),
    );
    api.add_project(detail(3, ProjectStatus::InDeployment, vec![]), at(20));
    api.fail_detail(ProjectId(3));

    let dashboard = run_async(load_dashboard(&api, 2)).expect("dashboard");

    assert_eq!(dashboard.len(), 3);
    assert_eq!(dashboard.totals_for(ProjectId(3)), Some(TaskTotals::default()));
    assert_eq!(
        dashboard.overall_totals(),
        TaskTotals {
            completed: 2,
            total: 4
        }
    );
    let counts = dashboard.status_counts();
    assert_eq!(
        (counts.mvp, counts.in_development, counts.in_deployment),
        (1, 1, 1)
    );
    let recent: Vec<ProjectId> = dashboard
        .recent(2)
        .iter()
        .map(|o| o.project.id)
        .collect();
    assert_eq!(recent, vec![ProjectId(2), ProjectId(3)]);
}

#[test]
fn project_creation_reports_incomplete_pages() {
    let api = MockApi::default();
    api.fail_stage(Stage::Deploy);

    let created = run_async(create_project_with_pages(
        &api,
        ProjectCreate {
            name: "Portfolio".to_string(),
            description: "Personal site".to_string(),
            link: None,
        },
        None,
        &["Home".to_string(), "  ".to_string(), "About".to_string()],
    ))
    .expect("create project");

    assert_eq!(created.project.name, "Portfolio");
    assert_eq!(created.pages.len(), 2);
    assert_eq!(
        created.incomplete,
        created
            .pages
            .iter()
            .map(|page| (*page, vec![Stage::Deploy]))
            .collect::<Vec<_>>()
    );

    let mut coordinator = Coordinator::new(&api, created.project.id);
    run_async(coordinator.load()).expect("load");
    let tree = coordinator.tree().expect("tree");
    assert_eq!(tree.missing_stages(created.pages[0]), vec![Stage::Deploy]);

    let blank = run_async(create_project_with_pages(
        &api,
        ProjectCreate {
            name: " ".to_string(),
            description: String::new(),
            link: None,
        },
        None,
        &[],
    ));
    assert!(matches!(blank, Err(MutationError::Validation(_))));
}

#[test]
fn project_image_is_uploaded_on_create_and_edit() {
    let api = MockApi::default();
    let cover = ImageUpload {
        file_name: "cover.png".to_string(),
        mime: "image/png",
        bytes: vec![0x89, b'P', b'N', b'G'],
    };

    let created = run_async(create_project_with_pages(
        &api,
        ProjectCreate {
            name: "Portfolio".to_string(),
            description: String::new(),
            link: None,
        },
        Some(cover),
        &[],
    ))
    .expect("create project");
    assert_eq!(
        created.project.image.as_deref(),
        Some("/media/images/cover.png")
    );

    let replacement = ImageUpload {
        file_name: "cover-v2.webp".to_string(),
        mime: "image/webp",
        bytes: vec![1, 2, 3],
    };
    let updated = run_async(api.update_project(
        created.project.id,
        ProjectPatch::default(),
        Some(replacement),
    ))
    .expect("update image");
    assert_eq!(updated.image.as_deref(), Some("/media/images/cover-v2.webp"));
    assert_eq!(updated.name, "Portfolio");

    let unchanged = run_async(api.update_project(
        created.project.id,
        ProjectPatch::status(ProjectStatus::InDevelopment),
        None,
    ))
    .expect("update status");
    assert_eq!(unchanged.image.as_deref(), Some("/media/images/cover-v2.webp"));
}
