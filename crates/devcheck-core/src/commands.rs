use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use devcheck_shared::{
    Credentials, IssueReport, PageId, ProjectCreate, ProjectId, ProjectPatch, ProjectStatus,
    Stage, TaskId,
};
use tracing::{info, instrument};

use crate::api::{ApiError, ChecklistApi, ImageUpload};
use crate::cli::Command;
use crate::config::Config;
use crate::coordinator::{Coordinator, MutationError, create_project_with_pages};
use crate::dashboard::load_dashboard;
use crate::http::HttpApi;
use crate::render::Renderer;
use crate::session::{Session, SessionStore};
use crate::tree::ProjectTree;

#[instrument(skip_all)]
pub async fn dispatch(
    cfg: &Config,
    api: &HttpApi,
    sessions: &SessionStore,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Login { username, password } => {
            cmd_login(api, sessions, username, password).await
        }
        Command::Register { username, password } => {
            cmd_register(api, sessions, username, password).await
        }
        Command::Logout => cmd_logout(api, sessions),
        Command::RefreshSession => cmd_refresh_session(api, sessions).await,
        Command::Whoami => cmd_whoami(api, renderer).await,
        Command::Projects { all } => cmd_projects(cfg, api, renderer, all).await,
        Command::Summary => cmd_summary(cfg, api, renderer).await,
        Command::Show { project } => cmd_show(api, renderer, &project).await,
        Command::CreateProject {
            name,
            description,
            link,
            pages,
            image,
        } => cmd_create_project(api, name, description, link, pages, image.as_deref()).await,
        Command::EditProject {
            project,
            name,
            description,
            link,
            image,
        } => {
            let patch = ProjectPatch {
                name,
                description,
                link,
                project_status: None,
            };
            cmd_edit_project(api, &project, patch, image.as_deref()).await
        }
        Command::DeleteProject { project } => cmd_delete_project(api, &project).await,
        Command::Status {
            project,
            status,
            yes,
        } => cmd_status(api, renderer, &project, status, yes).await,
        Command::Toggle { project, task } => {
            cmd_toggle(api, renderer, &project, TaskId(task)).await
        }
        Command::AddTask {
            project,
            page,
            stage,
            title,
        } => cmd_add_task(api, renderer, &project, &page, stage, &title.join(" ")).await,
        Command::DeleteTask { project, task } => {
            cmd_delete_task(api, renderer, &project, TaskId(task)).await
        }
        Command::AddPage { project, name } => {
            cmd_add_page(api, renderer, &project, &name.join(" ")).await
        }
        Command::DeletePage { project, page, yes } => {
            cmd_delete_page(api, renderer, &project, &page, yes).await
        }
        Command::RepairPage { project, page } => {
            cmd_repair_page(api, renderer, &project, &page).await
        }
        Command::ReportIssue { description } => {
            cmd_report_issue(api, description.join(" ")).await
        }
    }
}

/// Accepts a numeric id or a (case-insensitive) project name.
#[instrument(skip(api))]
pub async fn resolve_project<A: ChecklistApi>(api: &A, reference: &str) -> anyhow::Result<ProjectId> {
    if let Ok(id) = reference.trim().parse::<u64>() {
        return Ok(ProjectId(id));
    }

    let projects = api
        .list_projects()
        .await
        .context("failed to list projects")?;
    let matches: Vec<ProjectId> = projects
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case(reference.trim()))
        .map(|p| p.id)
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("no project named {reference:?}")),
        _ => Err(anyhow!(
            "project name {reference:?} is ambiguous; use its id"
        )),
    }
}

pub fn resolve_page(tree: &ProjectTree, reference: &str) -> anyhow::Result<PageId> {
    if let Ok(id) = reference.trim().parse::<u64>()
        && tree.page(PageId(id)).is_some()
    {
        return Ok(PageId(id));
    }
    tree.find_page_by_name(reference)
        .map(|page| page.id)
        .ok_or_else(|| anyhow!("no page {reference:?} in project {}", tree.project_id()))
}

fn confirm(prompt: &str, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    let mut err = io::stderr().lock();
    write!(err, "{prompt} [y/N] ")?;
    err.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

async fn open_project<'a>(
    api: &'a HttpApi,
    reference: &str,
) -> anyhow::Result<Coordinator<'a, HttpApi>> {
    let project = resolve_project(api, reference).await?;
    let mut coordinator = Coordinator::new(api, project);
    coordinator
        .load()
        .await
        .with_context(|| format!("failed to load project {project}"))?;
    Ok(coordinator)
}

/// Shows queued notices, then turns a failed mutation into an error.
fn finish<T>(
    coordinator: &mut Coordinator<'_, HttpApi>,
    renderer: &Renderer,
    action: &str,
    result: Result<T, MutationError>,
) -> anyhow::Result<T> {
    renderer.print_notices(&coordinator.drain_notices())?;
    result.map_err(|err| anyhow::Error::new(err).context(format!("{action} failed")))
}

#[instrument(skip(api, sessions, password))]
async fn cmd_login(
    api: &HttpApi,
    sessions: &SessionStore,
    username: String,
    password: String,
) -> anyhow::Result<()> {
    let tokens = api
        .obtain_token(Credentials {
            username: username.clone(),
            password,
        })
        .await
        .context("login failed")?;

    api.set_access_token(Some(tokens.access.clone()));
    sessions.save(&Session::from_tokens(&username, tokens))?;
    info!(username = %username, "logged in");
    println!("Logged in as {username}.");
    Ok(())
}

#[instrument(skip(api, sessions, password))]
async fn cmd_register(
    api: &HttpApi,
    sessions: &SessionStore,
    username: String,
    password: String,
) -> anyhow::Result<()> {
    sessions.clear()?;
    api.set_access_token(None);

    let user = api
        .register(Credentials {
            username: username.clone(),
            password: password.clone(),
        })
        .await
        .context("registration failed")?;
    info!(user = %user.id, "registered");

    cmd_login(api, sessions, username, password).await
}

fn cmd_logout(api: &HttpApi, sessions: &SessionStore) -> anyhow::Result<()> {
    api.set_access_token(None);
    if sessions.clear()? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

async fn cmd_refresh_session(api: &HttpApi, sessions: &SessionStore) -> anyhow::Result<()> {
    let Some(mut session) = sessions.load()? else {
        bail!("not logged in; run `devcheck login` first");
    };
    let access = api
        .refresh_token(session.refresh.clone())
        .await
        .context("failed to refresh access token")?;
    api.set_access_token(Some(access.clone()));
    session.access = access;
    sessions.save(&session)?;
    println!("Session refreshed for {}.", session.username);
    Ok(())
}

async fn cmd_whoami(api: &HttpApi, renderer: &Renderer) -> anyhow::Result<()> {
    match api.get_current_user().await {
        Ok(user) => renderer.print_user(&user),
        Err(ApiError::Unauthorized) => {
            println!("Not logged in.");
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context("failed to fetch current user")),
    }
}

async fn cmd_projects(
    cfg: &Config,
    api: &HttpApi,
    renderer: &Renderer,
    all: bool,
) -> anyhow::Result<()> {
    let dashboard = load_dashboard(api, cfg.fetch_concurrency()?)
        .await
        .context("failed to load projects")?;
    let listed = if all {
        dashboard.all()
    } else {
        dashboard.recent(cfg.recent_limit()?)
    };
    renderer.print_projects(&listed)
}

async fn cmd_summary(cfg: &Config, api: &HttpApi, renderer: &Renderer) -> anyhow::Result<()> {
    let dashboard = load_dashboard(api, cfg.fetch_concurrency()?)
        .await
        .context("failed to load projects")?;
    renderer.print_summary(dashboard.status_counts(), dashboard.overall_totals())
}

async fn cmd_show(api: &HttpApi, renderer: &Renderer, project: &str) -> anyhow::Result<()> {
    let coordinator = open_project(api, project).await?;
    renderer.print_tree(coordinator.loaded_tree()?)
}

async fn cmd_create_project(
    api: &HttpApi,
    name: String,
    description: String,
    link: Option<String>,
    pages: Vec<String>,
    image: Option<&Path>,
) -> anyhow::Result<()> {
    let image = image.map(ImageUpload::from_path).transpose()?;
    let create = ProjectCreate {
        name,
        description,
        link: link.filter(|l| !l.trim().is_empty()),
    };
    let created = create_project_with_pages(api, create, image, &pages)
        .await
        .context("failed to create project")?;

    println!(
        "Created project {} ({}) with {} page(s).",
        created.project.id,
        created.project.name,
        created.pages.len()
    );
    for (page, missing) in &created.incomplete {
        let stages: Vec<&str> = missing.iter().map(|s| s.code()).collect();
        eprintln!(
            "page {page} is missing sections {}; run `devcheck repair-page {} {page}`",
            stages.join(", "),
            created.project.id
        );
    }
    Ok(())
}

async fn cmd_edit_project(
    api: &HttpApi,
    project: &str,
    patch: ProjectPatch,
    image: Option<&Path>,
) -> anyhow::Result<()> {
    if patch.is_empty() && image.is_none() {
        bail!("nothing to change; pass --name, --description, --link or --image");
    }
    let image = image.map(ImageUpload::from_path).transpose()?;
    let id = resolve_project(api, project).await?;
    let updated = api
        .update_project(id, patch, image)
        .await
        .with_context(|| format!("failed to update project {id}"))?;
    println!("Updated project {} ({}).", updated.id, updated.name);
    Ok(())
}

async fn cmd_delete_project(api: &HttpApi, project: &str) -> anyhow::Result<()> {
    let id = resolve_project(api, project).await?;
    api.delete_project(id)
        .await
        .with_context(|| format!("failed to delete project {id}"))?;
    println!("Project deleted!");
    Ok(())
}

async fn cmd_status(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    status: ProjectStatus,
    yes: bool,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    coordinator.stage_status(status);

    let prompt = format!("Set project status to {status}?");
    if !confirm(&prompt, yes)? {
        coordinator.cancel_status_change();
        println!("Cancelled.");
        return Ok(());
    }

    let result = coordinator.confirm_status_change().await;
    let status = finish(&mut coordinator, renderer, "status update", result)?;
    println!("Project status is now {status}.");
    Ok(())
}

async fn cmd_toggle(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    task: TaskId,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    let current = coordinator
        .loaded_tree()?
        .task(task)
        .map(|t| t.completed)
        .ok_or_else(|| anyhow!("task {task} not found in project {}", coordinator.project_id()))?;

    let result = coordinator.toggle_task(task, current).await;
    finish(&mut coordinator, renderer, "toggle", result)?;
    let state = if current { "open" } else { "done" };
    println!("Task {task} marked {state} ({}).", coordinator.totals().progress());
    Ok(())
}

async fn cmd_add_task(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    page: &str,
    stage: Stage,
    title: &str,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    let page = resolve_page(coordinator.loaded_tree()?, page)?;

    coordinator.open_draft(page, stage)?;
    coordinator.set_draft_title(page, stage, title)?;
    let result = coordinator.submit_draft(page, stage).await;
    finish(&mut coordinator, renderer, "add task", result)?;
    println!("Task added to {} on page {page}.", stage.label());
    Ok(())
}

async fn cmd_delete_task(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    task: TaskId,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    let result = coordinator.delete_task(task).await;
    finish(&mut coordinator, renderer, "delete task", result)?;
    println!("Task {task} deleted.");
    Ok(())
}

async fn cmd_add_page(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    name: &str,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    coordinator.set_new_page_name(name);
    let result = coordinator.add_page(name).await;
    let page = finish(&mut coordinator, renderer, "add page", result)?;
    println!("Page {page} added with MVP, DEV and DEPLOY sections.");
    Ok(())
}

async fn cmd_delete_page(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    page: &str,
    yes: bool,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    let page_id = resolve_page(coordinator.loaded_tree()?, page)?;
    coordinator.stage_page_deletion(page_id);

    let prompt = format!("Delete page {page} and all of its tasks?");
    if !confirm(&prompt, yes)? {
        coordinator.cancel_page_deletion();
        println!("Cancelled.");
        return Ok(());
    }

    let result = coordinator.confirm_page_deletion().await;
    finish(&mut coordinator, renderer, "delete page", result)?;
    println!("Page {page_id} deleted.");
    Ok(())
}

async fn cmd_repair_page(
    api: &HttpApi,
    renderer: &Renderer,
    project: &str,
    page: &str,
) -> anyhow::Result<()> {
    let mut coordinator = open_project(api, project).await?;
    let page_id = resolve_page(coordinator.loaded_tree()?, page)?;
    let result = coordinator.repair_page(page_id).await;
    let created = finish(&mut coordinator, renderer, "repair page", result)?;
    if created.is_empty() {
        println!("Page {page_id} already has all sections.");
    } else {
        let stages: Vec<&str> = created.iter().map(|s| s.code()).collect();
        println!("Page {page_id}: created {}.", stages.join(", "));
    }
    Ok(())
}

async fn cmd_report_issue(api: &HttpApi, description: String) -> anyhow::Result<()> {
    let description = description.trim().to_string();
    if description.is_empty() {
        bail!("issue description cannot be empty");
    }
    api.submit_issue_report(IssueReport { description })
        .await
        .context("failed to submit issue report")?;
    println!("Thanks! Your report was submitted.");
    Ok(())
}
