//! Derived statistics over loaded projects. Everything here is pure: the same
//! projects and detail trees always produce the same aggregates.

use std::collections::HashMap;

use devcheck_shared::{Project, ProjectDetail, ProjectId, ProjectStatus, TaskNode};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskTotals {
    pub completed: usize,
    pub total: usize,
}

impl TaskTotals {
    /// `0/0` means "no tasks yet", not 0%.
    pub fn has_tasks(&self) -> bool {
        self.total > 0
    }

    pub fn progress(&self) -> String {
        progress_fraction(self.completed, self.total)
    }

    fn add(self, other: TaskTotals) -> TaskTotals {
        TaskTotals {
            completed: self.completed + other.completed,
            total: self.total + other.total,
        }
    }
}

pub fn task_totals<'a>(tasks: impl IntoIterator<Item = &'a TaskNode>) -> TaskTotals {
    tasks
        .into_iter()
        .fold(TaskTotals::default(), |acc, task| TaskTotals {
            completed: acc.completed + usize::from(task.completed),
            total: acc.total + 1,
        })
}

pub fn detail_totals(detail: &ProjectDetail) -> TaskTotals {
    task_totals(
        detail
            .pages
            .iter()
            .flat_map(|page| page.sections.iter())
            .flat_map(|section| section.tasks.iter()),
    )
}

/// Percentage string for a progress bar; `"0%"` when there are no tasks.
pub fn progress_fraction(completed: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let percent = completed as f64 / total as f64 * 100.0;
    format!("{percent}%")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub mvp: usize,
    pub in_development: usize,
    pub in_deployment: usize,
}

impl StatusCounts {
    pub fn get(&self, status: ProjectStatus) -> usize {
        match status {
            ProjectStatus::Mvp => self.mvp,
            ProjectStatus::InDevelopment => self.in_development,
            ProjectStatus::InDeployment => self.in_deployment,
        }
    }
}

pub fn status_counts<'a>(projects: impl IntoIterator<Item = &'a Project>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for project in projects {
        match project.project_status {
            ProjectStatus::Mvp => counts.mvp += 1,
            ProjectStatus::InDevelopment => counts.in_development += 1,
            ProjectStatus::InDeployment => counts.in_deployment += 1,
        }
    }
    counts
}

/// Most recently edited first. `sort_by` is stable, so equal timestamps keep
/// their input order.
pub fn sort_by_recency<T, F>(items: &mut [T], edited_at: F)
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    items.sort_by(|a, b| edited_at(b).cmp(&edited_at(a)));
}

pub fn recently_edited(projects: &[Project], limit: usize) -> Vec<&Project> {
    let mut sorted: Vec<&Project> = projects.iter().collect();
    sort_by_recency(&mut sorted, |p| p.last_edited());
    sorted.truncate(limit);
    sorted
}

/// A project plus its detail tree, when that could be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectOverview {
    pub project: Project,
    pub detail: Option<ProjectDetail>,
    pub totals: TaskTotals,
}

impl ProjectOverview {
    pub fn new(project: Project, detail: Option<ProjectDetail>) -> Self {
        let totals = detail.as_ref().map(detail_totals).unwrap_or_default();
        Self {
            project,
            detail,
            totals,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    overviews: Vec<ProjectOverview>,
}

impl Dashboard {
    /// Pairs every project with its entry in `details`; projects without one
    /// report zero tasks.
    pub fn build(projects: Vec<Project>, mut details: HashMap<ProjectId, ProjectDetail>) -> Self {
        let overviews = projects
            .into_iter()
            .map(|project| {
                let detail = details.remove(&project.id);
                ProjectOverview::new(project, detail)
            })
            .collect();
        Self { overviews }
    }

    pub fn from_overviews(overviews: Vec<ProjectOverview>) -> Self {
        Self { overviews }
    }

    pub fn len(&self) -> usize {
        self.overviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overviews.is_empty()
    }

    pub fn totals_for(&self, id: ProjectId) -> Option<TaskTotals> {
        self.overviews
            .iter()
            .find(|o| o.project.id == id)
            .map(|o| o.totals)
    }

    pub fn status_counts(&self) -> StatusCounts {
        status_counts(self.overviews.iter().map(|o| &o.project))
    }

    pub fn overall_totals(&self) -> TaskTotals {
        self.overviews
            .iter()
            .fold(TaskTotals::default(), |acc, o| acc.add(o.totals))
    }

    /// Every project, most recently edited first.
    pub fn all(&self) -> Vec<&ProjectOverview> {
        let mut sorted: Vec<&ProjectOverview> = self.overviews.iter().collect();
        sort_by_recency(&mut sorted, |o| o.project.last_edited());
        sorted
    }

    pub fn recent(&self, limit: usize) -> Vec<&ProjectOverview> {
        let mut sorted = self.all();
        sorted.truncate(limit);
        sorted
    }
}
