use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::aggregate::{Dashboard, ProjectOverview};
use crate::api::{ApiResult, ChecklistApi};

/// Lists the user's projects and fetches every detail tree, with at most
/// `concurrency` detail requests in flight. A failed detail fetch is recorded
/// as zero tasks and does not stop the others.
#[instrument(skip(api))]
pub async fn load_dashboard<A: ChecklistApi>(api: &A, concurrency: usize) -> ApiResult<Dashboard> {
    let projects = api.list_projects().await?;
    info!(count = projects.len(), "loaded project list");

    let overviews: Vec<ProjectOverview> = stream::iter(projects)
        .map(|project| async move {
            match api.get_project_detail(project.id).await {
                Ok(detail) => ProjectOverview::new(project, Some(detail)),
                Err(err) => {
                    warn!(project = %project.id, error = %err, "project detail fetch failed");
                    ProjectOverview::new(project, None)
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    Ok(Dashboard::from_overviews(overviews))
}
