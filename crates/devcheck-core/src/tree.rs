use devcheck_shared::{
    PageId, PageNode, ProjectDetail, ProjectId, ProjectStatus, SectionId, SectionNode, Stage,
    TaskId, TaskNode,
};

/// In-memory Project → Page → Section → Task tree for one loaded project.
///
/// Rebuilt wholesale from every detail fetch and patched in place for
/// optimistic edits.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTree {
    detail: ProjectDetail,
}

impl ProjectTree {
    pub fn new(detail: ProjectDetail) -> Self {
        Self { detail }
    }

    pub fn detail(&self) -> &ProjectDetail {
        &self.detail
    }

    pub fn into_detail(self) -> ProjectDetail {
        self.detail
    }

    pub fn project_id(&self) -> ProjectId {
        self.detail.id
    }

    pub fn status(&self) -> ProjectStatus {
        self.detail.project_status
    }

    pub fn set_status(&mut self, status: ProjectStatus) {
        self.detail.project_status = status;
    }

    pub fn pages(&self) -> &[PageNode] {
        &self.detail.pages
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.detail
            .pages
            .iter()
            .flat_map(|page| page.sections.iter())
            .flat_map(|section| section.tasks.iter())
    }

    pub fn page(&self, id: PageId) -> Option<&PageNode> {
        self.detail.pages.iter().find(|page| page.id == id)
    }

    pub fn find_page_by_name(&self, name: &str) -> Option<&PageNode> {
        let wanted = name.trim();
        self.detail
            .pages
            .iter()
            .find(|page| page.name.eq_ignore_ascii_case(wanted))
    }

    pub fn section(&self, page: PageId, stage: Stage) -> Option<&SectionNode> {
        self.page(page)?
            .sections
            .iter()
            .find(|section| section.title == stage)
    }

    pub fn section_by_id(&self, id: SectionId) -> Option<(&PageNode, &SectionNode)> {
        self.detail.pages.iter().find_map(|page| {
            page.sections
                .iter()
                .find(|section| section.id == id)
                .map(|section| (page, section))
        })
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskNode> {
        self.tasks().find(|task| task.id == id)
    }

    fn task_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.detail
            .pages
            .iter_mut()
            .flat_map(|page| page.sections.iter_mut())
            .flat_map(|section| section.tasks.iter_mut())
            .find(|task| task.id == id)
    }

    /// Stages that have no section under `page`. Empty for complete pages and
    /// for pages that are not in the tree.
    pub fn missing_stages(&self, page: PageId) -> Vec<Stage> {
        let Some(node) = self.page(page) else {
            return vec![];
        };
        Stage::ALL
            .into_iter()
            .filter(|stage| !node.sections.iter().any(|s| s.title == *stage))
            .collect()
    }

    /// Sets `completed` on a task. Returns false when the id is not present.
    pub fn set_task_completed(&mut self, id: TaskId, completed: bool) -> bool {
        match self.task_mut(id) {
            Some(task) => {
                task.completed = completed;
                true
            }
            None => false,
        }
    }

    /// Removes a task from every section it appears in.
    pub fn remove_task(&mut self, id: TaskId) -> bool {
        let mut removed = false;
        for section in self
            .detail
            .pages
            .iter_mut()
            .flat_map(|page| page.sections.iter_mut())
        {
            let before = section.tasks.len();
            section.tasks.retain(|task| task.id != id);
            removed |= section.tasks.len() != before;
        }
        removed
    }

    pub fn remove_page(&mut self, id: PageId) -> bool {
        let before = self.detail.pages.len();
        self.detail.pages.retain(|page| page.id != id);
        self.detail.pages.len() != before
    }

    /// Inserts a page, or replaces the one with the same id.
    pub fn upsert_page(&mut self, page: PageNode) {
        match self.detail.pages.iter_mut().find(|p| p.id == page.id) {
            Some(existing) => *existing = page,
            None => self.detail.pages.push(page),
        }
    }

    pub fn add_section(&mut self, page: PageId, section: SectionNode) -> bool {
        let Some(node) = self.detail.pages.iter_mut().find(|p| p.id == page) else {
            return false;
        };
        if node.sections.iter().any(|s| s.title == section.title) {
            return false;
        }
        node.sections.push(section);
        node.sections.sort_by_key(|s| s.title);
        true
    }
}
