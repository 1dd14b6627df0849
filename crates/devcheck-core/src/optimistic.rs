//! Two-phase optimistic edits: `apply` patches the local tree before the
//! request is issued, and `reconcile_after` picks what happens once the
//! backend answers.

use devcheck_shared::{PageId, ProjectStatus, TaskId};

use crate::tree::ProjectTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalEdit {
    SetTaskCompleted { task: TaskId, completed: bool },
    RemoveTask { task: TaskId },
    RemovePage { page: PageId },
    SetStatus { status: ProjectStatus },
}

impl LocalEdit {
    /// Patches `tree` in place. Returns whether anything changed; unknown ids
    /// leave the tree untouched.
    pub fn apply(&self, tree: &mut ProjectTree) -> bool {
        match *self {
            Self::SetTaskCompleted { task, completed } => tree.set_task_completed(task, completed),
            Self::RemoveTask { task } => tree.remove_task(task),
            Self::RemovePage { page } => tree.remove_page(page),
            Self::SetStatus { status } => {
                let changed = tree.status() != status;
                tree.set_status(status);
                changed
            }
        }
    }

    /// Destructive edits re-fetch on both paths; the rest only on failure.
    pub fn reconcile_after(&self, confirmed: bool) -> Reconcile {
        match self {
            Self::RemoveTask { .. } | Self::RemovePage { .. } => Reconcile::Refetch,
            Self::SetTaskCompleted { .. } | Self::SetStatus { .. } if confirmed => Reconcile::Keep,
            Self::SetTaskCompleted { .. } | Self::SetStatus { .. } => Reconcile::Refetch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Local state already matches what the server accepted.
    Keep,
    /// Discard local speculation and replace it with a fresh fetch.
    Refetch,
}
