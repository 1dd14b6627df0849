use std::collections::HashMap;
use std::fmt;

use devcheck_shared::{PageId, SectionId, Stage};
use tracing::debug;

use crate::tree::ProjectTree;

/// Identity of a section for in-progress input.
///
/// A section that the tree does not know yet (e.g. created this session and
/// not round-tripped) is addressed by page and stage until its id arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKey {
    Known(SectionId),
    Pending { page: PageId, stage: Stage },
}

impl SectionKey {
    pub fn for_section(tree: &ProjectTree, page: PageId, stage: Stage) -> Self {
        match tree.section(page, stage) {
            Some(section) => Self::Known(section.id),
            None => Self::Pending { page, stage },
        }
    }

    /// Section id this key points at in `tree`, if any.
    pub fn resolve(&self, tree: &ProjectTree) -> Option<SectionId> {
        match *self {
            Self::Known(id) => Some(id),
            Self::Pending { page, stage } => tree.section(page, stage).map(|s| s.id),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(id) => write!(f, "{id}"),
            Self::Pending { page, stage } => write!(f, "{page}-{}", stage.code()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub open: bool,
    pub title: String,
}

/// Per-section "add task" input state.
#[derive(Debug, Clone, Default)]
pub struct DraftBook {
    drafts: HashMap<SectionKey, Draft>,
}

impl DraftBook {
    pub fn get(&self, key: SectionKey) -> Option<&Draft> {
        self.drafts.get(&key)
    }

    pub fn is_open(&self, key: SectionKey) -> bool {
        self.drafts.get(&key).is_some_and(|d| d.open)
    }

    pub fn title(&self, key: SectionKey) -> &str {
        self.drafts
            .get(&key)
            .map(|d| d.title.as_str())
            .unwrap_or_default()
    }

    pub fn open(&mut self, key: SectionKey) {
        self.drafts.entry(key).or_default().open = true;
    }

    pub fn set_title(&mut self, key: SectionKey, title: impl Into<String>) {
        self.drafts.entry(key).or_default().title = title.into();
    }

    /// Hides the input and forgets the typed text.
    pub fn clear(&mut self, key: SectionKey) {
        self.drafts.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Moves `Pending` drafts onto `Known` keys for sections that now have an
    /// id. A draft already stored under the known key wins. Drafts for
    /// sections or pages that are no longer in `tree` are dropped.
    pub fn rekey(&mut self, tree: &ProjectTree) {
        let pending: Vec<(SectionKey, SectionId)> = self
            .drafts
            .keys()
            .filter(|key| matches!(key, SectionKey::Pending { .. }))
            .filter_map(|key| key.resolve(tree).map(|id| (*key, id)))
            .collect();

        for (old, id) in pending {
            if let Some(draft) = self.drafts.remove(&old) {
                debug!(from = %old, to = %id, "rekeying task draft");
                self.drafts.entry(SectionKey::Known(id)).or_insert(draft);
            }
        }

        self.drafts.retain(|key, _| {
            let live = match *key {
                SectionKey::Known(id) => tree.section_by_id(id).is_some(),
                SectionKey::Pending { page, .. } => tree.page(page).is_some(),
            };
            if !live {
                debug!(key = %key, "dropping draft for removed section");
            }
            live
        });
    }
}
